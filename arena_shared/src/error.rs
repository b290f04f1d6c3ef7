//! Network-layer error types.
//!
//! Every variant is terminal for the connection it occurred on. Nothing in
//! the arena core retries.

/// Errors that can occur while decoding or moving frames.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// A frame could not be decoded. The peer must be disconnected.
    #[error("malformed message: {reason}")]
    Malformed { reason: String },

    /// Read or write on the underlying socket failed.
    #[error("connection failure: {0}")]
    Connection(#[from] std::io::Error),

    /// The session's outbound queue was full when a frame was offered.
    #[error("outbound queue saturated")]
    QueueSaturated,

    /// The other side of a session channel has gone away.
    #[error("session closed")]
    Closed,
}

impl NetError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        NetError::Malformed {
            reason: reason.into(),
        }
    }
}

/// Convenience alias used across the codec and transport.
pub type NetResult<T> = Result<T, NetError>;
