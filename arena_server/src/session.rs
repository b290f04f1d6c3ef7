//! Connection sessions.
//!
//! A session bridges one socket to the tick loop through exactly two
//! primitives:
//! - a `watch` register holding the latest `UserCommand` (last write wins)
//! - a bounded `mpsc` queue of outbound frames, drained by a writer task
//!
//! The reader and writer tasks never touch the registry. They report failure
//! by raising the session's disconnect flag, which the tick loop reaps.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use arena_shared::{
    codec::{ClientMsg, ControlMsg},
    command::UserCommand,
    config::ServerConfig,
    error::{NetError, NetResult},
    net::{FrameReader, FrameWriter, RawConnection, SessionId},
};
use bytes::Bytes;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// Shared disconnect flag. Raised by any side, consumed at the next reap.
#[derive(Debug, Clone, Default)]
pub struct DisconnectFlag(Arc<AtomicBool>);

impl DisconnectFlag {
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Server-side state of one connected client. Owned by the registry.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    name: String,
    peer: Option<SocketAddr>,
    outbound: mpsc::Sender<Bytes>,
    commands: watch::Receiver<UserCommand>,
    disconnected: DisconnectFlag,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl Session {
    /// Splits the connection and spawns its reader and writer tasks.
    /// `capacity` bounds the outbound queue.
    pub fn spawn(
        id: SessionId,
        name: String,
        conn: RawConnection,
        cfg: &ServerConfig,
        capacity: usize,
    ) -> Self {
        let peer = conn.peer;
        let (frames_in, frames_out) = conn.into_split(cfg.max_frame_len);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));
        let (commands_tx, commands_rx) = watch::channel(UserCommand::default());
        let disconnected = DisconnectFlag::default();

        let reader = tokio::spawn(read_loop(id, frames_in, commands_tx, disconnected.clone()));
        let writer = tokio::spawn(write_loop(id, frames_out, outbound_rx, disconnected.clone()));

        Self {
            id,
            name,
            peer: Some(peer),
            outbound: outbound_tx,
            commands: commands_rx,
            disconnected,
            reader: Some(reader),
            writer: Some(writer),
        }
    }

    /// Builds a session around already-created channels, without I/O tasks.
    pub fn from_parts(
        id: SessionId,
        name: String,
        outbound: mpsc::Sender<Bytes>,
        commands: watch::Receiver<UserCommand>,
    ) -> Self {
        Self {
            id,
            name,
            peer: None,
            outbound,
            commands,
            disconnected: DisconnectFlag::default(),
            reader: None,
            writer: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// The freshest command the client sent. Persists until overwritten.
    pub fn latest_command(&self) -> UserCommand {
        *self.commands.borrow()
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected.is_raised()
    }

    pub fn mark_disconnected(&self) {
        self.disconnected.raise();
    }

    /// Offers a frame to the outbound queue without waiting.
    ///
    /// A full queue is terminal: the session is flagged and the frame dropped.
    pub fn try_send(&self, frame: Bytes) -> NetResult<()> {
        if self.is_disconnected() {
            return Err(NetError::Closed);
        }
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.mark_disconnected();
                Err(NetError::QueueSaturated)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_disconnected();
                Err(NetError::Closed)
            }
        }
    }

    /// Tears the session down.
    ///
    /// A healthy session's writer flushes what is queued and half-closes the
    /// socket; a failed one is aborted immediately.
    pub fn close(mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        if self.is_disconnected() {
            if let Some(writer) = self.writer.take() {
                writer.abort();
            }
        }
        debug!(session_id = %self.id, "session closed");
    }
}

async fn read_loop(
    id: SessionId,
    mut frames: FrameReader,
    commands: watch::Sender<UserCommand>,
    disconnected: DisconnectFlag,
) {
    loop {
        let frame = match frames.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!(session_id = %id, "peer closed connection");
                break;
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "read failed");
                break;
            }
        };
        match ClientMsg::decode(&frame) {
            Ok(ClientMsg::Command(cmd)) => {
                commands.send_replace(cmd);
            }
            Ok(ClientMsg::Control(ControlMsg::Leave { .. })) => {
                info!(session_id = %id, "client said goodbye");
                break;
            }
            Ok(ClientMsg::Control(other)) => {
                warn!(session_id = %id, opcode = other.opcode(), "unexpected control message");
                break;
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "dropping client");
                break;
            }
        }
    }
    disconnected.raise();
}

async fn write_loop(
    id: SessionId,
    mut frames: FrameWriter,
    mut outbound: mpsc::Receiver<Bytes>,
    disconnected: DisconnectFlag,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = frames.send(&frame).await {
            warn!(session_id = %id, error = %e, "write failed");
            disconnected.raise();
            return;
        }
    }
    let _ = frames.shutdown().await;
}
