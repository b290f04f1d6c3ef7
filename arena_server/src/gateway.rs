//! Accept/disconnect gateway.
//!
//! Turns raw connection events into `GatewayEvent`s for the tick loop. The
//! gateway never touches the registry itself; everything is serialized
//! through the event channel.

use arena_shared::net::{FrameListener, SessionId};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{info, warn};

use crate::tick::{GatewayEvent, ServerStatus};

/// Cloneable handle for sending events to the tick loop.
#[derive(Debug, Clone)]
pub struct Gateway {
    events: mpsc::Sender<GatewayEvent>,
}

impl Gateway {
    pub fn new(events: mpsc::Sender<GatewayEvent>) -> Self {
        Self { events }
    }

    /// Asks the tick loop to drop a session at its next reap.
    pub async fn disconnect(&self, id: SessionId) -> anyhow::Result<()> {
        self.events
            .send(GatewayEvent::Disconnect(id))
            .await
            .map_err(|_| anyhow::anyhow!("tick loop has stopped"))
    }

    pub async fn status(&self) -> anyhow::Result<ServerStatus> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(GatewayEvent::Status(tx))
            .await
            .map_err(|_| anyhow::anyhow!("tick loop has stopped"))?;
        Ok(rx.await?)
    }

    /// Spawns the accept task. It ends when the tick loop stops listening.
    pub fn spawn_acceptor(&self, listener: FrameListener) -> JoinHandle<()> {
        let events = self.events.clone();
        tokio::spawn(async move {
            loop {
                let conn = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                        continue;
                    }
                };
                info!(peer = %conn.peer, "incoming connection");
                if events.send(GatewayEvent::Connected(conn)).await.is_err() {
                    break;
                }
            }
        })
    }
}
