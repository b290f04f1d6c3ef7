//! Client implementation.
//!
//! The client maintains:
//! - A framed connection to the server
//! - A mirror of the server's entity slots, patched by each snapshot
//! - The roster of other sessions, built from control messages
//! - Snapshot history for interpolation

use std::{collections::BTreeMap, net::SocketAddr, time::Duration};

use anyhow::Context;
use arena_shared::{
    codec::{decode_snapshot, ClientMsg, ControlMsg, ServerMsg},
    command::UserCommand,
    config::ClientConfig,
    entity::Entity,
    error::NetResult,
    math::Vec3,
    net::{self, FrameReader, FrameWriter, SessionId},
};
use tracing::{debug, info, warn};

use crate::interp::SnapshotBuffer;

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Connected, waiting for the initial full snapshot.
    Connected,
    /// Mirror holds a complete world.
    Synced,
    Disconnected,
}

/// Another session as announced by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    pub name: String,
    pub position: Vec3,
}

/// Local replica of server state.
#[derive(Default)]
pub struct Mirror {
    pub session_id: Option<SessionId>,
    pub entities: Vec<Entity>,
    pub roster: BTreeMap<SessionId, RosterEntry>,
    pub snaps: SnapshotBuffer,
    pub snapshots_applied: u64,
}

impl Mirror {
    pub fn new(entity_count: usize) -> Self {
        Self {
            entities: vec![Entity::default(); entity_count],
            snaps: SnapshotBuffer::new(32),
            ..Default::default()
        }
    }

    /// Applies one server message. A malformed snapshot changes nothing.
    pub fn apply(&mut self, msg: &ServerMsg) -> NetResult<()> {
        match msg {
            ServerMsg::Snapshot(body) => {
                decode_snapshot(body, &mut self.entities)?;
                self.snaps.push(&self.entities);
                self.snapshots_applied += 1;
            }
            ServerMsg::Control(ControlMsg::AssignId { id }) => {
                self.session_id = Some(*id);
            }
            ServerMsg::Control(ControlMsg::Join { id, name, position }) => {
                self.roster.insert(
                    *id,
                    RosterEntry {
                        name: name.clone(),
                        position: *position,
                    },
                );
            }
            ServerMsg::Control(ControlMsg::Leave { id }) => {
                self.roster.remove(id);
            }
            ServerMsg::Control(ControlMsg::Position { id, position }) => {
                if let Some(entry) = self.roster.get_mut(id) {
                    entry.position = *position;
                }
            }
        }
        Ok(())
    }
}

/// High-level game client.
pub struct GameClient {
    pub state: ClientState,
    pub mirror: Mirror,
    reader: FrameReader,
    writer: FrameWriter,
    server: SocketAddr,
}

impl GameClient {
    /// Connects to a server. The first frame it will receive is a full sync.
    pub async fn connect(cfg: &ClientConfig) -> anyhow::Result<Self> {
        let server: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        info!(%server, "Connecting to server");
        let (reader, writer) = net::connect(server, cfg.max_frame_len).await?;
        Ok(Self {
            state: ClientState::Connected,
            mirror: Mirror::new(cfg.entity_count),
            reader,
            writer,
            server,
        })
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.mirror.session_id
    }

    pub fn entities(&self) -> &[Entity] {
        &self.mirror.entities
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server
    }

    /// Waits for the next server message and applies it.
    ///
    /// Returns `None` once the server closes the connection. A frame that
    /// fails to decode or apply ends the connection: the mirror may have
    /// missed a delta, so nothing after it can be trusted.
    pub async fn recv(&mut self) -> anyhow::Result<Option<ServerMsg>> {
        if self.state == ClientState::Disconnected {
            anyhow::bail!("connection closed");
        }
        let frame = match self.reader.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("server closed connection");
                self.state = ClientState::Disconnected;
                return Ok(None);
            }
            Err(e) => {
                self.state = ClientState::Disconnected;
                return Err(e).context("read frame");
            }
        };
        let msg = match ServerMsg::decode(&frame).context("decode server frame") {
            Ok(msg) => msg,
            Err(e) => return Err(self.abandon(e).await),
        };
        if let Err(e) = self.mirror.apply(&msg).context("apply server frame") {
            return Err(self.abandon(e).await);
        }
        if matches!(msg, ServerMsg::Snapshot(_)) && self.state == ClientState::Connected {
            debug!("initial sync applied");
            self.state = ClientState::Synced;
        }
        Ok(Some(msg))
    }

    async fn abandon(&mut self, err: anyhow::Error) -> anyhow::Error {
        warn!(error = %err, "malformed server frame; closing connection");
        self.state = ClientState::Disconnected;
        let _ = self.writer.shutdown().await;
        err
    }

    /// Like `recv`, but gives up after `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> anyhow::Result<Option<ServerMsg>> {
        match tokio::time::timeout(timeout, self.recv()).await {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }

    pub async fn send_command(&mut self, cmd: UserCommand) -> anyhow::Result<()> {
        self.writer
            .send(&ClientMsg::Command(cmd).encode())
            .await
            .context("send command")
    }

    /// Says goodbye and closes the write side.
    pub async fn leave(&mut self) -> anyhow::Result<()> {
        let id = self.mirror.session_id.unwrap_or(SessionId(0));
        self.writer
            .send(&ClientMsg::Control(ControlMsg::Leave { id }).encode())
            .await
            .context("send leave")?;
        self.writer.shutdown().await.context("shutdown")?;
        self.state = ClientState::Disconnected;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_shared::{
        codec::encode_snapshot,
        entity::{default_arena, Slot},
    };

    #[test]
    fn mirror_tracks_world_and_roster() {
        let mut mirror = Mirror::new(3);
        let world = default_arena();
        let full = ServerMsg::Snapshot(encode_snapshot(&world, &[], true));
        mirror.apply(&full).unwrap();
        assert_eq!(mirror.entities, world);

        let mut moved = world.clone();
        moved[2].position = Vec3::new(0.0, 7.0, 0.0);
        mirror
            .apply(&ServerMsg::Snapshot(encode_snapshot(&moved, &world, false)))
            .unwrap();
        assert_eq!(mirror.entities, moved);
        assert_eq!(mirror.snaps.interp_entity(Slot(2), 1.0), Some(Vec3::new(0.0, 7.0, 0.0)));

        for msg in [
            ControlMsg::AssignId { id: SessionId(3) },
            ControlMsg::Join {
                id: SessionId(1),
                name: "player1".into(),
                position: Vec3::ZERO,
            },
            ControlMsg::Position {
                id: SessionId(1),
                position: Vec3::new(1.0, 1.0, 1.0),
            },
        ] {
            mirror.apply(&ServerMsg::Control(msg)).unwrap();
        }
        assert_eq!(mirror.session_id, Some(SessionId(3)));
        assert_eq!(mirror.roster[&SessionId(1)].position, Vec3::new(1.0, 1.0, 1.0));

        mirror
            .apply(&ServerMsg::Control(ControlMsg::Leave { id: SessionId(1) }))
            .unwrap();
        assert!(mirror.roster.is_empty());
        assert_eq!(mirror.snapshots_applied, 2);
    }

    #[tokio::test]
    async fn malformed_frame_ends_the_connection() -> anyhow::Result<()> {
        let listener = net::FrameListener::bind("127.0.0.1:0".parse()?).await?;
        let cfg = ClientConfig {
            server_addr: listener.local_addr()?.to_string(),
            ..Default::default()
        };
        let (client, accepted) = tokio::join!(GameClient::connect(&cfg), listener.accept());
        let mut client = client?;
        let (mut server_rx, mut server_tx) = accepted?.into_split(cfg.max_frame_len);

        let world = default_arena();
        let mut moved = world.clone();
        moved[0].position = Vec3::new(1.0, 0.0, 0.0);
        let full = ServerMsg::Snapshot(encode_snapshot(&world, &[], true)).encode();
        let delta = ServerMsg::Snapshot(encode_snapshot(&moved, &world, false)).encode();
        server_tx.send(&full).await?;
        server_tx.send(&full[..full.len() - 5]).await?;
        server_tx.send(&delta).await?;

        assert!(matches!(client.recv().await?, Some(ServerMsg::Snapshot(_))));
        assert_eq!(client.state, ClientState::Synced);

        assert!(client.recv().await.is_err());
        assert_eq!(client.state, ClientState::Disconnected);
        // The valid delta behind the bad frame is never applied.
        assert!(client.recv().await.is_err());
        assert_eq!(client.entities(), &world[..]);
        assert_eq!(client.mirror.snapshots_applied, 1);

        // Our write side was shut down.
        assert!(server_rx.recv().await?.is_none());
        Ok(())
    }

    #[test]
    fn bad_snapshot_leaves_mirror_alone() {
        let mut mirror = Mirror::new(2);
        let body = encode_snapshot(&default_arena(), &[], true);
        assert!(mirror.apply(&ServerMsg::Snapshot(body)).is_err());
        assert_eq!(mirror.entities, vec![Entity::default(); 2]);
        assert_eq!(mirror.snapshots_applied, 0);
    }
}
