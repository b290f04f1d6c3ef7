//! Tick loop.
//!
//! The single logical thread that owns the entity store and the session
//! registry. Per tick, strictly in order:
//!
//! 1. read every live session's latest command
//! 2. run the simulation step
//! 3. encode the delta snapshot
//! 4. offer it to every session without blocking
//! 5. reap flagged sessions and announce their departure
//! 6. commit `current` into `previous`
//!
//! Gateway events (joins, kicks, status queries) are handled between ticks,
//! never inside one.

use std::net::SocketAddr;

use arena_shared::{
    codec::{ControlMsg, ServerMsg},
    config::ServerConfig,
    math::Vec3,
    net::{RawConnection, SessionId},
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    registry::SessionRegistry,
    session::Session,
    simulation::Simulation,
    store::EntityStore,
};

/// Tick loop lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Ticking and accepting joins.
    Running,
    /// Shutdown requested; no further ticks start.
    Draining,
    Stopped,
}

/// Requests routed into the tick loop by the gateway.
#[derive(Debug)]
pub enum GatewayEvent {
    /// A freshly accepted connection.
    Connected(RawConnection),
    /// Ask for a session to be removed at the next reap.
    Disconnect(SessionId),
    Status(oneshot::Sender<ServerStatus>),
}

/// Point-in-time view of the loop, for the console.
#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub state: LoopState,
    pub tick: u64,
    pub entities: usize,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub peer: Option<SocketAddr>,
    pub disconnected: bool,
}

pub struct TickLoop {
    cfg: ServerConfig,
    store: EntityStore,
    registry: SessionRegistry,
    simulation: Box<dyn Simulation>,
    events: mpsc::Receiver<GatewayEvent>,
    state: LoopState,
    tick: u64,
}

impl TickLoop {
    pub fn new(
        cfg: ServerConfig,
        store: EntityStore,
        simulation: Box<dyn Simulation>,
        events: mpsc::Receiver<GatewayEvent>,
    ) -> Self {
        Self {
            cfg,
            store,
            registry: SessionRegistry::new(),
            simulation,
            events,
            state: LoopState::Running,
            tick: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Runs until `shutdown` turns true, its sender drops, or every gateway
    /// handle is gone.
    ///
    /// An overrunning tick is not compensated: the next one starts as soon as
    /// it finishes and the cadence resumes from there.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(self.cfg.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(tick_hz = self.cfg.tick_hz, entities = self.store.len(), "tick loop running");

        while self.state == LoopState::Running {
            tokio::select! {
                _ = interval.tick() => self.tick(),
                event = self.events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("gateway closed");
                        self.state = LoopState::Draining;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(tick = self.tick, "shutdown requested");
                        self.state = LoopState::Draining;
                    }
                }
            }
        }

        self.drain();
        Ok(())
    }

    /// Runs one full tick.
    pub fn tick(&mut self) {
        let inputs = self.registry.collect_inputs();

        let before = self.store.current().to_vec();
        let dt = self.cfg.tick_interval().as_secs_f64();
        if let Err(e) = self.simulation.step(&inputs, &mut self.store, dt) {
            warn!(tick = self.tick, error = %e, "simulation step failed; state rolled back");
            if let Err(e) = self.store.restore(&before) {
                warn!(tick = self.tick, error = %e, "rollback failed");
            }
        }

        let frame = ServerMsg::Snapshot(self.store.diff_and_snapshot(false)).encode();
        let flagged = self.registry.broadcast(&frame);
        if !flagged.is_empty() {
            debug!(tick = self.tick, count = flagged.len(), "sessions flagged during broadcast");
        }

        self.reap();
        self.store.commit();
        self.tick += 1;
    }

    /// Handles one gateway event. Only call between ticks.
    pub fn handle_event(&mut self, event: GatewayEvent) {
        match event {
            GatewayEvent::Connected(conn) => {
                self.on_connect(conn);
            }
            GatewayEvent::Disconnect(id) => {
                if self.registry.mark_disconnected(id) {
                    info!(session_id = %id, "disconnect requested");
                } else {
                    debug!(session_id = %id, "disconnect for unknown session");
                }
            }
            GatewayEvent::Status(reply) => {
                let _ = reply.send(self.status());
            }
        }
    }

    /// Turns an accepted connection into a registered session.
    pub fn on_connect(&mut self, conn: RawConnection) -> Option<SessionId> {
        if self.state != LoopState::Running {
            debug!(peer = %conn.peer, "refusing join while draining");
            return None;
        }
        let id = match self.registry.allocate_id() {
            Ok(id) => id,
            Err(e) => {
                warn!(peer = %conn.peer, error = %e, "refusing join");
                return None;
            }
        };
        let capacity = self.newcomer_capacity();
        let session = Session::spawn(id, format!("player{id}"), conn, &self.cfg, capacity);
        self.join(session);
        Some(id)
    }

    /// Outbound queue size for the next session to join.
    ///
    /// The join backlog (full sync, id, one announcement per session already
    /// registered) goes out in one burst, so it is added on top of the
    /// configured steady-state capacity.
    pub fn newcomer_capacity(&self) -> usize {
        self.cfg.outbound_capacity + self.registry.len() + 2
    }

    /// Registers a session and brings it up to date.
    ///
    /// The newcomer gets, in order: a full snapshot, its id, and one join
    /// announcement per existing session. Everyone else hears about it.
    pub fn join(&mut self, session: Session) {
        let id = session.id();
        let full = ServerMsg::Snapshot(self.store.diff_and_snapshot(true)).encode();
        let mut backlog = vec![full, ServerMsg::Control(ControlMsg::AssignId { id }).encode()];
        for other in self.registry.sorted() {
            backlog.push(
                ServerMsg::Control(ControlMsg::Join {
                    id: other.id(),
                    name: other.name().to_string(),
                    position: Vec3::ZERO,
                })
                .encode(),
            );
        }
        for frame in backlog {
            if let Err(e) = session.try_send(frame) {
                warn!(session_id = %id, error = %e, "initial sync not delivered");
                break;
            }
        }

        let announce = ServerMsg::Control(ControlMsg::Join {
            id,
            name: session.name().to_string(),
            position: Vec3::ZERO,
        })
        .encode();
        self.registry.broadcast_except(Some(id), &announce);

        info!(session_id = %id, peer = ?session.peer(), sessions = self.registry.len() + 1, "session joined");
        self.registry.insert(session);
    }

    fn reap(&mut self) {
        let removed = self.registry.reap();
        if removed.is_empty() {
            return;
        }
        for session in &removed {
            info!(session_id = %session.id(), tick = self.tick, "session reaped");
            let leave = ServerMsg::Control(ControlMsg::Leave { id: session.id() }).encode();
            self.registry.broadcast(&leave);
        }
        for session in removed {
            session.close();
        }
    }

    fn drain(&mut self) {
        self.state = LoopState::Draining;
        for session in self.registry.drain() {
            session.close();
        }
        self.state = LoopState::Stopped;
        info!(tick = self.tick, "tick loop stopped");
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus {
            state: self.state,
            tick: self.tick,
            entities: self.store.len(),
            sessions: self
                .registry
                .sorted()
                .into_iter()
                .map(|s| SessionSummary {
                    id: s.id(),
                    name: s.name().to_string(),
                    peer: s.peer(),
                    disconnected: s.is_disconnected(),
                })
                .collect(),
        }
    }
}
