//! Server assembly.
//!
//! Binds the listener, wires the gateway to the tick loop, and runs both
//! until shutdown.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::Context;
use arena_shared::{
    config::ServerConfig,
    entity::{default_arena, Entity},
    net::FrameListener,
};
use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::{
    gateway::Gateway,
    simulation::{PaddleSimulation, Simulation},
    store::EntityStore,
    tick::TickLoop,
};

/// Capacity of the gateway -> tick loop event channel.
const EVENT_QUEUE: usize = 64;

/// Game server.
pub struct GameServer {
    pub cfg: ServerConfig,
    listener: FrameListener,
    gateway: Gateway,
    tick_loop: TickLoop,
}

impl GameServer {
    /// Binds with the default arena and paddle simulation.
    pub async fn bind(cfg: ServerConfig) -> anyhow::Result<Self> {
        let sim = PaddleSimulation::new(cfg.paddle_speed);
        Self::bind_with(cfg, default_arena(), Box::new(sim)).await
    }

    pub async fn bind_with(
        cfg: ServerConfig,
        entities: Vec<Entity>,
        simulation: Box<dyn Simulation>,
    ) -> anyhow::Result<Self> {
        cfg.validate().context("invalid server config")?;
        let addr: SocketAddr = cfg.listen_addr.parse().context("parse listen_addr")?;
        let listener = FrameListener::bind(addr).await?;
        let store = EntityStore::new(entities).context("build entity store")?;

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let tick_loop = TickLoop::new(cfg.clone(), store, simulation, events_rx);

        Ok(Self {
            cfg,
            listener,
            gateway: Gateway::new(events_tx),
            tick_loop,
        })
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn gateway(&self) -> Gateway {
        self.gateway.clone()
    }

    /// Accepts and ticks until `shutdown` turns true.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let local = self.listener.local_addr()?;
        info!(%local, "Server listening");

        let acceptor = self.gateway.spawn_acceptor(self.listener);
        // The loop must not be kept alive by our own handle.
        drop(self.gateway);
        let result = self.tick_loop.run(shutdown).await;
        acceptor.abort();
        result
    }
}

/// Helper for tests: bind to an ephemeral loopback port.
pub async fn bind_ephemeral(tick_hz: u32) -> anyhow::Result<(GameServer, ServerConfig)> {
    let cfg = ServerConfig {
        listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).to_string(),
        tick_hz,
        ..Default::default()
    };
    let server = GameServer::bind(cfg).await?;
    let mut cfg = server.cfg.clone();
    cfg.listen_addr = server.local_addr()?.to_string();
    Ok((server, cfg))
}
