//! Helpers shared by the integration tests.

use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use arena_client::GameClient;
use arena_server::{gateway::Gateway, server::bind_ephemeral};
use arena_shared::{codec::ServerMsg, config::ClientConfig};
use tokio::{sync::watch, task::JoinHandle};

/// Installs a test-writer subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// A server running in the background on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub gateway: Gateway,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    pub async fn start(tick_hz: u32) -> anyhow::Result<Self> {
        let (server, cfg) = bind_ephemeral(tick_hz).await?;
        let addr = cfg.listen_addr.parse().context("parse listen_addr")?;
        let gateway = server.gateway();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(server.run(shutdown_rx));
        Ok(Self {
            addr,
            gateway,
            shutdown,
            handle,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_addr: self.addr.to_string(),
            ..Default::default()
        }
    }

    pub async fn connect(&self) -> anyhow::Result<GameClient> {
        GameClient::connect(&self.client_config()).await
    }

    pub async fn stop(self) -> anyhow::Result<()> {
        self.shutdown.send_replace(true);
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .context("server did not stop")???;
        Ok(())
    }
}

/// Receives until `pred` matches, failing after `timeout`.
pub async fn recv_until(
    client: &mut GameClient,
    timeout: Duration,
    mut pred: impl FnMut(&ServerMsg, &GameClient) -> bool,
) -> anyhow::Result<ServerMsg> {
    tokio::time::timeout(timeout, async {
        loop {
            match client.recv().await? {
                Some(msg) if pred(&msg, &*client) => return Ok(msg),
                Some(_) => {}
                None => anyhow::bail!("connection closed"),
            }
        }
    })
    .await
    .context("timed out waiting for message")?
}
