//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p arena_client -- [--addr 127.0.0.1:8080] [--tick-hz 30] [--entities 3]
//!
//! The client connects, sends a paddle command every tick (alternating up and
//! down once a second), and logs the mirrored world.

use std::env;

use anyhow::Context;
use arena_client::{client::ClientState, input::InputState, GameClient};
use arena_shared::{codec::ServerMsg, config::ClientConfig};
use tracing::info;

fn parse_args() -> anyhow::Result<ClientConfig> {
    let mut cfg = ClientConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1]
                    .parse()
                    .with_context(|| format!("parse --tick-hz {:?}", args[i + 1]))?;
                i += 2;
            }
            "--entities" if i + 1 < args.len() => {
                cfg.entity_count = args[i + 1]
                    .parse()
                    .with_context(|| format!("parse --entities {:?}", args[i + 1]))?;
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg.validate().context("invalid arguments")?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(server = %cfg.server_addr, "Starting client");

    let mut client = GameClient::connect(&cfg).await.context("connect")?;
    let mut interval = tokio::time::interval(cfg.tick_interval());
    let mut frame: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // Fake input for now - a real client would sample the keyboard.
                let up = (frame / u64::from(cfg.tick_hz)) % 2 == 0;
                client.send_command(arena_client::input::build_command(InputState { up, down: !up })).await?;
                frame += 1;
            }
            msg = client.recv() => {
                match msg? {
                    Some(ServerMsg::Control(ctl)) => info!(?ctl, "control"),
                    Some(ServerMsg::Snapshot(_)) => {
                        if client.mirror.snapshots_applied % 30 == 0 {
                            for (slot, ent) in client.entities().iter().enumerate() {
                                info!(slot, kind = ?ent.kind, pos = ?ent.position, "entity");
                            }
                        }
                    }
                    None => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                client.leave().await?;
                break;
            }
        }

        if client.state == ClientState::Disconnected {
            println!("Disconnected from server.");
            break;
        }
    }

    Ok(())
}
