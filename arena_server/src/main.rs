//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p arena_server -- [--addr 127.0.0.1:8080] [--tick-hz 30] [--config server.json]
//!
//! Console commands:
//!   status     - Show server status
//!   kick <id>  - Disconnect a session
//!   quit       - Shutdown server

use std::env;
use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Context;
use arena_server::{console::exec_console, GameServer};
use arena_shared::config::ServerConfig;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

fn parse_args() -> anyhow::Result<ServerConfig> {
    let args: Vec<String> = env::args().collect();
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => ServerConfig::from_file(Path::new(&args[i + 1]))?,
        _ => ServerConfig::default(),
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.listen_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1]
                    .parse()
                    .with_context(|| format!("parse --tick-hz {:?}", args[i + 1]))?;
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
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(addr = %cfg.listen_addr, tick_hz = cfg.tick_hz, "Starting server");

    let server = GameServer::bind(cfg).await.context("create server")?;
    let gateway = server.gateway();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    let console_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        while let Some(line) = console_rx.recv().await {
            match exec_console(&line, &gateway, &console_shutdown).await {
                Ok(output) => {
                    for line in output {
                        println!("{}", line);
                    }
                }
                Err(e) => println!("Error: {}", e),
            }
        }
    });

    let ctrl_c_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            return;
        }
        ctrl_c_shutdown.send_replace(true);
    });

    println!("Server ready. Type 'status' for info, 'kick <id>' to drop a client, 'quit' to exit.");
    println!();

    server.run(shutdown_rx).await
}
