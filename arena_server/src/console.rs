//! Server console.
//!
//! Commands:
//!   status     - Show tick, entities and sessions
//!   kick <id>  - Disconnect a session
//!   quit       - Shut the server down

use tokio::sync::watch;

use arena_shared::net::SessionId;

use crate::gateway::Gateway;

/// Executes one console line and returns the lines to print.
pub async fn exec_console(
    line: &str,
    gateway: &Gateway,
    shutdown: &watch::Sender<bool>,
) -> anyhow::Result<Vec<String>> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&cmd) = tokens.first() else {
        return Ok(Vec::new());
    };

    match cmd {
        "status" => {
            let status = gateway.status().await?;
            let mut out = vec![
                format!("State: {:?}", status.state),
                format!("Tick: {}", status.tick),
                format!("Entities: {}", status.entities),
                format!("Sessions: {}", status.sessions.len()),
            ];
            for s in &status.sessions {
                out.push(format!(
                    "  {}: {} peer={:?} disconnected={}",
                    s.id, s.name, s.peer, s.disconnected
                ));
            }
            Ok(out)
        }
        "kick" => {
            let Some(id) = tokens.get(1).and_then(|t| t.parse::<u32>().ok()) else {
                return Ok(vec!["Usage: kick <id>".to_string()]);
            };
            gateway.disconnect(SessionId(id)).await?;
            Ok(vec![format!("Kicking session {id}")])
        }
        "quit" | "exit" => {
            shutdown.send_replace(true);
            Ok(vec!["Shutting down".to_string()])
        }
        other => Ok(vec![format!("Unknown command: {other}")]),
    }
}
