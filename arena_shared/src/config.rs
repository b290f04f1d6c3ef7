//! Configuration.
//!
//! Loads server and client configuration from JSON strings/files.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::net::DEFAULT_MAX_FRAME_LEN;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. `127.0.0.1:8080`.
    pub listen_addr: String,
    /// Fixed simulation tick rate.
    pub tick_hz: u32,
    /// Frames a session may have queued before it is dropped.
    pub outbound_capacity: usize,
    /// Largest inbound frame accepted.
    pub max_frame_len: usize,
    /// Paddle travel in units per second.
    pub paddle_speed: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            tick_hz: 30,
            outbound_capacity: 32,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            paddle_speed: 120.0,
        }
    }
}

impl ServerConfig {
    /// Parses config from JSON. Missing fields take their defaults.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg = Self::from_json_str(&raw)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.validate()
            .with_context(|| format!("validate config {}", path.display()))?;
        Ok(cfg)
    }

    /// Rejects settings the tick loop cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.tick_hz > 0, "tick_hz must be positive");
        anyhow::ensure!(self.outbound_capacity > 0, "outbound_capacity must be positive");
        anyhow::ensure!(
            self.paddle_speed.is_finite(),
            "paddle_speed must be finite, got {}",
            self.paddle_speed
        );
        Ok(())
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_addr: String,
    /// How often commands are sent.
    pub tick_hz: u32,
    /// Entity slots mirrored locally; must match the server's world.
    pub entity_count: usize,
    pub max_frame_len: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8080".to_string(),
            tick_hz: 30,
            entity_count: 3,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.tick_hz > 0, "tick_hz must be positive");
        Ok(())
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / f64::from(self.tick_hz.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = ServerConfig::from_json_str(r#"{ "tick_hz": 60 }"#).unwrap();
        assert_eq!(cfg.tick_hz, 60);
        assert_eq!(cfg.outbound_capacity, 32);
        assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
    }

    #[test]
    fn zero_tick_rate_is_rejected() {
        let cfg = ServerConfig::from_json_str(r#"{ "tick_hz": 0 }"#).unwrap();
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("tick_hz"));
        assert!(ServerConfig::default().validate().is_ok());

        let client = ClientConfig::from_json_str(r#"{ "tick_hz": 0 }"#).unwrap();
        assert!(client.validate().is_err());
    }

    #[test]
    fn config_file_with_zero_tick_rate_fails_to_load() {
        let path = std::env::temp_dir().join(format!("arena_cfg_{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "tick_hz": 0 }"#).unwrap();
        let result = ServerConfig::from_file(&path);
        let _ = std::fs::remove_file(&path);
        assert!(result.is_err());
    }

    #[test]
    fn tick_interval_matches_rate() {
        let cfg = ServerConfig::default();
        let interval = cfg.tick_interval();
        assert!((interval.as_secs_f64() - 1.0 / 30.0).abs() < 1e-9);
    }
}
