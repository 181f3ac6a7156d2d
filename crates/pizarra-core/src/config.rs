//! Client configuration.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::replication::DEFAULT_OUTBOX_LIMIT;

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:3030/ws";
pub const DEFAULT_ROOM: &str = "sala-principal";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("room name must not be empty")]
    EmptyRoom,
    #[error("server URL must use ws:// or wss://, got {0:?}")]
    BadScheme(String),
}

/// Where to replicate to and how much to buffer while offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_url: String,
    pub room: String,
    /// Publishes kept while disconnected. Oldest are dropped beyond this.
    pub outbox_limit: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            room: DEFAULT_ROOM.to_string(),
            outbox_limit: DEFAULT_OUTBOX_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Defaults overridden by `PIZARRA_SERVER_URL` and `PIZARRA_ROOM`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("PIZARRA_SERVER_URL") {
            config.server_url = url;
        }
        if let Ok(room) = std::env::var("PIZARRA_ROOM") {
            config.room = room;
        }
        config
    }

    /// Parse a JSON document; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.room.trim().is_empty() {
            return Err(ConfigError::EmptyRoom);
        }
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(ConfigError::BadScheme(self.server_url.clone()));
        }
        Ok(())
    }
}
