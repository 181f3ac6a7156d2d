//! Server configuration from environment variables.

use std::net::SocketAddr;

const DEFAULT_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 3030);
const DEFAULT_HISTORY_LIMIT: usize = 10_000;
const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Records kept per room for late joiners.
    pub history_limit: usize,
    /// Broadcast buffer per room.
    pub channel_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(DEFAULT_ADDR),
            history_limit: DEFAULT_HISTORY_LIMIT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            addr: env_parse("PIZARRA_ADDR", defaults.addr),
            history_limit: env_parse("PIZARRA_HISTORY_LIMIT", defaults.history_limit).max(1),
            channel_capacity: env_parse("PIZARRA_CHANNEL_CAPACITY", defaults.channel_capacity).max(1),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}
