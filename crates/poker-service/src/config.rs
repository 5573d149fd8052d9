//! Poker service configuration.
//!
//! Configuration is loaded from environment variables. Every value has a
//! default; a value that is present but cannot be parsed is an error rather
//! than being silently replaced by the default.

use common::config::ObservabilityConfig;
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

/// Default HTTP + WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:4000";

/// Default room code length.
pub const DEFAULT_ROOM_CODE_LENGTH: usize = 6;

/// Accepted room code lengths.
pub const ROOM_CODE_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 4..=12;

/// Default per-connection outbound queue capacity.
pub const DEFAULT_OUTBOUND_BUFFER: usize = 64;

/// Smallest outbound queue that still holds `welcome` plus the first lobby.
pub const MIN_OUTBOUND_BUFFER: usize = 2;

/// Poker service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listener for HTTP routes and the `/ws` endpoint (default: "0.0.0.0:4000").
    pub bind_address: SocketAddr,

    /// Length of generated room codes (default: 6).
    pub room_code_length: usize,

    /// When true, reveal/reset are only honoured from the scrum master
    /// while one is assigned. Default false (cooperative rooms).
    pub enforce_scrum_master: bool,

    /// Capacity of each connection's outbound event queue (default: 64).
    pub outbound_buffer: usize,

    /// Logging configuration.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 4000)),
            room_code_length: DEFAULT_ROOM_CODE_LENGTH,
            enforce_scrum_master: false,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("POKER_BIND_ADDRESS")
            .map_or(DEFAULT_BIND_ADDRESS, String::as_str);
        let bind_address: SocketAddr = bind_address.parse().map_err(|e| {
            ConfigError::InvalidValue(format!("POKER_BIND_ADDRESS={bind_address}: {e}"))
        })?;

        let room_code_length =
            parse_var(vars, "POKER_ROOM_CODE_LENGTH")?.unwrap_or(DEFAULT_ROOM_CODE_LENGTH);
        if !ROOM_CODE_LENGTH_RANGE.contains(&room_code_length) {
            return Err(ConfigError::InvalidValue(format!(
                "POKER_ROOM_CODE_LENGTH must be between {} and {}, got {room_code_length}",
                ROOM_CODE_LENGTH_RANGE.start(),
                ROOM_CODE_LENGTH_RANGE.end()
            )));
        }

        let enforce_scrum_master = parse_bool(vars, "POKER_ENFORCE_SCRUM_MASTER")?.unwrap_or(false);

        let outbound_buffer =
            parse_var(vars, "POKER_OUTBOUND_BUFFER")?.unwrap_or(DEFAULT_OUTBOUND_BUFFER);
        if outbound_buffer < MIN_OUTBOUND_BUFFER {
            return Err(ConfigError::InvalidValue(format!(
                "POKER_OUTBOUND_BUFFER must be at least {MIN_OUTBOUND_BUFFER}"
            )));
        }

        let observability = ObservabilityConfig {
            log_level: vars
                .get("POKER_LOG_LEVEL")
                .cloned()
                .unwrap_or_else(|| common::config::DEFAULT_LOG_LEVEL.to_string()),
            json_logs: parse_bool(vars, "POKER_LOG_JSON")?.unwrap_or(false),
        };

        Ok(Config {
            bind_address,
            room_code_length,
            enforce_scrum_master,
            outbound_buffer,
            observability,
        })
    }
}

fn parse_var<T>(vars: &HashMap<String, String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    vars.get(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("{key}={raw}: {e}")))
        })
        .transpose()
}

fn parse_bool(vars: &HashMap<String, String>, key: &str) -> Result<Option<bool>, ConfigError> {
    vars.get(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(format!(
                "{key}={raw}: expected a boolean"
            ))),
        })
        .transpose()
}
