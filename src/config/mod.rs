//! Configuration module - environment variable parsing

pub mod tuning;

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub use tuning::{GameConfig, MapLayout};

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Process configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Relay listen address
    pub bind_addr: SocketAddr,
    /// Relay address a peer connects to
    pub relay_addr: String,
    /// Maximum simultaneous relay connections
    pub max_connections: usize,
    /// Match id peers send in JOIN
    pub game_id: u32,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
    /// Optional JSON file overriding gameplay tuning
    pub game_config_path: Option<PathBuf>,
    /// Fixed seed for map generation, offers and spread jitter
    pub rng_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:10000".to_string());

        let max_connections = match lookup("MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidNumber("MAX_CONNECTIONS"))?,
            None => 100,
        };

        let game_id = match lookup("GAME_ID") {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|_| ConfigError::InvalidNumber("GAME_ID"))?,
            None => 1,
        };

        let rng_seed = match lookup("RNG_SEED") {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| ConfigError::InvalidNumber("RNG_SEED"))?,
            ),
            None => None,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            bind_addr: bind_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            relay_addr: lookup("RELAY_ADDR").unwrap_or_else(|| "127.0.0.1:10000".to_string()),
            max_connections,
            game_id,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_format,
            game_config_path: lookup("GAME_CONFIG_PATH").map(PathBuf::from),
            rng_seed,
        })
    }

    /// Load the gameplay tuning this process should run with
    pub fn load_game_config(&self) -> Result<GameConfig, ConfigError> {
        let game = match &self.game_config_path {
            Some(path) => GameConfig::from_file(path)?,
            None => GameConfig::default(),
        };
        game.validate()?;
        Ok(game)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid bind address format")]
    InvalidAddress,

    #[error("Invalid numeric value for {0}")]
    InvalidNumber(&'static str),

    #[error("Failed to read game config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse game config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid game config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_addr.port(), 10000);
        assert_eq!(config.relay_addr, "127.0.0.1:10000");
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.game_id, 1);
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.rng_seed.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("BIND_ADDR", "127.0.0.1:4000"),
            ("MAX_CONNECTIONS", "2"),
            ("GAME_ID", "7"),
            ("RNG_SEED", "42"),
            ("LOG_FORMAT", "json"),
        ]))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 4000);
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.game_id, 7);
        assert_eq!(config.rng_seed, Some(42));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("BIND_ADDR", "nowhere")])),
            Err(ConfigError::InvalidAddress)
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("MAX_CONNECTIONS", "0")])),
            Err(ConfigError::InvalidNumber("MAX_CONNECTIONS"))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("GAME_ID", "one")])),
            Err(ConfigError::InvalidNumber("GAME_ID"))
        ));
    }

    #[test]
    fn test_default_game_config_loads() {
        let config = Config::from_lookup(|_| None).unwrap();
        let game = config.load_game_config().unwrap();
        assert_eq!(game.rules.max_wins, 5);
    }
}
