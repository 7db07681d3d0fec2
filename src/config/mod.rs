//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::game::SimulationConfig;
use crate::util::rate_limit::RELAY_RATE_LIMIT;

/// Relay configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, comma-separated, or `*`
    pub client_origin: String,

    /// How often closed connections are swept from the peer set
    pub sweep_interval: Duration,
    /// How often a status line is logged
    pub status_interval: Duration,
    /// Max HP recorded in the advisory snapshot when a client omits it
    pub default_boss_max_hp: f32,
    /// Inbound frames per second accepted from one connection
    pub relay_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT; fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN").unwrap_or_else(|_| "*".to_string()),

            sweep_interval: Duration::from_secs(parse_or("SWEEP_INTERVAL_SECS", 30u64)?.max(1)),
            status_interval: Duration::from_secs(parse_or("STATUS_INTERVAL_SECS", 60u64)?.max(1)),
            default_boss_max_hp: parse_or("DEFAULT_BOSS_MAX_HP", 1000.0)?,
            relay_rate_limit: parse_or("RELAY_RATE_LIMIT", RELAY_RATE_LIMIT)?,
        })
    }
}

/// Headless client configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct BotConfig {
    /// Relay WebSocket URL
    pub relay_url: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub player_name: String,
    pub avatar_url: String,
    /// Delay between fired bullets
    pub fire_interval: Duration,
    /// Seed for the local simulation RNG
    pub seed: u64,
    pub simulation: SimulationConfig,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let simulation = match env::var("SIM_CONFIG_PATH") {
            Ok(path) => load_simulation_config(Path::new(&path))?,
            Err(_) => SimulationConfig::default(),
        };

        Ok(Self {
            relay_url: env::var("RELAY_URL").unwrap_or_else(|_| "ws://localhost:8080".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            player_name: env::var("BOT_NAME").map_err(|_| ConfigError::Missing("BOT_NAME"))?,
            avatar_url: env::var("BOT_AVATAR_URL").unwrap_or_default(),
            fire_interval: Duration::from_millis(
                parse_or("BOT_FIRE_INTERVAL_MS", 1500u64)?.max(1),
            ),
            seed: parse_or("BOT_SEED", rand::random::<u64>())?,
            simulation,
        })
    }
}

/// Read a `default-config.json`-style simulation file
pub fn load_simulation_config(path: &Path) -> Result<SimulationConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let config: SimulationConfig = serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(config.sanitized())
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_file_is_loaded_and_sanitized() {
        let path = env::temp_dir().join(format!("sim-config-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"BULLET":{"CRITICAL_RATE":3.0,"BASE_DAMAGE":7}}"#).unwrap();

        let cfg = load_simulation_config(&path).unwrap();
        assert_eq!(cfg.bullet.critical_rate, 1.0);
        assert_eq!(cfg.bullet.base_damage, 7.0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_simulation_config(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
