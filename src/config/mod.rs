//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::game::detonation::MAX_FIRE_LENGTH;
use crate::game::GameRules;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Directory holding `<map id>.json` tile maps
    pub maps_dir: PathBuf,
    /// Directory served under `/static`
    pub static_dir: PathBuf,

    /// Protocol version clients must announce at login
    pub app_version: String,
    /// Placeholder credentials accepted at login
    pub login_username: String,
    pub login_password: String,

    /// Period of the bomb detonation scan
    pub detonation_interval: Duration,
    /// Max inbound messages per second per connection
    pub input_rate_limit: u32,
    /// Capacity of each connection's outbound queue
    pub outbound_queue_size: usize,
    /// Fixed seed for spawn/cooldown randomness (entropy when unset)
    pub rng_seed: Option<u64>,

    /// Gameplay tuning
    pub rules: GameRules,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3030".to_string())
        };

        let defaults = Self::default();
        let rules = GameRules {
            default_map: env::var("DEFAULT_MAP").unwrap_or(defaults.rules.default_map),
            movement_delay_min: millis_var("MOVEMENT_DELAY_MIN_MS", defaults.rules.movement_delay_min)?,
            movement_delay_max: millis_var("MOVEMENT_DELAY_MAX_MS", defaults.rules.movement_delay_max)?,
            bomb_cooldown: millis_var("BOMB_COOLDOWN_MS", defaults.rules.bomb_cooldown)?,
            fire_delay: millis_var("BOMB_FIRE_DELAY_MS", defaults.rules.fire_delay)?,
            fire_length: parse_var("BOMB_FIRE_LENGTH", defaults.rules.fire_length)?,
            ..defaults.rules
        };

        let config = Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),

            maps_dir: env::var("MAPS_DIR").map(PathBuf::from).unwrap_or(defaults.maps_dir),
            static_dir: env::var("STATIC_DIR").map(PathBuf::from).unwrap_or(defaults.static_dir),

            app_version: env::var("APP_VERSION").unwrap_or(defaults.app_version),
            login_username: env::var("LOGIN_USERNAME").unwrap_or(defaults.login_username),
            login_password: env::var("LOGIN_PASSWORD").unwrap_or(defaults.login_password),

            detonation_interval: millis_var("DETONATION_INTERVAL_MS", defaults.detonation_interval)?,
            input_rate_limit: parse_var("INPUT_RATE_LIMIT", defaults.input_rate_limit)?,
            outbound_queue_size: parse_var("OUTBOUND_QUEUE_SIZE", defaults.outbound_queue_size)?,
            rng_seed: match env::var("RNG_SEED") {
                Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid("RNG_SEED"))?),
                Err(_) => None,
            },

            rules,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the game loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.detonation_interval.is_zero() {
            return Err(ConfigError::Invalid("DETONATION_INTERVAL_MS"));
        }
        if self.rules.fire_length > MAX_FIRE_LENGTH {
            return Err(ConfigError::Invalid("BOMB_FIRE_LENGTH"));
        }
        if self.rules.movement_delay_min > self.rules.movement_delay_max {
            return Err(ConfigError::Invalid("MOVEMENT_DELAY_MIN_MS"));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 3030)),
            log_level: "info".to_string(),
            maps_dir: PathBuf::from("maps"),
            static_dir: PathBuf::from("public"),
            app_version: "1.0.7".to_string(),
            login_username: "demo".to_string(),
            login_password: "demo".to_string(),
            detonation_interval: Duration::from_millis(500),
            input_rate_limit: 30,
            outbound_queue_size: 64,
            rng_seed: None,
            rules: GameRules::default(),
        }
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(default),
    }
}

fn millis_var(key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    let default_ms = default.as_millis() as u64;
    parse_var(key, default_ms).map(Duration::from_millis)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
