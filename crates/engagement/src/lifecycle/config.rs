//! Runtime configuration of the engagement system.
//!
//! Values come from `ENGAGEMENT_*` environment variables; the demo binary lets command
//! line flags override them.

use entity_actor::ActorConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const ENV_STATE_DIR: &str = "ENGAGEMENT_STATE_DIR";
pub const ENV_FLUSH_INTERVAL_MS: &str = "ENGAGEMENT_FLUSH_INTERVAL_MS";
pub const ENV_FLUSH_THRESHOLD: &str = "ENGAGEMENT_FLUSH_THRESHOLD";
pub const ENV_FLUSH_TIMEOUT_MS: &str = "ENGAGEMENT_FLUSH_TIMEOUT_MS";
pub const ENV_IDLE_TIMEOUT_SECS: &str = "ENGAGEMENT_IDLE_TIMEOUT_SECS";
pub const ENV_MAILBOX_SIZE: &str = "ENGAGEMENT_MAILBOX_SIZE";
pub const ENV_SUBSCRIBER_BUFFER: &str = "ENGAGEMENT_SUBSCRIBER_BUFFER";
pub const ENV_SEED_FROM_RECORD: &str = "ENGAGEMENT_SEED_FROM_RECORD";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Cannot open state directory {path}: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: entity_actor::StoreError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngagementConfig {
    pub actor: ActorConfig,
    /// Directory for snapshot files. `None` keeps snapshots in memory.
    pub state_dir: Option<PathBuf>,
    /// Seed entities without a snapshot from the System-of-Record.
    pub seed_from_record: bool,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            actor: ActorConfig::default(),
            state_dir: None,
            seed_from_record: true,
        }
    }
}

impl EngagementConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source. Unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(dir) = get(ENV_STATE_DIR) {
            config.state_dir = Some(PathBuf::from(dir));
        }
        if let Some(ms) = parse::<u64>(ENV_FLUSH_INTERVAL_MS, get(ENV_FLUSH_INTERVAL_MS))? {
            config.actor.flush_interval = Duration::from_millis(ms);
        }
        if let Some(threshold) = parse_positive(ENV_FLUSH_THRESHOLD, get(ENV_FLUSH_THRESHOLD))? {
            config.actor.flush_threshold = threshold;
        }
        if let Some(ms) = parse::<u64>(ENV_FLUSH_TIMEOUT_MS, get(ENV_FLUSH_TIMEOUT_MS))? {
            config.actor.flush_timeout = Duration::from_millis(ms);
        }
        if let Some(secs) = parse::<u64>(ENV_IDLE_TIMEOUT_SECS, get(ENV_IDLE_TIMEOUT_SECS))? {
            config.actor.idle_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(size) = parse_positive(ENV_MAILBOX_SIZE, get(ENV_MAILBOX_SIZE))? {
            config.actor.mailbox_size = size;
        }
        if let Some(size) = parse_positive(ENV_SUBSCRIBER_BUFFER, get(ENV_SUBSCRIBER_BUFFER))? {
            config.actor.subscriber_buffer = size;
        }
        if let Some(raw) = get(ENV_SEED_FROM_RECORD) {
            config.seed_from_record = parse_bool(ENV_SEED_FROM_RECORD, raw)?;
        }
        Ok(config)
    }
}

fn parse<T>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        })
    })
    .transpose()
}

fn parse_positive(key: &'static str, raw: Option<String>) -> Result<Option<usize>, ConfigError> {
    match parse::<usize>(key, raw)? {
        Some(0) => Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        }),
        other => Ok(other),
    }
}

fn parse_bool(key: &'static str, raw: String) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "expected true or false".to_string(),
        }),
    }
}
