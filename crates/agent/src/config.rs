//! Agent configuration from environment variables.
//!
//! | Variable                   | Default          | Description                              |
//! |----------------------------|------------------|------------------------------------------|
//! | `D4LOG_PROCESS_NAME`       | `Diablo IV.exe`  | Game executable to attach to             |
//! | `D4LOG_OFFSETS_PATH`       | `offsets.json`   | Offset table for the running game build  |
//! | `D4LOG_LOG_DIR`            | `logs`           | Directory for session logs               |
//! | `D4LOG_SAMPLE_INTERVAL_MS` | `100`            | Sampling period, at least 10 ms          |
//! | `D4LOG_IDLE_TIMEOUT_SECS`  | `5`              | Idle time that ends an encounter         |
//! | `D4LOG_WS_URL`             | --               | WebSocket endpoint for live streaming    |
//! | `D4LOG_WEBHOOK_URL`        | --               | Receives each encounter summary          |
//! | `D4LOG_GAME_DATA_DIR`      | --               | Mined game data, for power names in logs |

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_PROCESS_NAME: &str = "Diablo IV.exe";
pub const DEFAULT_OFFSETS_PATH: &str = "offsets.json";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;
pub const MIN_SAMPLE_INTERVAL_MS: u64 = 10;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub process_name: String,
    pub offsets_path: PathBuf,
    pub log_dir: PathBuf,
    pub sample_interval: Duration,
    pub idle_timeout: Duration,
    pub ws_url: Option<String>,
    pub webhook_url: Option<String>,
    pub game_data_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
            offsets_path: PathBuf::from(DEFAULT_OFFSETS_PATH),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            sample_interval: Duration::from_millis(DEFAULT_SAMPLE_INTERVAL_MS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            ws_url: None,
            webhook_url: None,
            game_data_dir: None,
        }
    }
}

impl AgentConfig {
    /// Read the configuration from the process environment. Call
    /// `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let sample_ms = parse_u64(
            "D4LOG_SAMPLE_INTERVAL_MS",
            get("D4LOG_SAMPLE_INTERVAL_MS"),
            DEFAULT_SAMPLE_INTERVAL_MS,
        )?;
        if sample_ms < MIN_SAMPLE_INTERVAL_MS {
            return Err(ConfigError::TooSmall {
                var: "D4LOG_SAMPLE_INTERVAL_MS",
                min: MIN_SAMPLE_INTERVAL_MS,
                value: sample_ms,
            });
        }

        let idle_secs = parse_u64(
            "D4LOG_IDLE_TIMEOUT_SECS",
            get("D4LOG_IDLE_TIMEOUT_SECS"),
            DEFAULT_IDLE_TIMEOUT_SECS,
        )?;
        if idle_secs == 0 {
            return Err(ConfigError::TooSmall {
                var: "D4LOG_IDLE_TIMEOUT_SECS",
                min: 1,
                value: 0,
            });
        }

        Ok(Self {
            process_name: get("D4LOG_PROCESS_NAME").unwrap_or(defaults.process_name),
            offsets_path: get("D4LOG_OFFSETS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.offsets_path),
            log_dir: get("D4LOG_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            sample_interval: Duration::from_millis(sample_ms),
            idle_timeout: Duration::from_secs(idle_secs),
            ws_url: get("D4LOG_WS_URL"),
            webhook_url: get("D4LOG_WEBHOOK_URL"),
            game_data_dir: get("D4LOG_GAME_DATA_DIR").map(PathBuf::from),
        })
    }
}

fn parse_u64(var: &'static str, raw: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}
