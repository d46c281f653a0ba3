//! Application configuration.
//!
//! Read from the JSON file named by `ROTA_CONFIG` (default `rota.json`).
//! Every field has a default, so a missing file or a partial one is fine.

use chrono::{FixedOffset, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::demo_data::DEFAULT_ROSTER;
use crate::domain::ROSTER_SIZE;
use crate::solver::SolverConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "ROTA_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "rota.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("roster must list exactly {expected} workers, got {actual}")]
    RosterSize { expected: usize, actual: usize },
    #[error("roster contains an empty or duplicate name: {0:?}")]
    RosterName(String),
    #[error("UTC offset of {0} minutes is out of range")]
    UtcOffset(i32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Address the REST server binds to.
    pub bind: SocketAddr,
    /// Directory holding the JSON state files.
    pub data_dir: PathBuf,
    /// Worker names, in roster order.
    pub roster: Vec<String>,
    /// Local time offset used for "today" and the timed jobs.
    pub utc_offset_minutes: i32,
    /// Weekday of the automatic weekly generation.
    pub weekly_day: Weekday,
    pub weekly_time: NaiveTime,
    /// Time of the daily "today" announcement.
    pub daily_time: NaiveTime,
    /// Fixed RNG seed; entropy when unset.
    pub seed: Option<u64>,
    pub solver: SolverConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 7860)),
            data_dir: PathBuf::from("data"),
            roster: DEFAULT_ROSTER.iter().map(|s| s.to_string()).collect(),
            utc_offset_minutes: 60,
            weekly_day: Weekday::Sun,
            weekly_time: time(20, 0),
            daily_time: time(7, 30),
            seed: None,
            solver: SolverConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the config named by `ROTA_CONFIG`, falling back to `rota.json`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load(&path)
    }

    /// Loads and validates a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| ConfigError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the roster and offset.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.roster.len() != ROSTER_SIZE {
            return Err(ConfigError::RosterSize {
                expected: ROSTER_SIZE,
                actual: self.roster.len(),
            });
        }
        let mut seen = HashSet::new();
        for name in &self.roster {
            if name.trim().is_empty() || !seen.insert(name.to_lowercase()) {
                return Err(ConfigError::RosterName(name.clone()));
            }
        }
        self.offset()?;
        Ok(())
    }

    pub fn offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::UtcOffset(self.utc_offset_minutes))
    }
}

fn time(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}
