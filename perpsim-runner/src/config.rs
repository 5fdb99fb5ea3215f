//! Simulation configuration — TOML file, validation, content hash, hot reload.
//!
//! Every section and field has a default, so a partial file (or no file) is a
//! valid configuration. The `[risk]`, `[signals]` and `[session]` sections can
//! be edited while a session is running; see [`ConfigReloader`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use perpsim_core::risk::{RiskConfig, RiskConfigError};
use perpsim_core::signals::SignalConfig;

use crate::evolve::EvolveConfig;

/// Content hash of a configuration (hex BLAKE3).
pub type ConfigId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid risk settings: {0}")]
    Risk(#[from] RiskConfigError),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Session driver settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Pause between ticks.
    pub tick_interval_ms: u64,
    /// Pause before retrying a failed snapshot retrieval.
    pub retry_backoff_ms: u64,
    /// Give up after this many consecutive retrieval failures. Unset retries forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_consecutive_failures: Option<u32>,
    /// Stop after this many processed ticks. Unset runs until stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<u64>,
    /// Candidates requested from the selector per tick.
    pub signal_limit: usize,
    pub kraken_base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 3_000,
            retry_backoff_ms: 2_000,
            max_consecutive_failures: None,
            max_ticks: None,
            signal_limit: 20,
            kraken_base_url: crate::source::kraken::DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 10,
        }
    }
}

/// Where artifacts and logs go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Suppress per-tick console output.
    pub quiet: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            log_dir: PathBuf::from("logs"),
            quiet: false,
        }
    }
}

/// Complete simulator configuration.
///
/// `starting_capital` must stay the first field: TOML requires plain values
/// before tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub starting_capital: f64,
    pub risk: RiskConfig,
    pub signals: SignalConfig,
    pub session: SessionSettings,
    pub output: OutputSettings,
    pub evolve: EvolveConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            starting_capital: 10_000.0,
            risk: RiskConfig::default(),
            signals: SignalConfig::default(),
            session: SessionSettings::default(),
            output: OutputSettings::default(),
            evolve: EvolveConfig::default(),
        }
    }
}

impl SimConfig {
    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.risk.validate()?;

        if !(self.starting_capital.is_finite() && self.starting_capital > 0.0) {
            return Err(invalid("starting_capital", "must be positive"));
        }

        let s = &self.signals;
        if !(s.momentum_threshold.is_finite() && s.momentum_threshold > 0.0) {
            return Err(invalid("signals.momentum_threshold", "must be positive"));
        }
        for (field, value) in [
            ("signals.min_volume", s.min_volume),
            ("signals.funding_rate_long", s.funding_rate_long),
            ("signals.funding_rate_short", s.funding_rate_short),
            ("signals.scalp_strength", s.scalp_strength),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(field, "must be non-negative"));
            }
        }
        if s.swing_leverage == 0 || s.scalp_leverage == 0 {
            return Err(invalid("signals.*_leverage", "must be at least 1"));
        }

        if self.session.kraken_base_url.trim().is_empty() {
            return Err(invalid("session.kraken_base_url", "must not be empty"));
        }

        self.evolve.validate()
    }

    /// Deterministic content hash; identical configs share an id.
    pub fn config_id(&self) -> ConfigId {
        // plain data with string keys always serializes
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}

pub(crate) fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Watches a config file between ticks.
///
/// Polling compares the file's modification time with the last one seen.
/// A changed file that fails to load or validate is logged and skipped; the
/// caller keeps the configuration it already has.
#[derive(Debug)]
pub struct ConfigReloader {
    path: PathBuf,
    last_modified: Option<SystemTime>,
}

impl ConfigReloader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_modified = modified(&path);
        Self {
            path,
            last_modified,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the new configuration if the file changed and is valid.
    pub fn poll(&mut self) -> Option<SimConfig> {
        let current = modified(&self.path)?;
        if self.last_modified == Some(current) {
            return None;
        }
        self.last_modified = Some(current);

        match SimConfig::load(&self.path) {
            Ok(config) => {
                info!(path = %self.path.display(), config_id = %config.config_id(), "configuration reloaded");
                Some(config)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring invalid configuration change");
                None
            }
        }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
