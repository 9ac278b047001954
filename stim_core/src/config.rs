//! Configuration file support for stim.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/stim/config.toml`.
//! Every field has a default, so a partial (or missing) file is fine.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub check: CheckConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Dose validation and undo buffer limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_dose_mg")]
    pub max_dose_mg: f64,

    /// Maximum number of undone doses kept for redo. Unbounded when absent.
    #[serde(default)]
    pub undo_limit: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_dose_mg: default_max_dose_mg(),
            undo_limit: None,
        }
    }
}

/// `stim history` configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            limit: default_history_limit(),
        }
    }
}

/// `stim graph` configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_hours_back")]
    pub hours_back: u32,

    #[serde(default = "default_projection_hours")]
    pub projection_hours: u32,

    #[serde(default = "default_resolution_minutes")]
    pub resolution_minutes: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            hours_back: default_hours_back(),
            projection_hours: default_projection_hours(),
            resolution_minutes: default_resolution_minutes(),
        }
    }
}

/// Sleep warning thresholds for `stim check`
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckConfig {
    #[serde(default = "default_evening_warning_mg")]
    pub evening_warning_mg: f64,

    #[serde(default = "default_night_warning_mg")]
    pub night_warning_mg: f64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            evening_warning_mg: default_evening_warning_mg(),
            night_warning_mg: default_night_warning_mg(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".stim")
}

fn default_max_dose_mg() -> f64 {
    1000.0
}

fn default_history_limit() -> usize {
    5
}

fn default_hours_back() -> u32 {
    24
}

fn default_projection_hours() -> u32 {
    72
}

fn default_resolution_minutes() -> f64 {
    5.0
}

fn default_evening_warning_mg() -> f64 {
    30.0
}

fn default_night_warning_mg() -> f64 {
    15.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stim")
            .join("config.toml")
    }

    /// Reject values that would make every dose invalid or every chart empty
    pub fn validate(&self) -> Result<()> {
        if !(self.limits.max_dose_mg > 0.0) {
            return Err(Error::Config(format!(
                "limits.max_dose_mg must be positive, got {}",
                self.limits.max_dose_mg
            )));
        }
        if !(self.graph.resolution_minutes > 0.0) {
            return Err(Error::Config(format!(
                "graph.resolution_minutes must be positive, got {}",
                self.graph.resolution_minutes
            )));
        }
        Ok(())
    }
}
