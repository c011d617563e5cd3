use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the maintenance engine and CLI.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

impl Config {
    /// Load defaults, then an optional override file, then `FLEET_MAINT__*` env vars.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FLEET_MAINT_CONFIG")
            .unwrap_or_else(|_| "config/local.toml".to_string());
        Self::load_with_file(&config_path)
    }

    /// Same layering as [`Config::load`] with an explicit override file.
    pub fn load_with_file(config_path: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("FLEET_MAINT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Trailing telemetry window the usage sample was counted over
    #[serde(default = "default_usage_window_days")]
    pub usage_window_days: u32,

    /// Daily usage assumed when a vehicle reported no telemetry in the window
    #[serde(default = "default_fallback_daily_usage")]
    pub fallback_daily_usage: f64,

    /// Confidence (percent) attached to schedule-based predictions
    #[serde(default = "default_schedule_confidence")]
    pub schedule_confidence: u8,

    /// Confidence (percent) reported in training statistics
    #[serde(default = "default_reported_confidence")]
    pub reported_confidence: f64,

    /// L2 penalty applied when fitting the regressor
    #[serde(default = "default_ridge_penalty")]
    pub ridge_penalty: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            usage_window_days: default_usage_window_days(),
            fallback_daily_usage: default_fallback_daily_usage(),
            schedule_confidence: default_schedule_confidence(),
            reported_confidence: default_reported_confidence(),
            ridge_penalty: default_ridge_penalty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding model generations and the CURRENT pointer
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// CSV export of the fleet vehicle table
    #[serde(default = "default_snapshots_path")]
    pub snapshots_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            snapshots_path: default_snapshots_path(),
        }
    }
}

fn default_usage_window_days() -> u32 {
    7
}

fn default_fallback_daily_usage() -> f64 {
    10.0
}

fn default_schedule_confidence() -> u8 {
    90
}

fn default_reported_confidence() -> f64 {
    95.0
}

fn default_ridge_penalty() -> f64 {
    1e-3
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("./data/models")
}

fn default_snapshots_path() -> PathBuf {
    PathBuf::from("./data/vehicles.csv")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::io::Write;

    #[test]
    fn embedded_defaults_match_code_defaults() {
        let cfg: Config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        let defaults = Config::default();

        assert_eq!(cfg.engine.usage_window_days, defaults.engine.usage_window_days);
        assert_eq!(cfg.engine.fallback_daily_usage, defaults.engine.fallback_daily_usage);
        assert_eq!(cfg.engine.schedule_confidence, defaults.engine.schedule_confidence);
        assert_eq!(cfg.engine.reported_confidence, defaults.engine.reported_confidence);
        assert_eq!(cfg.engine.ridge_penalty, defaults.engine.ridge_penalty);
        assert_eq!(cfg.storage.model_dir, defaults.storage.model_dir);
        assert_eq!(cfg.storage.snapshots_path, defaults.storage.snapshots_path);
    }

    #[test]
    fn override_file_replaces_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[engine]\nfallback_daily_usage = 25.0").unwrap();

        let cfg = Config::load_with_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.engine.fallback_daily_usage, 25.0);
        assert_eq!(cfg.engine.schedule_confidence, 90);
    }

    #[test]
    fn malformed_override_is_a_configuration_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[engine]\nusage_window_days = \"a week\"").unwrap();

        let err = Config::load_with_file(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert_eq!(err.error_code(), "CONFIGURATION_ERROR");
    }
}
