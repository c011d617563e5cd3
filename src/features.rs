use crate::config::EngineConfig;
use crate::data::VehicleSnapshot;
use crate::error::{EngineError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Number of model features.
pub const N_FEATURES: usize = 5;

/// Feature names in model column order.
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "age_in_days",
    "days_since_last_maintenance",
    "average_daily_usage",
    "current_distance",
    "maintenance_event_count",
];

/// Numeric description of a vehicle, in fixed model order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub age_in_days: f64,
    pub days_since_last_maintenance: f64,
    pub average_daily_usage: f64,
    pub current_distance: f64,
    pub maintenance_event_count: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> Array1<f64> {
        Array1::from_vec(vec![
            self.age_in_days,
            self.days_since_last_maintenance,
            self.average_daily_usage,
            self.current_distance,
            self.maintenance_event_count,
        ])
    }
}

/// Turns snapshots into feature vectors.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    window_days: u32,
    fallback_daily_usage: f64,
}

impl FeatureExtractor {
    pub fn new(window_days: u32, fallback_daily_usage: f64) -> Self {
        Self {
            window_days: window_days.max(1),
            fallback_daily_usage,
        }
    }

    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg.usage_window_days, cfg.fallback_daily_usage)
    }

    /// Average usage per day over the window; the fallback applies when no
    /// telemetry arrived.
    pub fn average_daily_usage(&self, usage_sample: u32) -> f64 {
        if usage_sample == 0 {
            self.fallback_daily_usage
        } else {
            usage_sample as f64 / self.window_days as f64
        }
    }

    pub fn extract(&self, snapshot: &VehicleSnapshot) -> Result<FeatureVector> {
        if snapshot.age_in_days < 0 {
            return Err(EngineError::vehicle(
                snapshot.id,
                format!("negative age ({} days)", snapshot.age_in_days),
            ));
        }
        if !snapshot.current_distance.is_finite() || snapshot.current_distance < 0.0 {
            return Err(EngineError::vehicle(
                snapshot.id,
                format!("invalid distance ({})", snapshot.current_distance),
            ));
        }
        let days_since = snapshot.effective_days_since_maintenance();
        if days_since < 0 {
            return Err(EngineError::vehicle(
                snapshot.id,
                format!("last maintenance is in the future ({} days)", days_since),
            ));
        }

        Ok(FeatureVector {
            age_in_days: snapshot.age_in_days as f64,
            days_since_last_maintenance: days_since as f64,
            average_daily_usage: self.average_daily_usage(snapshot.recent_usage_sample),
            current_distance: snapshot.current_distance,
            maintenance_event_count: snapshot.maintenance_event_count as f64,
        })
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
