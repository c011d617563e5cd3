//! Regression training over fleet snapshots.
//!
//! There is no recorded maintenance outcome to learn from, so the regressor
//! is fitted to the schedule's own days-until values. The resulting model is
//! diagnostic: its statistics are reported, but individual predictions are
//! always schedule-based.

use crate::config::EngineConfig;
use crate::data::VehicleSnapshot;
use crate::error::{EngineError, Result};
use crate::features::{FeatureExtractor, N_FEATURES};
use crate::model::TrainedModel;
use crate::schedule::ScheduleTable;
use chrono::{DateTime, Utc};
use linfa::prelude::SingleTargetRegression;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Fewest snapshots a training run accepts.
pub const MIN_TRAINING_SAMPLES: usize = 5;

/// Below this many samples the model is evaluated on its own training data.
const HOLDOUT_MIN_SAMPLES: usize = 10;

/// Every n-th sample is held out for evaluation (an 80/20 split).
const HOLDOUT_STRIDE: usize = 5;

pub const ALGORITHM_LABEL: &str = "LinearRegression + Schedule-Based";

/// Summary of the latest successful training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    pub sample_count: usize,
    pub rmse: f64,
    pub r2: f64,
    pub confidence: f64,
    pub algorithm: String,
    pub trained_at: DateTime<Utc>,
}

/// Everything a training run produces; persisted and swapped in as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    pub model: TrainedModel,
    pub stats: TrainingStats,
}

pub struct Trainer {
    schedule: ScheduleTable,
    extractor: FeatureExtractor,
    penalty: f64,
    reported_confidence: f64,
}

impl Trainer {
    pub fn new(schedule: ScheduleTable, extractor: FeatureExtractor, cfg: &EngineConfig) -> Self {
        Self {
            schedule,
            extractor,
            penalty: cfg.ridge_penalty.max(0.0),
            reported_confidence: cfg.reported_confidence,
        }
    }

    /// Features and schedule targets for every usable snapshot.
    pub fn build_dataset(
        &self,
        snapshots: &[VehicleSnapshot],
    ) -> Result<(Array2<f64>, Array1<f64>)> {
        let mut feats = Vec::with_capacity(snapshots.len() * N_FEATURES);
        let mut targets = Vec::with_capacity(snapshots.len());

        for snapshot in snapshots {
            match self.extractor.extract(snapshot) {
                Ok(f) => {
                    feats.extend(f.to_array().iter().copied());
                    let entry = self.schedule.next_milestone(snapshot.current_distance);
                    targets.push(entry.days_until() as f64);
                }
                Err(e) => {
                    warn!(vehicle_id = snapshot.id, error = %e, "Excluding vehicle from training")
                }
            }
        }

        if targets.len() < MIN_TRAINING_SAMPLES {
            return Err(EngineError::InsufficientData {
                found: targets.len(),
                required: MIN_TRAINING_SAMPLES,
            });
        }

        let x = Array2::from_shape_vec((targets.len(), N_FEATURES), feats)
            .map_err(|e| EngineError::Model(e.to_string()))?;
        Ok((x, Array1::from_vec(targets)))
    }

    pub fn train(&self, snapshots: &[VehicleSnapshot]) -> Result<ModelBundle> {
        if snapshots.len() < MIN_TRAINING_SAMPLES {
            return Err(EngineError::InsufficientData {
                found: snapshots.len(),
                required: MIN_TRAINING_SAMPLES,
            });
        }
        info!(vehicles = snapshots.len(), "Training regression model");

        let (x, y) = self.build_dataset(snapshots)?;
        let n = y.len();

        let (train_idx, eval_idx): (Vec<usize>, Vec<usize>) = if n >= HOLDOUT_MIN_SAMPLES {
            (0..n).partition(|i| i % HOLDOUT_STRIDE != HOLDOUT_STRIDE - 1)
        } else {
            ((0..n).collect(), (0..n).collect())
        };
        debug!(train = train_idx.len(), eval = eval_idx.len(), "Split samples");

        let x_train = x.select(Axis(0), &train_idx);
        let y_train = y.select(Axis(0), &train_idx);
        let x_eval = x.select(Axis(0), &eval_idx);
        let y_eval = y.select(Axis(0), &eval_idx);

        let model = TrainedModel::fit(&x_train, &y_train, self.penalty)?;

        let predicted = model.predict(&x_eval);
        let mse = predicted
            .mean_squared_error(&y_eval)
            .map_err(|e| EngineError::Model(e.to_string()))?;
        let r2 = predicted
            .r2(&y_eval)
            .map_err(|e| EngineError::Model(e.to_string()))?;

        let stats = TrainingStats {
            sample_count: n,
            rmse: finite_or_zero(round_to(mse.sqrt(), 2)),
            r2: finite_or_zero(round_to(r2, 3)),
            confidence: self.reported_confidence,
            algorithm: ALGORITHM_LABEL.to_string(),
            trained_at: Utc::now(),
        };
        info!(
            samples = stats.sample_count,
            rmse = stats.rmse,
            r2 = stats.r2,
            "Model trained"
        );

        Ok(ModelBundle { model, stats })
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// JSON has no NaN, and the stats record must always load back
fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
