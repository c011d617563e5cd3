//! Fleet maintenance prediction.
//!
//! Combines a fixed distance/time service schedule with urgency tiers to
//! forecast each vehicle's next service, and trains a linear regression on
//! fleet snapshots whose statistics are reported alongside.

pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod features;
pub mod model;
pub mod predictor;
pub mod schedule;
pub mod store;
pub mod trainer;
pub mod urgency;

pub use crate::config::{Config, EngineConfig, StorageConfig};
pub use data::{CsvSnapshotSource, SnapshotSource, VehicleSnapshot};
pub use engine::{MaintenanceEngine, PredictAllResponse, StatusReport, TrainResponse};
pub use error::{EngineError, Result};
pub use features::{FeatureExtractor, FeatureVector};
pub use predictor::{Prediction, PredictionMethod, Predictor};
pub use schedule::{ScheduleEntry, ScheduleTable};
pub use store::{FsModelRepo, ModelRepo};
pub use trainer::{ModelBundle, Trainer, TrainingStats};
pub use urgency::{Classification, DistanceSignal, Policy, UrgencyTier};
