use crate::config::EngineConfig;
use crate::data::VehicleSnapshot;
use crate::error::{EngineError, Result};
use crate::features::FeatureExtractor;
use crate::predictor::{Prediction, Predictor};
use crate::schedule::ScheduleTable;
use crate::store::ModelRepo;
use crate::trainer::{ModelBundle, Trainer, TrainingStats, ALGORITHM_LABEL};
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of a batch prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictAllResponse {
    pub success: bool,
    pub predictions: Vec<Prediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of a training request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<TrainingStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub trained: bool,
    pub algorithm: String,
    pub last_stats: Option<TrainingStats>,
}

/// Maintenance prediction service.
///
/// Owns the process-wide model state. The loaded bundle is only ever
/// replaced wholesale after it has been persisted, so readers observe
/// either the previous model or the new one. Training runs are serialized.
pub struct MaintenanceEngine {
    predictor: Predictor,
    trainer: Trainer,
    repo: Box<dyn ModelRepo>,
    current: RwLock<Option<Arc<ModelBundle>>>,
    training: Mutex<()>,
}

impl MaintenanceEngine {
    /// Build an engine without touching storage.
    pub fn new(schedule: ScheduleTable, cfg: &EngineConfig, repo: Box<dyn ModelRepo>) -> Self {
        let extractor = FeatureExtractor::from_config(cfg);
        Self {
            predictor: Predictor::new(schedule.clone(), extractor.clone(), cfg.schedule_confidence),
            trainer: Trainer::new(schedule, extractor, cfg),
            repo,
            current: RwLock::new(None),
            training: Mutex::new(()),
        }
    }

    /// Build an engine and load any previously committed model.
    pub fn open(schedule: ScheduleTable, cfg: &EngineConfig, repo: Box<dyn ModelRepo>) -> Self {
        let engine = Self::new(schedule, cfg, repo);
        engine.load();
        engine
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    /// Reload the committed model; any failure leaves the engine untrained.
    ///
    /// Waits for a running training, so a reload never replaces a newer
    /// bundle with the one it read before that training committed.
    pub fn load(&self) -> bool {
        let _guard = self.training.lock();

        let loaded = match self.repo.load() {
            Ok(Some(bundle)) => {
                info!(
                    samples = bundle.stats.sample_count,
                    trained_at = %bundle.stats.trained_at,
                    "Model loaded from disk"
                );
                Some(Arc::new(bundle))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Could not load model, starting untrained");
                None
            }
        };
        let trained = loaded.is_some();
        *self.current.write() = loaded;
        trained
    }

    pub fn is_trained(&self) -> bool {
        self.current.read().is_some()
    }

    /// The currently loaded bundle, if any.
    pub fn current_model(&self) -> Option<Arc<ModelBundle>> {
        self.current.read().clone()
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            trained: self.is_trained(),
            algorithm: ALGORITHM_LABEL.to_string(),
            last_stats: self.current_model().map(|b| b.stats.clone()),
        }
    }

    pub fn predict_all(
        &self,
        snapshots: &[VehicleSnapshot],
        today: NaiveDate,
    ) -> PredictAllResponse {
        if snapshots.is_empty() {
            return PredictAllResponse {
                success: false,
                predictions: Vec::new(),
                message: Some(EngineError::DataUnavailable.to_string()),
            };
        }

        let predictions = self.predictor.predict_all(snapshots, today);
        info!(
            predicted = predictions.len(),
            skipped = snapshots.len() - predictions.len(),
            "Generated predictions"
        );
        PredictAllResponse {
            success: true,
            predictions,
            message: None,
        }
    }

    pub fn predict_one(
        &self,
        vehicle_id: u64,
        snapshots: &[VehicleSnapshot],
        today: NaiveDate,
    ) -> Result<Prediction> {
        if snapshots.is_empty() {
            return Err(EngineError::DataUnavailable);
        }
        self.predictor.predict_one(vehicle_id, snapshots, today)
    }

    /// Fit, persist and swap in a new model.
    ///
    /// On any failure the previously loaded model stays in place.
    pub fn train_model(&self, snapshots: &[VehicleSnapshot]) -> Result<TrainingStats> {
        let _guard = self.training.lock();

        let bundle = self.trainer.train(snapshots)?;
        self.repo.save(&bundle)?;

        let stats = bundle.stats.clone();
        *self.current.write() = Some(Arc::new(bundle));
        Ok(stats)
    }

    pub fn train(&self, snapshots: &[VehicleSnapshot]) -> TrainResponse {
        match self.train_model(snapshots) {
            Ok(stats) => TrainResponse {
                success: true,
                stats: Some(stats),
                message: Some("Model trained successfully".to_string()),
            },
            Err(e) => {
                error!(code = e.error_code(), error = %e, "Training failed");
                TrainResponse {
                    success: false,
                    stats: None,
                    message: Some(format!("Training error: {}", e)),
                }
            }
        }
    }

    /// Days-until estimate from the trained regressor, for diagnostics.
    ///
    /// Predictions themselves stay schedule-based; this never feeds
    /// [`Prediction::method`].
    pub fn regression_estimate(&self, snapshot: &VehicleSnapshot) -> Result<Option<f64>> {
        let Some(bundle) = self.current_model() else {
            return Ok(None);
        };
        let features = self.predictor.extractor().extract(snapshot)?;
        Ok(Some(bundle.model.predict_days(&features)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::urgency::UrgencyTier;

    /// In-memory repo whose saves can be made to fail.
    #[derive(Default)]
    struct MemoryRepo {
        saved: Mutex<Option<ModelBundle>>,
        fail_saves: bool,
    }

    impl ModelRepo for MemoryRepo {
        fn save(&self, bundle: &ModelBundle) -> Result<()> {
            if self.fail_saves {
                return Err(EngineError::Persistence("disk full".into()));
            }
            *self.saved.lock() = Some(bundle.clone());
            Ok(())
        }

        fn load(&self) -> Result<Option<ModelBundle>> {
            Ok(self.saved.lock().clone())
        }
    }

    fn snapshot(id: u64, distance: f64, days_since: i64) -> VehicleSnapshot {
        VehicleSnapshot {
            id,
            name: format!("Unit {}", id),
            plate_number: format!("SYN-{}", 1000 + id),
            age_in_days: 200 + id as i64 * 11,
            current_distance: distance,
            maintenance_event_count: (id % 3) as u32,
            days_since_last_maintenance: Some(days_since),
            recent_usage_sample: (id * 9 % 50) as u32,
        }
    }

    fn fleet() -> Vec<VehicleSnapshot> {
        (1..=12)
            .map(|i| {
                let distance = 4200.0 * i as f64 + 37.0 * (i % 5) as f64;
                snapshot(i, distance, 5 + (i as i64 * 23) % 160)
            })
            .collect()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn engine(repo: MemoryRepo) -> MaintenanceEngine {
        MaintenanceEngine::open(ScheduleTable::standard(), &EngineConfig::default(), Box::new(repo))
    }

    #[test]
    fn starts_untrained_with_empty_repo() {
        let engine = engine(MemoryRepo::default());
        assert!(!engine.is_trained());
        let status = engine.status();
        assert!(!status.trained);
        assert!(status.last_stats.is_none());
        assert_eq!(engine.regression_estimate(&fleet()[0]).unwrap(), None);
    }

    #[test]
    fn empty_fleet_reports_no_vehicles() {
        let engine = engine(MemoryRepo::default());
        let response = engine.predict_all(&[], today());
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("No vehicles found"));
        assert!(matches!(
            engine.predict_one(1, &[], today()),
            Err(EngineError::DataUnavailable)
        ));
    }

    #[test]
    fn batch_survives_bad_vehicle() {
        let engine = engine(MemoryRepo::default());
        let mut snapshots = fleet();
        snapshots[3].age_in_days = -5;

        let response = engine.predict_all(&snapshots, today());
        assert!(response.success);
        assert_eq!(response.predictions.len(), snapshots.len() - 1);
        assert!(response.predictions.iter().all(|p| p.vehicle_id != snapshots[3].id));
    }

    #[test]
    fn train_then_status() {
        let engine = engine(MemoryRepo::default());
        let response = engine.train(&fleet());
        assert!(response.success, "{:?}", response.message);

        let status = engine.status();
        assert!(status.trained);
        assert_eq!(status.last_stats.unwrap().sample_count, 12);
        assert!(engine.regression_estimate(&fleet()[0]).unwrap().is_some());
    }

    #[test]
    fn insufficient_data_keeps_previous_model() {
        let engine = engine(MemoryRepo::default());
        let first = engine.train_model(&fleet()).unwrap();

        let err = engine.train_model(&fleet()[..3]).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientData { found: 3, .. }));
        assert_eq!(engine.status().last_stats, Some(first));
    }

    #[test]
    fn reload_after_training_sees_new_model() {
        let engine = engine(MemoryRepo::default());
        let first = engine.train_model(&fleet()).unwrap();
        let second = engine.train_model(&fleet()[..6]).unwrap();
        assert_ne!(first.sample_count, second.sample_count);

        assert!(engine.load());
        assert_eq!(engine.status().last_stats, Some(second));
    }

    #[test]
    fn reload_waits_for_running_training() {
        let engine = Arc::new(engine(MemoryRepo::default()));
        engine.train_model(&fleet()[..6]).unwrap();

        let guard = engine.training.lock();
        let reloader = {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.load())
        };
        // while training holds the lock, commit a newer bundle the way train_model does
        let bundle = engine.trainer.train(&fleet()).unwrap();
        engine.repo.save(&bundle).unwrap();
        *engine.current.write() = Some(Arc::new(bundle));
        drop(guard);

        assert!(reloader.join().unwrap());
        assert_eq!(engine.status().last_stats.unwrap().sample_count, 12);
    }

    #[test]
    fn failed_save_leaves_engine_untrained() {
        let engine = engine(MemoryRepo {
            fail_saves: true,
            ..Default::default()
        });
        let response = engine.train(&fleet());
        assert!(!response.success);
        assert!(response.message.unwrap().contains("disk full"));
        assert!(!engine.is_trained());
    }

    #[test]
    fn history_driven_vehicle_is_overdue() {
        let engine = engine(MemoryRepo::default());
        let snapshots = vec![snapshot(1, 0.0, 200)];
        let p = engine.predict_one(1, &snapshots, today()).unwrap();
        assert_eq!(p.urgency, UrgencyTier::Critical);
        assert_eq!(p.days_until_maintenance, -110);
        assert_eq!(p.next_maintenance_date, today());
    }
}
