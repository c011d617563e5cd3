use crate::config::EngineConfig;
use crate::data::VehicleSnapshot;
use crate::error::{EngineError, Result};
use crate::features::{FeatureExtractor, FeatureVector};
use crate::schedule::ScheduleTable;
use crate::urgency::{classify, DistanceSignal, UrgencyTier};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PredictionMethod {
    ScheduleBased,
    MlBased,
}

/// Maintenance forecast for one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub vehicle_id: u64,
    pub vehicle_name: String,
    pub plate_number: String,
    pub urgency: UrgencyTier,
    /// Negative when the vehicle is overdue
    pub days_until_maintenance: i64,
    /// Never earlier than the day the prediction was made
    pub next_maintenance_date: NaiveDate,
    pub recommended_tasks: Vec<String>,
    /// Percentage
    pub confidence: u8,
    pub method: PredictionMethod,
    pub distance_until_milestone: f64,
    pub factors: FeatureVector,
}

/// Schedule-based prediction over snapshots.
#[derive(Debug, Clone)]
pub struct Predictor {
    schedule: ScheduleTable,
    extractor: FeatureExtractor,
    confidence: u8,
}

impl Predictor {
    pub fn new(schedule: ScheduleTable, extractor: FeatureExtractor, confidence: u8) -> Self {
        Self {
            schedule,
            extractor,
            confidence: confidence.min(100),
        }
    }

    pub fn from_config(schedule: ScheduleTable, cfg: &EngineConfig) -> Self {
        Self::new(
            schedule,
            FeatureExtractor::from_config(cfg),
            cfg.schedule_confidence,
        )
    }

    pub fn schedule(&self) -> &ScheduleTable {
        &self.schedule
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    pub fn predict(&self, snapshot: &VehicleSnapshot, today: NaiveDate) -> Result<Prediction> {
        let factors = self.extractor.extract(snapshot)?;
        let entry = self.schedule.next_milestone(snapshot.current_distance);
        let classification = classify(DistanceSignal::for_snapshot(snapshot), entry.days_until());

        let ahead = classification.days_until.max(0) as u64;
        let next_maintenance_date = today.checked_add_days(Days::new(ahead)).ok_or_else(|| {
            EngineError::vehicle(snapshot.id, "next maintenance date out of range")
        })?;

        Ok(Prediction {
            vehicle_id: snapshot.id,
            vehicle_name: snapshot.name.clone(),
            plate_number: snapshot.plate_number.clone(),
            urgency: classification.tier,
            days_until_maintenance: classification.days_until,
            next_maintenance_date,
            distance_until_milestone: entry.distance_until(snapshot.current_distance),
            recommended_tasks: entry.required_tasks,
            confidence: self.confidence,
            method: PredictionMethod::ScheduleBased,
            factors,
        })
    }

    /// Predict every snapshot; failing vehicles are logged and left out.
    pub fn predict_all(&self, snapshots: &[VehicleSnapshot], today: NaiveDate) -> Vec<Prediction> {
        snapshots
            .iter()
            .filter_map(|s| match self.predict(s, today) {
                Ok(p) => Some(p),
                Err(e) => {
                    warn!(vehicle_id = s.id, error = %e, "Error processing vehicle");
                    None
                }
            })
            .collect()
    }

    pub fn predict_one(
        &self,
        vehicle_id: u64,
        snapshots: &[VehicleSnapshot],
        today: NaiveDate,
    ) -> Result<Prediction> {
        let snapshot = snapshots
            .iter()
            .find(|s| s.id == vehicle_id)
            .ok_or(EngineError::VehicleNotFound(vehicle_id))?;
        self.predict(snapshot, today)
    }
}

impl Default for Predictor {
    fn default() -> Self {
        Self::from_config(ScheduleTable::standard(), &EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    }

    fn snapshot(id: u64, distance: f64, days_since: Option<i64>) -> VehicleSnapshot {
        VehicleSnapshot {
            id,
            name: format!("Vehicle {}", id),
            plate_number: format!("SYN-{}", 1000 + id),
            age_in_days: 400,
            current_distance: distance,
            maintenance_event_count: 1,
            days_since_last_maintenance: days_since,
            recent_usage_sample: 70,
        }
    }

    #[test]
    fn distance_known_vehicle_on_milestone() {
        let p = Predictor::default()
            .predict(&snapshot(1, 10000.0, Some(30)), today())
            .unwrap();

        assert_eq!(p.urgency, UrgencyTier::Low);
        assert_eq!(p.days_until_maintenance, 180);
        assert_eq!(
            p.next_maintenance_date,
            NaiveDate::from_ymd_opt(2026, 8, 28).unwrap()
        );
        assert_eq!(p.recommended_tasks, vec!["oil_change", "tire_rotation"]);
        assert_eq!(p.method, PredictionMethod::ScheduleBased);
        assert_eq!(p.confidence, 90);
        assert_eq!(p.distance_until_milestone, 0.0);
    }

    #[test]
    fn known_distance_ignores_stale_service_history() {
        let p = Predictor::default()
            .predict(&snapshot(3, 10000.0, Some(400)), today())
            .unwrap();

        assert_eq!(p.urgency, UrgencyTier::Low);
        assert_eq!(p.days_until_maintenance, 180);
        assert_eq!(
            p.next_maintenance_date,
            NaiveDate::from_ymd_opt(2026, 8, 28).unwrap()
        );
        assert_eq!(p.factors.days_since_last_maintenance, 400.0);
    }

    #[test]
    fn overdue_vehicle_is_clamped_to_today() {
        let p = Predictor::default()
            .predict(&snapshot(2, 0.0, Some(200)), today())
            .unwrap();

        assert_eq!(p.urgency, UrgencyTier::Critical);
        assert_eq!(p.days_until_maintenance, -110);
        assert_eq!(p.next_maintenance_date, today());
        assert_eq!(p.recommended_tasks, vec!["oil_change"]);
    }

    #[test]
    fn batch_skips_failing_vehicle() {
        let snapshots = vec![
            snapshot(1, 10000.0, Some(30)),
            snapshot(2, f64::NAN, Some(30)),
            snapshot(3, 0.0, Some(150)),
        ];
        let predictions = Predictor::default().predict_all(&snapshots, today());

        let ids: Vec<u64> = predictions.iter().map(|p| p.vehicle_id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(predictions[1].urgency, UrgencyTier::High);
    }

    #[test]
    fn predict_one_reports_missing_vehicle() {
        let snapshots = vec![snapshot(1, 10000.0, Some(30))];
        let predictor = Predictor::default();

        assert!(predictor.predict_one(1, &snapshots, today()).is_ok());
        assert!(matches!(
            predictor.predict_one(42, &snapshots, today()),
            Err(EngineError::VehicleNotFound(42))
        ));
    }

    #[test]
    fn prediction_serializes_tier_and_method() {
        let p = Predictor::default()
            .predict(&snapshot(1, 10000.0, Some(30)), today())
            .unwrap();
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["urgency"], "LOW");
        assert_eq!(json["method"], "SCHEDULE_BASED");
        assert_eq!(json["next_maintenance_date"], "2026-08-28");
    }
}
