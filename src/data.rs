use crate::error::Result;
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

// one row of the fleet vehicle export, column names follow the vehicle table
#[derive(Debug, Deserialize)]
struct VehicleRecord {
    #[serde(rename = "vehicle_id")] id: u64,
    #[serde(rename = "article", default)] name: String,
    #[serde(default)] plate_number: String,
    #[serde(default)] status: Option<String>,
    created_at: NaiveDate,
    #[serde(rename = "current_mileage")] current_distance: Option<f64>,
    #[serde(default)] maintenance_count: Option<u32>,
    last_maintenance_date: Option<NaiveDate>,
    #[serde(rename = "gps_points_last_week")] usage_points: Option<u32>,
}

/// Point-in-time summary of one vehicle, the input to every prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleSnapshot {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub plate_number: String,
    pub age_in_days: i64,
    pub current_distance: f64,
    pub maintenance_event_count: u32,
    /// `None` when the vehicle has never been serviced
    pub days_since_last_maintenance: Option<i64>,
    /// Telemetry points seen in the trailing usage window
    pub recent_usage_sample: u32,
}

impl VehicleSnapshot {
    /// Days since last service, falling back to the vehicle's age.
    pub fn effective_days_since_maintenance(&self) -> i64 {
        self.days_since_last_maintenance.unwrap_or(self.age_in_days)
    }
}

/// Anything that can hand the engine the current fleet.
pub trait SnapshotSource {
    /// One snapshot per active vehicle, ages measured against `today`.
    fn fetch_vehicle_snapshots(&self, today: NaiveDate) -> Result<Vec<VehicleSnapshot>>;
}

/// Reads the fleet from a CSV export of the vehicle table.
pub struct CsvSnapshotSource {
    path: PathBuf,
}

impl CsvSnapshotSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotSource for CsvSnapshotSource {
    fn fetch_vehicle_snapshots(&self, today: NaiveDate) -> Result<Vec<VehicleSnapshot>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)?;
        let mut snapshots = Vec::new();

        for (line, res) in reader.deserialize::<VehicleRecord>().enumerate() {
            // a single bad row should not hide the rest of the fleet
            let raw = match res {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(line = line + 2, error = %e, "Skipping malformed vehicle row");
                    continue;
                }
            };

            let active = raw
                .status
                .as_deref()
                .map_or(true, |s| s.is_empty() || s.eq_ignore_ascii_case("active"));
            if !active {
                debug!(vehicle_id = raw.id, "Skipping inactive vehicle");
                continue;
            }

            snapshots.push(VehicleSnapshot {
                id: raw.id,
                name: raw.name,
                plate_number: raw.plate_number,
                age_in_days: (today - raw.created_at).num_days(),
                current_distance: raw.current_distance.unwrap_or(0.0),
                maintenance_event_count: raw.maintenance_count.unwrap_or(0),
                days_since_last_maintenance: raw
                    .last_maintenance_date
                    .map(|d| (today - d).num_days()),
                recent_usage_sample: raw.usage_points.unwrap_or(0),
            });
        }

        snapshots.sort_by_key(|s| s.id);
        debug!(count = snapshots.len(), path = %self.path.display(), "Loaded vehicle snapshots");
        Ok(snapshots)
    }
}
