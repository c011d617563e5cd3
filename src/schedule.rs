use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Fixed month length used to turn target months into days.
pub const DAYS_PER_MONTH: i64 = 30;

/// Spacing of the synthesized milestone once a vehicle is past the table.
const DEFAULT_INTERVAL: f64 = 5000.0;
const DEFAULT_TARGET_MONTHS: u32 = 3;
const DEFAULT_TASK: &str = "oil_change";

/// One row of the maintenance schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub milestone_distance: u64,
    pub target_months: u32,
    pub required_tasks: Vec<String>,
}

impl ScheduleEntry {
    pub fn new(milestone_distance: u64, target_months: u32, tasks: &[&str]) -> Self {
        Self {
            milestone_distance,
            target_months,
            required_tasks: tasks.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Days until this entry is due, using 30-day months.
    pub fn days_until(&self) -> i64 {
        self.target_months as i64 * DAYS_PER_MONTH
    }

    /// Remaining distance to the milestone (never negative).
    pub fn distance_until(&self, current_distance: f64) -> f64 {
        (self.milestone_distance as f64 - current_distance).max(0.0)
    }
}

/// Ascending, immutable mapping from distance milestones to service tasks.
#[derive(Debug, Clone)]
pub struct ScheduleTable {
    entries: Vec<ScheduleEntry>,
}

impl ScheduleTable {
    /// Build a table, rejecting unsorted milestones and malformed entries.
    pub fn new(entries: Vec<ScheduleEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(EngineError::InvalidSchedule("schedule has no entries".into()));
        }

        let mut previous: Option<u64> = None;
        for entry in &entries {
            if entry.milestone_distance == 0 || entry.target_months == 0 {
                return Err(EngineError::InvalidSchedule(format!(
                    "milestone {} must have positive distance and months",
                    entry.milestone_distance
                )));
            }
            if previous.is_some_and(|p| entry.milestone_distance <= p) {
                return Err(EngineError::InvalidSchedule(format!(
                    "milestone {} is not strictly ascending",
                    entry.milestone_distance
                )));
            }
            if entry.required_tasks.is_empty() {
                return Err(EngineError::InvalidSchedule(format!(
                    "milestone {} has no tasks",
                    entry.milestone_distance
                )));
            }
            let unique: HashSet<_> = entry.required_tasks.iter().collect();
            if unique.len() != entry.required_tasks.len() {
                return Err(EngineError::InvalidSchedule(format!(
                    "milestone {} lists a task twice",
                    entry.milestone_distance
                )));
            }
            previous = Some(entry.milestone_distance);
        }

        Ok(Self { entries })
    }

    /// The fleet's standard 5k-distance / 3-month service schedule.
    pub fn standard() -> Self {
        const OIL: &[&str] = &["oil_change"];
        const ROTATION: &[&str] = &["oil_change", "tire_rotation"];
        const MAJOR: &[&str] = &[
            "oil_change",
            "tire_rotation",
            "wheel_balance",
            "wheel_alignment",
            "brake_inspection",
        ];
        const MAJOR_COOLING: &[&str] = &[
            "oil_change",
            "tire_rotation",
            "wheel_balance",
            "wheel_alignment",
            "brake_inspection",
            "cooling_system",
        ];
        const TUNE_UP: &[&str] = &["oil_change", "engine_tune_up"];

        let rows: [(u64, u32, &[&str]); 20] = [
            (5000, 3, OIL),
            (10000, 6, ROTATION),
            (15000, 9, OIL),
            (20000, 12, MAJOR),
            (25000, 15, OIL),
            (30000, 18, ROTATION),
            (35000, 21, OIL),
            (40000, 24, MAJOR_COOLING),
            (45000, 27, TUNE_UP),
            (50000, 30, ROTATION),
            (55000, 33, OIL),
            (60000, 36, MAJOR),
            (65000, 39, OIL),
            (70000, 42, ROTATION),
            (75000, 45, OIL),
            (80000, 48, MAJOR_COOLING),
            (85000, 51, TUNE_UP),
            (90000, 54, ROTATION),
            (95000, 57, OIL),
            (100000, 60, MAJOR),
        ];

        Self {
            entries: rows
                .iter()
                .map(|(km, months, tasks)| ScheduleEntry::new(*km, *months, tasks))
                .collect(),
        }
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// First entry whose milestone is at or beyond `current_distance`.
    ///
    /// A vehicle sitting exactly on a milestone is still due for that
    /// milestone. Past the last milestone an oil change 5000 ahead is
    /// synthesized.
    pub fn next_milestone(&self, current_distance: f64) -> ScheduleEntry {
        self.entries
            .iter()
            .find(|e| current_distance <= e.milestone_distance as f64)
            .cloned()
            .unwrap_or_else(|| ScheduleEntry {
                milestone_distance: (current_distance.max(0.0) + DEFAULT_INTERVAL).round() as u64,
                target_months: DEFAULT_TARGET_MONTHS,
                required_tasks: vec![DEFAULT_TASK.to_string()],
            })
    }
}

impl Default for ScheduleTable {
    fn default() -> Self {
        Self::standard()
    }
}
