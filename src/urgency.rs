//! Urgency classification.
//!
//! Vehicles reporting distance are judged purely by the schedule; vehicles
//! without odometer data are judged by time since their last service, and
//! only fall back to the schedule table when recently serviced.

use crate::data::VehicleSnapshot;
use crate::schedule::DAYS_PER_MONTH;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Days after the last service at which a history-driven vehicle is due.
const HISTORY_DUE_DAYS: i64 = 90;
const HISTORY_HIGH_DAYS: i64 = 120;
const HISTORY_CRITICAL_DAYS: i64 = 180;

/// How soon maintenance is needed. Ordered `Low < Medium < High < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UrgencyTier {
    Low,
    Medium,
    High,
    Critical,
}

impl UrgencyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            UrgencyTier::Low => "LOW",
            UrgencyTier::Medium => "MEDIUM",
            UrgencyTier::High => "HIGH",
            UrgencyTier::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which signal drives classification for a vehicle, chosen once per snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceSignal {
    /// Odometer data present; the schedule is authoritative.
    DistanceKnown,
    /// No odometer data; elapsed time since service decides.
    DistanceUnknown { days_since_maintenance: i64 },
}

impl DistanceSignal {
    pub fn for_snapshot(snapshot: &VehicleSnapshot) -> Self {
        if snapshot.current_distance > 0.0 {
            DistanceSignal::DistanceKnown
        } else {
            DistanceSignal::DistanceUnknown {
                days_since_maintenance: snapshot.effective_days_since_maintenance(),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    ScheduleDriven,
    HistoryDriven,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub tier: UrgencyTier,
    /// Negative when overdue
    pub days_until: i64,
    pub policy: Policy,
}

/// Schedule-driven tier for a number of days until the next milestone.
pub fn schedule_tier(days_until: i64) -> UrgencyTier {
    let months_until = days_until as f64 / DAYS_PER_MONTH as f64;
    if months_until < 0.25 {
        UrgencyTier::Critical
    } else if months_until < 0.5 {
        UrgencyTier::High
    } else if months_until < 2.0 {
        UrgencyTier::Medium
    } else {
        UrgencyTier::Low
    }
}

/// Classify a vehicle given its signal and the schedule's days-until value.
pub fn classify(signal: DistanceSignal, scheduled_days_until: i64) -> Classification {
    let by_schedule = Classification {
        tier: schedule_tier(scheduled_days_until),
        days_until: scheduled_days_until,
        policy: Policy::ScheduleDriven,
    };

    match signal {
        DistanceSignal::DistanceKnown => by_schedule,
        DistanceSignal::DistanceUnknown {
            days_since_maintenance,
        } => {
            let tier = if days_since_maintenance > HISTORY_CRITICAL_DAYS {
                UrgencyTier::Critical
            } else if days_since_maintenance > HISTORY_HIGH_DAYS {
                UrgencyTier::High
            } else if days_since_maintenance > HISTORY_DUE_DAYS {
                UrgencyTier::Medium
            } else {
                return by_schedule;
            };
            Classification {
                tier,
                days_until: HISTORY_DUE_DAYS - days_since_maintenance,
                policy: Policy::HistoryDriven,
            }
        }
    }
}
