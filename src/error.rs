use thiserror::Error;

/// Errors raised by the maintenance engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The data store returned no vehicles
    #[error("No vehicles found")]
    DataUnavailable,

    /// Too few snapshots to fit a model
    #[error("Not enough data ({found} vehicles, need at least {required})")]
    InsufficientData { found: usize, required: usize },

    /// Feature derivation or classification failed for a single vehicle
    #[error("Vehicle {vehicle_id}: {reason}")]
    PerVehicleCompute { vehicle_id: u64, reason: String },

    /// Model artifacts could not be written or read
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Vehicle not found: {0}")]
    VehicleNotFound(u64),

    /// Fitting or evaluating the regressor failed
    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Configuration error: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    /// Stable machine-readable code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::DataUnavailable => "DATA_UNAVAILABLE",
            EngineError::InsufficientData { .. } => "INSUFFICIENT_DATA",
            EngineError::PerVehicleCompute { .. } => "PER_VEHICLE_COMPUTE",
            EngineError::Persistence(_) => "PERSISTENCE_ERROR",
            EngineError::VehicleNotFound(_) => "NOT_FOUND",
            EngineError::Model(_) => "MODEL_ERROR",
            EngineError::InvalidSchedule(_) => "INVALID_SCHEDULE",
            EngineError::Configuration(_) => "CONFIGURATION_ERROR",
            EngineError::Csv(_) => "CSV_ERROR",
        }
    }

    pub(crate) fn vehicle(vehicle_id: u64, reason: impl Into<String>) -> Self {
        EngineError::PerVehicleCompute {
            vehicle_id,
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;
