//! Sensor read errors following panic-free policy.

use thiserror::Error;

/// Errors a sensor backend reports when it cannot produce a fresh reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// The backing source could not be read
    #[error("Sensor {sensor} unavailable: {reason}")]
    Unavailable { sensor: String, reason: String },

    /// The source was read but its content did not parse
    #[error("Failed to parse reading for {sensor}: {reason}")]
    Parse { sensor: String, reason: String },

    /// The source holds no marked current value
    #[error("Could not find current value for {sensor}")]
    NoCurrentValue { sensor: String },
}

impl SensorError {
    /// Returns the name of the sensor that failed.
    pub fn sensor(&self) -> &str {
        match self {
            Self::Unavailable { sensor, .. }
            | Self::Parse { sensor, .. }
            | Self::NoCurrentValue { sensor } => sensor,
        }
    }
}

/// Result type for sensor reads.
pub type SensorResult<T> = Result<T, SensorError>;
