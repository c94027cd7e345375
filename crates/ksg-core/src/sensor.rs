//! The sensor capability.
//!
//! Any backend (sysfs files, synthetic data, test fixtures) becomes
//! monitorable by implementing [`Sensor`]. The registry and the protocol
//! only ever see this trait; backend-specific parsing stays behind it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SensorResult;

/// How a client should parse a sensor's value string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Integer,
    Float,
}

impl ValueType {
    /// Returns the protocol spelling of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed, unit-bearing quantity.
///
/// `value`, `min` and `max` return decimal strings matching
/// [`value_type`](Sensor::value_type). They may fail on any call; callers
/// treat a failure as "no reading this time", never as fatal.
///
/// Implementations are shared across concurrent sessions. A backend that
/// caches readings is responsible for its own synchronization.
pub trait Sensor: Send + Sync + fmt::Debug {
    /// Stable identifier used as the protocol key.
    fn name(&self) -> &str;

    /// Human-readable label. May be empty.
    fn description(&self) -> &str;

    fn value_type(&self) -> ValueType;

    /// Display suffix such as `Mhz` or `%`. May be empty.
    fn units(&self) -> &str;

    /// Current reading.
    fn value(&self) -> SensorResult<String>;

    /// Lower end of the advertised range.
    fn min(&self) -> SensorResult<String>;

    /// Upper end of the advertised range.
    fn max(&self) -> SensorResult<String>;
}
