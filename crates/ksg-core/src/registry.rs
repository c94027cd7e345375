//! Sensor registry.
//!
//! The registry is populated once at startup and is read-only afterwards.
//! Sessions share it through an `Arc<SensorRegistry>` and never mutate it,
//! so registry access needs no locking.
//!
//! # Admission
//!
//! A candidate sensor is admitted only if its initial `value()` read
//! succeeds. Failed candidates are dropped with a warning and never retried.
//! A later registration under an existing name silently replaces the
//! earlier one.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::sensor::Sensor;

/// Protocol keywords. A sensor with one of these names is admitted but can
/// never be queried by value, because keyword matching always wins.
pub const RESERVED_NAMES: &[&str] = &["monitors", "quit"];

/// One sensor's readings, as produced by [`SensorRegistry::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorSnapshot {
    pub name: String,
    pub description: String,
    pub value_type: String,
    pub value: String,
    pub min: String,
    pub max: String,
    pub unit: String,
}

/// Immutable-after-startup mapping from sensor name to sensor.
#[derive(Debug, Default)]
pub struct SensorRegistry {
    sensors: BTreeMap<String, Arc<dyn Sensor>>,
}

impl SensorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to register a sensor.
    ///
    /// Returns `true` if the sensor was admitted. A sensor is rejected when
    /// its name is empty, contains whitespace or control characters, or
    /// ends in `?`, or when its initial reading fails.
    pub fn add<S: Sensor + 'static>(&mut self, sensor: S) -> bool {
        let name = sensor.name().to_string();

        if !is_addressable(&name) {
            warn!(sensor = %name, "Rejecting sensor with unaddressable name");
            return false;
        }

        if let Err(e) = sensor.value() {
            warn!(sensor = %name, error = %e, "Failed to do initial sensor reading");
            return false;
        }

        if RESERVED_NAMES.contains(&name.as_str()) {
            warn!(
                sensor = %name,
                "Sensor name collides with a protocol keyword and cannot be queried by value"
            );
        }

        if self.sensors.insert(name.clone(), Arc::new(sensor)).is_some() {
            debug!(sensor = %name, "Replaced existing sensor with the same name");
        } else {
            debug!(sensor = %name, "Registered sensor");
        }

        true
    }

    /// Looks up a sensor by exact name.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Sensor>> {
        self.sensors.get(name).cloned()
    }

    /// Iterates over all registered sensors.
    ///
    /// Callers must not rely on any particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Sensor>> {
        self.sensors.values()
    }

    /// Returns the names of all registered sensors.
    pub fn names(&self) -> Vec<&str> {
        self.sensors.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Reads every sensor once.
    ///
    /// A sensor whose value read fails is logged and left out; the rest are
    /// still read. A failed min or max read leaves that field empty.
    pub fn snapshot(&self) -> Vec<SensorSnapshot> {
        let mut readings = Vec::with_capacity(self.sensors.len());

        for sensor in self.sensors.values() {
            let value = match sensor.value() {
                Ok(v) => v,
                Err(e) => {
                    warn!(sensor = %sensor.name(), error = %e, "Error from sensor reading");
                    continue;
                }
            };

            let min = sensor.min().unwrap_or_else(|e| {
                warn!(sensor = %sensor.name(), error = %e, "Failed to read sensor minimum");
                String::new()
            });
            let max = sensor.max().unwrap_or_else(|e| {
                warn!(sensor = %sensor.name(), error = %e, "Failed to read sensor maximum");
                String::new()
            });

            readings.push(SensorSnapshot {
                name: sensor.name().to_string(),
                description: sensor.description().to_string(),
                value_type: sensor.value_type().to_string(),
                value,
                min,
                max,
                unit: sensor.units().to_string(),
            });
        }

        readings
    }
}

/// A name is addressable when it is non-empty and free of whitespace and
/// control characters, and does not end in `?`.
///
/// A trailing `?` always selects the info query for the name before it, so
/// a value query for `sclk?` is never attempted; such names are refused up
/// front instead of registering a sensor whose value cannot be read.
fn is_addressable(name: &str) -> bool {
    !name.is_empty()
        && !name.ends_with('?')
        && !name.chars().any(|c| c.is_whitespace() || c.is_control())
}
