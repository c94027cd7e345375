//! KSG Core - Sensor capability and registry
//!
//! This crate provides the domain types shared between the protocol
//! and the server:
//! - `Sensor` - the capability every monitorable quantity implements
//! - `SensorRegistry` - the immutable-after-startup collection of sensors
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod registry;
pub mod sensor;

// Re-exports for convenience
pub use error::{SensorError, SensorResult};
pub use registry::{SensorRegistry, SensorSnapshot, RESERVED_NAMES};
pub use sensor::{Sensor, ValueType};
