//! KSG Server - line-protocol sensor daemon
//!
//! This crate provides everything around the core registry:
//! - `server` - per-connection protocol sessions over TCP or stdio
//! - `sysfs` - amdgpu sysfs file sensors
//! - `config` - built-in and TOML-configured sensor tables
//! - `dump` - one-shot table/JSON rendering of all readings
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ build_registry ┌──────────────────────┐
//! │ SensorConfig │───────────────▶│ SensorRegistry       │
//! └──────────────┘                │ (Arc, read-only)     │
//!                                 └──────────┬───────────┘
//!                                            │
//!                 ┌──────────────────────────┼─────────────┐
//!                 ▼                          ▼             ▼
//!        ┌────────────────┐        ┌────────────────┐  ┌────────┐
//!        │ TcpServer      │───────▶│ SessionHandler │  │ dump   │
//!        │ (accept loop)  │ spawn  │ (per client)   │  └────────┘
//!        └────────────────┘        └────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`

pub mod config;
pub mod dump;
pub mod server;
pub mod sysfs;
