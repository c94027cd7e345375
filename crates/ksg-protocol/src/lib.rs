//! KSG Protocol - ksysguardd-compatible line protocol
//!
//! This crate provides request parsing and response formatting for the
//! text protocol spoken by KSysGuard frontends. It performs no I/O; the
//! server drives it over whatever stream a session is bound to.

pub mod request;
pub mod response;
pub mod version;

pub use request::Request;
pub use response::{info_line, monitor_line, value_line};
pub use version::{banner, ProtocolVersion, PROMPT};
