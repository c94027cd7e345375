//! Protocol version and session greeting.

use std::fmt;

/// Prompt written before every read, without a trailing newline.
pub const PROMPT: &str = "ksysguardd> ";

/// Version of the ksysguardd protocol this daemon speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl ProtocolVersion {
    /// The version advertised in the banner.
    pub const CURRENT: ProtocolVersion = ProtocolVersion {
        major: 1,
        minor: 2,
        patch: 0,
    };
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Banner line sent once when a session starts (without newline).
pub fn banner() -> String {
    format!("ksysguardd {}", ProtocolVersion::CURRENT)
}
