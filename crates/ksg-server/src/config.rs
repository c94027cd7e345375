//! Sensor configuration.
//!
//! The daemon knows a built-in table of amdgpu sensors. A TOML file can
//! replace the table or point it at another card:
//!
//! ```toml
//! device = "/sys/class/drm/card1/device"
//!
//! [[sensor]]
//! file = "pp_dpm_sclk"
//! name = "sclk"
//! description = "GPU Clock Speed"
//! pattern = '\d+: (\d+)Mhz'
//! type = "integer"
//! unit = "Mhz"
//!
//! [[sensor]]
//! file = "gpu_busy_percent"
//! name = "gpu_busy_percent"
//! type = "integer"
//! unit = "%"
//! single_value = true
//! min = "0"
//! max = "100"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use ksg_core::{SensorRegistry, ValueType};

use crate::sysfs::{PerfFile, ReadMode};

/// Default amdgpu device directory.
pub const DEFAULT_DEVICE_DIR: &str = "/sys/class/drm/card0/device";

/// Level pattern for `pp_dpm_*clk` tables.
pub const CLOCK_PATTERN: &str = r"\d+: (\d+)Mhz";

/// Level pattern for `pp_dpm_pcie`.
pub const PCIE_PATTERN: &str = r"\d+: ([\.\d]+)GT/s";

/// One configured sysfs sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSpec {
    /// File name relative to the device directory
    pub file: String,

    /// Protocol name
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Regex with one capture group, required unless `single_value`
    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(rename = "type")]
    pub value_type: ValueType,

    #[serde(default)]
    pub unit: String,

    /// Whole file is the value
    #[serde(default)]
    pub single_value: bool,

    /// Fixed range for single-value sensors
    #[serde(default)]
    pub min: String,

    #[serde(default)]
    pub max: String,
}

impl SensorSpec {
    fn clock(file: &str, name: &str, description: &str) -> Self {
        Self {
            file: file.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            pattern: Some(CLOCK_PATTERN.to_string()),
            value_type: ValueType::Integer,
            unit: "Mhz".to_string(),
            single_value: false,
            min: String::new(),
            max: String::new(),
        }
    }

    /// Builds the sysfs sensor for this spec under `device`.
    pub fn build(&self, device: &Path) -> Result<PerfFile, ConfigError> {
        let mode = if self.single_value {
            ReadMode::Single {
                min: self.min.clone(),
                max: self.max.clone(),
            }
        } else {
            let pattern = self
                .pattern
                .as_deref()
                .ok_or_else(|| ConfigError::MissingPattern {
                    sensor: self.name.clone(),
                })?;
            let regex = Regex::new(pattern).map_err(|e| ConfigError::Pattern {
                sensor: self.name.clone(),
                error: e.to_string(),
            })?;
            ReadMode::Levels(regex)
        };

        Ok(
            PerfFile::new(device.join(&self.file), &self.name, self.value_type, mode)
                .with_description(&self.description)
                .with_unit(&self.unit),
        )
    }
}

/// The built-in amdgpu sensor table.
pub fn default_sensors() -> Vec<SensorSpec> {
    vec![
        SensorSpec::clock("pp_dpm_sclk", "sclk", "GPU Clock Speed"),
        SensorSpec::clock("pp_dpm_mclk", "mclk", "Memory Clock Speed"),
        SensorSpec::clock("pp_dpm_socclk", "socclk", "GPU SoC Clock Speed"),
        SensorSpec::clock("pp_dpm_fclk", "fclk", ""),
        SensorSpec::clock("pp_dpm_dcefclk", "dcefclk", "Display (DCE) Clock"),
        SensorSpec {
            file: "pp_dpm_pcie".to_string(),
            name: "pcie".to_string(),
            description: "PCIe Bandwidth Speed".to_string(),
            pattern: Some(PCIE_PATTERN.to_string()),
            value_type: ValueType::Float,
            unit: "GT/s".to_string(),
            single_value: false,
            min: String::new(),
            max: String::new(),
        },
        SensorSpec {
            file: "gpu_busy_percent".to_string(),
            name: "gpu_busy_percent".to_string(),
            description: "GPU Busy Percent".to_string(),
            pattern: None,
            value_type: ValueType::Integer,
            unit: "%".to_string(),
            single_value: true,
            min: "0".to_string(),
            max: "100".to_string(),
        },
    ]
}

fn default_device() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICE_DIR)
}

/// Device directory plus the sensors to read from it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SensorConfig {
    #[serde(default = "default_device")]
    pub device: PathBuf,

    #[serde(default = "default_sensors", rename = "sensor")]
    pub sensors: Vec<SensorSpec>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sensors: default_sensors(),
        }
    }
}

impl SensorConfig {
    /// Parses a TOML document. `origin` is only used in error messages.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Loads a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::parse(&contents, path)
    }

    /// Resolves the configuration to use.
    ///
    /// An explicit path must load. Otherwise the per-user file is used when
    /// present, and the built-in table when not.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            info!(path = %path.display(), "Loading sensor config");
            return Self::load(path);
        }

        match default_config_path() {
            Some(path) if path.is_file() => {
                info!(path = %path.display(), "Loading sensor config");
                Self::load(&path)
            }
            _ => {
                debug!("No sensor config found, using built-in sensors");
                Ok(Self::default())
            }
        }
    }

    /// Replaces the device directory.
    pub fn with_device(mut self, device: impl Into<PathBuf>) -> Self {
        self.device = device.into();
        self
    }

    /// Builds the registry from every sensor whose file exists.
    ///
    /// Missing files are skipped quietly, since not every card exposes
    /// every clock domain. Sensors whose first reading fails are dropped by
    /// the registry itself.
    pub fn build_registry(&self) -> Result<SensorRegistry, ConfigError> {
        let mut registry = SensorRegistry::new();

        for spec in &self.sensors {
            let sensor = spec.build(&self.device)?;
            if !sensor.exists() {
                debug!(
                    sensor = %spec.name,
                    path = %sensor.path().display(),
                    "Sensor file not present, skipping"
                );
                continue;
            }
            registry.add(sensor);
        }

        info!(
            device = %self.device.display(),
            count = registry.len(),
            sensors = ?registry.names(),
            "Sensor registry ready"
        );

        Ok(registry)
    }
}

/// Default per-user config path: `<config_dir>/ksgd/sensors.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ksgd").join("sensors.toml"))
}

/// Errors that can occur while loading configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid pattern for sensor {sensor}: {error}")]
    Pattern { sensor: String, error: String },

    #[error("Sensor {sensor} needs a pattern or single_value = true")]
    MissingPattern { sensor: String },
}
