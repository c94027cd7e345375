//! Sysfs-backed sensors.
//!
//! amdgpu exposes its power-play clock tables as small text files under
//! the device directory, for example `pp_dpm_sclk`:
//!
//! ```text
//! 0: 300Mhz
//! 1: 1400Mhz *
//! 2: 2100Mhz
//! ```
//!
//! The first line is the lowest level, the last line the highest, and the
//! active level is marked with `*`. Other files such as `gpu_busy_percent`
//! hold a single number.
//!
//! Every read goes back to the file; nothing is cached, so a `PerfFile`
//! can be queried from many sessions at once without locking.

use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

use ksg_core::{Sensor, SensorError, SensorResult, ValueType};

/// How the file content is turned into readings.
#[derive(Debug, Clone)]
pub enum ReadMode {
    /// One level per line; the capture group extracts the number.
    Levels(Regex),

    /// The whole file is the value; the range is fixed.
    Single { min: String, max: String },
}

/// Parsed level table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Levels {
    pub min: Option<String>,
    pub max: Option<String>,
    pub current: Option<String>,
}

impl Levels {
    /// Extracts min, max and the starred current level from a table.
    pub fn parse(contents: &str, pattern: &Regex) -> Self {
        let capture = |line: &str| -> Option<String> {
            pattern
                .captures(line)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        };

        let mut lines = contents.trim().lines().filter(|l| !l.trim().is_empty());
        let Some(first) = lines.next() else {
            return Self::default();
        };

        let mut last = first;
        let mut current = first
            .trim_end()
            .ends_with('*')
            .then(|| capture(first))
            .flatten();

        for line in lines {
            last = line;
            if current.is_none() && line.trim_end().ends_with('*') {
                current = capture(line);
            }
        }

        Self {
            min: capture(first),
            max: capture(last),
            current,
        }
    }
}

/// A sensor reading one sysfs file.
#[derive(Debug, Clone)]
pub struct PerfFile {
    path: PathBuf,
    name: String,
    description: String,
    value_type: ValueType,
    unit: String,
    mode: ReadMode,
}

impl PerfFile {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        value_type: ValueType,
        mode: ReadMode,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            description: String::new(),
            value_type,
            unit: String::new(),
            mode,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the backing file is present.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn read_contents(&self) -> SensorResult<String> {
        fs::read_to_string(&self.path).map_err(|e| SensorError::Unavailable {
            sensor: self.name.clone(),
            reason: format!("{}: {e}", self.path.display()),
        })
    }

    fn read_levels(&self, pattern: &Regex) -> SensorResult<Levels> {
        let contents = self.read_contents()?;
        Ok(Levels::parse(&contents, pattern))
    }

    fn unmatched(&self, which: &str) -> SensorError {
        SensorError::Parse {
            sensor: self.name.clone(),
            reason: format!("no {which} level in {}", self.path.display()),
        }
    }
}

impl Sensor for PerfFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn value_type(&self) -> ValueType {
        self.value_type
    }

    fn units(&self) -> &str {
        &self.unit
    }

    fn value(&self) -> SensorResult<String> {
        match &self.mode {
            ReadMode::Levels(pattern) => {
                self.read_levels(pattern)?
                    .current
                    .ok_or_else(|| SensorError::NoCurrentValue {
                        sensor: self.name.clone(),
                    })
            }
            ReadMode::Single { .. } => {
                let contents = self.read_contents()?;
                let value = contents.trim();
                if value.is_empty() {
                    return Err(SensorError::Parse {
                        sensor: self.name.clone(),
                        reason: format!("{} is empty", self.path.display()),
                    });
                }
                Ok(value.to_string())
            }
        }
    }

    fn min(&self) -> SensorResult<String> {
        match &self.mode {
            ReadMode::Levels(pattern) => self
                .read_levels(pattern)?
                .min
                .ok_or_else(|| self.unmatched("lowest")),
            ReadMode::Single { min, .. } => Ok(min.clone()),
        }
    }

    fn max(&self) -> SensorResult<String> {
        match &self.mode {
            ReadMode::Levels(pattern) => self
                .read_levels(pattern)?
                .max
                .ok_or_else(|| self.unmatched("highest")),
            ReadMode::Single { max, .. } => Ok(max.clone()),
        }
    }
}
