//! Supervisor and machine configuration.
//!
//! [`SupervisorConfig`] holds process-level tunables and is loaded from an
//! optional JSON file. [`MachineConfig`] is one record of the machine
//! setup file, read through the [`ConfigPort`](crate::app::ports::ConfigPort).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::sensors::Range;

/// Display names longer than this are truncated on load.
pub const MAX_NAME_LEN: usize = 50;

pub type Name = heapless::String<MAX_NAME_LEN>;

/// Copy `raw` into a bounded name, dropping whatever does not fit.
/// Truncation happens on a char boundary.
pub fn bounded_name(raw: &str) -> Name {
    let mut name = Name::new();
    for c in raw.chars() {
        if name.push(c).is_err() {
            break;
        }
    }
    name
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Directory holding the input files and the per-machine history.
    pub data_dir: PathBuf,
    /// Machine setup records, relative to `data_dir`.
    pub machine_setup_file: PathBuf,
    /// Pending operation instructions, relative to `data_dir`.
    pub instructions_file: PathBuf,
    /// Telemetry poll period per machine (milliseconds).
    pub telemetry_interval_ms: u64,
    /// Machine ids powered on at startup. Empty means every configured
    /// machine.
    pub floor: Vec<u32>,
    /// Abort in-progress operations on shutdown instead of waiting for
    /// their deadlines.
    pub cancel_on_shutdown: bool,
    /// Shut down after this many seconds even if operations are still
    /// running. `None` runs until the batch is done.
    pub run_deadline_secs: Option<u64>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            machine_setup_file: PathBuf::from("machine_setup.csv"),
            instructions_file: PathBuf::from("instructions.csv"),
            telemetry_interval_ms: 1000,
            floor: Vec::new(),
            cancel_on_shutdown: true,
            run_deadline_secs: None,
        }
    }
}

impl SupervisorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telemetry_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "telemetry_interval_ms must be non-zero",
            ));
        }
        if self.machine_setup_file.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed("machine_setup_file is empty"));
        }
        if self.instructions_file.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed("instructions_file is empty"));
        }
        Ok(())
    }

    pub fn machine_setup_path(&self) -> PathBuf {
        self.data_dir.join(&self.machine_setup_file)
    }

    pub fn instructions_path(&self) -> PathBuf {
        self.data_dir.join(&self.instructions_file)
    }

    /// Whether machine `id` should be powered on at startup.
    pub fn starts_on_floor(&self, id: u32) -> bool {
        self.floor.is_empty() || self.floor.contains(&id)
    }
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
    pub id: u32,
    pub name: Name,
    pub temperature: Range,
    pub humidity: Range,
    /// Ring buffer capacity per metric.
    pub buffer_capacity: usize,
    /// Tumbling window size shared by both metrics.
    pub window_length: usize,
}

impl MachineConfig {
    /// Reject ranges and window sizes that can never behave sensibly.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.temperature.is_valid() {
            return Err(ConfigError::ValidationFailed("temperature min exceeds max"));
        }
        if !self.humidity.is_valid() {
            return Err(ConfigError::ValidationFailed("humidity min exceeds max"));
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::ValidationFailed("buffer_capacity must be non-zero"));
        }
        if self.window_length == 0 {
            return Err(ConfigError::ValidationFailed("window_length must be non-zero"));
        }
        if self.window_length > self.buffer_capacity {
            return Err(ConfigError::ValidationFailed(
                "window_length exceeds buffer_capacity",
            ));
        }
        Ok(())
    }
}
