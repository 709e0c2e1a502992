//! Comma-separated file adapters.
//!
//! | Adapter            | Implements          | File                                |
//! |--------------------|---------------------|-------------------------------------|
//! | `MachineSetupFile` | `ConfigPort`        | `machine_setup.csv`                 |
//! | `InstructionFile`  | `InstructionSource` | `instructions.csv`                  |
//! | `HistoryStore`     | `HistoryPort`       | `machine_<id>_operations.csv` (one per machine) |
//!
//! Fields are split on `,` and trimmed; there is no quoting. Names that
//! would need quoting have their commas replaced before they are written.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDateTime;
use log::{error, info, warn};

use crate::app::ports::{ConfigError, ConfigPort, HistoryPort, InstructionSource, StorageError};
use crate::config::{bounded_name, MachineConfig};
use crate::machine::Operation;
use crate::scheduler::Instruction;
use crate::sensors::Range;

/// Timestamp format of the `StartTime` column.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const HISTORY_HEADER: &str = "OperationID,MachineID,OperationName,StartTime,Duration";

fn fields(line: &str) -> Vec<&str> {
    line.split(',').map(str::trim).collect()
}

fn number<T: FromStr>(field: &str, line: usize, reason: &'static str) -> Result<T, ConfigError> {
    field.parse().map_err(|_| ConfigError::Malformed { line, reason })
}

// ---------------------------------------------------------------------------
// Machine setup
// ---------------------------------------------------------------------------

/// `id,name,temp_min,temp_max,hum_min,hum_max,buffer_capacity,window_length`
pub struct MachineSetupFile {
    path: PathBuf,
}

impl MachineSetupFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse one non-blank, non-comment line. `line` is 1-based.
    pub fn parse_line(text: &str, line: usize) -> Result<MachineConfig, ConfigError> {
        let f = fields(text);
        if f.len() != 8 {
            return Err(ConfigError::Malformed {
                line,
                reason: "expected 8 fields",
            });
        }
        if f[1].is_empty() {
            return Err(ConfigError::Malformed {
                line,
                reason: "empty machine name",
            });
        }
        let config = MachineConfig {
            id: number(f[0], line, "bad machine id")?,
            name: bounded_name(f[1]),
            temperature: Range::new(
                number(f[2], line, "bad temperature minimum")?,
                number(f[3], line, "bad temperature maximum")?,
            ),
            humidity: Range::new(
                number(f[4], line, "bad humidity minimum")?,
                number(f[5], line, "bad humidity maximum")?,
            ),
            buffer_capacity: number(f[6], line, "bad buffer capacity")?,
            window_length: number(f[7], line, "bad window length")?,
        };
        config.validate()?;
        Ok(config)
    }
}

impl ConfigPort for MachineSetupFile {
    fn load_machines(&self) -> Result<Vec<MachineConfig>, ConfigError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut machines = Vec::new();
        for (idx, text) in reader.lines().enumerate() {
            let text = text?;
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            machines.push(Self::parse_line(trimmed, idx + 1)?);
        }
        info!(
            "machine setup: {} record(s) from {}",
            machines.len(),
            self.path.display()
        );
        Ok(machines)
    }
}

// ---------------------------------------------------------------------------
// Instructions
// ---------------------------------------------------------------------------

/// `operation_id,machine_id,name[,duration]` after a header line.
pub struct InstructionFile {
    path: PathBuf,
}

impl InstructionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `None` for rows that cannot be used.
    pub fn parse_line(text: &str) -> Option<Instruction> {
        let f = fields(text);
        if f.len() < 3 || f[2].is_empty() {
            return None;
        }
        let duration_secs = match f.get(3) {
            None | Some(&"") => 0,
            Some(d) => d.parse().ok()?,
        };
        Some(Instruction {
            operation_id: f[0].parse().ok()?,
            machine_id: f[1].parse().ok()?,
            name: bounded_name(f[2]),
            duration_secs,
        })
    }
}

impl InstructionSource for InstructionFile {
    fn load(&mut self) -> Result<Vec<Instruction>, StorageError> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut batch = Vec::new();
        for (idx, text) in reader.lines().enumerate().skip(1) {
            let text = text?;
            if text.trim().is_empty() {
                continue;
            }
            match Self::parse_line(&text) {
                Some(instruction) => batch.push(instruction),
                None => warn!(
                    "{}:{}: unusable instruction '{}' skipped",
                    self.path.display(),
                    idx + 1,
                    text
                ),
            }
        }
        Ok(batch)
    }
}

// ---------------------------------------------------------------------------
// Operation history
// ---------------------------------------------------------------------------

/// One append-only CSV log per machine under `dir`.
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, machine_id: u32) -> PathBuf {
        self.dir.join(format!("machine_{}_operations.csv", machine_id))
    }

    fn format_record(op: &Operation) -> String {
        format!(
            "{},{},{},{},{}",
            op.operation_id,
            op.machine_id,
            op.name.replace(',', " "),
            op.start_time.format(TIME_FORMAT),
            op.duration_secs
        )
    }

    fn parse_record(text: &str, line: usize) -> Result<Operation, StorageError> {
        let corrupted = StorageError::Corrupted { line };
        let f = fields(text);
        if f.len() != 5 {
            return Err(corrupted);
        }
        Ok(Operation {
            operation_id: f[0].parse().map_err(|_| corrupted)?,
            machine_id: f[1].parse().map_err(|_| corrupted)?,
            name: bounded_name(f[2]),
            start_time: NaiveDateTime::parse_from_str(f[3], TIME_FORMAT).map_err(|_| corrupted)?,
            duration_secs: f[4].parse().map_err(|_| corrupted)?,
        })
    }
}

impl HistoryPort for HistoryStore {
    fn reset(&mut self, machine_id: u32) -> Result<(), StorageError> {
        fs::create_dir_all(&self.dir)?;
        let mut file = File::create(self.path_for(machine_id))?;
        writeln!(file, "{}", HISTORY_HEADER)?;
        Ok(())
    }

    fn append(&mut self, op: &Operation) -> Result<(), StorageError> {
        let path = self.path_for(op.machine_id);
        if !path.exists() {
            self.reset(op.machine_id)?;
        }
        let mut file = OpenOptions::new().append(true).open(&path).map_err(|e| {
            error!("history: cannot open {}: {}", path.display(), e);
            StorageError::from(e)
        })?;
        writeln!(file, "{}", Self::format_record(op))?;
        Ok(())
    }

    fn read(&self, machine_id: u32) -> Result<Vec<Operation>, StorageError> {
        let reader = BufReader::new(File::open(self.path_for(machine_id))?);
        let mut ops = Vec::new();
        for (idx, text) in reader.lines().enumerate().skip(1) {
            let text = text?;
            if text.trim().is_empty() {
                continue;
            }
            ops.push(Self::parse_record(&text, idx + 1)?);
        }
        Ok(ops)
    }
}
