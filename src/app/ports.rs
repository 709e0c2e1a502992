//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (machine links, event sinks, files, clocks) implement
//! these traits. The [`AppService`](super::service::AppService) consumes
//! them via generics, so the domain core never performs I/O directly.
//!
//! All port errors are typed and `Copy`; callers must handle every variant
//! explicitly.

use std::io;

use chrono::NaiveDateTime;

use crate::config::MachineConfig;
use crate::machine::Operation;
use crate::scheduler::{Instruction, SkipReason};

// ───────────────────────────────────────────────────────────────
// Telemetry port (driven adapter: machine link ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Request/response link to the machines.
///
/// `command` is a formatted machine command (`ON,0,0,0,1,1`). The reply
/// is the raw response text; decoding is the domain's job.
pub trait TelemetryPort {
    fn query(&mut self, machine_id: u32, command: &str) -> String;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port. Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: machine setup records)
// ───────────────────────────────────────────────────────────────

/// Loads the per-machine configuration records.
///
/// Implementations MUST validate every record and reject invalid ranges
/// with [`ConfigError::ValidationFailed`] rather than clamping them.
pub trait ConfigPort {
    fn load_machines(&self) -> Result<Vec<MachineConfig>, ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Instruction source (driven adapter: pending operation queue)
// ───────────────────────────────────────────────────────────────

pub trait InstructionSource {
    /// Pending instructions in arrival order.
    fn load(&mut self) -> Result<Vec<Instruction>, StorageError>;
}

// ───────────────────────────────────────────────────────────────
// History port (driven adapter: per-machine operation log)
// ───────────────────────────────────────────────────────────────

/// Append-only operation history, one log per machine.
pub trait HistoryPort {
    /// Start a fresh, empty log for `machine_id`.
    fn reset(&mut self, machine_id: u32) -> Result<(), StorageError>;

    fn append(&mut self, op: &Operation) -> Result<(), StorageError>;

    /// Records of `machine_id` in append order.
    fn read(&self, machine_id: u32) -> Result<Vec<Operation>, StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Time port
// ───────────────────────────────────────────────────────────────

pub trait TimePort {
    /// Local wall-clock time, second resolution is enough.
    fn now(&self) -> NaiveDateTime;
}

// ───────────────────────────────────────────────────────────────
// Scheduler delegate (decouples scheduler from events and history)
// ───────────────────────────────────────────────────────────────

/// Callback trait the [`OperationScheduler`](crate::scheduler::OperationScheduler)
/// invokes as it walks a batch. The scheduler itself knows nothing about
/// event sinks or history files.
pub trait SchedulerDelegate {
    /// `op` was stamped and the machine moved `ON → OP`.
    fn on_dispatched(&mut self, op: &Operation);

    /// `instruction` was not dispatched and will not be retried.
    fn on_skipped(&mut self, instruction: &Instruction, reason: SkipReason);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] and supervisor config loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The configuration source does not exist.
    NotFound,
    /// A record could not be parsed. `line` is 1-based.
    Malformed { line: usize, reason: &'static str },
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying I/O failure.
    Io(io::ErrorKind),
}

/// Errors from [`HistoryPort`] and [`InstructionSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// The requested file or log does not exist.
    NotFound,
    /// A stored record could not be parsed. `line` is 1-based.
    Corrupted { line: usize },
    /// Underlying I/O failure.
    Io(io::ErrorKind),
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            kind => Self::Io(kind),
        }
    }
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            kind => Self::Io(kind),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Malformed { line, reason } => write!(f, "line {}: {}", line, reason),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::Io(kind) => write!(f, "I/O error: {}", kind),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Corrupted { line } => write!(f, "corrupted record at line {}", line),
            Self::Io(kind) => write!(f, "I/O error: {}", kind),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
