//! Unified error types for the plant-floor supervisor.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! supervisor's top-level handling uniform. All variants are `Copy` so
//! they can be passed through events and reports without allocation.
//!
//! Every kind here is recoverable at the call site. Fatal startup
//! conditions surface from the adapters as [`ConfigError`] and are turned
//! into a process exit by the binary, never by the core.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};
use crate::fsm::{StateId, Transition};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sample ring buffer rejected an enqueue or a read.
    Buffer(BufferError),
    /// A telemetry record could not be decoded.
    Decode(DecodeError),
    /// A lifecycle transition is not legal from the current state.
    Transition(TransitionError),
    /// A plant-floor membership operation failed.
    Registry(RegistryError),
    /// A machine command could not be formatted.
    Command(CommandError),
    /// Machine or supervisor configuration is invalid or unreadable.
    Config(ConfigError),
    /// The operation history backend failed.
    Storage(StorageError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buffer(e) => write!(f, "buffer: {e}"),
            Self::Decode(e) => write!(f, "decode: {e}"),
            Self::Transition(e) => write!(f, "transition: {e}"),
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::Command(e) => write!(f, "command: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Ring buffer errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// Enqueue on a buffer already holding `capacity` samples.
    /// The offered sample is dropped; nothing is evicted.
    Full,
    /// Dequeue on an empty buffer.
    Empty,
    /// A drain asked for more samples than are buffered.
    /// The buffer is left untouched.
    Insufficient { requested: usize, available: usize },
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "buffer full"),
            Self::Empty => write!(f, "buffer empty"),
            Self::Insufficient {
                requested,
                available,
            } => write!(f, "need {requested} samples, have {available}"),
        }
    }
}

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Self {
        Self::Buffer(e)
    }
}

// ---------------------------------------------------------------------------
// Telemetry decode errors
// ---------------------------------------------------------------------------

/// Any of these means "metric not found in this response"; the channel
/// is simply not updated for the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// No record carries the requested name.
    TokenNotFound,
    /// The record has no `unit:` field, or it is empty or too long.
    MalformedUnit,
    /// The record has no `value:` field, or it is not a signed integer.
    MalformedValue,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TokenNotFound => write!(f, "token not found"),
            Self::MalformedUnit => write!(f, "malformed unit field"),
            Self::MalformedValue => write!(f, "malformed value field"),
        }
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Self::Decode(e)
    }
}

// ---------------------------------------------------------------------------
// Lifecycle transition errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionError {
    pub from: StateId,
    pub transition: Transition,
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not allowed from {}", self.transition, self.from)
    }
}

impl From<TransitionError> for Error {
    fn from(e: TransitionError) -> Self {
        Self::Transition(e)
    }
}

// ---------------------------------------------------------------------------
// Registry errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// No configured (or no active) machine has this id.
    NotFound(u32),
    /// The machine is already on the plant floor.
    AlreadyPresent(u32),
    /// The machine is executing an operation.
    Busy(u32),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "machine {id} not found"),
            Self::AlreadyPresent(id) => write!(f, "machine {id} already on the floor"),
            Self::Busy(id) => write!(f, "machine {id} is busy (OP)"),
        }
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

// ---------------------------------------------------------------------------
// Command formatting errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Not one of `ON`, `OFF`, `OP` after trimming.
    InvalidCommand,
    /// The machine id does not fit the 5-bit address field.
    IdOutOfRange(u32),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCommand => write!(f, "invalid command"),
            Self::IdOutOfRange(id) => write!(f, "machine id {id} exceeds 5-bit range"),
        }
    }
}

impl From<CommandError> for Error {
    fn from(e: CommandError) -> Self {
        Self::Command(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
