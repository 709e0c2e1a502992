//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them (console log, history, tests).

use crate::config::Name;
use crate::error::DecodeError;
use crate::fsm::StateId;
use crate::machine::Operation;
use crate::scheduler::{Instruction, SkipReason};
use crate::sensors::{Alert, Metric, Range};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started.
    Started { configured: usize, on_floor: usize },

    /// A machine's lifecycle state changed.
    StateChanged {
        machine_id: u32,
        from: StateId,
        to: StateId,
    },

    /// A window median fell outside its range.
    Alert(Alert),

    /// A sample was not buffered because the smoothing buffer was full.
    SampleDropped {
        machine_id: u32,
        metric: Metric,
        value: i32,
    },

    /// A metric was missing or malformed in a response; not updated
    /// this cycle.
    TelemetryIgnored {
        machine_id: u32,
        metric: Metric,
        error: DecodeError,
    },

    OperationStarted(Operation),

    OperationCompleted(Operation),

    OperationSkipped {
        instruction: Instruction,
        reason: SkipReason,
    },

    /// An operation was aborted before its deadline.
    OperationCancelled(Operation),
}

/// Point-in-time view of one floor machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineStatus {
    pub id: u32,
    pub name: Name,
    pub state: StateId,
    pub temperature: i32,
    pub temperature_range: Range,
    pub humidity: i32,
    pub humidity_range: Range,
    /// The running operation while `OP`.
    pub operation: Option<Operation>,
}
