//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (operator
//! console, instruction loader, timers) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.

use chrono::NaiveDateTime;

use crate::config::Name;
use crate::machine::Operation;
use crate::scheduler::{DispatchOutcome, Instruction};

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Power a configured machine on and put it on the floor.
    AddMachine(u32),

    /// Take an idle machine off the floor.
    RemoveMachine(u32),

    /// Start an operation on a machine with the next free operation id.
    AssignOperation {
        machine_id: u32,
        name: Name,
        duration_secs: u64,
    },

    /// Order and dispatch a batch of pending instructions.
    RunInstructions(Vec<Instruction>),

    /// Complete every operation whose deadline is at or before `now`.
    CheckCompletions(NaiveDateTime),

    /// Abort running operations and power every machine off.
    Shutdown,
}

/// What a successfully handled command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    Done,
    Assigned(Operation),
    Dispatched(Vec<DispatchOutcome>),
    Completed(Vec<Operation>),
}
