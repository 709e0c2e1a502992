//! Operation scheduler.
//!
//! Walks a batch of pending [`Instruction`]s in operation-id order and
//! dispatches each onto its target machine when that machine is eligible.
//! The scheduler never waits for an operation to finish: dispatch moves
//! the machine `ON → OP` and returns; completion is driven separately by
//! a deadline (runtime timers) or by polling [`OperationScheduler::complete_due`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  batch ──▶ stable sort by operation_id                       │
//! │             │                                                │
//! │             ▼  for each instruction                          │
//! │   seen before? ──yes──▶ skip DuplicateOperation              │
//! │   on floor?    ──no───▶ skip MachineNotFound                 │
//! │   state ON?    ──no───▶ skip MachineBusy                     │
//! │             │                                                │
//! │             ▼                                                │
//! │   ON → OP, start_time = now, append to machine               │
//! │             │                                                │
//! │             ▼                                                │
//! │   SchedulerDelegate (history record, events)                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Skipped instructions are reported once and never retried.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use log::{info, warn};

use crate::app::ports::{SchedulerDelegate, TimePort};
use crate::config::Name;
use crate::error::{Error, RegistryError};
use crate::fsm::{StateId, Transition};
use crate::machine::Operation;
use crate::registry::Registry;

// ═══════════════════════════════════════════════════════════════
//  Instruction types
// ═══════════════════════════════════════════════════════════════

/// A pending, undispatched operation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub operation_id: u32,
    pub machine_id: u32,
    pub name: Name,
    pub duration_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The target machine is not on the plant floor.
    MachineNotFound,
    /// The target machine is not `ON` (already executing).
    MachineBusy,
    /// This operation id was already dispatched.
    DuplicateOperation,
}

impl core::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MachineNotFound => write!(f, "machine not found"),
            Self::MachineBusy => write!(f, "machine busy"),
            Self::DuplicateOperation => write!(f, "duplicate operation id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched(Operation),
    Skipped {
        instruction: Instruction,
        reason: SkipReason,
    },
}

impl DispatchOutcome {
    pub fn operation(&self) -> Option<&Operation> {
        match self {
            Self::Dispatched(op) => Some(op),
            Self::Skipped { .. } => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler engine
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct OperationScheduler {
    /// Operation ids dispatched in this process.
    dispatched: HashSet<u32>,
    /// Largest operation id seen anywhere (dispatched or queued).
    max_seen: u32,
}

impl OperationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort by `operation_id` ascending. Ties keep their input order.
    pub fn order(batch: &mut [Instruction]) {
        batch.sort_by_key(|i| i.operation_id);
    }

    /// Record an operation id so manual assignments never reuse it.
    pub fn observe(&mut self, operation_id: u32) {
        self.max_seen = self.max_seen.max(operation_id);
    }

    /// Id for a manually assigned operation: one past the largest seen.
    pub fn next_operation_id(&self) -> u32 {
        self.max_seen.saturating_add(1)
    }

    pub fn was_dispatched(&self, operation_id: u32) -> bool {
        self.dispatched.contains(&operation_id)
    }

    /// Try to start one instruction on its machine.
    pub fn dispatch(
        &mut self,
        registry: &mut Registry,
        instruction: &Instruction,
        now: NaiveDateTime,
        delegate: &mut impl SchedulerDelegate,
    ) -> DispatchOutcome {
        self.observe(instruction.operation_id);

        let reason = match self.try_start(registry, instruction, now) {
            Ok(op) => {
                self.dispatched.insert(op.operation_id);
                info!(
                    "dispatch: op {} '{}' on machine {} for {}s",
                    op.operation_id, op.name, op.machine_id, op.duration_secs
                );
                delegate.on_dispatched(&op);
                return DispatchOutcome::Dispatched(op);
            }
            Err(reason) => reason,
        };

        warn!(
            "dispatch: op {} for machine {} skipped: {}",
            instruction.operation_id, instruction.machine_id, reason
        );
        delegate.on_skipped(instruction, reason);
        DispatchOutcome::Skipped {
            instruction: instruction.clone(),
            reason,
        }
    }

    fn try_start(
        &self,
        registry: &mut Registry,
        instruction: &Instruction,
        now: NaiveDateTime,
    ) -> Result<Operation, SkipReason> {
        if self.was_dispatched(instruction.operation_id) {
            return Err(SkipReason::DuplicateOperation);
        }
        let machine = registry
            .active_mut(instruction.machine_id)
            .ok_or(SkipReason::MachineNotFound)?;
        if machine.state() != StateId::On {
            return Err(SkipReason::MachineBusy);
        }
        let op = Operation {
            operation_id: instruction.operation_id,
            machine_id: instruction.machine_id,
            name: instruction.name.clone(),
            start_time: now,
            duration_secs: instruction.duration_secs,
        };
        machine
            .start_operation(op.clone())
            .map_err(|_| SkipReason::MachineBusy)?;
        Ok(op)
    }

    /// Order `batch` and dispatch every instruction in turn.
    ///
    /// Each dispatch is stamped with the clock's time at that moment.
    pub fn run_batch(
        &mut self,
        registry: &mut Registry,
        mut batch: Vec<Instruction>,
        clock: &impl TimePort,
        delegate: &mut impl SchedulerDelegate,
    ) -> Vec<DispatchOutcome> {
        Self::order(&mut batch);
        for i in &batch {
            self.observe(i.operation_id);
        }
        let mut outcomes = Vec::with_capacity(batch.len());
        for i in &batch {
            outcomes.push(self.dispatch(&mut *registry, i, clock.now(), &mut *delegate));
        }
        outcomes
    }

    /// End the running operation on `machine_id` (`OP → ON`).
    ///
    /// `how` is [`Transition::Complete`] for a finished run and
    /// [`Transition::Abort`] for a cancelled one.
    pub fn finish(
        &mut self,
        registry: &mut Registry,
        machine_id: u32,
        how: Transition,
    ) -> Result<Operation, Error> {
        let machine = registry
            .active_mut(machine_id)
            .ok_or(RegistryError::NotFound(machine_id))?;
        let op = machine.finish_operation(how)?.clone();
        info!(
            "finish: op {} on machine {} ({})",
            op.operation_id, machine_id, how
        );
        Ok(op)
    }

    /// Complete every floor operation whose deadline has passed.
    pub fn complete_due(&mut self, registry: &mut Registry, now: NaiveDateTime) -> Vec<Operation> {
        let due: Vec<u32> = registry
            .list()
            .filter(|m| m.current_operation().is_some_and(|op| op.is_due(now)))
            .map(|m| m.id())
            .collect();

        let mut done = Vec::with_capacity(due.len());
        for id in due {
            match self.finish(registry, id, Transition::Complete) {
                Ok(op) => done.push(op),
                Err(e) => warn!("complete: machine {}: {}", id, e),
            }
        }
        done
    }
}

impl SkipReason {
    /// Map a skip on a manual assignment to the caller-facing error.
    pub fn into_registry_error(self, machine_id: u32) -> Option<RegistryError> {
        match self {
            Self::MachineNotFound => Some(RegistryError::NotFound(machine_id)),
            Self::MachineBusy => Some(RegistryError::Busy(machine_id)),
            Self::DuplicateOperation => None,
        }
    }
}
