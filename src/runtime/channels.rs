//! Per-machine task control block.
//!
//! Uses `embassy-sync` primitives to bridge the synchronous
//! [`AppService`](crate::app::service::AppService) calls made by the
//! supervisor with the two async tasks each floor machine runs.
//!
//! ```text
//! ┌────────────┐  OpMsg (Channel)   ┌──────────────────┐
//! │ Supervisor │───────────────────▶│  operation task  │
//! │            │── cancel (Signal) ▶│  deadline / abort │
//! │            │◀─ finished (Watch)─│                  │
//! │            │                    └──────────────────┘
//! │            │── stop (Signal) ──▶┌──────────────────┐
//! └────────────┘                    │  telemetry task  │
//!                                   └──────────────────┘
//! ```
//!
//! `finished` keeps the most recent [`OperationEnd`] instead of handing
//! it to a single consumer: the batch waiter and shutdown may both be
//! waiting on the same machine, and a waiter that arrives late still sees
//! how the operation ended.
//!
//! Everything runs on one `LocalExecutor` thread, so the no-op raw mutex
//! is sufficient.

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_sync::watch::Watch;

use crate::machine::Operation;

/// Messages to a machine's operation task.
#[derive(Debug, Clone)]
pub enum OpMsg {
    /// Execute `op` until its deadline or until cancelled.
    Run(Operation),
    /// Exit the task.
    Stop,
}

/// How an operation left `OP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEnd {
    Completed(Operation),
    Cancelled(Operation),
}

impl OperationEnd {
    pub fn operation(&self) -> &Operation {
        match self {
            Self::Completed(op) | Self::Cancelled(op) => op,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Depth of the dispatch hand-off. A machine runs one operation at a
/// time, plus room for a trailing `Stop`.
const OP_DEPTH: usize = 2;

/// Concurrent waiters on one machine's completion (batch, shutdown,
/// callers of `wait_for`).
pub const FINISH_WAITERS: usize = 4;

pub struct MachineControl {
    pub machine_id: u32,
    /// Stops the telemetry task.
    pub stop: Signal<NoopRawMutex, ()>,
    /// Dispatch hand-off to the operation task.
    pub ops: Channel<NoopRawMutex, OpMsg, OP_DEPTH>,
    /// Aborts the running operation.
    pub cancel: Signal<NoopRawMutex, ()>,
    /// Latest operation to leave `OP`, published by the operation task.
    pub finished: Watch<NoopRawMutex, OperationEnd, FINISH_WAITERS>,
}

impl MachineControl {
    pub fn new(machine_id: u32) -> Self {
        Self {
            machine_id,
            stop: Signal::new(),
            ops: Channel::new(),
            cancel: Signal::new(),
            finished: Watch::new(),
        }
    }

    /// Publish how an operation left `OP` and wake every waiter.
    pub fn publish(&self, end: OperationEnd) {
        self.finished.sender().send(end);
    }

    /// Last published end of `operation_id`, if it is still the latest.
    pub fn ended(&self, operation_id: u32) -> Option<OperationEnd> {
        self.finished
            .try_get_and(|end| end.operation().operation_id == operation_id)
    }

    /// Ask both tasks to exit at their next suspension point.
    pub fn shut_down(&self) {
        self.stop.signal(());
        if self.ops.try_send(OpMsg::Stop).is_err() {
            log::warn!("machine {}: operation queue full on stop", self.machine_id);
        }
    }
}
