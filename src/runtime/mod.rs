//! Cooperative supervisor runtime.
//!
//! Drives one [`AppService`] on a single-threaded `edge-executor` with
//! `async-io-mini` reactor timers. Every floor machine gets a telemetry
//! task and an operation task (see [`tasks`]).
//!
//! ```text
//!  ┌─────────────────────────────────────────────────────────────┐
//!  │  futures_lite::future::block_on                             │
//!  │  ┌───────────────────────────────────────────────────────┐  │
//!  │  │  edge_executor::LocalExecutor                         │  │
//!  │  │                                                       │  │
//!  │  │  main future ── run_instructions / shutdown           │  │
//!  │  │  ┌────────────┐ ┌────────────┐      ┌────────────┐    │  │
//!  │  │  │ M1 telem ⏱ │ │ M1 op ⏱    │ ...  │ Mn op ⏱    │    │  │
//!  │  │  └────────────┘ └────────────┘      └────────────┘    │  │
//!  │  └───────────────────────────────────────────────────────┘  │
//!  │              Rc<RefCell<Core>>  (AppService + ports)        │
//!  └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Removing a machine that is executing is rejected with `Busy`.
//! Shutdown either waits for running operations or aborts them,
//! depending on [`RuntimeConfig::cancel_on_shutdown`]. It may run while a
//! batch is still waiting: both observe the same completions.
//! [`Supervisor::run`] joins a batch with its shutdown trigger, which is
//! [`Supervisor::request_shutdown`] or the optional run deadline.

pub mod channels;
mod tasks;

use core::cell::RefCell;
use core::future::Future;
use core::time::Duration;
use std::collections::HashMap;
use std::rc::Rc;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::FutureExt;
use log::{error, info, warn};

use crate::app::events::MachineStatus;
use crate::app::ports::{EventSink, HistoryPort, TelemetryPort, TimePort};
use crate::app::service::AppService;
use crate::config::SupervisorConfig;
use crate::diagnostics::RuntimeMetrics;
use crate::error::Result;
use crate::fsm::StateId;
use crate::machine::Operation;
use crate::scheduler::{DispatchOutcome, Instruction};

use channels::{MachineControl, OpMsg, OperationEnd};
use tasks::SharedCore;

/// Runnable queue depth. Two tasks per addressable machine (32) plus
/// the main future; must be a power of two.
const TASK_QUEUE_DEPTH: usize = 128;

/// The service plus every port it talks to.
pub(crate) struct Core<L, H, S, C> {
    pub(crate) app: AppService,
    pub(crate) link: L,
    pub(crate) history: H,
    pub(crate) sink: S,
    pub(crate) clock: C,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub telemetry_interval: Duration,
    pub cancel_on_shutdown: bool,
    /// Shut down this long after [`Supervisor::run`] starts, even if the
    /// batch is still running.
    pub run_deadline: Option<Duration>,
}

impl From<&SupervisorConfig> for RuntimeConfig {
    fn from(c: &SupervisorConfig) -> Self {
        Self {
            telemetry_interval: Duration::from_millis(c.telemetry_interval_ms),
            cancel_on_shutdown: c.cancel_on_shutdown,
            run_deadline: c.run_deadline_secs.map(Duration::from_secs),
        }
    }
}

/// Result of one instruction batch once every dispatched operation has
/// left `OP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<DispatchOutcome>,
    pub finished: Vec<OperationEnd>,
}

pub struct Supervisor<L, H, S, C> {
    executor: edge_executor::LocalExecutor<'static, TASK_QUEUE_DEPTH>,
    core: SharedCore<L, H, S, C>,
    controls: RefCell<HashMap<u32, Rc<MachineControl>>>,
    stop_requested: Signal<NoopRawMutex, ()>,
    config: RuntimeConfig,
}

impl<L, H, S, C> Supervisor<L, H, S, C>
where
    L: TelemetryPort + 'static,
    H: HistoryPort + 'static,
    S: EventSink + 'static,
    C: TimePort + 'static,
{
    pub fn new(app: AppService, link: L, history: H, sink: S, clock: C, config: RuntimeConfig) -> Self {
        Self {
            executor: edge_executor::LocalExecutor::new(),
            core: Rc::new(RefCell::new(Core {
                app,
                link,
                history,
                sink,
                clock,
            })),
            controls: RefCell::new(HashMap::new()),
            stop_requested: Signal::new(),
            config,
        }
    }

    /// Drive the executor until `fut` completes.
    pub fn block_on<F: Future>(&self, fut: F) -> F::Output {
        futures_lite::future::block_on(self.executor.run(fut))
    }

    // ── Plant floor ───────────────────────────────────────────

    /// Populate the floor and start the tasks of every machine on it.
    pub fn start(&self, on_floor: impl Fn(u32) -> bool) {
        let ids = {
            let mut core = self.core.borrow_mut();
            let Core { app, sink, .. } = &mut *core;
            app.start(on_floor, sink);
            app.registry().floor_ids()
        };
        for id in ids {
            self.spawn_machine(id);
        }
        info!(
            "supervisor running: {} machine(s), poll every {:?}",
            self.controls.borrow().len(),
            self.config.telemetry_interval
        );
    }

    pub fn add_machine(&self, id: u32) -> Result<()> {
        {
            let mut core = self.core.borrow_mut();
            let Core { app, sink, .. } = &mut *core;
            app.add_machine(id, sink)?;
        }
        self.spawn_machine(id);
        Ok(())
    }

    /// Fails with `Busy` while the machine is executing; its tasks keep
    /// running in that case.
    pub fn remove_machine(&self, id: u32) -> Result<()> {
        {
            let mut core = self.core.borrow_mut();
            let Core { app, sink, .. } = &mut *core;
            app.remove_machine(id, sink)?;
        }
        if let Some(ctl) = self.controls.borrow_mut().remove(&id) {
            ctl.shut_down();
        }
        Ok(())
    }

    fn spawn_machine(&self, id: u32) {
        let ctl = Rc::new(MachineControl::new(id));
        self.controls.borrow_mut().insert(id, ctl.clone());
        self.executor
            .spawn(tasks::telemetry_loop(
                self.core.clone(),
                ctl.clone(),
                self.config.telemetry_interval,
            ))
            .detach();
        self.executor
            .spawn(tasks::operation_loop(self.core.clone(), ctl))
            .detach();
    }

    // ── Operations ────────────────────────────────────────────

    /// Start an operation on `machine_id` with the next free id. Returns
    /// once it is dispatched; see [`wait_for`](Self::wait_for).
    pub fn assign_operation(&self, machine_id: u32, name: &str, duration_secs: u64) -> Result<Operation> {
        let op = {
            let mut core = self.core.borrow_mut();
            let Core {
                app,
                history,
                sink,
                clock,
                ..
            } = &mut *core;
            app.assign_operation(machine_id, name, duration_secs, &*clock, history, sink)?
        };
        let _ = self.hand_off(&op);
        Ok(op)
    }

    /// Dispatch `batch` in operation-id order, then wait until every
    /// dispatched operation has completed or been cancelled.
    pub async fn run_instructions(&self, batch: Vec<Instruction>) -> BatchReport {
        let outcomes = {
            let mut core = self.core.borrow_mut();
            let Core {
                app,
                history,
                sink,
                clock,
                ..
            } = &mut *core;
            app.run_instructions(batch, &*clock, history, sink)
        };

        // Hold the controls so a shutdown draining them cannot strand us.
        let pending: Vec<(Rc<MachineControl>, u32)> = outcomes
            .iter()
            .filter_map(DispatchOutcome::operation)
            .filter_map(|op| {
                let ctl = self.hand_off(op)?;
                Some((ctl, op.operation_id))
            })
            .collect();

        let mut finished = Vec::with_capacity(pending.len());
        for (ctl, operation_id) in &pending {
            if let Some(end) = self.wait_end(ctl, *operation_id).await {
                finished.push(end);
            }
        }
        BatchReport { outcomes, finished }
    }

    /// Wait for the operation running on `machine_id` to leave `OP`.
    ///
    /// Returns at once when the machine is not in `OP`: with the end of its
    /// last operation, or `None` if it has not run one since its tasks
    /// started. `None` also if the machine has no tasks.
    pub async fn wait_for(&self, machine_id: u32) -> Option<OperationEnd> {
        let ctl = self.controls.borrow().get(&machine_id).cloned()?;
        match self.running_operation(machine_id) {
            Some(operation_id) => self.wait_end(&ctl, operation_id).await,
            None => ctl.finished.try_get(),
        }
    }

    /// Wait until `operation_id` is published as ended on `ctl`. `None` if
    /// the machine stops running it without a published end.
    async fn wait_end(&self, ctl: &MachineControl, operation_id: u32) -> Option<OperationEnd> {
        let Some(mut rx) = ctl.finished.receiver() else {
            warn!(
                "machine {}: too many waiters on op {}",
                ctl.machine_id, operation_id
            );
            return ctl.ended(operation_id);
        };
        loop {
            // Marks the current value seen, so `changed` waits for the next.
            let latest = rx.try_get();
            if let Some(end) = latest.filter(|e| e.operation().operation_id == operation_id) {
                return Some(end);
            }
            if self.running_operation(ctl.machine_id) != Some(operation_id) {
                return None;
            }
            rx.changed().await;
        }
    }

    fn running_operation(&self, machine_id: u32) -> Option<u32> {
        let core = self.core.borrow();
        core.app
            .registry()
            .active(machine_id)
            .and_then(|m| m.current_operation())
            .map(|op| op.operation_id)
    }

    /// Abort the operation running on `machine_id`, if any.
    pub fn cancel(&self, machine_id: u32) {
        if let Some(ctl) = self.controls.borrow().get(&machine_id) {
            ctl.cancel.signal(());
        }
    }

    /// Give `op` to its machine's operation task. Returns the control
    /// block its end will be published on.
    fn hand_off(&self, op: &Operation) -> Option<Rc<MachineControl>> {
        let ctl = self.controls.borrow().get(&op.machine_id).cloned();
        let sent = ctl.as_ref().is_some_and(|ctl| {
            ctl.cancel.reset();
            ctl.ops.try_send(OpMsg::Run(op.clone())).is_ok()
        });
        if sent {
            return ctl;
        }

        // Nothing would ever finish it; do not leave the machine in OP.
        error!(
            "machine {}: op {} could not be handed to its task",
            op.machine_id, op.operation_id
        );
        let end = {
            let mut core = self.core.borrow_mut();
            let Core { app, sink, .. } = &mut *core;
            app.cancel_operation(op.machine_id, sink)
                .map_or_else(|_| OperationEnd::Cancelled(op.clone()), OperationEnd::Cancelled)
        };
        if let Some(ctl) = &ctl {
            ctl.publish(end);
        }
        ctl
    }

    // ── Shutdown ──────────────────────────────────────────────

    /// Ask [`run`](Self::run) to shut down now.
    pub fn request_shutdown(&self) {
        self.stop_requested.signal(());
    }

    /// Dispatch `batch` and shut down once it is done, or earlier when
    /// shutdown is requested or the run deadline passes. Operations still
    /// running at that point are handled per `cancel_on_shutdown`.
    pub async fn run(&self, batch: Vec<Instruction>) -> (BatchReport, RuntimeMetrics) {
        let deadline = self.config.run_deadline;
        let work = async {
            let report = self.run_instructions(batch).await;
            self.request_shutdown();
            report
        };
        let stopper = async {
            let trigger = async {
                self.stop_requested.wait().await;
            };
            match deadline {
                Some(after) => {
                    trigger
                        .or(async {
                            async_io_mini::Timer::after(after).await;
                            info!("run deadline of {:?} reached", after);
                        })
                        .await;
                }
                None => trigger.await,
            }
            self.shutdown().await
        };
        futures_lite::future::zip(work, stopper).await
    }

    /// Finish or abort running operations, stop every task and power the
    /// floor off.
    pub async fn shutdown(&self) -> RuntimeMetrics {
        let busy: Vec<u32> = {
            let core = self.core.borrow();
            core.app
                .status()
                .iter()
                .filter(|s| s.state == StateId::Op)
                .map(|s| s.id)
                .collect()
        };

        for &id in &busy {
            if self.config.cancel_on_shutdown {
                self.cancel(id);
            } else {
                info!("shutdown: waiting for machine {} to finish", id);
            }
        }
        for &id in &busy {
            let _ = self.wait_for(id).await;
        }

        for (_, ctl) in self.controls.borrow_mut().drain() {
            ctl.shut_down();
        }

        let mut core = self.core.borrow_mut();
        let Core { app, sink, .. } = &mut *core;
        app.shutdown(sink);
        app.metrics()
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn status(&self) -> Vec<MachineStatus> {
        self.core.borrow().app.status()
    }

    pub fn metrics(&self) -> RuntimeMetrics {
        self.core.borrow().app.metrics()
    }

    /// Read access to the service and its history port.
    pub fn inspect<R>(&self, f: impl FnOnce(&AppService, &H) -> R) -> R {
        let core = self.core.borrow();
        f(&core.app, &core.history)
    }
}
