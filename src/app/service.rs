//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the machine registry, the operation scheduler and
//! the runtime counters. It exposes a synchronous, I/O-free API; every
//! effect flows through port traits injected at call sites, so the whole
//! service is testable with mock adapters.
//!
//! ```text
//!  TelemetryPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                    │          AppService          │
//!      TimePort ───▶ │ Registry · Scheduler · FSMs  │ ──▶ HistoryPort
//!                    └──────────────────────────────┘
//! ```
//!
//! The async [`Supervisor`](crate::runtime::Supervisor) wraps one
//! `AppService` in an `Rc<RefCell<…>>` and calls into it for every state
//! change; each call is a short, non-suspending critical section.

use chrono::NaiveDateTime;
use log::{error, info, warn};

use crate::config::{bounded_name, MachineConfig};
use crate::diagnostics::RuntimeMetrics;
use crate::error::{RegistryError, Result};
use crate::fsm::{StateId, Transition};
use crate::machine::{ChannelUpdate, Operation};
use crate::registry::Registry;
use crate::scheduler::{DispatchOutcome, Instruction, OperationScheduler, SkipReason};
use crate::sensors::Metric;

use super::commands::{AppCommand, CommandReply};
use super::events::{AppEvent, MachineStatus};
use super::ports::{EventSink, HistoryPort, SchedulerDelegate, TelemetryPort, TimePort};

// ───────────────────────────────────────────────────────────────
// Scheduler delegate: history + events + counters
// ───────────────────────────────────────────────────────────────

struct DispatchReporter<'a, H, S> {
    history: &'a mut H,
    sink: &'a mut S,
    metrics: &'a mut RuntimeMetrics,
}

impl<H: HistoryPort, S: EventSink> SchedulerDelegate for DispatchReporter<'_, H, S> {
    fn on_dispatched(&mut self, op: &Operation) {
        self.metrics.operations_dispatched += 1;
        if let Err(e) = self.history.append(op) {
            error!(
                "history: op {} on machine {} not recorded: {}",
                op.operation_id, op.machine_id, e
            );
        }
        self.sink.emit(&AppEvent::StateChanged {
            machine_id: op.machine_id,
            from: StateId::On,
            to: StateId::Op,
        });
        self.sink.emit(&AppEvent::OperationStarted(op.clone()));
    }

    fn on_skipped(&mut self, instruction: &Instruction, reason: SkipReason) {
        self.metrics.operations_skipped += 1;
        self.sink.emit(&AppEvent::OperationSkipped {
            instruction: instruction.clone(),
            reason,
        });
    }
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    registry: Registry,
    scheduler: OperationScheduler,
    metrics: RuntimeMetrics,
}

impl AppService {
    /// Build the arena from validated machine records. Every machine
    /// starts `OFF`; call [`start`](Self::start) to populate the floor.
    pub fn new(configs: Vec<MachineConfig>) -> Result<Self> {
        for c in &configs {
            c.validate()?;
        }
        Ok(Self {
            registry: Registry::from_configs(configs)?,
            scheduler: OperationScheduler::new(),
            metrics: RuntimeMetrics::default(),
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Put every machine for which `on_floor(id)` holds onto the floor.
    pub fn start(&mut self, on_floor: impl Fn(u32) -> bool, sink: &mut impl EventSink) {
        let ids: Vec<u32> = self
            .registry
            .configured()
            .map(|m| m.id())
            .filter(|id| on_floor(*id))
            .collect();
        for id in ids {
            if let Err(e) = self.add_machine(id, sink) {
                warn!("startup: {}", e);
            }
        }
        sink.emit(&AppEvent::Started {
            configured: self.registry.configured_len(),
            on_floor: self.registry.floor_len(),
        });
        info!(
            "AppService started: {} configured, {} on the floor",
            self.registry.configured_len(),
            self.registry.floor_len()
        );
    }

    /// Abort whatever is still running and power every machine off.
    ///
    /// Returns the cancelled operations.
    pub fn shutdown(&mut self, sink: &mut impl EventSink) -> Vec<Operation> {
        let mut cancelled = Vec::new();
        for id in self.registry.floor_ids() {
            if self
                .registry
                .active(id)
                .is_some_and(|m| m.state() == StateId::Op)
            {
                match self.cancel_operation(id, sink) {
                    Ok(op) => cancelled.push(op),
                    Err(e) => warn!("shutdown: machine {}: {}", id, e),
                }
            }
            if let Err(e) = self.remove_machine(id, sink) {
                warn!("shutdown: machine {}: {}", id, e);
            }
        }
        info!("AppService stopped: {}", self.metrics);
        cancelled
    }

    // ── Plant floor ───────────────────────────────────────────

    pub fn add_machine(&mut self, id: u32, sink: &mut impl EventSink) -> Result<()> {
        self.registry.add(id)?;
        sink.emit(&AppEvent::StateChanged {
            machine_id: id,
            from: StateId::Off,
            to: StateId::On,
        });
        Ok(())
    }

    /// Fails with `Busy` while the machine is executing.
    pub fn remove_machine(&mut self, id: u32, sink: &mut impl EventSink) -> Result<()> {
        self.registry.remove(id)?;
        sink.emit(&AppEvent::StateChanged {
            machine_id: id,
            from: StateId::On,
            to: StateId::Off,
        });
        Ok(())
    }

    // ── Telemetry ─────────────────────────────────────────────

    /// Feed one raw telemetry response for a floor machine.
    pub fn ingest_response(
        &mut self,
        machine_id: u32,
        text: &str,
        sink: &mut impl EventSink,
    ) -> Result<[ChannelUpdate; 2]> {
        let machine = self
            .registry
            .active_mut(machine_id)
            .ok_or(RegistryError::NotFound(machine_id))?;
        let updates = machine.ingest_response(text);
        for u in &updates {
            self.report_update(machine_id, text, u, sink);
        }
        Ok(updates)
    }

    fn report_update(
        &mut self,
        machine_id: u32,
        text: &str,
        update: &ChannelUpdate,
        sink: &mut impl EventSink,
    ) {
        match update.result {
            Ok(outcome) => {
                self.metrics.samples_ingested += 1;
                if outcome.dropped {
                    self.metrics.samples_dropped += 1;
                    let value = self
                        .registry
                        .active(machine_id)
                        .map_or(0, |m| m.channel(update.metric).current());
                    sink.emit(&AppEvent::SampleDropped {
                        machine_id,
                        metric: update.metric,
                        value,
                    });
                }
                if outcome.median.is_some() {
                    self.metrics.windows_evaluated += 1;
                }
                if let Some(alert) = outcome.alert {
                    self.metrics.alerts_raised += 1;
                    sink.emit(&AppEvent::Alert(alert));
                }
            }
            Err(error) => {
                self.metrics.malformed_readings += 1;
                log::debug!("machine {}: '{}' has no usable {}", machine_id, text, update.metric);
                sink.emit(&AppEvent::TelemetryIgnored {
                    machine_id,
                    metric: update.metric,
                    error,
                });
            }
        }
    }

    /// Query one floor machine over `link` and ingest the reply.
    pub fn poll_machine(
        &mut self,
        machine_id: u32,
        link: &mut impl TelemetryPort,
        sink: &mut impl EventSink,
    ) -> Result<[ChannelUpdate; 2]> {
        let command = self
            .registry
            .active(machine_id)
            .and_then(|m| m.poll_command())
            .ok_or(RegistryError::NotFound(machine_id))?;
        let response = link.query(machine_id, &command);
        self.ingest_response(machine_id, &response, sink)
    }

    /// Poll every floor machine once, in floor order.
    pub fn poll_all(&mut self, link: &mut impl TelemetryPort, sink: &mut impl EventSink) {
        for id in self.registry.floor_ids() {
            if let Err(e) = self.poll_machine(id, link, sink) {
                warn!("poll: machine {}: {}", id, e);
            }
        }
    }

    // ── Operations ────────────────────────────────────────────

    /// Start an operation on `machine_id` with the next free id.
    pub fn assign_operation(
        &mut self,
        machine_id: u32,
        name: &str,
        duration_secs: u64,
        clock: &impl TimePort,
        history: &mut impl HistoryPort,
        sink: &mut impl EventSink,
    ) -> Result<Operation> {
        // Checked up front so a rejected request does not emit a skip event.
        let machine = self
            .registry
            .active(machine_id)
            .ok_or(RegistryError::NotFound(machine_id))?;
        if machine.state() != StateId::On {
            return Err(RegistryError::Busy(machine_id).into());
        }

        let instruction = Instruction {
            operation_id: self.scheduler.next_operation_id(),
            machine_id,
            name: bounded_name(name),
            duration_secs,
        };
        let mut reporter = DispatchReporter {
            history,
            sink,
            metrics: &mut self.metrics,
        };
        match self
            .scheduler
            .dispatch(&mut self.registry, &instruction, clock.now(), &mut reporter)
        {
            DispatchOutcome::Dispatched(op) => Ok(op),
            DispatchOutcome::Skipped { reason, .. } => Err(reason
                .into_registry_error(machine_id)
                .unwrap_or(RegistryError::Busy(machine_id))
                .into()),
        }
    }

    /// Order and dispatch `batch`. Busy or missing machines are skipped,
    /// never waited for.
    pub fn run_instructions(
        &mut self,
        batch: Vec<Instruction>,
        clock: &impl TimePort,
        history: &mut impl HistoryPort,
        sink: &mut impl EventSink,
    ) -> Vec<DispatchOutcome> {
        let mut reporter = DispatchReporter {
            history,
            sink,
            metrics: &mut self.metrics,
        };
        self.scheduler
            .run_batch(&mut self.registry, batch, clock, &mut reporter)
    }

    /// The running operation on `machine_id` reached its deadline.
    pub fn complete_operation(
        &mut self,
        machine_id: u32,
        sink: &mut impl EventSink,
    ) -> Result<Operation> {
        let op = self
            .scheduler
            .finish(&mut self.registry, machine_id, Transition::Complete)?;
        self.metrics.operations_completed += 1;
        Self::emit_finished(sink, AppEvent::OperationCompleted(op.clone()), machine_id);
        Ok(op)
    }

    /// Abort the running operation on `machine_id` before its deadline.
    pub fn cancel_operation(
        &mut self,
        machine_id: u32,
        sink: &mut impl EventSink,
    ) -> Result<Operation> {
        let op = self
            .scheduler
            .finish(&mut self.registry, machine_id, Transition::Abort)?;
        self.metrics.operations_cancelled += 1;
        warn!(
            "op {} on machine {} cancelled before completion",
            op.operation_id, machine_id
        );
        Self::emit_finished(sink, AppEvent::OperationCancelled(op.clone()), machine_id);
        Ok(op)
    }

    /// Complete every floor operation whose deadline is at or before `now`.
    pub fn check_completions(
        &mut self,
        now: NaiveDateTime,
        sink: &mut impl EventSink,
    ) -> Vec<Operation> {
        let done = self.scheduler.complete_due(&mut self.registry, now);
        for op in &done {
            self.metrics.operations_completed += 1;
            Self::emit_finished(sink, AppEvent::OperationCompleted(op.clone()), op.machine_id);
        }
        done
    }

    fn emit_finished(sink: &mut impl EventSink, event: AppEvent, machine_id: u32) {
        sink.emit(&AppEvent::StateChanged {
            machine_id,
            from: StateId::Op,
            to: StateId::On,
        });
        sink.emit(&event);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        clock: &impl TimePort,
        history: &mut impl HistoryPort,
        sink: &mut impl EventSink,
    ) -> Result<CommandReply> {
        match cmd {
            AppCommand::AddMachine(id) => {
                self.add_machine(id, sink)?;
                Ok(CommandReply::Done)
            }
            AppCommand::RemoveMachine(id) => {
                self.remove_machine(id, sink)?;
                Ok(CommandReply::Done)
            }
            AppCommand::AssignOperation {
                machine_id,
                name,
                duration_secs,
            } => self
                .assign_operation(machine_id, &name, duration_secs, clock, history, sink)
                .map(CommandReply::Assigned),
            AppCommand::RunInstructions(batch) => Ok(CommandReply::Dispatched(
                self.run_instructions(batch, clock, history, sink),
            )),
            AppCommand::CheckCompletions(now) => {
                Ok(CommandReply::Completed(self.check_completions(now, sink)))
            }
            AppCommand::Shutdown => {
                self.shutdown(sink);
                Ok(CommandReply::Done)
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// One row per floor machine, in floor order.
    pub fn status(&self) -> Vec<MachineStatus> {
        self.registry
            .list()
            .map(|m| {
                let t = m.channel(Metric::Temperature);
                let h = m.channel(Metric::Humidity);
                MachineStatus {
                    id: m.id(),
                    name: m.config().name.clone(),
                    state: m.state(),
                    temperature: t.current(),
                    temperature_range: t.range(),
                    humidity: h.current(),
                    humidity_range: h.range(),
                    operation: m.current_operation().cloned(),
                }
            })
            .collect()
    }

    pub fn state_of(&self, machine_id: u32) -> Option<StateId> {
        self.registry.get(machine_id).map(|m| m.state())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn metrics(&self) -> RuntimeMetrics {
        self.metrics
    }
}
