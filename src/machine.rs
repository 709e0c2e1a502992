//! Machine and operation records.
//!
//! A [`Machine`] owns its configuration, one [`MetricChannel`] per metric,
//! its lifecycle [`MachineFsm`] and the append-only list of operations it
//! has executed. Machines live in the registry arena and are reached
//! through handles; nothing else holds a copy.

use chrono::{NaiveDateTime, TimeDelta};
use log::{debug, warn};

use crate::config::{MachineConfig, Name};
use crate::error::{DecodeError, TransitionError};
use crate::fsm::{MachineFsm, StateId, Transition};
use crate::protocol::command::{self, CommandKind, CommandString};
use crate::protocol::decoder;
use crate::sensors::{IngestOutcome, Metric, MetricChannel};

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// A dispatched, time-bounded task on one machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub operation_id: u32,
    pub machine_id: u32,
    pub name: Name,
    pub start_time: NaiveDateTime,
    pub duration_secs: u64,
}

impl Operation {
    pub fn deadline(&self) -> NaiveDateTime {
        let secs = i64::try_from(self.duration_secs).unwrap_or(i64::MAX);
        let delta = TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX);
        self.start_time
            .checked_add_signed(delta)
            .unwrap_or(NaiveDateTime::MAX)
    }

    /// `now - start_time >= duration`.
    pub fn is_due(&self, now: NaiveDateTime) -> bool {
        now >= self.deadline()
    }
}

// ---------------------------------------------------------------------------
// Machine
// ---------------------------------------------------------------------------

/// Per-metric result of feeding one telemetry response to a machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelUpdate {
    pub metric: Metric,
    pub result: Result<IngestOutcome, DecodeError>,
}

pub struct Machine {
    config: MachineConfig,
    temperature: MetricChannel,
    humidity: MetricChannel,
    fsm: MachineFsm,
    operations: Vec<Operation>,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        let temperature =
            MetricChannel::new(Metric::Temperature, config.temperature, config.buffer_capacity);
        let humidity =
            MetricChannel::new(Metric::Humidity, config.humidity, config.buffer_capacity);
        Self {
            config,
            temperature,
            humidity,
            fsm: MachineFsm::new(),
            operations: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.config.id
    }

    pub fn name(&self) -> &str {
        self.config.name.as_str()
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn state(&self) -> StateId {
        self.fsm.state()
    }

    pub fn channel(&self, metric: Metric) -> &MetricChannel {
        match metric {
            Metric::Temperature => &self.temperature,
            Metric::Humidity => &self.humidity,
        }
    }

    fn channel_mut(&mut self, metric: Metric) -> &mut MetricChannel {
        match metric {
            Metric::Temperature => &mut self.temperature,
            Metric::Humidity => &mut self.humidity,
        }
    }

    /// Every operation this machine has executed, in dispatch order.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// The operation being executed, if the machine is in `OP`.
    pub fn current_operation(&self) -> Option<&Operation> {
        match self.state() {
            StateId::Op => self.operations.last(),
            _ => None,
        }
    }

    /// The only path by which the lifecycle state changes.
    pub fn apply(&mut self, t: Transition) -> Result<StateId, TransitionError> {
        self.fsm.apply(t)
    }

    /// `ON → OP` and record `op`. Nothing is recorded if the machine is
    /// not `ON`.
    pub fn start_operation(&mut self, op: Operation) -> Result<(), TransitionError> {
        self.fsm.apply(Transition::Dispatch)?;
        self.operations.push(op);
        Ok(())
    }

    /// `OP → ON` through `Complete` or `Abort`, returning the finished
    /// operation.
    pub fn finish_operation(&mut self, how: Transition) -> Result<&Operation, TransitionError> {
        let from = self.state();
        if !matches!(how, Transition::Complete | Transition::Abort) {
            return Err(TransitionError { from, transition: how });
        }
        self.fsm.apply(how)?;
        self.operations
            .last()
            .ok_or(TransitionError { from, transition: how })
    }

    /// Decode `TEMP` and `HUM` from one response and feed both channels.
    ///
    /// Each metric is probed independently; a missing or malformed record
    /// leaves that channel untouched for this cycle.
    pub fn ingest_response(&mut self, text: &str) -> [ChannelUpdate; 2] {
        let window = self.config.window_length;
        let id = self.config.id;
        Metric::ALL.map(|metric| {
            let result = decoder::decode_metric(text, metric).map(|reading| {
                debug!(
                    "machine {} {} = {} {}",
                    id, metric, reading.value, reading.unit
                );
                self.channel_mut(metric).ingest(id, reading.value, window)
            });
            ChannelUpdate { metric, result }
        })
    }

    /// Discard buffered, not yet evaluated samples on both channels.
    pub fn reset_windows(&mut self) {
        self.temperature.reset_window();
        self.humidity.reset_window();
    }

    /// Command used to poll this machine for telemetry.
    ///
    /// `ON,…` while idle and `OP,…` while executing. `None` when the
    /// machine is `OFF`. An id that does not fit the address field is
    /// sent as the bare command word.
    pub fn poll_command(&self) -> Option<CommandString> {
        let kind = match self.state() {
            StateId::Off => return None,
            StateId::On => CommandKind::On,
            StateId::Op => CommandKind::Op,
        };
        match command::encode(kind, self.id()) {
            Ok(cmd) => Some(cmd),
            Err(e) => {
                warn!("machine {}: {}; sending bare command", self.id(), e);
                let mut bare = CommandString::new();
                let _ = bare.push_str(kind.keyword());
                Some(bare)
            }
        }
    }
}
