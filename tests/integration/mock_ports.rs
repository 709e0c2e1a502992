//! Recording port mocks for integration tests.
//!
//! Every mock keeps its state behind an `Rc<RefCell<…>>` so a test can
//! hand one clone to the [`Supervisor`](plantfloor::runtime::Supervisor)
//! and keep another for assertions.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime};
use plantfloor::app::events::AppEvent;
use plantfloor::app::ports::{EventSink, HistoryPort, StorageError, TelemetryPort};
use plantfloor::config::{bounded_name, MachineConfig};
use plantfloor::machine::Operation;
use plantfloor::protocol::{encode_response, RESPONSE_OFF};
use plantfloor::sensors::Range;

pub fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

/// Temperature 10..30, humidity 40..70, buffer 10, window 5.
pub fn machine(id: u32) -> MachineConfig {
    MachineConfig {
        id,
        name: bounded_name(&format!("Machine {}", id)),
        temperature: Range::new(10, 30),
        humidity: Range::new(40, 70),
        buffer_capacity: 10,
        window_length: 5,
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<AppEvent>>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AppEvent> {
        self.events.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.borrow().iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}

// ── History ───────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemoryHistory {
    logs: Rc<RefCell<HashMap<u32, Vec<Operation>>>>,
}

#[allow(dead_code)]
impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryPort for MemoryHistory {
    fn reset(&mut self, machine_id: u32) -> Result<(), StorageError> {
        self.logs.borrow_mut().insert(machine_id, Vec::new());
        Ok(())
    }

    fn append(&mut self, op: &Operation) -> Result<(), StorageError> {
        self.logs
            .borrow_mut()
            .entry(op.machine_id)
            .or_default()
            .push(op.clone());
        Ok(())
    }

    fn read(&self, machine_id: u32) -> Result<Vec<Operation>, StorageError> {
        self.logs
            .borrow()
            .get(&machine_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

// ── Machine link ──────────────────────────────────────────────

/// Serves queued replies per machine, then a steady in-range reading.
#[derive(Clone, Default)]
pub struct ScriptedLink {
    replies: Rc<RefCell<HashMap<u32, VecDeque<String>>>>,
    commands: Rc<RefCell<Vec<(u32, String)>>>,
}

#[allow(dead_code)]
impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, machine_id: u32, temperature: i32, humidity: i32) {
        self.push_raw(machine_id, encode_response(temperature, humidity));
    }

    pub fn push_raw(&self, machine_id: u32, reply: impl Into<String>) {
        self.replies
            .borrow_mut()
            .entry(machine_id)
            .or_default()
            .push_back(reply.into());
    }

    /// Every `(machine_id, command)` sent so far.
    pub fn commands(&self) -> Vec<(u32, String)> {
        self.commands.borrow().clone()
    }
}

impl TelemetryPort for ScriptedLink {
    fn query(&mut self, machine_id: u32, command: &str) -> String {
        self.commands
            .borrow_mut()
            .push((machine_id, command.to_string()));
        if command.starts_with("OFF") {
            return RESPONSE_OFF.to_string();
        }
        self.replies
            .borrow_mut()
            .get_mut(&machine_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| encode_response(20, 50))
    }
}
