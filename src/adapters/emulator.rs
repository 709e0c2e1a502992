//! In-process machine link.
//!
//! Implements [`TelemetryPort`] by answering commands the way a machine
//! controller does, without a serial line:
//!
//! | Command prefix | Reply                                   |
//! |----------------|-----------------------------------------|
//! | `OFF`          | `Machine is OFF`                        |
//! | `ON`, `OP`     | `TEMP&unit:celsius&value:<t>#HUM&…:<h>` |
//! | anything else  | `Invalid command`                       |
//!
//! Readings come from a per-machine script when one is queued and
//! otherwise from a deterministic walk through 20–30 °C and 40–70 %.

use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::app::ports::TelemetryPort;
use crate::protocol::{encode_response, RESPONSE_INVALID, RESPONSE_OFF};

const TEMP_BASE: i32 = 20;
const TEMP_SPAN: u32 = 11;
const HUM_BASE: i32 = 40;
const HUM_SPAN: u32 = 31;

#[derive(Debug, Default)]
pub struct MachineEmulator {
    scripts: HashMap<u32, VecDeque<String>>,
    ticks: HashMap<u32, u32>,
    queries: u64,
}

impl MachineEmulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reading pair for `machine_id`. Scripted readings are served
    /// before generated ones.
    pub fn push_reading(&mut self, machine_id: u32, temperature_c: i32, humidity_pct: i32) {
        self.push_raw(machine_id, encode_response(temperature_c, humidity_pct));
    }

    /// Queue a verbatim reply for the next `ON`/`OP` query.
    pub fn push_raw(&mut self, machine_id: u32, reply: impl Into<String>) {
        self.scripts
            .entry(machine_id)
            .or_default()
            .push_back(reply.into());
    }

    /// Total queries answered, any command.
    pub fn queries(&self) -> u64 {
        self.queries
    }

    fn generated(&mut self, machine_id: u32) -> String {
        let tick = self.ticks.entry(machine_id).or_insert(0);
        let n = tick.wrapping_add(machine_id.wrapping_mul(7));
        *tick = tick.wrapping_add(1);
        // Spans are small, the casts cannot truncate.
        let t = TEMP_BASE + (n % TEMP_SPAN) as i32;
        let h = HUM_BASE + (n.wrapping_mul(3) % HUM_SPAN) as i32;
        encode_response(t, h)
    }
}

impl TelemetryPort for MachineEmulator {
    fn query(&mut self, machine_id: u32, command: &str) -> String {
        self.queries += 1;
        let reply = if command.starts_with("OFF") {
            RESPONSE_OFF.to_string()
        } else if command.starts_with("ON") || command.starts_with("OP") {
            match self.scripts.get_mut(&machine_id).and_then(VecDeque::pop_front) {
                Some(scripted) => scripted,
                None => self.generated(machine_id),
            }
        } else {
            RESPONSE_INVALID.to_string()
        };
        debug!("link {} | {} -> {}", machine_id, command, reply);
        reply
    }
}
