//! Wall-clock adapters.
//!
//! - [`SystemClock`] reads the local time of day through `chrono`.
//! - [`ManualClock`] only moves when told to; tests and replays use it.

use core::cell::Cell;
use std::rc::Rc;

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};

use crate::app::ports::TimePort;

/// Local wall clock, truncated to whole seconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl TimePort for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// Clock that stays where it is set. Clones share one time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Rc<Cell<NaiveDateTime>>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }

    /// Move forward `secs` seconds. Saturates at the end of time.
    pub fn advance(&self, secs: i64) {
        let delta = TimeDelta::try_seconds(secs).unwrap_or(TimeDelta::MAX);
        let next = self
            .now
            .get()
            .checked_add_signed(delta)
            .unwrap_or(NaiveDateTime::MAX);
        self.now.set(next);
    }
}

impl TimePort for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}
