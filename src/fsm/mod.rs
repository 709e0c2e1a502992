//! Function-pointer machine lifecycle state machine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StateTable                                                  │
//! │  ┌─────────┬──────────┬───────────┬────────────┬───────────┐ │
//! │  │ StateId │ name     │ monitored │ assignable │ on_event  │ │
//! │  ├─────────┼──────────┼───────────┼────────────┼───────────┤ │
//! │  │ Off     │ "OFF"    │ no        │ no         │ fn(t)->?  │ │
//! │  │ On      │ "ON"     │ yes       │ yes        │ fn(t)->?  │ │
//! │  │ Op      │ "OP"     │ yes       │ no         │ fn(t)->?  │ │
//! │  └─────────┴──────────┴───────────┴────────────┴───────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A machine's state changes only through [`MachineFsm::apply`]. The
//! current state's `on_event` handler decides whether the requested
//! [`Transition`] is legal; `None` means it is not, and the state is left
//! untouched.

pub mod states;

use core::fmt;

use log::debug;

use crate::error::TransitionError;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Lifecycle states of a machine.
/// Must stay in sync with the table built in [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Off = 0,
    On = 1,
    Op = 2,
}

impl StateId {
    pub const COUNT: usize = 3;

    /// Convert a table index back to `StateId`. Out-of-range indices
    /// assert in debug builds and fall back to `Off`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Off,
            1 => Self::On,
            2 => Self::Op,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Off
            }
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::On => "ON",
            Self::Op => "OP",
        }
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Requests that move a machine between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    /// Registry add: `OFF → ON`.
    PowerOn,
    /// Operation dispatch: `ON → OP`.
    Dispatch,
    /// Operation finished: `OP → ON`.
    Complete,
    /// Operation cancelled before its deadline: `OP → ON`.
    Abort,
    /// Registry remove: `ON → OFF`. Rejected from `OP`.
    PowerOff,
}

impl Transition {
    pub const ALL: [Transition; 5] = [
        Transition::PowerOn,
        Transition::Dispatch,
        Transition::Complete,
        Transition::Abort,
        Transition::PowerOff,
    ];
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PowerOn => write!(f, "power-on"),
            Self::Dispatch => write!(f, "dispatch"),
            Self::Complete => write!(f, "complete"),
            Self::Abort => write!(f, "abort"),
            Self::PowerOff => write!(f, "power-off"),
        }
    }
}

// ---------------------------------------------------------------------------
// State descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Returns the next state for a legal transition, `None` otherwise.
pub type TransitionFn = fn(Transition) -> Option<StateId>;

pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    /// Telemetry is polled in this state.
    pub monitored: bool,
    /// New operations may be dispatched in this state.
    pub assignable: bool,
    pub on_event: TransitionFn,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Per-machine lifecycle. Starts in `OFF`.
pub struct MachineFsm {
    table: [StateDescriptor; StateId::COUNT],
    current: usize,
    /// Number of accepted transitions since construction.
    transitions: u64,
}

impl Default for MachineFsm {
    fn default() -> Self {
        Self::new()
    }
}

impl MachineFsm {
    pub fn new() -> Self {
        Self {
            table: states::build_state_table(),
            current: StateId::Off as usize,
            transitions: 0,
        }
    }

    pub fn state(&self) -> StateId {
        StateId::from_index(self.current)
    }

    pub fn is_monitored(&self) -> bool {
        self.table[self.current].monitored
    }

    pub fn is_assignable(&self) -> bool {
        self.table[self.current].assignable
    }

    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    /// Whether `t` would be accepted from the current state.
    pub fn can_apply(&self, t: Transition) -> bool {
        (self.table[self.current].on_event)(t).is_some()
    }

    /// Apply `t`, returning the new state.
    ///
    /// An illegal transition leaves the state unchanged.
    pub fn apply(&mut self, t: Transition) -> Result<StateId, TransitionError> {
        let from = self.state();
        let next = (self.table[self.current].on_event)(t)
            .ok_or(TransitionError { from, transition: t })?;

        debug!(
            "lifecycle {}: {} -> {}",
            t, self.table[self.current].name, self.table[next as usize].name
        );
        self.current = next as usize;
        self.transitions += 1;
        Ok(next)
    }
}
