//! Per-state transition handlers and table builder.
//!
//! ```text
//!            PowerOn            Dispatch
//!   OFF ──────────────▶ ON ──────────────▶ OP
//!    ▲                  │ ▲                 │
//!    └──── PowerOff ────┘ └─ Complete/Abort ┘
//!
//!   OP ──PowerOff──▶ rejected (machine busy)
//! ```

use super::{StateDescriptor, StateId, Transition};

/// Build the static state table. Index order must match `StateId`.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        StateDescriptor {
            id: StateId::Off,
            name: "OFF",
            monitored: false,
            assignable: false,
            on_event: off_event,
        },
        StateDescriptor {
            id: StateId::On,
            name: "ON",
            monitored: true,
            assignable: true,
            on_event: on_event,
        },
        StateDescriptor {
            id: StateId::Op,
            name: "OP",
            monitored: true,
            assignable: false,
            on_event: op_event,
        },
    ]
}

fn off_event(t: Transition) -> Option<StateId> {
    match t {
        Transition::PowerOn => Some(StateId::On),
        _ => None,
    }
}

fn on_event(t: Transition) -> Option<StateId> {
    match t {
        Transition::Dispatch => Some(StateId::Op),
        Transition::PowerOff => Some(StateId::Off),
        _ => None,
    }
}

fn op_event(t: Transition) -> Option<StateId> {
    match t {
        Transition::Complete | Transition::Abort => Some(StateId::On),
        _ => None,
    }
}
