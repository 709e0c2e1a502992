//! Plant-floor machine supervisor library.
//!
//! Exposes the domain core (telemetry smoothing, machine lifecycle,
//! operation dispatch), the async runtime that drives it and the
//! file/console adapters, for the `supervisor` binary and for
//! integration testing.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod fsm;
pub mod machine;
pub mod protocol;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod sensors;
