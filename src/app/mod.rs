//! Application core: pure domain logic, zero I/O.
//!
//! This module holds the business rules of the supervisor: floor
//! membership, telemetry alerting and operation dispatch. All
//! interaction with machines, files and clocks happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without a real plant floor.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
