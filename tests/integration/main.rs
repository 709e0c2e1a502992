//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters or a scratch directory. Nothing here needs a
//! real machine link.

mod adapter_tests;
mod mock_ports;
mod runtime_tests;
mod service_tests;
