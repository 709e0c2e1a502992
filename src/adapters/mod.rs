//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements          | Connects to                    |
//! |-------------|---------------------|--------------------------------|
//! | `emulator`  | TelemetryPort       | in-process machine emulator    |
//! | `csv_store` | ConfigPort          | machine setup file             |
//! |             | InstructionSource   | pending instruction file       |
//! |             | HistoryPort         | per-machine operation logs     |
//! | `log_sink`  | EventSink           | `log` facade (console)         |
//! | `time`      | TimePort            | local wall clock / manual clock|

pub mod csv_store;
pub mod emulator;
pub mod log_sink;
pub mod time;
