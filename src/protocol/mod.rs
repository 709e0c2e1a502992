//! Machine link protocol.
//!
//! Commands go out as short ASCII strings, responses come back as
//! `#`-separated metric records:
//!
//! ```text
//!  supervisor ── "ON,0,0,0,1,1" ──▶ machine
//!  supervisor ◀── "TEMP&unit:celsius&value:20#HUM&unit:percentage&value:80" ──
//! ```
//!
//! [`command`] builds the outbound strings, [`decoder`] pulls metric
//! readings out of the inbound ones.

pub mod command;
pub mod decoder;

/// Response of a machine that received `OFF`.
pub const RESPONSE_OFF: &str = "Machine is OFF";

/// Response to any unrecognised command.
pub const RESPONSE_INVALID: &str = "Invalid command";

/// Build a telemetry response carrying one temperature and one humidity
/// record.
pub fn encode_response(temperature_c: i32, humidity_pct: i32) -> String {
    format!(
        "TEMP&unit:celsius&value:{}{}HUM&unit:percentage&value:{}",
        temperature_c,
        decoder::RECORD_SEPARATOR,
        humidity_pct
    )
}
