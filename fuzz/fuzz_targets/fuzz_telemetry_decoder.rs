//! Fuzz target: telemetry response decoding
//!
//! Drives arbitrary text through the decoder for both metric tokens and
//! through a machine's ingestion path. Neither may panic, and a decoded
//! unit never exceeds its bound.
//!
//! cargo fuzz run fuzz_telemetry_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use plantfloor::config::{bounded_name, MachineConfig};
use plantfloor::machine::Machine;
use plantfloor::protocol::decoder::{decode_metric, MAX_UNIT_LEN};
use plantfloor::sensors::{Metric, Range};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    for metric in Metric::ALL {
        if let Ok(reading) = decode_metric(text, metric) {
            assert!(!reading.unit.is_empty());
            assert!(reading.unit.len() <= MAX_UNIT_LEN);
        }
    }

    let mut machine = Machine::new(MachineConfig {
        id: 1,
        name: bounded_name("fuzz"),
        temperature: Range::new(0, 50),
        humidity: Range::new(0, 100),
        buffer_capacity: 4,
        window_length: 3,
    });
    for _ in 0..4 {
        let _ = machine.ingest_response(text);
    }
});
