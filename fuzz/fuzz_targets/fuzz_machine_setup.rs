//! Fuzz target: machine setup line parsing
//!
//! Every line either parses into a record that passes validation or
//! fails with an error naming that line.
//!
//! cargo fuzz run fuzz_machine_setup

#![no_main]

use libfuzzer_sys::fuzz_target;
use plantfloor::adapters::csv_store::MachineSetupFile;
use plantfloor::app::ports::ConfigError;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };

    for (idx, line) in text.lines().enumerate() {
        match MachineSetupFile::parse_line(line, idx + 1) {
            Ok(config) => assert!(config.validate().is_ok()),
            Err(ConfigError::Malformed { line, .. }) => assert_eq!(line, idx + 1),
            Err(_) => {}
        }
    }
});
