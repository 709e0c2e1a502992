//! Runtime diagnostics.
//!
//! [`RuntimeMetrics`] is a set of monotonically increasing counters kept by
//! the [`AppService`](crate::app::service::AppService) and reported on
//! shutdown. A panic hook routes panic messages through the `log` facade
//! so they land in the same stream as everything else.

use core::fmt;

use serde::Serialize;

/// Counters since process start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuntimeMetrics {
    /// Decoded values fed into a metric channel.
    pub samples_ingested: u64,
    /// Samples that did not enter a full smoothing buffer.
    pub samples_dropped: u64,
    /// Metric records missing or malformed in a response.
    pub malformed_readings: u64,
    /// Window medians completed.
    pub windows_evaluated: u64,
    pub alerts_raised: u64,
    pub operations_dispatched: u64,
    pub operations_completed: u64,
    pub operations_skipped: u64,
    pub operations_cancelled: u64,
}

impl RuntimeMetrics {
    /// Operations dispatched but neither completed nor cancelled.
    pub fn operations_in_flight(&self) -> u64 {
        self.operations_dispatched
            .saturating_sub(self.operations_completed + self.operations_cancelled)
    }
}

impl fmt::Display for RuntimeMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "samples={} dropped={} malformed={} windows={} alerts={} \
             ops dispatched={} completed={} skipped={} cancelled={}",
            self.samples_ingested,
            self.samples_dropped,
            self.malformed_readings,
            self.windows_evaluated,
            self.alerts_raised,
            self.operations_dispatched,
            self.operations_completed,
            self.operations_skipped,
            self.operations_cancelled,
        )
    }
}

// ───────────────────────────────────────────────────────────────
// Panic hook
// ───────────────────────────────────────────────────────────────

/// Install a panic hook that logs the panic message before the default
/// handler unwinds. Call once during startup, after the logger.
pub fn install_panic_handler() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let reason = if let Some(msg) = info.payload().downcast_ref::<&str>() {
            *msg
        } else if let Some(msg) = info.payload().downcast_ref::<String>() {
            msg.as_str()
        } else {
            "unknown panic"
        };
        match info.location() {
            Some(loc) => log::error!("PANIC at {}:{}: {}", loc.file(), loc.line(), reason),
            None => log::error!("PANIC: {}", reason),
        }
        default_hook(info);
    }));
}
