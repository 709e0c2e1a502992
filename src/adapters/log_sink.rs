//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each application event as one
//! tagged line through the `log` facade. Alerts and skipped work go out
//! at `warn`, malformed telemetry at `debug`, everything else at `info`.

use log::{log, Level};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }

    /// Level and text of the line `event` is logged as.
    pub fn render(event: &AppEvent) -> (Level, String) {
        match event {
            AppEvent::Started {
                configured,
                on_floor,
            } => (
                Level::Info,
                format!("START | configured={} on_floor={}", configured, on_floor),
            ),
            AppEvent::StateChanged {
                machine_id,
                from,
                to,
            } => (
                Level::Info,
                format!("STATE | machine {} | {} -> {}", machine_id, from, to),
            ),
            AppEvent::Alert(alert) => (Level::Warn, format!("ALERT | {}", alert)),
            AppEvent::SampleDropped {
                machine_id,
                metric,
                value,
            } => (
                Level::Warn,
                format!(
                    "DROP  | machine {} | {} {}{} not buffered (buffer full)",
                    machine_id,
                    metric,
                    value,
                    metric.unit_suffix()
                ),
            ),
            AppEvent::TelemetryIgnored {
                machine_id,
                metric,
                error,
            } => (
                Level::Debug,
                format!("TELEM | machine {} | {} ignored: {}", machine_id, metric, error),
            ),
            AppEvent::OperationStarted(op) => (
                Level::Info,
                format!(
                    "OP    | #{} '{}' started on machine {} ({}s)",
                    op.operation_id, op.name, op.machine_id, op.duration_secs
                ),
            ),
            AppEvent::OperationCompleted(op) => (
                Level::Info,
                format!(
                    "OP    | #{} '{}' completed on machine {}",
                    op.operation_id, op.name, op.machine_id
                ),
            ),
            AppEvent::OperationCancelled(op) => (
                Level::Warn,
                format!(
                    "OP    | #{} '{}' cancelled on machine {}",
                    op.operation_id, op.name, op.machine_id
                ),
            ),
            AppEvent::OperationSkipped {
                instruction,
                reason,
            } => (
                Level::Warn,
                format!(
                    "OP    | #{} for machine {} skipped: {}",
                    instruction.operation_id, instruction.machine_id, reason
                ),
            ),
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        let (level, line) = Self::render(event);
        log!(level, "{}", line);
    }
}
