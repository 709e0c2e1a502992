//! Telemetry channels and threshold alerting.
//!
//! Each machine owns one [`MetricChannel`] per metric. A channel keeps the
//! last observed value, a fixed-capacity smoothing buffer and the
//! configured acceptable range. Every decoded sample goes through
//! [`MetricChannel::ingest`]:
//!
//! ```text
//!  value ──▶ current ──▶ ring.enqueue ──[len ≥ window]──▶ drain_n
//!                             │                             │
//!                        Full: dropped                 sort + median
//!                                                           │
//!                                      median > max ──▶ High alert
//!                                      median < min ──▶ Low alert
//! ```
//!
//! Channels are owned exclusively by their machine; nothing here is
//! shared between tasks.

pub mod median;
pub mod ring;

use core::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use ring::SampleRingBuffer;

// ---------------------------------------------------------------------------
// Metric identity
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Temperature,
    Humidity,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Temperature, Metric::Humidity];

    /// Record name used on the telemetry wire.
    pub const fn token(self) -> &'static str {
        match self {
            Self::Temperature => "TEMP",
            Self::Humidity => "HUM",
        }
    }

    /// Display suffix for values of this metric.
    pub const fn unit_suffix(self) -> &'static str {
        match self {
            Self::Temperature => "\u{00b0}C",
            Self::Humidity => "%",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temperature => write!(f, "temperature"),
            Self::Humidity => write!(f, "humidity"),
        }
    }
}

// ---------------------------------------------------------------------------
// Acceptable range
// ---------------------------------------------------------------------------

/// Inclusive acceptable band for a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub min: i32,
    pub max: i32,
}

impl Range {
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    /// Which side of the band `value` falls on, if outside it.
    /// Both bounds are inclusive: a value equal to `max` is in range.
    pub fn classify(&self, value: i32) -> Option<AlertKind> {
        if value > self.max {
            Some(AlertKind::High)
        } else if value < self.min {
            Some(AlertKind::Low)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Alerts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    High,
    Low,
}

/// A window median fell outside the configured range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub machine_id: u32,
    pub metric: Metric,
    pub kind: AlertKind,
    pub median: i32,
    /// The bound that was crossed (`max` for High, `min` for Low).
    pub limit: i32,
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (dir, bound) = match self.kind {
            AlertKind::High => ("too high", "max"),
            AlertKind::Low => ("too low", "min"),
        };
        let unit = self.metric.unit_suffix();
        write!(
            f,
            "machine {} {} {} (median {}{unit}, {} {}{unit})",
            self.machine_id, self.metric, dir, self.median, bound, self.limit
        )
    }
}

/// Result of feeding one sample into a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestOutcome {
    /// The smoothing buffer was full and the sample did not enter it.
    pub dropped: bool,
    /// A full window was consumed; this is its median.
    pub median: Option<i32>,
    pub alert: Option<Alert>,
}

// ---------------------------------------------------------------------------
// Metric channel
// ---------------------------------------------------------------------------

pub struct MetricChannel {
    metric: Metric,
    range: Range,
    current: i32,
    ring: SampleRingBuffer,
}

impl MetricChannel {
    pub fn new(metric: Metric, range: Range, buffer_capacity: usize) -> Self {
        Self {
            metric,
            range,
            current: 0,
            ring: SampleRingBuffer::new(buffer_capacity),
        }
    }

    /// Feed a decoded sample.
    ///
    /// `current` always reflects `value`, even when the buffer is full.
    /// At most one window is evaluated per call.
    pub fn ingest(&mut self, machine_id: u32, value: i32, window_length: usize) -> IngestOutcome {
        self.current = value;

        let mut outcome = IngestOutcome::default();
        if let Err(e) = self.ring.enqueue(value) {
            debug!(
                "machine {} {}: sample {} not buffered ({})",
                machine_id, self.metric, value, e
            );
            outcome.dropped = true;
        }

        if let Some(m) = median::evaluate_window(&mut self.ring, window_length) {
            outcome.median = Some(m);
            outcome.alert = self.range.classify(m).map(|kind| Alert {
                machine_id,
                metric: self.metric,
                kind,
                median: m,
                limit: match kind {
                    AlertKind::High => self.range.max,
                    AlertKind::Low => self.range.min,
                },
            });
        }

        outcome
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn range(&self) -> Range {
        self.range
    }

    /// Last observed value (0 before the first sample).
    pub fn current(&self) -> i32 {
        self.current
    }

    /// Samples waiting for the next window.
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Drop every sample not yet evaluated.
    pub fn reset_window(&mut self) {
        self.ring.clear();
    }
}
