//! Per-machine async tasks.
//!
//! Each floor machine runs two cooperative tasks on the supervisor's
//! `LocalExecutor`:
//!
//! 1. **Telemetry**: polls the machine every `interval` via a reactor
//!    timer and feeds the reply through the alerting pipeline.
//! 2. **Operation**: waits for a dispatched operation, then suspends
//!    until its deadline or a cancel signal, whichever comes first.
//!
//! A running operation suspends only its own task; other machines keep
//! polling and the supervisor keeps dispatching. Shared state is
//! borrowed only between suspension points.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

use futures_lite::FutureExt;
use log::{debug, info, warn};

use super::channels::{MachineControl, OpMsg, OperationEnd};
use super::Core;
use crate::app::ports::{EventSink, HistoryPort, TelemetryPort, TimePort};

pub(super) type SharedCore<L, H, S, C> = Rc<RefCell<Core<L, H, S, C>>>;

/// Telemetry task: poll, then sleep `interval` or stop.
pub(super) async fn telemetry_loop<L, H, S, C>(
    core: SharedCore<L, H, S, C>,
    ctl: Rc<MachineControl>,
    interval: Duration,
) where
    L: TelemetryPort,
    H: HistoryPort,
    S: EventSink,
    C: TimePort,
{
    let id = ctl.machine_id;
    info!("machine {}: telemetry task started ({:?})", id, interval);
    loop {
        {
            let mut core = core.borrow_mut();
            let Core {
                app, link, sink, ..
            } = &mut *core;
            if let Err(e) = app.poll_machine(id, link, sink) {
                debug!("machine {}: poll skipped: {}", id, e);
            }
        }

        let stopped = async {
            async_io_mini::Timer::after(interval).await;
            false
        }
        .or(async {
            ctl.stop.wait().await;
            true
        })
        .await;

        if stopped {
            break;
        }
    }
    info!("machine {}: telemetry task stopped", id);
}

/// Operation task: run each dispatched operation to its deadline.
pub(super) async fn operation_loop<L, H, S, C>(core: SharedCore<L, H, S, C>, ctl: Rc<MachineControl>)
where
    L: TelemetryPort,
    H: HistoryPort,
    S: EventSink,
    C: TimePort,
{
    let id = ctl.machine_id;
    loop {
        let op = match ctl.ops.receive().await {
            OpMsg::Run(op) => op,
            OpMsg::Stop => break,
        };

        let cancelled = async {
            async_io_mini::Timer::after(Duration::from_secs(op.duration_secs)).await;
            false
        }
        .or(async {
            ctl.cancel.wait().await;
            true
        })
        .await;

        let result = {
            let mut core = core.borrow_mut();
            let Core { app, sink, .. } = &mut *core;
            if cancelled {
                app.cancel_operation(id, sink).map(OperationEnd::Cancelled)
            } else {
                app.complete_operation(id, sink).map(OperationEnd::Completed)
            }
        };

        let end = result.unwrap_or_else(|e| {
            warn!("machine {}: op {} did not finish cleanly: {}", id, op.operation_id, e);
            OperationEnd::Cancelled(op)
        });
        ctl.publish(end);
    }
    debug!("machine {}: operation task stopped", id);
}
