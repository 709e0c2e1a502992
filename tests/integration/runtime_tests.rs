//! Supervisor runtime: per-machine tasks on the `LocalExecutor`, real
//! reactor timers, cancellation on shutdown.

use std::time::Duration;

use async_io_mini::Timer;
use futures_lite::future::zip;
use plantfloor::adapters::time::ManualClock;
use plantfloor::app::events::AppEvent;
use plantfloor::app::ports::HistoryPort;
use plantfloor::app::service::AppService;
use plantfloor::config::bounded_name;
use plantfloor::error::{Error, RegistryError};
use plantfloor::fsm::StateId;
use plantfloor::runtime::{RuntimeConfig, Supervisor};
use plantfloor::scheduler::Instruction;

use super::mock_ports::{machine, t0, MemoryHistory, RecordingSink, ScriptedLink};

type TestSupervisor = Supervisor<ScriptedLink, MemoryHistory, RecordingSink, ManualClock>;

struct Rig {
    sup: TestSupervisor,
    link: ScriptedLink,
    sink: RecordingSink,
}

fn rig(ids: &[u32], cancel_on_shutdown: bool) -> Rig {
    rig_with(
        ids,
        RuntimeConfig {
            telemetry_interval: Duration::from_millis(10),
            cancel_on_shutdown,
            run_deadline: None,
        },
    )
}

fn rig_with(ids: &[u32], config: RuntimeConfig) -> Rig {
    let app = AppService::new(ids.iter().map(|&id| machine(id)).collect()).unwrap();
    let link = ScriptedLink::new();
    let sink = RecordingSink::new();
    let sup = Supervisor::new(
        app,
        link.clone(),
        MemoryHistory::new(),
        sink.clone(),
        ManualClock::new(t0()),
        config,
    );
    sup.start(|_| true);
    Rig { sup, link, sink }
}

fn instr(operation_id: u32, machine_id: u32, duration_secs: u64) -> Instruction {
    Instruction {
        operation_id,
        machine_id,
        name: bounded_name("Press"),
        duration_secs,
    }
}

async fn sleep_ms(ms: u64) {
    Timer::after(Duration::from_millis(ms)).await;
}

#[test]
fn telemetry_tasks_poll_every_machine() {
    let r = rig(&[1, 2], true);
    r.sup.block_on(sleep_ms(60));

    let commands = r.link.commands();
    assert!(commands.iter().filter(|(id, _)| *id == 1).count() >= 2);
    assert!(commands.iter().filter(|(id, _)| *id == 2).count() >= 2);
    assert!(commands.iter().all(|(_, c)| c.starts_with("ON,")));
    assert!(r.sup.metrics().samples_ingested >= 8);
}

#[test]
fn batch_waits_for_every_operation() {
    let r = rig(&[1, 2], true);
    let report = r
        .sup
        .block_on(r.sup.run_instructions(vec![instr(2, 2, 1), instr(1, 1, 0)]));

    assert_eq!(report.outcomes.len(), 2);
    assert_eq!(report.finished.len(), 2);
    assert!(report.finished.iter().all(|e| e.is_completed()));
    assert_eq!(r.sup.metrics().operations_completed, 2);
    assert!(r.sup.status().iter().all(|s| s.state == StateId::On));

    let history = r.sup.inspect(|_, h| h.read(2).unwrap());
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].operation_id, 2);
}

#[test]
fn machine_in_op_is_polled_with_op_command() {
    let r = rig(&[5], true);
    r.sup.assign_operation(5, "Anneal", 3600).unwrap();
    r.sup.block_on(sleep_ms(30));
    assert!(r.link.commands().iter().any(|(_, c)| c == "OP,0,0,1,0,1"));
    r.sup.cancel(5);
    let end = r.sup.block_on(r.sup.wait_for(5)).unwrap();
    assert!(!end.is_completed());
    assert_eq!(r.sup.status()[0].state, StateId::On);
}

#[test]
fn shutdown_aborts_running_operations() {
    let r = rig(&[1, 2], true);
    let op = r.sup.assign_operation(1, "Long run", 3600).unwrap();
    assert_eq!(op.operation_id, 1);

    let metrics = r.sup.block_on(async {
        sleep_ms(20).await;
        r.sup.shutdown().await
    });

    assert_eq!(metrics.operations_cancelled, 1);
    assert_eq!(metrics.operations_completed, 0);
    assert!(r.sup.status().is_empty());
    r.sup.inspect(|app, _| {
        assert_eq!(app.state_of(1), Some(StateId::Off));
        assert_eq!(app.state_of(2), Some(StateId::Off));
    });
    assert_eq!(
        r.sink
            .count(|e| matches!(e, AppEvent::OperationCancelled(op) if op.machine_id == 1)),
        1
    );
}

#[test]
fn shutdown_can_wait_for_completion() {
    let r = rig(&[1], false);
    r.sup.assign_operation(1, "Short run", 1).unwrap();
    let metrics = r.sup.block_on(r.sup.shutdown());
    assert_eq!(metrics.operations_completed, 1);
    assert_eq!(metrics.operations_cancelled, 0);
}

#[test]
fn removal_rules() {
    let r = rig(&[1, 2], true);
    r.sup.assign_operation(1, "Busy", 3600).unwrap();
    assert_eq!(
        r.sup.remove_machine(1),
        Err(Error::from(RegistryError::Busy(1)))
    );

    r.sup.remove_machine(2).unwrap();
    r.sup.block_on(sleep_ms(15));
    let polled = r.link.commands().iter().filter(|(id, _)| *id == 2).count();
    r.sup.block_on(sleep_ms(40));
    let polled_later = r.link.commands().iter().filter(|(id, _)| *id == 2).count();
    assert_eq!(polled, polled_later, "removed machine must not be polled");

    r.sup.add_machine(2).unwrap();
    r.sup.block_on(sleep_ms(30));
    assert!(r.link.commands().iter().filter(|(id, _)| *id == 2).count() > polled_later);
}

#[test]
fn unknown_machine_has_nothing_to_wait_for() {
    let r = rig(&[1], true);
    assert!(r.sup.block_on(r.sup.wait_for(9)).is_none());
}

#[test]
fn wait_for_idle_machine_returns_immediately() {
    let r = rig(&[1], true);
    assert!(r.sup.block_on(r.sup.wait_for(1)).is_none());

    let op = r.sup.assign_operation(1, "Quick", 0).unwrap();
    let end = r.sup.block_on(r.sup.wait_for(1)).unwrap();
    assert!(end.is_completed());
    assert_eq!(end.operation().operation_id, op.operation_id);

    // Already back in ON: the last end is still observable.
    let again = r.sup.block_on(r.sup.wait_for(1)).unwrap();
    assert_eq!(again, end);
}

#[test]
fn shutdown_preempts_a_waiting_batch() {
    let r = rig(&[1, 2], true);
    let (report, metrics) = r.sup.block_on(zip(
        r.sup
            .run_instructions(vec![instr(1, 1, 3600), instr(2, 2, 3600)]),
        async {
            sleep_ms(20).await;
            r.sup.shutdown().await
        },
    ));

    assert_eq!(report.finished.len(), 2);
    assert!(report.finished.iter().all(|e| !e.is_completed()));
    assert_eq!(metrics.operations_cancelled, 2);
    assert_eq!(metrics.operations_completed, 0);
    r.sup.inspect(|app, _| {
        assert_eq!(app.state_of(1), Some(StateId::Off));
        assert_eq!(app.state_of(2), Some(StateId::Off));
    });
}

#[test]
fn run_stops_at_the_deadline() {
    let r = rig_with(
        &[1, 2],
        RuntimeConfig {
            telemetry_interval: Duration::from_millis(10),
            cancel_on_shutdown: true,
            run_deadline: Some(Duration::from_millis(30)),
        },
    );
    let (report, metrics) = r
        .sup
        .block_on(r.sup.run(vec![instr(1, 1, 3600), instr(2, 2, 0)]));

    assert_eq!(report.finished.len(), 2);
    assert_eq!(metrics.operations_completed, 1);
    assert_eq!(metrics.operations_cancelled, 1);
    assert!(r.sup.status().is_empty());
}

#[test]
fn run_stops_on_request() {
    let r = rig(&[1], true);
    let ((report, metrics), ()) = r.sup.block_on(zip(
        r.sup.run(vec![instr(7, 1, 3600)]),
        async {
            sleep_ms(20).await;
            r.sup.request_shutdown();
        },
    ));

    assert_eq!(report.finished.len(), 1);
    assert_eq!(report.finished[0].operation().operation_id, 7);
    assert!(!report.finished[0].is_completed());
    assert_eq!(metrics.operations_cancelled, 1);
}

#[test]
fn run_shuts_down_after_the_batch() {
    let r = rig(&[1], true);
    let (report, metrics) = r.sup.block_on(r.sup.run(vec![instr(3, 1, 0)]));

    assert_eq!(report.finished.len(), 1);
    assert!(report.finished[0].is_completed());
    assert_eq!(metrics.operations_completed, 1);
    assert!(r.sup.status().is_empty());
}
