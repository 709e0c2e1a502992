//! AppService → registry → FSM → scheduler, driven synchronously
//! through recording mocks.

use plantfloor::adapters::time::ManualClock;
use plantfloor::app::commands::{AppCommand, CommandReply};
use plantfloor::app::events::AppEvent;
use plantfloor::app::ports::{HistoryPort, TimePort};
use plantfloor::app::service::AppService;
use plantfloor::config::bounded_name;
use plantfloor::error::{Error, RegistryError};
use plantfloor::fsm::StateId;
use plantfloor::scheduler::{DispatchOutcome, Instruction, SkipReason};
use plantfloor::sensors::{AlertKind, Metric};

use super::mock_ports::{machine, t0, MemoryHistory, RecordingSink, ScriptedLink};

struct Floor {
    app: AppService,
    link: ScriptedLink,
    history: MemoryHistory,
    sink: RecordingSink,
    clock: ManualClock,
}

fn floor(ids: &[u32]) -> Floor {
    let mut app = AppService::new(ids.iter().map(|&id| machine(id)).collect()).unwrap();
    let mut sink = RecordingSink::new();
    app.start(|_| true, &mut sink);
    let mut history = MemoryHistory::new();
    for &id in ids {
        history.reset(id).unwrap();
    }
    Floor {
        app,
        link: ScriptedLink::new(),
        history,
        sink,
        clock: ManualClock::new(t0()),
    }
}

fn instr(operation_id: u32, machine_id: u32, duration_secs: u64) -> Instruction {
    Instruction {
        operation_id,
        machine_id,
        name: bounded_name("Mill"),
        duration_secs,
    }
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn polling_sends_state_command_and_updates_current() {
    let mut f = floor(&[3]);
    f.link.push(3, 22, 55);
    f.app.poll_machine(3, &mut f.link, &mut f.sink).unwrap();

    assert_eq!(f.link.commands(), vec![(3, "ON,0,0,0,1,1".to_string())]);
    let status = f.app.status();
    assert_eq!((status[0].temperature, status[0].humidity), (22, 55));
}

#[test]
fn high_median_raises_one_alert_per_window() {
    let mut f = floor(&[1]);
    for t in [31, 35, 29, 40, 33] {
        f.link.push(1, t, 50);
    }
    f.app.poll_all(&mut f.link, &mut f.sink);
    assert_eq!(f.sink.count(|e| matches!(e, AppEvent::Alert(_))), 0);

    for _ in 0..4 {
        f.app.poll_all(&mut f.link, &mut f.sink);
    }
    let alerts: Vec<_> = f
        .sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            AppEvent::Alert(a) => Some(a),
            _ => None,
        })
        .collect();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].metric, Metric::Temperature);
    assert_eq!(alerts[0].kind, AlertKind::High);
    assert_eq!(alerts[0].median, 33);
    assert_eq!(f.app.metrics().windows_evaluated, 2);
}

#[test]
fn missing_metric_leaves_other_metric_updated() {
    let mut f = floor(&[1]);
    f.link.push_raw(1, "TEMP&unit:celsius&value:12");
    f.app.poll_machine(1, &mut f.link, &mut f.sink).unwrap();

    assert_eq!(f.app.status()[0].temperature, 12);
    assert_eq!(f.app.status()[0].humidity, 0);
    assert_eq!(
        f.sink.count(|e| matches!(
            e,
            AppEvent::TelemetryIgnored {
                metric: Metric::Humidity,
                ..
            }
        )),
        1
    );
}

// ── Operations ────────────────────────────────────────────────

#[test]
fn batch_dispatches_in_id_order_and_skips() {
    let mut f = floor(&[1, 2]);
    let batch = vec![instr(9, 2, 10), instr(4, 1, 10), instr(6, 1, 10), instr(5, 7, 10)];
    let outcomes = f
        .app
        .run_instructions(batch, &f.clock, &mut f.history, &mut f.sink);

    let summary: Vec<(u32, Option<SkipReason>)> = outcomes
        .iter()
        .map(|o| match o {
            DispatchOutcome::Dispatched(op) => (op.operation_id, None),
            DispatchOutcome::Skipped {
                instruction,
                reason,
            } => (instruction.operation_id, Some(*reason)),
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (4, None),
            (5, Some(SkipReason::MachineNotFound)),
            (6, Some(SkipReason::MachineBusy)),
            (9, None),
        ]
    );
    assert_eq!(f.app.state_of(1), Some(StateId::Op));
    assert_eq!(f.app.state_of(2), Some(StateId::Op));
    assert_eq!(f.history.read(1).unwrap().len(), 1);
    assert_eq!(f.history.read(1).unwrap()[0].start_time, t0());
}

#[test]
fn dispatched_machine_polls_with_op_command() {
    let mut f = floor(&[2]);
    let _ = f
        .app
        .run_instructions(vec![instr(1, 2, 60)], &f.clock, &mut f.history, &mut f.sink);
    f.app.poll_machine(2, &mut f.link, &mut f.sink).unwrap();
    assert_eq!(f.link.commands()[0].1, "OP,0,0,0,1,0");
}

#[test]
fn completions_follow_the_clock() {
    let mut f = floor(&[1, 2]);
    let _ = f.app.run_instructions(
        vec![instr(1, 1, 30), instr(2, 2, 90)],
        &f.clock,
        &mut f.history,
        &mut f.sink,
    );

    f.clock.advance(29);
    assert!(f.app.check_completions(f.clock.now(), &mut f.sink).is_empty());

    f.clock.advance(1);
    let done = f.app.check_completions(f.clock.now(), &mut f.sink);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].operation_id, 1);
    assert_eq!(f.app.state_of(1), Some(StateId::On));
    assert_eq!(f.app.state_of(2), Some(StateId::Op));
}

#[test]
fn assign_uses_next_free_id() {
    let mut f = floor(&[1, 2]);
    let _ = f
        .app
        .run_instructions(vec![instr(41, 1, 5)], &f.clock, &mut f.history, &mut f.sink);

    let op = f
        .app
        .assign_operation(2, "Weld", 5, &f.clock, &mut f.history, &mut f.sink)
        .unwrap();
    assert_eq!(op.operation_id, 42);
    assert_eq!(op.name.as_str(), "Weld");

    let busy = f
        .app
        .assign_operation(1, "Weld", 5, &f.clock, &mut f.history, &mut f.sink)
        .unwrap_err();
    assert_eq!(busy, Error::from(RegistryError::Busy(1)));
    let missing = f
        .app
        .assign_operation(8, "Weld", 5, &f.clock, &mut f.history, &mut f.sink)
        .unwrap_err();
    assert_eq!(missing, Error::from(RegistryError::NotFound(8)));
}

#[test]
fn reused_operation_id_is_skipped() {
    let mut f = floor(&[1, 2]);
    let _ = f
        .app
        .run_instructions(vec![instr(3, 1, 0)], &f.clock, &mut f.history, &mut f.sink);
    let outcomes = f
        .app
        .run_instructions(vec![instr(3, 2, 0)], &f.clock, &mut f.history, &mut f.sink);
    assert!(matches!(
        outcomes[0],
        DispatchOutcome::Skipped {
            reason: SkipReason::DuplicateOperation,
            ..
        }
    ));
}

// ── Floor membership ──────────────────────────────────────────

#[test]
fn busy_machine_cannot_leave_the_floor() {
    let mut f = floor(&[1]);
    let _ = f
        .app
        .run_instructions(vec![instr(1, 1, 60)], &f.clock, &mut f.history, &mut f.sink);
    assert_eq!(
        f.app.remove_machine(1, &mut f.sink),
        Err(Error::from(RegistryError::Busy(1)))
    );

    f.app.cancel_operation(1, &mut f.sink).unwrap();
    f.app.remove_machine(1, &mut f.sink).unwrap();
    assert_eq!(f.app.state_of(1), Some(StateId::Off));
    assert!(f.app.status().is_empty());
}

#[test]
fn commands_route_through_handle_command() {
    let mut f = floor(&[1, 2]);
    let reply = f
        .app
        .handle_command(
            AppCommand::RemoveMachine(2),
            &f.clock,
            &mut f.history,
            &mut f.sink,
        )
        .unwrap();
    assert_eq!(reply, CommandReply::Done);

    let reply = f
        .app
        .handle_command(
            AppCommand::AssignOperation {
                machine_id: 1,
                name: bounded_name("Paint"),
                duration_secs: 0,
            },
            &f.clock,
            &mut f.history,
            &mut f.sink,
        )
        .unwrap();
    assert!(matches!(reply, CommandReply::Assigned(ref op) if op.machine_id == 1));

    let reply = f
        .app
        .handle_command(
            AppCommand::CheckCompletions(t0()),
            &f.clock,
            &mut f.history,
            &mut f.sink,
        )
        .unwrap();
    assert!(matches!(reply, CommandReply::Completed(ref ops) if ops.len() == 1));

    assert!(
        f.app
            .handle_command(
                AppCommand::AddMachine(9),
                &f.clock,
                &mut f.history,
                &mut f.sink
            )
            .is_err()
    );
}

#[test]
fn shutdown_cancels_then_powers_off() {
    let mut f = floor(&[1, 2]);
    let _ = f
        .app
        .run_instructions(vec![instr(1, 1, 600)], &f.clock, &mut f.history, &mut f.sink);
    f.sink.clear();

    let cancelled = f.app.shutdown(&mut f.sink);
    assert_eq!(cancelled.len(), 1);
    assert_eq!(f.app.state_of(1), Some(StateId::Off));
    assert_eq!(f.app.state_of(2), Some(StateId::Off));

    let events = f.sink.events();
    let cancel_at = events
        .iter()
        .position(|e| matches!(e, AppEvent::OperationCancelled(_)))
        .unwrap();
    let off_at = events
        .iter()
        .position(|e| {
            matches!(
                e,
                AppEvent::StateChanged {
                    machine_id: 1,
                    to: StateId::Off,
                    ..
                }
            )
        })
        .unwrap();
    assert!(cancel_at < off_at);
    assert_eq!(f.app.metrics().operations_cancelled, 1);
}
