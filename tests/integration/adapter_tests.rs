//! File adapters against a scratch directory.

use std::fs;

use chrono::NaiveDate;
use plantfloor::adapters::csv_store::{
    HistoryStore, InstructionFile, MachineSetupFile, HISTORY_HEADER,
};
use plantfloor::app::ports::{
    ConfigError, ConfigPort, HistoryPort, InstructionSource, StorageError,
};
use plantfloor::config::bounded_name;
use plantfloor::machine::Operation;

#[test]
fn setup_file_skips_blanks_and_comments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("machine_setup.csv");
    fs::write(
        &path,
        "# id,name,tmin,tmax,hmin,hmax,buf,win\n\n1,Lathe,10,30,40,70,10,5\n2,Oven,50,250,0,20,6,3\n",
    )
    .unwrap();

    let machines = MachineSetupFile::new(&path).load_machines().unwrap();
    assert_eq!(machines.len(), 2);
    assert_eq!(machines[1].name.as_str(), "Oven");
    assert_eq!(machines[1].temperature.max, 250);
}

#[test]
fn setup_file_failure_names_the_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("machine_setup.csv");
    fs::write(&path, "1,Lathe,10,30,40,70,10,5\n\n3,Saw,10,thirty,40,70,10,5\n").unwrap();

    let err = MachineSetupFile::new(&path).load_machines().unwrap_err();
    assert!(matches!(err, ConfigError::Malformed { line: 3, .. }), "{err}");
}

#[test]
fn missing_setup_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = MachineSetupFile::new(dir.path().join("nope.csv"))
        .load_machines()
        .unwrap_err();
    assert_eq!(err, ConfigError::NotFound);
}

#[test]
fn instruction_file_skips_header_and_bad_rows() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("instructions.csv");
    fs::write(
        &path,
        "OperationID,MachineID,OperationName,Duration\n3,1,Cut,20\nbroken\n1,2,Drill\n",
    )
    .unwrap();

    let batch = InstructionFile::new(&path).load().unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].operation_id, 3);
    assert_eq!(batch[0].duration_secs, 20);
    assert_eq!(batch[1].duration_secs, 0);
}

#[test]
fn history_is_truncated_then_appended() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = HistoryStore::new(dir.path().join("data"));
    let op = Operation {
        operation_id: 7,
        machine_id: 4,
        name: bounded_name("Polish"),
        start_time: NaiveDate::from_ymd_opt(2024, 6, 2)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap(),
        duration_secs: 30,
    };

    store.reset(4).unwrap();
    store.append(&op).unwrap();
    let text = fs::read_to_string(store.path_for(4)).unwrap();
    assert_eq!(text, format!("{HISTORY_HEADER}\n7,4,Polish,2024-06-02 14:05:09,30\n"));
    assert_eq!(store.read(4).unwrap(), vec![op.clone()]);

    store.reset(4).unwrap();
    assert!(store.read(4).unwrap().is_empty());
    assert_eq!(store.read(5), Err(StorageError::NotFound));
}

#[test]
fn corrupted_history_reports_line() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(dir.path());
    fs::write(
        store.path_for(1),
        format!("{HISTORY_HEADER}\n1,1,Cut,2024-01-01 00:00:00,5\n2,1,Cut,yesterday,5\n"),
    )
    .unwrap();
    assert_eq!(store.read(1), Err(StorageError::Corrupted { line: 3 }));
}
