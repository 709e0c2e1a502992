//! Plant-floor supervisor entry point.
//!
//! Hexagonal architecture driven by a cooperative async runtime.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  MachineEmulator   LogEventSink   MachineSetupFile  SystemClock│
//! │  (TelemetryPort)   (EventSink)    (ConfigPort)      (TimePort) │
//! │  InstructionFile   HistoryStore                                │
//! │  (Instructions)    (HistoryPort)                               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Registry · FSM · Alerting · Scheduler                 │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Supervisor (LocalExecutor · per-machine telemetry/op tasks)   │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Usage: `supervisor [config.json]`. Without a file every setting takes
//! its default (`data/` directory, all machines on the floor).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{error, info, warn};

use plantfloor::adapters::csv_store::{HistoryStore, InstructionFile, MachineSetupFile};
use plantfloor::adapters::emulator::MachineEmulator;
use plantfloor::adapters::log_sink::LogEventSink;
use plantfloor::adapters::time::SystemClock;
use plantfloor::app::ports::{ConfigPort, HistoryPort, InstructionSource, StorageError};
use plantfloor::app::service::AppService;
use plantfloor::config::SupervisorConfig;
use plantfloor::diagnostics;
use plantfloor::runtime::{RuntimeConfig, Supervisor};

fn load_config(path: Option<&Path>) -> Result<SupervisorConfig> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let cfg: SupervisorConfig = serde_json::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            info!("Config loaded from {}", path.display());
            cfg
        }
        None => {
            info!("No config file given, using defaults");
            SupervisorConfig::default()
        }
    };
    config.validate().context("invalid supervisor config")?;
    Ok(config)
}

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    diagnostics::install_panic_handler();

    info!("╔══════════════════════════════════════╗");
    info!("║  PlantFloor supervisor v{}        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration ──────────────────────────────────────
    let arg = std::env::args_os().nth(1);
    let config = load_config(arg.as_deref().map(Path::new))?;

    let setup = MachineSetupFile::new(config.machine_setup_path());
    let machines = setup
        .load_machines()
        .with_context(|| format!("loading {}", setup.path().display()))?;
    let ids: Vec<u32> = machines.iter().map(|m| m.id).collect();
    let app = AppService::new(machines).context("building the plant floor")?;

    // ── 3. History logs (fresh per run) ───────────────────────
    let mut history = HistoryStore::new(&config.data_dir);
    for &id in &ids {
        if let Err(e) = history.reset(id) {
            error!("history for machine {} unavailable: {}", id, e);
        }
    }

    // ── 4. Pending instructions ───────────────────────────────
    let mut source = InstructionFile::new(config.instructions_path());
    let batch = match source.load() {
        Ok(batch) => batch,
        Err(StorageError::NotFound) => {
            warn!(
                "{} not found, no operations to dispatch",
                config.instructions_path().display()
            );
            Vec::new()
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("loading {}", config.instructions_path().display())
            });
        }
    };

    // ── 5. Runtime ────────────────────────────────────────────
    let supervisor = Supervisor::new(
        app,
        MachineEmulator::new(),
        history,
        LogEventSink::new(),
        SystemClock::new(),
        RuntimeConfig::from(&config),
    );
    supervisor.start(|id| config.starts_on_floor(id));

    for s in supervisor.status() {
        info!(
            "machine {:>2} {:<20} {} | T {}..{} | H {}..{}",
            s.id,
            s.name,
            s.state,
            s.temperature_range.min,
            s.temperature_range.max,
            s.humidity_range.min,
            s.humidity_range.max
        );
    }

    if let Some(secs) = config.run_deadline_secs {
        info!("Run deadline: shutting down after {}s", secs);
    }
    let (report, metrics) = supervisor.block_on(supervisor.run(batch));
    let completed = report.finished.iter().filter(|e| e.is_completed()).count();
    info!(
        "batch done: {} instruction(s), {} completed, {} cancelled",
        report.outcomes.len(),
        completed,
        report.finished.len() - completed
    );

    // ── 6. Cleanup ────────────────────────────────────────────
    info!("Supervisor stopped: {}", metrics);
    Ok(())
}
