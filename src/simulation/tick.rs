//! Periodic cycle driver
//!
//! Every period one cycle runs: measure progress against the daily target,
//! maybe refresh the multiplier, form bonds, divide cells, then log a census.
//! A cycle that finds the previous one still running is skipped. Failures in
//! one step are logged and the remaining steps still run.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::records::Multiplier;
use crate::simulation::balance::Progress;
use crate::simulation::bonds::BondOutcome;
use crate::simulation::census::Census;
use crate::simulation::division::DivisionReport;
use crate::simulation::engine::Engine;

/// What one cycle achieved; `None` marks a step that failed
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub progress: Option<Progress>,
    /// `Some(None)` when the refresh roll failed
    pub multiplier: Option<Option<Multiplier>>,
    pub bonds: Option<BondOutcome>,
    pub divisions: Option<DivisionReport>,
    pub census: Option<Census>,
}

impl CycleReport {
    /// Steps that did not complete
    pub fn failed_steps(&self) -> usize {
        [
            self.progress.is_none(),
            self.multiplier.is_none(),
            self.bonds.is_none(),
            self.divisions.is_none(),
            self.census.is_none(),
        ]
        .into_iter()
        .filter(|failed| *failed)
        .count()
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    /// Another cycle held the running flag
    Skipped,
    Completed(CycleReport),
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed(report) => Some(report),
            CycleOutcome::Skipped => None,
        }
    }
}

/// Clears the running flag however the cycle ends
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn log_failure<T, E: Display>(step: &'static str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            error!(step, error = %e, "Cycle step failed");
            None
        }
    }
}

#[derive(Debug)]
pub struct CycleScheduler {
    engine: Arc<Engine>,
    running: AtomicBool,
}

impl CycleScheduler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one cycle unless one is already in progress
    pub async fn run_cycle(&self) -> CycleOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Previous cycle still running, skipping");
            return CycleOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        let started = Instant::now();
        let engine = &self.engine;
        let mut report = CycleReport::default();

        report.progress = log_failure("progress", engine.cycle_progress().await);
        if let Some(progress) = &report.progress {
            info!(
                actual = progress.actual,
                expected = progress.expected,
                boost = progress.boost,
                "Entity production progress"
            );
        }

        report.multiplier = log_failure("multiplier", engine.maybe_refresh_multiplier().await);
        report.bonds = log_failure("bonds", engine.generate_bonds().await);
        report.divisions = log_failure("divisions", engine.generate_cells().await);
        report.census = log_failure("census", engine.census().await);

        if let Some(census) = &report.census {
            info!(
                entities = census.entities,
                free = census.free_entities,
                cells = census.cells,
                consolidations = census.consolidations,
                multiplier = %format!("{:.2}", census.multiplier),
                "Cycle census"
            );
        }
        debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            failed_steps = report.failed_steps(),
            pending = engine.pending_transitions(),
            "Cycle finished"
        );

        CycleOutcome::Completed(report)
    }

    /// Start periodic cycles on the runtime
    ///
    /// The first cycle runs after the startup delay, then one per period.
    /// Each trigger spawns its cycle so a slow cycle meets the overlap check
    /// instead of delaying the timer.
    pub fn start(self: &Arc<Self>) -> SchedulerHandle {
        let cfg = &self.engine.config().cycle;
        let startup = Duration::from_secs(cfg.startup_delay_secs);
        let period = Duration::from_secs(cfg.period_secs.max(1));
        let (shutdown, mut stop_rx) = mpsc::channel::<()>(1);

        info!(
            startup_secs = startup.as_secs(),
            period_secs = period.as_secs(),
            "Starting cycle scheduler"
        );

        let scheduler = Arc::clone(self);
        let task = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(startup) => {}
                _ = stop_rx.recv() => {
                    info!("Cycle scheduler stopped before first cycle");
                    return;
                }
            }

            scheduler.trigger();
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => scheduler.trigger(),
                    _ = stop_rx.recv() => {
                        info!("Cycle scheduler stopped");
                        break;
                    }
                }
            }
        });

        SchedulerHandle { shutdown, task }
    }

    fn trigger(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_cycle().await;
        });
    }
}

/// Stops periodic triggers; delayed transitions already scheduled still fire
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub async fn stop(self) {
        // A closed channel means the loop has already exited
        let _ = self.shutdown.send(()).await;
        if let Err(e) = self.task.await {
            error!(error = %e, "Cycle scheduler task failed");
        }
    }
}

/// Serializable summary of a completed cycle, used by the one-shot CLI mode
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub progress: Option<Progress>,
    pub multiplier_refreshed: bool,
    pub bond_formed: bool,
    pub divisions: usize,
    pub failed_steps: usize,
    pub census: Option<Census>,
}

impl From<&CycleReport> for CycleSummary {
    fn from(report: &CycleReport) -> Self {
        Self {
            progress: report.progress,
            multiplier_refreshed: matches!(report.multiplier, Some(Some(_))),
            bond_formed: matches!(report.bonds, Some(BondOutcome::Formed { .. })),
            divisions: report.divisions.as_ref().map_or(0, |d| d.divisions.len()),
            failed_steps: report.failed_steps(),
            census: report.census.clone(),
        }
    }
}
