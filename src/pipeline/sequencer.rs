//! The pipeline state machine.
//!
//! ```text
//! Idle -> Running(step) -> Running(next) | Halted(step, kind) | Completed
//! ```
//!
//! Steps run strictly one at a time. A failed step is never retried
//! automatically; the run halts and the user decides where to resume.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use crate::error::Result;

use super::contract::{CancelToken, ExecContext, PipelineStep, StepCatalog};
use super::outcome::{ErrorKind, StepOutcome, StepStatus};
use super::state::{BuildState, HaltReport};
use super::step::{ArchiveTool, BuildMode, Step};

/// Kind of transition a [`StatusRecord`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// A step is about to run.
    Running,
    /// A step finished with this status.
    Finished(StepStatus),
    /// The run stopped on a failure or cancellation.
    Halted,
    /// Every step succeeded.
    Completed,
}

/// Notification emitted after every transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub step: Option<Step>,
    pub status: RunStatus,
    pub error_kind: Option<ErrorKind>,
    pub message: String,
    /// One-based position of `step` in the sequence.
    pub position: usize,
    pub total: usize,
}

/// Create the initial state for a fresh build.
pub fn start_build(
    plugin: impl Into<String>,
    mode: BuildMode,
    working_directory: impl Into<PathBuf>,
    archive_tool: ArchiveTool,
) -> BuildState {
    BuildState::new(plugin, mode, working_directory, archive_tool)
}

/// Prepare a prior state to continue from `from`.
pub fn resume_build(prior: BuildState, from: Step) -> Result<BuildState> {
    info!("Resuming {} build from {}", prior.mode, from);
    prior.resume(from)
}

/// Drives a [`BuildState`] through the registered steps.
pub struct Sequencer<'a> {
    catalog: &'a StepCatalog,
    cancel: CancelToken,
}

impl<'a> Sequencer<'a> {
    pub fn new(catalog: &'a StepCatalog, cancel: CancelToken) -> Self {
        Self { catalog, cancel }
    }

    /// Run without observing status records.
    pub fn run(&self, state: BuildState) -> BuildState {
        self.run_to_completion_or_halt(state, |_| {})
    }

    /// Run steps until every step succeeded or one failed.
    ///
    /// A state that is already halted or completed is returned unchanged.
    pub fn run_to_completion_or_halt(
        &self,
        mut state: BuildState,
        mut on_status: impl FnMut(&StatusRecord),
    ) -> BuildState {
        if state.is_terminal() {
            debug!("Build state is already terminal, nothing to run");
            return state;
        }

        let sequence = state.sequence();
        let total = sequence.len();
        let position_of = |step: Step| {
            sequence
                .iter()
                .position(|s| *s == step)
                .map_or(0, |i| i + 1)
        };

        loop {
            let Some(step) = state.next_step() else {
                info!("Build of {} completed", state.plugin);
                on_status(&StatusRecord {
                    step: None,
                    status: RunStatus::Completed,
                    error_kind: None,
                    message: format!("{} build of {} completed", state.mode, state.plugin),
                    position: total,
                    total,
                });
                return state.completed();
            };
            let position = position_of(step);

            if self.cancel.is_cancelled() {
                warn!("Run cancelled before {}", step);
                let report = HaltReport {
                    step,
                    kind: ErrorKind::Cancelled,
                    detail: "Cancelled before the step started".to_string(),
                    log_paths: Vec::new(),
                };
                return self.halt(state, report, position, total, &mut on_status);
            }

            let Some(implementation) = self.catalog.get(step) else {
                let outcome = StepOutcome::failed(
                    step,
                    ErrorKind::Unknown,
                    format!("No implementation registered for {}", step),
                );
                return self.fail(state, outcome, position, total, &mut on_status);
            };

            state = state.running(step);
            info!("[{}/{}] {}", position, total, step);
            on_status(&StatusRecord {
                step: Some(step),
                status: RunStatus::Running,
                error_kind: None,
                message: format!("Running {}", step),
                position,
                total,
            });

            if let Err(failure) = implementation.precheck(&state) {
                warn!("Precheck for {} failed: {}", step, failure);
                let outcome = StepOutcome::failed(step, failure.kind, failure.detail);
                return self.fail(state, outcome, position, total, &mut on_status);
            }

            let mut outcome = self.attempt(implementation, &state);
            outcome.step = step;

            if let Err(e) = state.record(outcome.clone()) {
                error!("Rejected outcome for {}: {}", step, e);
                let outcome = StepOutcome::failed(step, ErrorKind::Unknown, e.to_string());
                let report = HaltReport::from_outcome(&outcome);
                return self.halt(state, report, position, total, &mut on_status);
            }

            self.cleanup(implementation, &state, &outcome);

            on_status(&StatusRecord {
                step: Some(step),
                status: RunStatus::Finished(outcome.status),
                error_kind: outcome.error_kind,
                message: outcome.detail.clone(),
                position,
                total,
            });

            if outcome.status == StepStatus::Failed {
                let report = HaltReport::from_outcome(&outcome);
                return self.halt(state, report, position, total, &mut on_status);
            }
        }
    }

    /// Execute and classify, turning errors and panics into tool crashes.
    fn attempt(&self, implementation: &dyn PipelineStep, state: &BuildState) -> StepOutcome {
        let step = implementation.step();
        let ctx = ExecContext {
            cancel: self.cancel.clone(),
        };

        let raw = match catch_unwind(AssertUnwindSafe(|| implementation.execute(state, &ctx))) {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                error!("{} could not run its tool: {}", step, e);
                return StepOutcome::failed(step, ErrorKind::ToolCrash, e.to_string());
            }
            Err(panic) => {
                error!("{} panicked while running its tool", step);
                return StepOutcome::failed(step, ErrorKind::ToolCrash, panic_message(&*panic));
            }
        };
        debug!(
            "{} tool finished: exit={:?} termination={:?} in {:?}",
            step, raw.exit_code, raw.termination, raw.duration
        );

        match catch_unwind(AssertUnwindSafe(|| implementation.classify(state, &raw))) {
            Ok(outcome) => outcome,
            Err(panic) => StepOutcome::failed(step, ErrorKind::ToolCrash, panic_message(&*panic))
                .with_log_paths(raw.log_paths.clone()),
        }
    }

    /// Cleanup problems are logged; they never change the outcome.
    fn cleanup(&self, implementation: &dyn PipelineStep, state: &BuildState, outcome: &StepOutcome) {
        let step = implementation.step();
        match catch_unwind(AssertUnwindSafe(|| implementation.cleanup(state, outcome))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Cleanup after {} failed: {}", step, e),
            Err(panic) => warn!("Cleanup after {} panicked: {}", step, panic_message(&*panic)),
        }
    }

    fn fail(
        &self,
        mut state: BuildState,
        outcome: StepOutcome,
        position: usize,
        total: usize,
        on_status: &mut impl FnMut(&StatusRecord),
    ) -> BuildState {
        let report = HaltReport::from_outcome(&outcome);
        on_status(&StatusRecord {
            step: Some(outcome.step),
            status: RunStatus::Finished(StepStatus::Failed),
            error_kind: outcome.error_kind,
            message: outcome.detail.clone(),
            position,
            total,
        });
        if let Err(e) = state.record(outcome) {
            error!("Could not record failure: {}", e);
        }
        self.halt(state, report, position, total, on_status)
    }

    fn halt(
        &self,
        state: BuildState,
        report: HaltReport,
        position: usize,
        total: usize,
        on_status: &mut impl FnMut(&StatusRecord),
    ) -> BuildState {
        error!("Build halted at {}: {} ({})", report.step, report.kind, report.detail);
        on_status(&StatusRecord {
            step: Some(report.step),
            status: RunStatus::Halted,
            error_kind: Some(report.kind),
            message: report.detail.clone(),
            position,
            total,
        });
        state.halted(report)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic while running step".to_string()
    }
}
