//! The uniform interface every pipeline step implements.
//!
//! The sequencer only ever talks to steps through [`PipelineStep`], which
//! keeps the tool plumbing out of the state machine and lets tests swap in
//! steps that just write files.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

use super::outcome::{StepFailure, StepOutcome};
use super::state::BuildState;
use super::step::Step;

/// Shared flag set when the user asks the run to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a flag registered with a signal handler.
    pub fn from_flag(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }

    pub fn flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.0)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How the external process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The process exited on its own.
    Exited,
    /// The process exceeded its time limit and was killed.
    TimedOut,
    /// The run was cancelled and the process was killed.
    Cancelled,
}

/// What a tool collaborator reports back.
///
/// Log files listed here are closed by the time this value exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToolResult {
    /// Exit code (`None` if the process was killed).
    pub exit_code: Option<i32>,
    pub log_paths: Vec<PathBuf>,
    pub artifact_paths: Vec<PathBuf>,
    pub termination: Termination,
    pub duration: Duration,
}

impl RawToolResult {
    pub fn exited(exit_code: i32, duration: Duration) -> Self {
        Self {
            exit_code: Some(exit_code),
            log_paths: Vec::new(),
            artifact_paths: Vec::new(),
            termination: Termination::Exited,
            duration,
        }
    }

    pub fn timed_out(duration: Duration) -> Self {
        Self {
            exit_code: None,
            log_paths: Vec::new(),
            artifact_paths: Vec::new(),
            termination: Termination::TimedOut,
            duration,
        }
    }

    pub fn cancelled(duration: Duration) -> Self {
        Self {
            exit_code: None,
            log_paths: Vec::new(),
            artifact_paths: Vec::new(),
            termination: Termination::Cancelled,
            duration,
        }
    }

    pub fn with_logs(mut self, log_paths: Vec<PathBuf>) -> Self {
        self.log_paths = log_paths;
        self
    }

    pub fn with_artifacts(mut self, artifact_paths: Vec<PathBuf>) -> Self {
        self.artifact_paths = artifact_paths;
        self
    }
}

/// Per-invocation context handed to [`PipelineStep::execute`].
#[derive(Debug, Clone, Default)]
pub struct ExecContext {
    pub cancel: CancelToken,
}

/// One pipeline stage.
pub trait PipelineStep {
    /// The step this implementation runs.
    fn step(&self) -> Step;

    /// Verify inputs exist and clear stale outputs of this step.
    fn precheck(&self, state: &BuildState) -> std::result::Result<(), StepFailure>;

    /// Run the external tool. An `Err` is treated as a tool crash.
    fn execute(&self, state: &BuildState, ctx: &ExecContext) -> Result<RawToolResult>;

    /// Decide success or failure from logs and artifacts. Exit status alone
    /// never counts as success.
    fn classify(&self, state: &BuildState, raw: &RawToolResult) -> StepOutcome;

    /// On failure remove this step's partial outputs, on success move
    /// artifacts into place for the next step.
    fn cleanup(&self, state: &BuildState, outcome: &StepOutcome) -> Result<()>;
}

/// Step implementations keyed by step.
#[derive(Default)]
pub struct StepCatalog {
    steps: HashMap<Step, Box<dyn PipelineStep>>,
}

impl StepCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation, replacing any previous one for its step.
    pub fn register(&mut self, step: Box<dyn PipelineStep>) {
        self.steps.insert(step.step(), step);
    }

    pub fn with(mut self, step: Box<dyn PipelineStep>) -> Self {
        self.register(step);
        self
    }

    pub fn get(&self, step: Step) -> Option<&dyn PipelineStep> {
        self.steps.get(&step).map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for StepCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut steps: Vec<_> = self.steps.keys().collect();
        steps.sort();
        f.debug_struct("StepCatalog").field("steps", &steps).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn cancel_token_wraps_external_flag() {
        let flag = Arc::new(AtomicBool::new(false));
        let token = CancelToken::from_flag(Arc::clone(&flag));
        flag.store(true, Ordering::SeqCst);
        assert!(token.is_cancelled());
    }

    #[test]
    fn raw_result_constructors_set_termination() {
        let d = Duration::from_secs(1);
        assert_eq!(RawToolResult::exited(0, d).termination, Termination::Exited);
        assert_eq!(RawToolResult::exited(3, d).exit_code, Some(3));
        assert_eq!(RawToolResult::timed_out(d).termination, Termination::TimedOut);
        assert_eq!(RawToolResult::cancelled(d).exit_code, None);
    }

    struct Noop(Step);

    impl PipelineStep for Noop {
        fn step(&self) -> Step {
            self.0
        }
        fn precheck(&self, _: &BuildState) -> std::result::Result<(), StepFailure> {
            Ok(())
        }
        fn execute(&self, _: &BuildState, _: &ExecContext) -> Result<RawToolResult> {
            Ok(RawToolResult::exited(0, Duration::ZERO))
        }
        fn classify(&self, _: &BuildState, _: &RawToolResult) -> StepOutcome {
            StepOutcome::succeeded(self.0, "noop")
        }
        fn cleanup(&self, _: &BuildState, _: &StepOutcome) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn catalog_registers_by_step() {
        let catalog = StepCatalog::new()
            .with(Box::new(Noop(Step::BuildCDX)))
            .with(Box::new(Noop(Step::MergePrevis)));
        assert_eq!(catalog.len(), 2);
        assert!(catalog.get(Step::BuildCDX).is_some());
        assert!(catalog.get(Step::ArchiveMeshes).is_none());
    }
}
