//! Build state and the last-run report.
//!
//! [`BuildState`] is a value: every transition consumes the old state and
//! returns a new one. The history it carries is append-only and ordered by
//! pipeline position, which is what makes resuming from an arbitrary step
//! safe.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{PrevisError, Result};

use super::outcome::{ErrorKind, StepOutcome, StepStatus};
use super::registry;
use super::step::{ArchiveTool, BuildMode, Step};

/// Where the run is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RunPhase {
    #[default]
    Idle,
    Running {
        step: Step,
    },
    Halted(HaltReport),
    Completed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Halted(_) | RunPhase::Completed)
    }
}

/// Why the run stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaltReport {
    pub step: Step,
    pub kind: ErrorKind,
    pub detail: String,
    #[serde(default)]
    pub log_paths: Vec<PathBuf>,
}

impl HaltReport {
    pub fn from_outcome(outcome: &StepOutcome) -> Self {
        Self {
            step: outcome.step,
            kind: outcome.error_kind.unwrap_or(ErrorKind::Unknown),
            detail: outcome.detail.clone(),
            log_paths: outcome.log_paths.clone(),
        }
    }
}

/// Everything needed to continue a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildState {
    /// Plugin file name, e.g. `MyMod.esp`.
    pub plugin: String,
    pub mode: BuildMode,
    /// Directory holding transcripts and the run report.
    pub working_directory: PathBuf,
    pub current_step: Option<Step>,
    #[serde(default)]
    pub history: Vec<StepOutcome>,
    #[serde(default)]
    pub archive_tool: ArchiveTool,
    /// Steps before this one are treated as done even without an outcome.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_from: Option<Step>,
    #[serde(default)]
    pub phase: RunPhase,
}

impl BuildState {
    pub fn new(
        plugin: impl Into<String>,
        mode: BuildMode,
        working_directory: impl Into<PathBuf>,
        archive_tool: ArchiveTool,
    ) -> Self {
        let mut state = Self {
            plugin: plugin.into(),
            mode,
            working_directory: working_directory.into(),
            current_step: None,
            history: Vec::new(),
            archive_tool,
            resumed_from: None,
            phase: RunPhase::Idle,
        };
        state.current_step = state.next_step();
        state
    }

    /// The ordered steps this build runs.
    pub fn sequence(&self) -> Vec<Step> {
        registry::steps_for(self.mode)
    }

    /// Steps the pipeline may move past: succeeded or skipped outcomes, plus
    /// anything ordered before the resume point.
    pub fn settled_steps(&self) -> Vec<Step> {
        let mut settled: Vec<Step> = self
            .sequence()
            .into_iter()
            .filter(|step| self.resumed_from.is_some_and(|from| *step < from))
            .collect();
        for outcome in &self.history {
            if outcome.status.is_settled() && !settled.contains(&outcome.step) {
                settled.push(outcome.step);
            }
        }
        settled
    }

    /// First step of the sequence that is not settled.
    pub fn next_step(&self) -> Option<Step> {
        registry::next_step(self.mode, &self.settled_steps())
    }

    /// Append one outcome, producing the next state.
    ///
    /// Rejects outcomes for steps outside this mode's sequence, outcomes
    /// that would break pipeline order, and a second success for a step.
    pub fn with_outcome(mut self, outcome: StepOutcome) -> Result<Self> {
        self.record(outcome)?;
        Ok(self)
    }

    /// In-place form of [`with_outcome`](Self::with_outcome). The state is
    /// left untouched when the outcome is rejected.
    pub fn record(&mut self, outcome: StepOutcome) -> Result<()> {
        if !self.sequence().contains(&outcome.step) {
            return Err(PrevisError::StateError {
                message: format!("{} is not part of a {} build", outcome.step, self.mode),
            });
        }
        if let Some(last) = self.history.last() {
            if outcome.step < last.step {
                return Err(PrevisError::StateError {
                    message: format!(
                        "{} cannot be recorded after {}",
                        outcome.step, last.step
                    ),
                });
            }
        }
        if outcome.status == StepStatus::Succeeded
            && self
                .history
                .iter()
                .any(|o| o.step == outcome.step && o.status == StepStatus::Succeeded)
        {
            return Err(PrevisError::StateError {
                message: format!("{} already succeeded", outcome.step),
            });
        }

        self.history.push(outcome);
        self.current_step = self.next_step();
        Ok(())
    }

    /// Restart from `from`, keeping only outcomes of steps before it.
    pub fn resume(mut self, from: Step) -> Result<Self> {
        if !self.sequence().contains(&from) {
            return Err(PrevisError::StateError {
                message: format!("{} is not part of a {} build", from, self.mode),
            });
        }
        self.history.retain(|outcome| outcome.step < from);
        self.resumed_from = Some(from);
        self.current_step = Some(from);
        self.phase = RunPhase::Idle;
        Ok(self)
    }

    pub fn running(mut self, step: Step) -> Self {
        self.phase = RunPhase::Running { step };
        self
    }

    pub fn halted(mut self, report: HaltReport) -> Self {
        self.phase = RunPhase::Halted(report);
        self
    }

    pub fn completed(mut self) -> Self {
        self.current_step = None;
        self.phase = RunPhase::Completed;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn halt_report(&self) -> Option<&HaltReport> {
        match &self.phase {
            RunPhase::Halted(report) => Some(report),
            _ => None,
        }
    }

    pub fn last_outcome(&self) -> Option<&StepOutcome> {
        self.history.last()
    }

    /// Steps a halted build can be resumed from: the failed step and every
    /// later step in the sequence.
    pub fn resume_points(&self) -> Vec<Step> {
        match self.halt_report() {
            Some(report) => self
                .sequence()
                .into_iter()
                .filter(|step| *step >= report.step)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Path of the last-run report inside `working_directory`.
    pub fn report_path(working_directory: &Path) -> PathBuf {
        working_directory.join("logs").join("last-run.yml")
    }

    /// Load the last-run report, if one exists.
    pub fn load_report(working_directory: &Path) -> Result<Option<Self>> {
        let path = Self::report_path(working_directory);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let state: Self =
            serde_yaml::from_str(&content).map_err(|e| PrevisError::ConfigParseError {
                path: path.clone(),
                message: e.to_string(),
            })?;
        Ok(Some(state))
    }

    /// Write the report with a write-to-temp-then-rename so a crash never
    /// leaves a truncated file behind.
    pub fn save_report(&self) -> Result<PathBuf> {
        let path = Self::report_path(&self.working_directory);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let content = serde_yaml::to_string(self).map_err(|e| PrevisError::StateError {
            message: format!("Failed to serialize run report: {}", e),
        })?;

        let temp_path = path.with_extension("yml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state(mode: BuildMode) -> BuildState {
        BuildState::new("MyMod.esp", mode, "/work", ArchiveTool::Archive2)
    }

    #[test]
    fn new_state_starts_at_first_step() {
        let s = state(BuildMode::Clean);
        assert_eq!(s.current_step, Some(Step::GeneratePrecombined));
        assert!(s.history.is_empty());
        assert_eq!(s.phase, RunPhase::Idle);
    }

    #[test]
    fn success_advances_current_step() {
        let s = state(BuildMode::Filtered)
            .with_outcome(StepOutcome::succeeded(Step::GeneratePrecombined, "ok"))
            .unwrap()
            .with_outcome(StepOutcome::succeeded(Step::MergeCombinedObjects, "ok"))
            .unwrap()
            .with_outcome(StepOutcome::succeeded(Step::ArchiveMeshes, "ok"))
            .unwrap();
        assert_eq!(s.current_step, Some(Step::GeneratePrevis));
    }

    #[test]
    fn failure_keeps_current_step() {
        let s = state(BuildMode::Clean)
            .with_outcome(StepOutcome::failed(
                Step::GeneratePrecombined,
                ErrorKind::Timeout,
                "slow",
            ))
            .unwrap();
        assert_eq!(s.current_step, Some(Step::GeneratePrecombined));
    }

    #[test]
    fn out_of_order_outcome_is_rejected() {
        let s = state(BuildMode::Clean)
            .with_outcome(StepOutcome::succeeded(Step::ArchiveMeshes, "ok"))
            .unwrap();
        let err = s
            .with_outcome(StepOutcome::succeeded(Step::GeneratePrecombined, "ok"))
            .unwrap_err();
        assert!(matches!(err, PrevisError::StateError { .. }));
    }

    #[test]
    fn duplicate_success_is_rejected() {
        let s = state(BuildMode::Clean)
            .with_outcome(StepOutcome::succeeded(Step::GeneratePrecombined, "ok"))
            .unwrap();
        assert!(s
            .with_outcome(StepOutcome::succeeded(Step::GeneratePrecombined, "again"))
            .is_err());
    }

    #[test]
    fn retry_after_failure_is_accepted() {
        let s = state(BuildMode::Clean)
            .with_outcome(StepOutcome::failed(
                Step::GeneratePrecombined,
                ErrorKind::Unknown,
                "",
            ))
            .unwrap()
            .with_outcome(StepOutcome::succeeded(Step::GeneratePrecombined, "ok"))
            .unwrap();
        assert_eq!(s.history.len(), 2);
        assert_eq!(s.current_step, Some(Step::MergeCombinedObjects));
    }

    #[test]
    fn step_outside_mode_is_rejected() {
        let err = state(BuildMode::Xbox)
            .with_outcome(StepOutcome::succeeded(Step::CompressPSG, "ok"))
            .unwrap_err();
        assert!(err.to_string().contains("xbox"));
    }

    #[test]
    fn resume_truncates_history_and_sets_current_step() {
        let s = state(BuildMode::Clean)
            .with_outcome(StepOutcome::succeeded(Step::GeneratePrecombined, "ok"))
            .unwrap()
            .with_outcome(StepOutcome::succeeded(Step::MergeCombinedObjects, "ok"))
            .unwrap()
            .with_outcome(StepOutcome::failed(
                Step::ArchiveMeshes,
                ErrorKind::ResourceExhaustion,
                "handles",
            ))
            .unwrap()
            .halted(HaltReport {
                step: Step::ArchiveMeshes,
                kind: ErrorKind::ResourceExhaustion,
                detail: "handles".into(),
                log_paths: vec![],
            });

        let resumed = s.resume(Step::ArchiveMeshes).unwrap();
        assert_eq!(resumed.history.len(), 2);
        assert_eq!(resumed.current_step, Some(Step::ArchiveMeshes));
        assert_eq!(resumed.next_step(), Some(Step::ArchiveMeshes));
        assert_eq!(resumed.phase, RunPhase::Idle);
    }

    #[test]
    fn resume_past_missing_history_treats_earlier_steps_as_done() {
        let resumed = state(BuildMode::Clean).resume(Step::GeneratePrevis).unwrap();
        assert!(resumed.history.is_empty());
        assert_eq!(resumed.next_step(), Some(Step::GeneratePrevis));
        assert!(resumed.settled_steps().contains(&Step::BuildCDX));
    }

    #[test]
    fn resume_rejects_step_outside_mode() {
        assert!(state(BuildMode::Filtered).resume(Step::BuildCDX).is_err());
    }

    #[test]
    fn resume_points_start_at_failed_step() {
        let s = state(BuildMode::Filtered).halted(HaltReport {
            step: Step::GeneratePrevis,
            kind: ErrorKind::IncompleteTask,
            detail: String::new(),
            log_paths: vec![],
        });
        assert_eq!(
            s.resume_points(),
            vec![Step::GeneratePrevis, Step::MergePrevis, Step::FinalPackaging]
        );
        assert!(state(BuildMode::Clean).resume_points().is_empty());
    }

    #[test]
    fn report_round_trips_with_atomic_write() {
        let temp = TempDir::new().unwrap();
        let s = BuildState::new(
            "MyMod.esp",
            BuildMode::Xbox,
            temp.path(),
            ArchiveTool::BSArch,
        )
        .with_outcome(
            StepOutcome::failed(Step::GeneratePrecombined, ErrorKind::ToolCrash, "boom")
                .with_log_paths(vec![PathBuf::from("CreationKit.log")]),
        )
        .unwrap();
        let s = s.clone().halted(HaltReport::from_outcome(&s.history[0]));

        let path = s.save_report().unwrap();
        assert!(path.ends_with("logs/last-run.yml"));
        assert!(!path.with_extension("yml.tmp").exists());

        let loaded = BuildState::load_report(temp.path()).unwrap().unwrap();
        assert_eq!(loaded, s);
        assert_eq!(loaded.halt_report().unwrap().kind, ErrorKind::ToolCrash);
    }

    #[test]
    fn load_report_missing_is_none() {
        let temp = TempDir::new().unwrap();
        assert!(BuildState::load_report(temp.path()).unwrap().is_none());
    }

    #[test]
    fn load_report_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = BuildState::report_path(temp.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "plugin: [unclosed").unwrap();
        assert!(matches!(
            BuildState::load_report(temp.path()),
            Err(PrevisError::ConfigParseError { .. })
        ));
    }
}
