//! Step outcomes and failure kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::step::Step;

/// Final status of one step attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Get the display character for this status.
    pub fn display_char(&self) -> char {
        match self {
            StepStatus::Succeeded => '✓',
            StepStatus::Failed => '✗',
            StepStatus::Skipped => '⊘',
        }
    }

    /// Whether this status lets the pipeline move past the step.
    pub fn is_settled(&self) -> bool {
        matches!(self, StepStatus::Succeeded | StepStatus::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Succeeded => write!(f, "succeeded"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// Why a step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The tool died or raised an unhandled exception.
    ToolCrash,
    /// The tool ran out of an internal resource (handle array entries).
    ResourceExhaustion,
    /// The tool exited without finishing its task.
    IncompleteTask,
    /// An input the step depends on, or an output it must produce, is absent.
    MissingArtifact,
    /// The tool logged an explicit error.
    ToolReportedError,
    /// The tool exceeded its time limit and was terminated.
    Timeout,
    /// Nothing conclusive was found in the logs.
    Unknown,
    /// The run was interrupted by the user.
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ToolCrash => "tool crash",
            ErrorKind::ResourceExhaustion => "resource exhaustion",
            ErrorKind::IncompleteTask => "incomplete task",
            ErrorKind::MissingArtifact => "missing artifact",
            ErrorKind::ToolReportedError => "tool reported error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
            ErrorKind::Cancelled => "cancelled",
        }
    }

    /// A one-line hint for the user, where there is something concrete to try.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ErrorKind::ResourceExhaustion => Some(
                "The Creation Kit ran out of handles. Increase the handle limit in the CK fixes configuration and retry.",
            ),
            ErrorKind::IncompleteTask => {
                Some("Previs generation did not finish. Check the cell named in the log and retry.")
            }
            ErrorKind::Timeout => {
                Some("Raise the step timeout under `timeouts:` in previsbine.yml if the worldspace is large.")
            }
            ErrorKind::MissingArtifact => {
                Some("An earlier step's output is missing. Resume from an earlier step.")
            }
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one step attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: Step,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
    /// Log files that were inspected when classifying the attempt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub log_paths: Vec<PathBuf>,
}

impl StepOutcome {
    pub fn succeeded(step: Step, detail: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Succeeded, None, detail.into())
    }

    pub fn failed(step: Step, kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Failed, Some(kind), detail.into())
    }

    pub fn skipped(step: Step, detail: impl Into<String>) -> Self {
        Self::new(step, StepStatus::Skipped, None, detail.into())
    }

    fn new(step: Step, status: StepStatus, error_kind: Option<ErrorKind>, detail: String) -> Self {
        Self {
            step,
            status,
            error_kind,
            detail,
            timestamp: Utc::now(),
            log_paths: Vec::new(),
        }
    }

    /// Attach the inspected log files.
    pub fn with_log_paths(mut self, log_paths: Vec<PathBuf>) -> Self {
        self.log_paths = log_paths;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == StepStatus::Succeeded
    }

    /// Format as a single line for the run summary.
    pub fn summary_line(&self) -> String {
        match self.error_kind {
            Some(kind) => format!(
                "{} {} [{}]: {}",
                self.status.display_char(),
                self.step,
                kind,
                self.detail
            ),
            None => format!("{} {}: {}", self.status.display_char(), self.step, self.detail),
        }
    }
}

/// A precheck rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepFailure {
    pub kind: ErrorKind,
    pub detail: String,
}

impl StepFailure {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn missing(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::MissingArtifact, detail)
    }
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}
