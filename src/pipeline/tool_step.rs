//! The production [`PipelineStep`]: one external tool run, described by the
//! step's [`StepSpec`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use regex::RegexBuilder;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::Result;
use crate::tools::{ToolRequest, ToolSet};

use super::classifier::{RuleSet, Verdict};
use super::contract::{CancelToken, ExecContext, PipelineStep, RawToolResult, StepCatalog, Termination};
use super::layout::{count_files_with_extension, remove_path, wait_for_file, DataLayout};
use super::outcome::{ErrorKind, StepFailure, StepOutcome, StepStatus};
use super::registry::{spec_for, Artifact, StepSpec, ToolFamily};
use super::state::BuildState;
use super::step::Step;

/// Poll interval while waiting for a late output plugin.
const LATE_OUTPUT_POLL: Duration = Duration::from_secs(1);

/// A step backed by a real tool.
pub struct ToolStep {
    spec: &'static StepSpec,
    tools: Arc<ToolSet>,
    data_dir: PathBuf,
    rules: RuleSet,
    timeout: Duration,
    artifact_wait: Duration,
    require_success_marker: bool,
}

impl ToolStep {
    /// A step with the registry's default timeout. xEdit steps must log a
    /// success marker; the Creation Kit and the archivers only need to
    /// avoid failure markers, with success confirmed by artifacts.
    pub fn new(step: Step, tools: Arc<ToolSet>, data_dir: impl Into<PathBuf>, rules: RuleSet) -> Self {
        let spec = spec_for(step);
        Self {
            spec,
            tools,
            data_dir: data_dir.into(),
            rules,
            timeout: spec.default_timeout,
            artifact_wait: Duration::from_secs(60),
            require_success_marker: spec.tool == ToolFamily::XEdit,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_artifact_wait(mut self, wait: Duration) -> Self {
        self.artifact_wait = wait;
        self
    }

    pub fn with_success_marker_required(mut self, required: bool) -> Self {
        self.require_success_marker = required;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn layout(&self, state: &BuildState) -> DataLayout {
        DataLayout::new(&self.data_dir, &state.plugin)
    }

    /// Describe verified outputs for the success detail.
    fn describe_outputs(&self, layout: &DataLayout) -> String {
        let parts: Vec<String> = self
            .spec
            .verifies
            .iter()
            .map(|artifact| match artifact.directory_extension() {
                Some(ext) => format!(
                    "{} .{} files",
                    count_files_with_extension(&layout.path(*artifact), ext),
                    ext
                ),
                None => file_name(&layout.path(*artifact)),
            })
            .collect();
        parts.join(", ")
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Concatenate every readable log. Tools do not always write UTF-8.
fn read_logs(paths: &[PathBuf]) -> String {
    let mut text = String::new();
    for path in paths {
        match fs::read(path) {
            Ok(bytes) => {
                text.push_str(&String::from_utf8_lossy(&bytes));
                text.push('\n');
            }
            Err(e) => debug!("Skipping unreadable log {}: {}", path.display(), e),
        }
    }
    text
}

/// Replace the plugin's file names and the data path with a placeholder.
///
/// Tools echo these in their logs, and a marker that is only part of a
/// name (`ExceptionalSettlements.esp`) must not decide the verdict.
fn mask_build_names(text: &str, layout: &DataLayout) -> String {
    let names = [
        layout.data_dir().display().to_string(),
        layout.plugin().to_string(),
        format!("{} - ", layout.plugin_base()),
    ];
    let alternation = names
        .iter()
        .filter(|name| !name.trim().is_empty())
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");
    if alternation.is_empty() {
        return text.to_string();
    }
    match RegexBuilder::new(&alternation).case_insensitive(true).build() {
        Ok(names) => names.replace_all(text, "<plugin>").into_owned(),
        Err(e) => {
            debug!("Not masking build names: {}", e);
            text.to_string()
        }
    }
}

impl PipelineStep for ToolStep {
    fn step(&self) -> Step {
        self.spec.step
    }

    fn precheck(&self, state: &BuildState) -> std::result::Result<(), StepFailure> {
        let layout = self.layout(state);

        for input in self.spec.consumes {
            if !layout.is_present(*input) {
                let source = match input.producer() {
                    Some(step) => format!("produced by {}", step),
                    None => "supplied by you".to_string(),
                };
                return Err(StepFailure::missing(format!(
                    "{} not found at {} ({})",
                    input,
                    layout.path(*input).display(),
                    source
                )));
            }
        }

        self.tools
            .for_family(self.spec.tool)
            .preflight(self.spec.step, &layout)?;

        for output in self.spec.produces {
            let path = layout.path(*output);
            if path.exists() {
                info!("Clearing stale {} at {}", output, path.display());
                remove_path(&path).map_err(|e| {
                    StepFailure::new(
                        ErrorKind::Unknown,
                        format!("Could not clear stale {}: {}", path.display(), e),
                    )
                })?;
            }
        }

        if self.spec.edits_plugin {
            fs::copy(layout.plugin_path(), layout.backup_path()).map_err(|e| {
                StepFailure::new(
                    ErrorKind::Unknown,
                    format!("Could not back up {}: {}", layout.plugin(), e),
                )
            })?;
            debug!("Backed up plugin to {}", layout.backup_path().display());
        }

        Ok(())
    }

    fn execute(&self, state: &BuildState, ctx: &ExecContext) -> Result<RawToolResult> {
        let layout = self.layout(state);
        let request = ToolRequest {
            step: self.spec.step,
            mode: state.mode,
            layout: &layout,
            timeout: self.timeout,
            cancel: &ctx.cancel,
            transcript: state
                .working_directory
                .join("logs")
                .join(format!("{}.log", self.spec.step.slug())),
        };
        self.tools.for_family(self.spec.tool).invoke(&request)
    }

    fn classify(&self, state: &BuildState, raw: &RawToolResult) -> StepOutcome {
        let step = self.spec.step;
        let logs = raw.log_paths.clone();
        let fail = |kind: ErrorKind, detail: String| {
            StepOutcome::failed(step, kind, detail).with_log_paths(logs.clone())
        };

        match raw.termination {
            Termination::TimedOut => {
                return fail(
                    ErrorKind::Timeout,
                    format!(
                        "{} did not finish within {}s and was terminated",
                        self.spec.tool,
                        self.timeout.as_secs()
                    ),
                )
            }
            Termination::Cancelled => {
                return fail(
                    ErrorKind::Cancelled,
                    format!("{} was stopped by the user", self.spec.tool),
                )
            }
            Termination::Exited => {}
        }

        let layout = self.layout(state);
        let text = mask_build_names(&read_logs(&raw.log_paths), &layout);
        let classification = self.rules.classify(&text);
        match (classification.verdict, classification.marker) {
            (Verdict::Failed(kind), Some(marker)) => {
                return fail(kind, format!("{} logged \"{}\"", self.spec.tool, marker.trim()));
            }
            (Verdict::Failed(kind), None) if self.require_success_marker => {
                return fail(
                    kind,
                    format!("{} logs contain no completion marker", self.spec.tool),
                );
            }
            _ => {}
        }

        if let Some(code) = raw.exit_code.filter(|code| *code != 0) {
            return fail(
                ErrorKind::ToolReportedError,
                format!("{} exited with code {}", self.spec.tool, code),
            );
        }

        let no_cancel = CancelToken::new();
        for late in self.spec.late_outputs {
            let path = layout.path(*late);
            if !wait_for_file(&path, self.artifact_wait, LATE_OUTPUT_POLL, &no_cancel) {
                warn!("{} did not appear within {:?}", path.display(), self.artifact_wait);
            }
        }

        for artifact in self.spec.verifies {
            if !layout.is_present(*artifact) {
                return fail(
                    ErrorKind::MissingArtifact,
                    format!(
                        "{} missing or empty after {}: {}",
                        artifact,
                        step,
                        layout.path(*artifact).display()
                    ),
                );
            }
        }

        StepOutcome::succeeded(step, self.describe_outputs(&layout)).with_log_paths(logs)
    }

    fn cleanup(&self, state: &BuildState, outcome: &StepOutcome) -> Result<()> {
        let layout = self.layout(state);
        match outcome.status {
            StepStatus::Failed => {
                for output in self.spec.produces {
                    remove_path(&layout.path(*output))?;
                }
                let backup = layout.backup_path();
                if self.spec.edits_plugin && backup.is_file() {
                    info!("Restoring {} from backup", layout.plugin());
                    fs::copy(&backup, layout.plugin_path())?;
                    remove_path(&backup)?;
                }
            }
            StepStatus::Succeeded => {
                for retired in self.spec.retires {
                    debug!("{} no longer needed after {}", retired, outcome.step);
                    remove_path(&layout.path(*retired))?;
                }
                if self.spec.edits_plugin {
                    remove_path(&layout.backup_path())?;
                }
            }
            StepStatus::Skipped => {}
        }
        Ok(())
    }
}

/// Register a [`ToolStep`] for every step, configured from settings.
pub fn build_catalog(settings: &Settings, tools: Arc<ToolSet>) -> Result<StepCatalog> {
    let data_dir = settings.data_dir()?;
    let rules = settings.rule_set()?;
    let mut catalog = StepCatalog::new();
    for step in Step::ALL {
        let tool_step = ToolStep::new(step, Arc::clone(&tools), &data_dir, rules.clone())
            .with_timeout(settings.timeout_for(step))
            .with_artifact_wait(Duration::from_secs(settings.artifact_wait_secs));
        let tool_step = if settings.classifier.require_success_marker {
            tool_step.with_success_marker_required(true)
        } else {
            tool_step
        };
        catalog.register(Box::new(tool_step));
    }
    Ok(catalog)
}

/// Describe the artifact, for listings.
pub fn artifact_summary(artifacts: &[Artifact]) -> String {
    if artifacts.is_empty() {
        return "-".to_string();
    }
    artifacts
        .iter()
        .map(|a| a.describe())
        .collect::<Vec<_>>()
        .join(", ")
}
