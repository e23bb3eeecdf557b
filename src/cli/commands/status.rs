//! Status command implementation.
//!
//! The `previsbine status` command shows the last run report: which steps
//! finished, where the build halted and how to resume it.

use std::path::{Path, PathBuf};

use crate::cli::args::StatusArgs;
use crate::error::{PrevisError, Result};
use crate::pipeline::{BuildState, RunPhase, StepStatus};
use crate::ui::{format_relative_time, Table, UserInterface};

use super::dispatcher::{Command, CommandResult};

/// The status command implementation.
pub struct StatusCommand {
    working_dir: PathBuf,
    args: StatusArgs,
}

impl StatusCommand {
    /// Create a new status command.
    pub fn new(working_dir: &Path, args: StatusArgs) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            args,
        }
    }

    /// Get the working directory.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    fn show_history(&self, state: &BuildState, ui: &mut dyn UserInterface) {
        let mut table = Table::new(&["", "Step", "When", "Detail"]);
        for outcome in &state.history {
            table.add_row(vec![
                outcome.status.display_char().to_string(),
                outcome.step.title().to_string(),
                format_relative_time(outcome.timestamp),
                outcome.detail.clone(),
            ]);
        }
        if table.is_empty() {
            ui.message("No steps have run yet.");
        } else {
            ui.message(&table.render());
        }
    }
}

impl Command for StatusCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let Some(state) = BuildState::load_report(&self.working_dir)? else {
            if self.args.json {
                ui.message("null");
            } else {
                ui.message(&format!(
                    "No build report in {}",
                    BuildState::report_path(&self.working_dir).display()
                ));
            }
            return Ok(CommandResult::success());
        };

        if self.args.json {
            let json = serde_json::to_string_pretty(&state)
                .map_err(|e| PrevisError::Other(e.into()))?;
            ui.message(&json);
            return Ok(CommandResult::success());
        }

        ui.show_header(&format!("{} ({} build)", state.plugin, state.mode));
        if let Some(from) = state.resumed_from {
            ui.message(&format!("Resumed from {}", from));
        }
        self.show_history(&state, ui);

        match &state.phase {
            RunPhase::Completed => {
                let skipped = state
                    .history
                    .iter()
                    .filter(|o| o.status == StepStatus::Skipped)
                    .count();
                if skipped > 0 {
                    ui.success(&format!("Build completed ({} skipped)", skipped));
                } else {
                    ui.success("Build completed");
                }
            }
            RunPhase::Halted(report) => {
                ui.show_halt(report);
                ui.show_hint(&format!(
                    "Resume with: previsbine run {} --resume-from {}",
                    state.plugin,
                    report.step.slug()
                ));
            }
            RunPhase::Running { step } => {
                ui.warning(&format!(
                    "The last run stopped while {} was running; it did not finish cleanly.",
                    step
                ));
                ui.show_hint(&format!(
                    "Resume with: previsbine run {} --resume-from {}",
                    state.plugin,
                    step.slug()
                ));
            }
            RunPhase::Idle => ui.message("The last build never started."),
        }

        Ok(CommandResult::success())
    }
}
