//! Steps command implementation.
//!
//! The `previsbine steps` command lists the steps a build mode runs, with the
//! tool each one drives and the timeout it gets.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::args::StepsArgs;
use crate::config::{load_settings, Settings};
use crate::error::{PrevisError, Result};
use crate::pipeline::{artifact_summary, spec_for, steps_for, BuildMode};
use crate::ui::{format_duration, Table, UserInterface};

use super::dispatcher::{Command, CommandResult};

/// The steps command implementation.
pub struct StepsCommand {
    working_dir: PathBuf,
    config_file: Option<PathBuf>,
    args: StepsArgs,
}

#[derive(Debug, Serialize)]
struct StepEntry {
    position: usize,
    step: &'static str,
    title: &'static str,
    tool: String,
    produces: String,
    timeout_secs: u64,
}

impl StepsCommand {
    /// Create a new steps command.
    pub fn new(working_dir: &Path, args: StepsArgs) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            config_file: None,
            args,
        }
    }

    pub fn with_config_file(mut self, config_file: Option<&Path>) -> Self {
        self.config_file = config_file.map(Path::to_path_buf);
        self
    }

    fn entries(&self, mode: BuildMode, settings: &Settings) -> Vec<StepEntry> {
        steps_for(mode)
            .into_iter()
            .enumerate()
            .map(|(i, step)| {
                let spec = spec_for(step);
                StepEntry {
                    position: i + 1,
                    step: step.slug(),
                    title: step.title(),
                    tool: spec.tool.to_string(),
                    produces: artifact_summary(spec.produces),
                    timeout_secs: settings.timeout_for(step).as_secs(),
                }
            })
            .collect()
    }
}

impl Command for StepsCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let settings = load_settings(&self.working_dir, self.config_file.as_deref())?;
        let mode = self.args.mode.unwrap_or_else(|| settings.build_mode());
        let entries = self.entries(mode, &settings);

        if self.args.json {
            let json = serde_json::to_string_pretty(&entries)
                .map_err(|e| PrevisError::Other(e.into()))?;
            ui.message(&json);
            return Ok(CommandResult::success());
        }

        ui.show_header(&format!("{} build: {} steps", mode, entries.len()));

        let mut table = Table::new(&["#", "Step", "Tool", "Produces", "Timeout"]);
        for entry in &entries {
            table.add_row(vec![
                entry.position.to_string(),
                entry.title.to_string(),
                entry.tool.clone(),
                entry.produces.clone(),
                format_duration(std::time::Duration::from_secs(entry.timeout_secs)),
            ]);
        }
        ui.message(&table.render());

        if mode != BuildMode::Clean {
            ui.show_hint("Compress PSG and Build CDX only run in clean mode.");
        }

        Ok(CommandResult::success())
    }
}
