//! Clean command implementation.
//!
//! The `previsbine clean` command deletes everything a build wrote for a
//! plugin so the next build starts from nothing. The plugin itself is kept.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::args::CleanArgs;
use crate::config::{load_settings, validate_plugin_name};
use crate::error::Result;
use crate::pipeline::{remove_paths, DataLayout};
use crate::ui::{Prompt, UserInterface};

use super::dispatcher::{config_failure, Command, CommandResult, EXIT_HALTED};

/// The clean command implementation.
pub struct CleanCommand {
    working_dir: PathBuf,
    config_file: Option<PathBuf>,
    args: CleanArgs,
}

impl CleanCommand {
    /// Create a new clean command.
    pub fn new(working_dir: &Path, args: CleanArgs) -> Self {
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

    fn layout(&self) -> Result<DataLayout> {
        let plugin = validate_plugin_name(&self.args.plugin)?;
        let mut settings = load_settings(&self.working_dir, self.config_file.as_deref())?;
        if let Some(path) = &self.args.fallout4_path {
            settings.tools.fallout4 = Some(path.clone());
        }
        Ok(DataLayout::new(settings.data_dir()?, plugin))
    }
}

impl Command for CleanCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let layout = match self.layout() {
            Ok(layout) => layout,
            Err(e) => return config_failure(ui, e),
        };

        let existing: Vec<PathBuf> = layout
            .generated_paths()
            .into_iter()
            .filter(|p| p.exists())
            .collect();
        if existing.is_empty() {
            ui.message(&format!("Nothing to clean for {}", layout.plugin()));
            return Ok(CommandResult::success());
        }

        ui.show_header(&format!("Clean {}", layout.plugin()));
        for path in &existing {
            ui.message(&format!("  {}", path.display()));
        }

        if !self.args.yes {
            let prompt = Prompt::confirm(
                "clean",
                &format!("Delete {} build outputs?", existing.len()),
                false,
            );
            if !ui.prompt(&prompt)?.as_bool() {
                ui.message("Nothing deleted.");
                return Ok(CommandResult::success());
            }
        }

        let report = remove_paths(&existing);
        info!(
            "Cleaned {}: {} removed, {} failed",
            layout.plugin(),
            report.removed.len(),
            report.failed.len()
        );
        for (path, e) in &report.failed {
            ui.warning(&format!("Could not remove {}: {}", path.display(), e));
        }

        if report.is_clean() {
            ui.success(&format!("Removed {} build outputs", report.removed.len()));
            Ok(CommandResult::success())
        } else {
            Ok(CommandResult::failure(EXIT_HALTED))
        }
    }
}
