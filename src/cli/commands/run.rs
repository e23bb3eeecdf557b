//! Run command implementation.
//!
//! The `previsbine run` command asks for whatever the flags and config leave
//! open, then drives the pipeline until it completes or halts. The report is
//! written either way, so a halted build can be resumed later.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::cli::args::RunArgs;
use crate::config::{load_settings, validate, validate_plugin_name, Settings};
use crate::error::{PrevisError, Result};
use crate::pipeline::{
    build_catalog, remove_paths, resume_build, start_build, BuildMode, BuildState, CancelToken,
    DataLayout, ErrorKind, RunPhase, RunStatus, Sequencer, StatusRecord, Step, StepCatalog,
    StepStatus, TEMPLATE_PLUGIN,
};
use crate::tools::ToolSet;
use crate::ui::{BuildSummary, Prompt, PromptOption, SpinnerHandle, UserInterface};

use super::dispatcher::{config_failure, Command, CommandResult, EXIT_CANCELLED, EXIT_HALTED};

/// A build ready to run: its starting state and where its files live.
#[derive(Debug)]
struct BuildPlan {
    state: BuildState,
    layout: DataLayout,
}

/// The run command implementation.
pub struct RunCommand {
    working_dir: PathBuf,
    config_file: Option<PathBuf>,
    cancel: CancelToken,
    args: RunArgs,
}

impl RunCommand {
    /// Create a new run command.
    pub fn new(working_dir: &Path, args: RunArgs) -> Self {
        Self {
            working_dir: working_dir.to_path_buf(),
            config_file: None,
            cancel: CancelToken::new(),
            args,
        }
    }

    pub fn with_config_file(mut self, config_file: Option<&Path>) -> Self {
        self.config_file = config_file.map(Path::to_path_buf);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get the command arguments.
    pub fn args(&self) -> &RunArgs {
        &self.args
    }

    /// Settings with the command-line tool paths applied.
    fn settings(&self) -> Result<Settings> {
        let mut settings = load_settings(&self.working_dir, self.config_file.as_deref())?;
        if let Some(path) = &self.args.fallout4_path {
            settings.tools.fallout4 = Some(path.clone());
        }
        if let Some(path) = &self.args.xedit_path {
            settings.tools.xedit = Some(path.clone());
        }
        validate(&settings)?;
        Ok(settings)
    }

    fn plan(&self, settings: &Settings, ui: &mut dyn UserInterface) -> Result<BuildPlan> {
        let plugin = self.choose_plugin(ui)?;
        let layout = DataLayout::new(settings.data_dir()?, plugin.clone());
        self.ensure_plugin(&layout, ui)?;

        let prior = self.prior_build(&plugin)?;
        let resume_from = self.choose_resume_point(prior.as_ref(), ui)?;

        let state = match (resume_from, prior) {
            (Some(from), Some(mut prior)) if self.args.mode.is_none_or(|m| m == prior.mode) => {
                prior.working_directory = self.working_dir.clone();
                if let Some(tool) = self.args.archive_tool {
                    prior.archive_tool = tool;
                }
                resume_build(prior, from)?
            }
            (resume_from, _) => {
                let mode = self.choose_mode(settings, ui)?;
                let archive_tool = self
                    .args
                    .archive_tool
                    .unwrap_or_else(|| settings.archive_tool());
                let fresh = start_build(plugin, mode, &self.working_dir, archive_tool);
                match resume_from {
                    Some(from) => {
                        ui.warning(&format!(
                            "No halted {} build of {} on record; steps before {} are assumed done",
                            mode, fresh.plugin, from
                        ));
                        resume_build(fresh, from)?
                    }
                    None => fresh,
                }
            }
        };

        Ok(BuildPlan { state, layout })
    }

    fn choose_plugin(&self, ui: &mut dyn UserInterface) -> Result<String> {
        if let Some(name) = &self.args.plugin {
            return validate_plugin_name(name);
        }

        let prompt = Prompt::input("plugin", "Plugin to build (e.g. MyMod.esp)");
        loop {
            let answer = ui.prompt(&prompt)?.as_string();
            match validate_plugin_name(&answer) {
                Ok(plugin) => return Ok(plugin),
                Err(e) if ui.is_interactive() => ui.warning(&e.to_string()),
                Err(e) => return Err(e),
            }
        }
    }

    /// Make sure the plugin is in `Data`, offering to create it from the
    /// template plugin when it is not.
    fn ensure_plugin(&self, layout: &DataLayout, ui: &mut dyn UserInterface) -> Result<()> {
        if layout.plugin_path().is_file() {
            return Ok(());
        }

        let missing = || PrevisError::InvalidPlugin {
            name: layout.plugin().to_string(),
            reason: format!("not found in {}", layout.data_dir().display()),
        };
        if !layout.template_path().is_file() {
            return Err(missing());
        }

        let create = self.args.yes
            || ui
                .prompt(&Prompt::confirm(
                    "create_plugin",
                    &format!(
                        "{} does not exist. Create it from {}?",
                        layout.plugin(),
                        TEMPLATE_PLUGIN
                    ),
                    true,
                ))?
                .as_bool();
        if !create {
            return Err(missing());
        }

        let path = layout.create_plugin_from_template()?;
        info!("Created {} from {}", path.display(), TEMPLATE_PLUGIN);
        ui.success(&format!("Created {} from {}", layout.plugin(), TEMPLATE_PLUGIN));
        Ok(())
    }

    /// The last report, if it belongs to this plugin.
    fn prior_build(&self, plugin: &str) -> Result<Option<BuildState>> {
        Ok(BuildState::load_report(&self.working_dir)?
            .filter(|state| state.plugin.eq_ignore_ascii_case(plugin)))
    }

    fn choose_resume_point(
        &self,
        prior: Option<&BuildState>,
        ui: &mut dyn UserInterface,
    ) -> Result<Option<Step>> {
        if let Some(step) = self.args.resume_from {
            return Ok(Some(step));
        }
        let Some(prior) = prior else {
            return Ok(None);
        };
        let Some(report) = prior.halt_report() else {
            return Ok(None);
        };
        if self.args.mode.is_some_and(|mode| mode != prior.mode) {
            return Ok(None);
        }

        let mut options = vec![PromptOption::new("Start a new build", "fresh")];
        options.extend(
            prior
                .resume_points()
                .into_iter()
                .map(|step| PromptOption::new(format!("Resume from {}", step), step.slug())),
        );
        let prompt = Prompt::select(
            "resume",
            &format!(
                "The last {} build halted at {} ({}). Resume?",
                prior.mode, report.step, report.kind
            ),
            options,
        )
        .with_default("fresh");

        let answer = ui.prompt(&prompt)?.as_string();
        if answer == "fresh" {
            return Ok(None);
        }
        Step::from_str(&answer)
            .map(Some)
            .map_err(|message| PrevisError::ConfigValidationError { message })
    }

    fn choose_mode(&self, settings: &Settings, ui: &mut dyn UserInterface) -> Result<BuildMode> {
        if let Some(mode) = self.args.mode.or(settings.build_mode) {
            return Ok(mode);
        }

        let options = BuildMode::ALL
            .iter()
            .map(|mode| PromptOption::new(mode_label(*mode), mode.as_str()))
            .collect();
        let prompt = Prompt::select("mode", "Build mode", options)
            .with_default(BuildMode::default().as_str());
        let answer = ui.prompt(&prompt)?.as_string();
        BuildMode::from_str(&answer).map_err(|message| PrevisError::ConfigValidationError { message })
    }

    fn show_plan(&self, plan: &BuildPlan, ui: &mut dyn UserInterface) {
        let state = &plan.state;
        ui.show_header(&format!("Building {}", state.plugin));
        ui.message(&format!("  Mode:      {}", state.mode));
        ui.message(&format!("  Archiver:  {}", state.archive_tool));
        ui.message(&format!("  Data:      {}", plan.layout.data_dir().display()));

        let total = state.sequence().len();
        let remaining = total - state.settled_steps().len();
        match (state.resumed_from, state.next_step()) {
            (Some(_), Some(next)) => ui.message(&format!(
                "  Resuming:  {} ({} of {} steps left)",
                next, remaining, total
            )),
            _ => ui.message(&format!("  Steps:     {}", total)),
        }
    }

    fn run_plan(
        &self,
        plan: BuildPlan,
        catalog: &StepCatalog,
        ui: &mut dyn UserInterface,
    ) -> Result<CommandResult> {
        self.show_plan(&plan, ui);
        if !self.args.yes {
            let proceed = ui
                .prompt(&Prompt::confirm("proceed", "Proceed with build?", true))?
                .as_bool();
            if !proceed {
                ui.message("Build not started.");
                return Ok(CommandResult::success());
            }
        }

        let BuildPlan { state, layout } = plan;
        let started = Instant::now();
        let state = self.drive(catalog, state, ui);
        let elapsed = started.elapsed();

        match state.save_report() {
            Ok(path) => info!("Run report written to {}", path.display()),
            Err(e) => ui.warning(&format!("Could not write the run report: {}", e)),
        }

        ui.show_summary(&BuildSummary::from_state(&state, elapsed));

        match &state.phase {
            RunPhase::Completed => {
                ui.success(&format!("Previs data for {} is ready", state.plugin));
                self.offer_cleanup(&layout, ui)?;
                Ok(CommandResult::success())
            }
            RunPhase::Halted(report) => {
                ui.show_halt(report);
                ui.show_hint(&format!(
                    "Resume with: previsbine run {} --resume-from {}",
                    state.plugin,
                    report.step.slug()
                ));
                if report.kind == ErrorKind::Cancelled {
                    Ok(CommandResult::failure(EXIT_CANCELLED))
                } else {
                    Ok(CommandResult::failure(EXIT_HALTED))
                }
            }
            phase => Err(PrevisError::StateError {
                message: format!("run ended in a non-terminal phase: {:?}", phase),
            }),
        }
    }

    /// Run the sequencer, turning status records into spinners.
    fn drive(
        &self,
        catalog: &StepCatalog,
        state: BuildState,
        ui: &mut dyn UserInterface,
    ) -> BuildState {
        let sequencer = Sequencer::new(catalog, self.cancel.clone());
        let mut spinner: Option<Box<dyn SpinnerHandle>> = None;
        let state = sequencer
            .run_to_completion_or_halt(state, |record| show_status(ui, &mut spinner, record));
        if let Some(mut spinner) = spinner.take() {
            spinner.finish_error("interrupted");
        }
        state
    }

    fn offer_cleanup(&self, layout: &DataLayout, ui: &mut dyn UserInterface) -> Result<()> {
        let leftovers: Vec<PathBuf> = layout
            .working_paths()
            .into_iter()
            .filter(|p| p.exists())
            .collect();
        if leftovers.is_empty() {
            return Ok(());
        }

        let remove = self.args.yes
            || ui
                .prompt(&Prompt::confirm(
                    "cleanup",
                    "Remove working files (CombinedObjects.esp, Previs.esp, loose meshes)?",
                    true,
                ))?
                .as_bool();
        if !remove {
            return Ok(());
        }

        let report = remove_paths(&leftovers);
        for (path, e) in &report.failed {
            ui.warning(&format!("Could not remove {}: {}", path.display(), e));
        }
        if !report.removed.is_empty() {
            ui.message(&format!("Removed {} working files", report.removed.len()));
        }
        Ok(())
    }
}

fn mode_label(mode: BuildMode) -> &'static str {
    match mode {
        BuildMode::Clean => "Clean (full rebuild with PSG compression and CDX)",
        BuildMode::Filtered => "Filtered (filtered-only previs, no PSG or CDX)",
        BuildMode::Xbox => "Xbox (Xbox One previs, no PSG or CDX)",
    }
}

fn show_status(
    ui: &mut dyn UserInterface,
    spinner: &mut Option<Box<dyn SpinnerHandle>>,
    record: &StatusRecord,
) {
    match (record.status, record.step) {
        (RunStatus::Running, Some(step)) => {
            *spinner = Some(ui.start_spinner(&format!(
                "[{}/{}] {}",
                record.position, record.total, step
            )));
        }
        (RunStatus::Finished(status), Some(step)) => {
            let line = if record.message.is_empty() {
                step.to_string()
            } else {
                format!("{} ({})", step, record.message)
            };
            let mut handle = spinner
                .take()
                .unwrap_or_else(|| ui.start_spinner(&step.to_string()));
            match status {
                StepStatus::Succeeded => handle.finish_success(&line),
                StepStatus::Skipped => handle.finish_skipped(&line),
                StepStatus::Failed => handle.finish_error(&line),
            }
        }
        _ => debug!("{}", record.message),
    }
}

impl Command for RunCommand {
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let settings = match self.settings() {
            Ok(settings) => settings,
            Err(e) => return config_failure(ui, e),
        };
        let plan = match self.plan(&settings, ui) {
            Ok(plan) => plan,
            Err(e) => return config_failure(ui, e),
        };
        let tools = match ToolSet::from_settings(&settings, plan.state.archive_tool) {
            Ok(tools) => tools,
            Err(e) => return config_failure(ui, e),
        };
        let catalog = build_catalog(&settings, Arc::new(tools))?;

        self.run_plan(plan, &catalog, ui)
    }
}
