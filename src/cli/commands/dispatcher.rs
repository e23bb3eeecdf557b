//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use std::path::{Path, PathBuf};

use crate::cli::args::{Cli, Commands, RunArgs};
use crate::error::{PrevisError, Result};
use crate::pipeline::CancelToken;
use crate::ui::UserInterface;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command.
    ///
    /// # Arguments
    ///
    /// * `ui` - User interface for displaying output and prompts
    ///
    /// # Returns
    ///
    /// A [`CommandResult`] indicating success/failure and exit code.
    fn execute(&self, ui: &mut dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Exit code for a build that halted on a step failure.
pub const EXIT_HALTED: i32 = 1;
/// Exit code for configuration and argument problems found before a build.
pub const EXIT_CONFIG: i32 = 2;
/// Exit code for a build stopped by Ctrl+C.
pub const EXIT_CANCELLED: i32 = 130;

/// Report a problem the user has to fix before a build can start.
///
/// Configuration and plugin errors become [`EXIT_CONFIG`]; anything else is
/// passed back to the caller.
pub(crate) fn config_failure(
    ui: &mut dyn UserInterface,
    error: PrevisError,
) -> Result<CommandResult> {
    match error {
        PrevisError::ConfigNotFound { .. }
        | PrevisError::ConfigParseError { .. }
        | PrevisError::ConfigValidationError { .. }
        | PrevisError::InvalidPlugin { .. }
        | PrevisError::ToolNotFound { .. }
        | PrevisError::InvalidRule { .. }
        | PrevisError::StateError { .. } => {
            ui.error(&error.to_string());
            Ok(CommandResult::failure(EXIT_CONFIG))
        }
        other => Err(other),
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    working_dir: PathBuf,
    config_file: Option<PathBuf>,
    cancel: CancelToken,
}

impl CommandDispatcher {
    /// Create a new dispatcher for the given working directory.
    pub fn new(working_dir: PathBuf) -> Self {
        Self {
            working_dir,
            config_file: None,
            cancel: CancelToken::new(),
        }
    }

    /// Load settings from this file instead of discovering them.
    pub fn with_config_file(mut self, config_file: Option<PathBuf>) -> Self {
        self.config_file = config_file;
        self
    }

    /// Share a cancellation token with the signal handler.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get the working directory.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Dispatch and execute a command.
    ///
    /// Routes the CLI subcommand to the appropriate command implementation
    /// and executes it.
    pub fn dispatch(&self, cli: &Cli, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let config = self.config_file.as_deref();
        match &cli.command {
            Some(Commands::Run(args)) => self.run(args.clone(), ui),
            Some(Commands::Steps(args)) => {
                let cmd = super::steps::StepsCommand::new(&self.working_dir, args.clone())
                    .with_config_file(config);
                cmd.execute(ui)
            }
            Some(Commands::Status(args)) => {
                let cmd = super::status::StatusCommand::new(&self.working_dir, args.clone());
                cmd.execute(ui)
            }
            Some(Commands::Clean(args)) => {
                let cmd = super::clean::CleanCommand::new(&self.working_dir, args.clone())
                    .with_config_file(config);
                cmd.execute(ui)
            }
            Some(Commands::Completions(args)) => {
                let cmd = super::completions::CompletionsCommand::new(args.clone());
                cmd.execute(ui)
            }
            // Default to run command with default args
            None => self.run(RunArgs::default(), ui),
        }
    }

    fn run(&self, args: RunArgs, ui: &mut dyn UserInterface) -> Result<CommandResult> {
        let cmd = super::run::RunCommand::new(&self.working_dir, args)
            .with_config_file(self.config_file.as_deref())
            .with_cancel(self.cancel.clone());
        cmd.execute(ui)
    }
}
