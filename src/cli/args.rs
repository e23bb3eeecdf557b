//! CLI argument definitions.
//!
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::pipeline::{ArchiveTool, BuildMode, Step};

/// Previsbine - Fallout 4 precombine and previs builds, resumable.
#[derive(Debug, Parser)]
#[command(name = "previsbine")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to config file (skips previsbine.yml discovery)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for transcripts, the run report and previsbine.yml
    /// (defaults to the current directory)
    #[arg(short = 'w', long, global = true)]
    pub working_dir: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build previs data for a plugin (default if no command specified)
    Run(RunArgs),

    /// List the steps a build mode runs
    Steps(StepsArgs),

    /// Show the last run report
    Status(StatusArgs),

    /// Delete build outputs for a plugin
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the `run` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct RunArgs {
    /// Plugin to build, e.g. MyMod.esp (".esp" is added if missing)
    pub plugin: Option<String>,

    /// Build mode: clean, filtered or xbox
    #[arg(short, long)]
    pub mode: Option<BuildMode>,

    /// Archiver: archive2 or bsarch
    #[arg(short, long)]
    pub archive_tool: Option<ArchiveTool>,

    /// Resume the last halted build from this step (name, slug or number)
    #[arg(short, long, value_name = "STEP")]
    pub resume_from: Option<Step>,

    /// Fallout 4 installation directory
    #[arg(long, env = "PREVISBINE_FALLOUT4", value_name = "DIR")]
    pub fallout4_path: Option<PathBuf>,

    /// FO4Edit / xEdit executable
    #[arg(long, env = "PREVISBINE_XEDIT", value_name = "PATH")]
    pub xedit_path: Option<PathBuf>,

    /// Answer yes to confirmations
    #[arg(short, long)]
    pub yes: bool,

    /// Never prompt; use flags, config and defaults
    #[arg(long)]
    pub non_interactive: bool,
}

/// Arguments for the `steps` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct StepsArgs {
    /// Build mode to list (defaults to the configured mode)
    #[arg(short, long)]
    pub mode: Option<BuildMode>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `status` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `clean` command.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct CleanArgs {
    /// Plugin whose outputs are removed
    pub plugin: String,

    /// Fallout 4 installation directory
    #[arg(long, env = "PREVISBINE_FALLOUT4", value_name = "DIR")]
    pub fallout4_path: Option<PathBuf>,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["previsbine"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn run_parses_typed_flags() {
        let cli = Cli::try_parse_from([
            "previsbine",
            "run",
            "MyMod.esp",
            "--mode",
            "filtered",
            "--archive-tool",
            "bsarch",
            "--resume-from",
            "archive-meshes",
            "--yes",
        ])
        .unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.plugin.as_deref(), Some("MyMod.esp"));
        assert_eq!(args.mode, Some(BuildMode::Filtered));
        assert_eq!(args.archive_tool, Some(ArchiveTool::BSArch));
        assert_eq!(args.resume_from, Some(Step::ArchiveMeshes));
        assert!(args.yes);
    }

    #[test]
    fn resume_from_accepts_step_number() {
        let cli = Cli::try_parse_from(["previsbine", "run", "--resume-from", "6"]).unwrap();
        let Some(Commands::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.resume_from, Some(Step::GeneratePrevis));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(Cli::try_parse_from(["previsbine", "run", "--mode", "fast"]).is_err());
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli =
            Cli::try_parse_from(["previsbine", "status", "--working-dir", "/tmp/build", "-q"])
                .unwrap();
        assert_eq!(cli.working_dir, Some(PathBuf::from("/tmp/build")));
        assert!(cli.quiet);
    }

    #[test]
    fn clean_requires_plugin() {
        assert!(Cli::try_parse_from(["previsbine", "clean"]).is_err());
    }
}
