//! External tool collaborators.
//!
//! Each collaborator knows how to build the command line for its tool, which
//! log files the tool writes, and how to clear stale logs before a run. The
//! process itself is always run through [`process::run_supervised`].
//!
//! - [`creation_kit`] - precombine, PSG, CDX and previs generation
//! - [`xedit`] - merging the generated plugins back into the mod
//! - [`archive`] - Archive2 / BSArch packing

pub mod archive;
pub mod creation_kit;
pub mod process;
pub mod xedit;

pub use archive::Archiver;
pub use creation_kit::CreationKit;
pub use process::{run_supervised, ProcessOutcome, ProcessSpec};
pub use xedit::XEdit;

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::config::Settings;
use crate::error::{PrevisError, Result};
use crate::pipeline::{
    ArchiveTool, BuildMode, CancelToken, DataLayout, RawToolResult, Step, StepFailure, ToolFamily,
};

/// Everything a collaborator needs for one invocation.
#[derive(Debug)]
pub struct ToolRequest<'a> {
    pub step: Step,
    pub mode: BuildMode,
    pub layout: &'a DataLayout,
    pub timeout: Duration,
    pub cancel: &'a CancelToken,
    /// Where the stdout/stderr transcript goes.
    pub transcript: PathBuf,
}

/// A program that performs the external work of one or more steps.
pub trait ToolCollaborator {
    fn family(&self) -> ToolFamily;

    /// Display name for messages.
    fn name(&self) -> String;

    /// Step-specific checks that need tool knowledge, run during precheck.
    fn preflight(&self, _step: Step, _layout: &DataLayout) -> std::result::Result<(), StepFailure> {
        Ok(())
    }

    /// Run the tool. Returns once the process has exited or been killed and
    /// its logs are closed.
    fn invoke(&self, request: &ToolRequest<'_>) -> Result<RawToolResult>;
}

/// Remove the tool's own log files before a run so classification never
/// reads output from a previous attempt.
pub(crate) fn clear_stale_logs(logs: &[PathBuf]) -> Result<()> {
    for log in logs {
        if log.is_file() {
            debug!("Removing stale log {}", log.display());
            crate::pipeline::remove_path(log)?;
        }
    }
    Ok(())
}

/// The transcript followed by every tool log that exists after the run.
pub(crate) fn collect_logs(transcript: &Path, candidates: &[PathBuf]) -> Vec<PathBuf> {
    let mut logs = vec![transcript.to_path_buf()];
    logs.extend(candidates.iter().filter(|p| p.is_file()).cloned());
    logs
}

/// Build a [`RawToolResult`] from a finished process.
pub(crate) fn raw_result(outcome: ProcessOutcome, logs: Vec<PathBuf>) -> RawToolResult {
    let base = match outcome.termination {
        crate::pipeline::Termination::Exited => {
            RawToolResult::exited(outcome.exit_code.unwrap_or(-1), outcome.duration)
        }
        crate::pipeline::Termination::TimedOut => RawToolResult::timed_out(outcome.duration),
        crate::pipeline::Termination::Cancelled => RawToolResult::cancelled(outcome.duration),
    };
    base.with_logs(logs)
}

/// The three collaborators a build uses.
pub struct ToolSet {
    creation_kit: Box<dyn ToolCollaborator>,
    xedit: Box<dyn ToolCollaborator>,
    archiver: Box<dyn ToolCollaborator>,
}

impl ToolSet {
    pub fn new(
        creation_kit: Box<dyn ToolCollaborator>,
        xedit: Box<dyn ToolCollaborator>,
        archiver: Box<dyn ToolCollaborator>,
    ) -> Self {
        Self {
            creation_kit,
            xedit,
            archiver,
        }
    }

    /// Build the real collaborators from settings, checking that every
    /// executable exists. Missing installations are fatal before the build.
    pub fn from_settings(settings: &Settings, archive_tool: ArchiveTool) -> Result<Self> {
        let game_root = settings.game_root()?;
        let creation_kit = require("Creation Kit", settings.creation_kit_path()?)?;
        let xedit = require(
            "xEdit",
            settings
                .xedit_path()
                .ok_or_else(|| PrevisError::ConfigValidationError {
                    message: "xEdit path is not configured (tools.xedit or --xedit-path)"
                        .to_string(),
                })?,
        )?;
        let archiver = require(
            match archive_tool {
                ArchiveTool::Archive2 => "Archive2",
                ArchiveTool::BSArch => "BSArch",
            },
            settings.archiver_path(archive_tool)?,
        )?;

        Ok(Self::new(
            Box::new(CreationKit::new(
                creation_kit,
                game_root.clone(),
                settings.logs.creation_kit.clone(),
            )),
            Box::new(XEdit::new(xedit, game_root, settings.logs.xedit.clone())),
            Box::new(Archiver::new(archive_tool, archiver)),
        ))
    }

    pub fn for_family(&self, family: ToolFamily) -> &dyn ToolCollaborator {
        match family {
            ToolFamily::CreationKit => self.creation_kit.as_ref(),
            ToolFamily::XEdit => self.xedit.as_ref(),
            ToolFamily::Archiver => self.archiver.as_ref(),
        }
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("creation_kit", &self.creation_kit.name())
            .field("xedit", &self.xedit.name())
            .field("archiver", &self.archiver.name())
            .finish()
    }
}

fn require(tool: &str, path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(PrevisError::ToolNotFound {
            tool: tool.to_string(),
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn clear_stale_logs_removes_only_files() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("CreationKit.log");
        let dir = temp.path().join("Logs");
        fs::write(&log, "old run").unwrap();
        fs::create_dir(&dir).unwrap();

        clear_stale_logs(&[log.clone(), dir.clone(), temp.path().join("missing.log")]).unwrap();
        assert!(!log.exists());
        assert!(dir.exists());
    }

    #[test]
    fn collect_logs_puts_transcript_first() {
        let temp = TempDir::new().unwrap();
        let present = temp.path().join("present.log");
        fs::write(&present, "x").unwrap();
        let transcript = temp.path().join("step.log");

        let logs = collect_logs(&transcript, &[temp.path().join("absent.log"), present.clone()]);
        assert_eq!(logs, vec![transcript, present]);
    }

    #[test]
    fn tool_set_requires_existing_executables() {
        let temp = TempDir::new().unwrap();
        let mut settings = Settings::default();
        settings.tools.fallout4 = Some(temp.path().to_path_buf());
        settings.tools.xedit = Some(temp.path().join("FO4Edit.exe"));

        let err = ToolSet::from_settings(&settings, ArchiveTool::Archive2).unwrap_err();
        match err {
            PrevisError::ToolNotFound { tool, .. } => assert_eq!(tool, "Creation Kit"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn tool_set_builds_when_everything_is_installed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("CreationKit.exe"), "").unwrap();
        fs::write(root.join("FO4Edit.exe"), "").unwrap();
        fs::create_dir_all(root.join("Tools/Archive2")).unwrap();
        fs::write(root.join("Tools/Archive2/Archive2.exe"), "").unwrap();

        let mut settings = Settings::default();
        settings.tools.fallout4 = Some(root.to_path_buf());
        settings.tools.xedit = Some(root.join("FO4Edit.exe"));

        let tools = ToolSet::from_settings(&settings, ArchiveTool::Archive2).unwrap();
        assert_eq!(
            tools.for_family(ToolFamily::Archiver).family(),
            ToolFamily::Archiver
        );
        assert_eq!(tools.for_family(ToolFamily::XEdit).name(), "xEdit");
    }
}
