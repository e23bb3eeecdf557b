//! Packing loose files into `.ba2` archives.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::pipeline::{Artifact, ArchiveTool, DataLayout, RawToolResult, Step, ToolFamily};

use super::{raw_result, run_supervised, ProcessSpec, ToolCollaborator, ToolRequest};

/// Archive2 or BSArch.
#[derive(Debug, Clone)]
pub struct Archiver {
    tool: ArchiveTool,
    executable: PathBuf,
}

impl Archiver {
    pub fn new(tool: ArchiveTool, executable: PathBuf) -> Self {
        Self { tool, executable }
    }
}

/// Source directory and target archive for an archiving step.
pub fn archive_job(step: Step, layout: &DataLayout) -> Option<(PathBuf, PathBuf)> {
    match step {
        Step::ArchiveMeshes => Some((
            layout.precombined_dir(),
            layout.path(Artifact::GeometryArchive),
        )),
        Step::FinalPackaging => Some((layout.previs_dir(), layout.path(Artifact::VisArchive))),
        _ => None,
    }
}

pub fn archive_args(tool: ArchiveTool, source: &Path, archive: &Path) -> Vec<String> {
    let source = source.display().to_string();
    let archive = archive.display().to_string();
    match tool {
        ArchiveTool::Archive2 => vec![
            archive,
            "-create".to_string(),
            "-compress".to_string(),
            "-root".to_string(),
            source,
        ],
        ArchiveTool::BSArch => vec![
            "pack".to_string(),
            source,
            archive,
            "-z".to_string(),
            "1".to_string(),
            "-fo4".to_string(),
        ],
    }
}

impl ToolCollaborator for Archiver {
    fn family(&self) -> ToolFamily {
        ToolFamily::Archiver
    }

    fn name(&self) -> String {
        self.tool.to_string()
    }

    fn invoke(&self, request: &ToolRequest<'_>) -> Result<RawToolResult> {
        let Some((source, archive)) = archive_job(request.step, request.layout) else {
            return Err(anyhow::anyhow!("{} is not an archiving step", request.step).into());
        };

        let spec = ProcessSpec::new(&self.executable)
            .args(archive_args(self.tool, &source, &archive))
            .cwd(request.layout.data_dir());
        info!("{}: {}", request.step, spec.display());

        let outcome = run_supervised(&spec, request.timeout, request.cancel, &request.transcript)?;
        let logs = vec![outcome.transcript.clone()];
        let artifacts = if archive.is_file() {
            vec![archive]
        } else {
            Vec::new()
        };
        Ok(raw_result(outcome, logs).with_artifacts(artifacts))
    }
}
