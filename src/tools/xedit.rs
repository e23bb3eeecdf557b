//! xEdit script runs that merge generated plugins into the mod.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::pipeline::{DataLayout, RawToolResult, Step, StepFailure, ToolFamily};
use crate::sys::dirs;

use super::{clear_stale_logs, collect_logs, raw_result, run_supervised, ProcessSpec};
use super::{ToolCollaborator, ToolRequest};

const SCRIPT_EXTENSIONS: &[&str] = &["pas", "psc", "txt"];

/// Runs FO4Edit / xEdit with a merge script.
#[derive(Debug, Clone)]
pub struct XEdit {
    executable: PathBuf,
    game_root: PathBuf,
    extra_logs: Vec<PathBuf>,
}

impl XEdit {
    pub fn new(executable: PathBuf, game_root: PathBuf, extra_logs: Vec<PathBuf>) -> Self {
        Self {
            executable,
            game_root,
            extra_logs,
        }
    }

    fn install_dir(&self) -> &Path {
        self.executable.parent().unwrap_or(Path::new("."))
    }

    /// Directories searched for merge scripts, in order.
    pub fn script_dirs(&self, layout: &DataLayout) -> Vec<PathBuf> {
        vec![
            self.install_dir().join("Edit Scripts"),
            layout.data_dir().join("Edit Scripts"),
            self.game_root.join("Edit Scripts"),
        ]
    }

    /// Locate the script for `step`.
    pub fn find_script(&self, step: Step, layout: &DataLayout) -> Option<PathBuf> {
        let stem = script_stem(step)?;
        self.script_dirs(layout).into_iter().find_map(|dir| {
            SCRIPT_EXTENSIONS
                .iter()
                .map(|ext| dir.join(format!("{}.{}", stem, ext)))
                .find(|path| path.is_file())
        })
    }

    pub fn log_candidates(&self, layout: &DataLayout) -> Vec<PathBuf> {
        let mut logs = vec![
            dirs::temp_dir().join("UnattendedScript.log"),
            self.install_dir()
                .join("Edit Scripts")
                .join("Edit Logs")
                .join(format!("{}.log", layout.plugin())),
        ];
        logs.extend(self.extra_logs.iter().cloned());
        logs
    }
}

/// Script name (without extension) that performs `step`'s merge.
pub fn script_stem(step: Step) -> Option<&'static str> {
    match step {
        Step::MergeCombinedObjects => Some("Merge Combined Objects"),
        Step::MergePrevis => Some("Merge Previs"),
        _ => None,
    }
}

pub fn xedit_args(step: Step, layout: &DataLayout) -> Vec<String> {
    let mut args = Vec::new();
    if step == Step::MergeCombinedObjects {
        args.push("-IKnowWhatImDoing".to_string());
        args.push("-AllowMasterFilesEdit".to_string());
    }
    args.push(format!("-D:{}", layout.data_dir().display()));
    if let Some(stem) = script_stem(step) {
        args.push(format!("-script:{}", stem));
    }
    args.push(layout.plugin().to_string());
    args
}

impl ToolCollaborator for XEdit {
    fn family(&self) -> ToolFamily {
        ToolFamily::XEdit
    }

    fn name(&self) -> String {
        "xEdit".to_string()
    }

    fn preflight(&self, step: Step, layout: &DataLayout) -> std::result::Result<(), StepFailure> {
        match (script_stem(step), self.find_script(step, layout)) {
            (Some(stem), None) => Err(StepFailure::missing(format!(
                "xEdit script '{}' not found in {}",
                stem,
                self.script_dirs(layout)
                    .iter()
                    .map(|d| d.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
            _ => Ok(()),
        }
    }

    fn invoke(&self, request: &ToolRequest<'_>) -> Result<RawToolResult> {
        let candidates = self.log_candidates(request.layout);
        clear_stale_logs(&candidates)?;

        let spec = ProcessSpec::new(&self.executable)
            .args(xedit_args(request.step, request.layout))
            .cwd(self.install_dir());
        info!("{}: {}", request.step, spec.display());

        let outcome = run_supervised(&spec, request.timeout, request.cancel, &request.transcript)?;
        let logs = collect_logs(&outcome.transcript, &candidates);
        Ok(raw_result(outcome, logs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn combined_objects_merge_allows_master_edits() {
        let layout = DataLayout::new("/fo4/Data", "MyMod.esp");
        assert_eq!(
            xedit_args(Step::MergeCombinedObjects, &layout),
            vec![
                "-IKnowWhatImDoing",
                "-AllowMasterFilesEdit",
                "-D:/fo4/Data",
                "-script:Merge Combined Objects",
                "MyMod.esp",
            ]
        );
    }

    #[test]
    fn previs_merge_omits_master_flags() {
        let layout = DataLayout::new("/fo4/Data", "MyMod.esp");
        let args = xedit_args(Step::MergePrevis, &layout);
        assert_eq!(args, vec!["-D:/fo4/Data", "-script:Merge Previs", "MyMod.esp"]);
    }

    #[test]
    fn finds_script_in_data_edit_scripts() {
        let temp = TempDir::new().unwrap();
        let data = temp.path().join("Data");
        fs::create_dir_all(data.join("Edit Scripts")).unwrap();
        fs::write(data.join("Edit Scripts").join("Merge Previs.pas"), "unit x;").unwrap();

        let xedit = XEdit::new(
            temp.path().join("xedit").join("FO4Edit.exe"),
            temp.path().to_path_buf(),
            vec![],
        );
        let layout = DataLayout::new(&data, "MyMod.esp");
        assert_eq!(
            xedit.find_script(Step::MergePrevis, &layout),
            Some(data.join("Edit Scripts").join("Merge Previs.pas"))
        );
        assert!(xedit.preflight(Step::MergePrevis, &layout).is_ok());
    }

    #[test]
    fn missing_script_fails_preflight_as_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let xedit = XEdit::new(
            temp.path().join("FO4Edit.exe"),
            temp.path().to_path_buf(),
            vec![],
        );
        let layout = DataLayout::new(temp.path().join("Data"), "MyMod.esp");
        let failure = xedit
            .preflight(Step::MergeCombinedObjects, &layout)
            .unwrap_err();
        assert_eq!(failure.kind, crate::pipeline::ErrorKind::MissingArtifact);
        assert!(failure.detail.contains("Merge Combined Objects"));
    }

    #[test]
    fn edit_log_is_named_after_plugin() {
        let xedit = XEdit::new(
            PathBuf::from("/tools/xedit/FO4Edit.exe"),
            PathBuf::from("/fo4"),
            vec![],
        );
        let layout = DataLayout::new("/fo4/Data", "MyMod.esp");
        assert!(xedit.log_candidates(&layout).contains(&PathBuf::from(
            "/tools/xedit/Edit Scripts/Edit Logs/MyMod.esp.log"
        )));
    }
}
