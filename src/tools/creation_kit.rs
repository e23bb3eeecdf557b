//! Creation Kit command-line generation.

use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::pipeline::{BuildMode, DataLayout, RawToolResult, Step, ToolFamily};
use crate::sys::dirs;

use super::{clear_stale_logs, collect_logs, raw_result, run_supervised, ProcessSpec};
use super::{ToolCollaborator, ToolRequest};

/// Drives `CreationKit.exe` for the four generation steps.
#[derive(Debug, Clone)]
pub struct CreationKit {
    executable: PathBuf,
    game_root: PathBuf,
    extra_logs: Vec<PathBuf>,
}

impl CreationKit {
    pub fn new(executable: PathBuf, game_root: PathBuf, extra_logs: Vec<PathBuf>) -> Self {
        Self {
            executable,
            game_root,
            extra_logs,
        }
    }

    /// Every place the Creation Kit (or its fixes plugin) may write its log.
    pub fn log_candidates(&self, layout: &DataLayout) -> Vec<PathBuf> {
        let mut logs = vec![self.game_root.join("Logs").join("CreationKit.log")];
        if let Some(docs) = dirs::documents_dir() {
            logs.push(
                docs.join("My Games")
                    .join("Fallout4")
                    .join("Logs")
                    .join("CreationKit.log"),
            );
        }
        logs.push(layout.data_dir().join("Logs").join("CreationKit.log"));
        logs.extend(self.extra_logs.iter().cloned());
        logs
    }
}

/// Command-line arguments for `step`.
pub fn creation_kit_args(step: Step, mode: BuildMode, layout: &DataLayout) -> Vec<String> {
    let plugin = layout.plugin();
    let data = format!("-DataPath:{}", layout.data_dir().display());
    let mode_flag = match mode {
        BuildMode::Clean => None,
        BuildMode::Filtered => Some("-FilteredOnly:1".to_string()),
        BuildMode::Xbox => Some("-XboxOne:1".to_string()),
    };

    let mut args = match step {
        Step::GeneratePrecombined => vec![
            format!("-GeneratePrecombined:{}", plugin),
            data,
            format!("-OutputPath:{}", layout.precombined_dir().display()),
        ],
        Step::CompressPSG => vec![format!("-CompressPSG:{}", plugin), data],
        Step::BuildCDX => vec![format!("-BuildCDX:{}", plugin), data],
        Step::GeneratePrevis => vec![
            format!("-GeneratePrevis:{}", plugin),
            data,
            format!("-OutputPath:{}", layout.previs_dir().display()),
        ],
        _ => Vec::new(),
    };
    if matches!(step, Step::GeneratePrecombined | Step::GeneratePrevis) {
        args.extend(mode_flag);
    }
    args
}

impl ToolCollaborator for CreationKit {
    fn family(&self) -> ToolFamily {
        ToolFamily::CreationKit
    }

    fn name(&self) -> String {
        "Creation Kit".to_string()
    }

    fn invoke(&self, request: &ToolRequest<'_>) -> Result<RawToolResult> {
        let candidates = self.log_candidates(request.layout);
        clear_stale_logs(&candidates)?;

        let spec = ProcessSpec::new(&self.executable)
            .args(creation_kit_args(request.step, request.mode, request.layout))
            .cwd(&self.game_root);
        info!("{}: {}", request.step, spec.display());

        let outcome = run_supervised(&spec, request.timeout, request.cancel, &request.transcript)?;
        let logs = collect_logs(&outcome.transcript, &candidates);
        Ok(raw_result(outcome, logs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> DataLayout {
        DataLayout::new("/fo4/Data", "MyMod.esp")
    }

    #[test]
    fn precombined_args_for_clean_mode() {
        let args = creation_kit_args(Step::GeneratePrecombined, BuildMode::Clean, &layout());
        assert_eq!(
            args,
            vec![
                "-GeneratePrecombined:MyMod.esp",
                "-DataPath:/fo4/Data",
                "-OutputPath:/fo4/Data/PreCombined",
            ]
        );
    }

    #[test]
    fn generation_steps_carry_mode_flag() {
        let filtered = creation_kit_args(Step::GeneratePrevis, BuildMode::Filtered, &layout());
        assert_eq!(filtered.last().unwrap(), "-FilteredOnly:1");
        let xbox = creation_kit_args(Step::GeneratePrecombined, BuildMode::Xbox, &layout());
        assert_eq!(xbox.last().unwrap(), "-XboxOne:1");
    }

    #[test]
    fn psg_and_cdx_have_no_output_path() {
        let psg = creation_kit_args(Step::CompressPSG, BuildMode::Clean, &layout());
        assert_eq!(psg, vec!["-CompressPSG:MyMod.esp", "-DataPath:/fo4/Data"]);
        let cdx = creation_kit_args(Step::BuildCDX, BuildMode::Clean, &layout());
        assert_eq!(cdx[0], "-BuildCDX:MyMod.esp");
    }

    #[test]
    fn log_candidates_include_game_and_data_logs() {
        let ck = CreationKit::new(
            PathBuf::from("/fo4/CreationKit.exe"),
            PathBuf::from("/fo4"),
            vec![PathBuf::from("/custom/ck.log")],
        );
        let logs = ck.log_candidates(&layout());
        assert_eq!(logs[0], PathBuf::from("/fo4/Logs/CreationKit.log"));
        assert!(logs.contains(&PathBuf::from("/fo4/Data/Logs/CreationKit.log")));
        assert_eq!(logs.last().unwrap(), &PathBuf::from("/custom/ck.log"));
    }
}
