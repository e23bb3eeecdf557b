//! Configuration schema definitions.
//!
//! These structs map to the YAML configuration file format. Every field is
//! optional; an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{PrevisError, Result};
use crate::pipeline::{spec_for, ArchiveTool, BuildMode, ErrorKind, Rule, RuleSet, Step};

/// Root configuration structure for `previsbine.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Tool installation paths
    pub tools: ToolPaths,

    /// Default build mode when `--mode` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_mode: Option<BuildMode>,

    /// Default archiver when `--archive-tool` is not given
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_tool: Option<ArchiveTool>,

    /// Per-step timeouts in seconds
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub timeouts: BTreeMap<Step, u64>,

    /// How long to wait for plugins the tools write after exiting
    #[serde(default = "default_artifact_wait")]
    pub artifact_wait_secs: u64,

    /// Extra log markers
    pub classifier: ClassifierSettings,

    /// Extra log locations
    pub logs: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            build_mode: None,
            archive_tool: None,
            timeouts: BTreeMap::new(),
            artifact_wait_secs: default_artifact_wait(),
            classifier: ClassifierSettings::default(),
            logs: LogSettings::default(),
        }
    }
}

fn default_artifact_wait() -> u64 {
    60
}

/// Where the game and its tools are installed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    /// Fallout 4 installation directory (contains `Data`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallout4: Option<PathBuf>,

    /// Defaults to `<fallout4>/CreationKit.exe`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_kit: Option<PathBuf>,

    /// FO4Edit executable; no default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xedit: Option<PathBuf>,

    /// Defaults to `<fallout4>/Tools/Archive2/Archive2.exe`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive2: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bsarch: Option<PathBuf>,
}

/// User-supplied log markers, added to the built-in table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failure_markers: Vec<FailureMarker>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub success_markers: Vec<String>,

    /// Treat a log with no marker at all as a failure for every tool,
    /// not only xEdit
    #[serde(default, skip_serializing_if = "is_false")]
    pub require_success_marker: bool,
}

/// A log substring and the failure it indicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureMarker {
    pub pattern: String,
    pub kind: ErrorKind,
}

/// Additional log files to inspect, per tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub creation_kit: Vec<PathBuf>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub xedit: Vec<PathBuf>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Settings {
    /// The Fallout 4 installation directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValidationError` when no game path is configured.
    pub fn game_root(&self) -> Result<PathBuf> {
        self.tools
            .fallout4
            .clone()
            .ok_or_else(|| PrevisError::ConfigValidationError {
                message: "Fallout 4 path is not configured (tools.fallout4 or --fallout4-path)"
                    .to_string(),
            })
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        Ok(self.game_root()?.join("Data"))
    }

    pub fn creation_kit_path(&self) -> Result<PathBuf> {
        match &self.tools.creation_kit {
            Some(path) => Ok(path.clone()),
            None => Ok(self.game_root()?.join("CreationKit.exe")),
        }
    }

    pub fn xedit_path(&self) -> Option<PathBuf> {
        self.tools.xedit.clone()
    }

    /// Executable for the selected archiver. BSArch has no default location.
    pub fn archiver_path(&self, tool: ArchiveTool) -> Result<PathBuf> {
        match tool {
            ArchiveTool::Archive2 => match &self.tools.archive2 {
                Some(path) => Ok(path.clone()),
                None => Ok(self
                    .game_root()?
                    .join("Tools")
                    .join("Archive2")
                    .join("Archive2.exe")),
            },
            ArchiveTool::BSArch => {
                self.tools
                    .bsarch
                    .clone()
                    .ok_or_else(|| PrevisError::ConfigValidationError {
                        message: "BSArch path is not configured (tools.bsarch)".to_string(),
                    })
            }
        }
    }

    pub fn timeout_for(&self, step: Step) -> Duration {
        self.timeouts
            .get(&step)
            .map(|secs| Duration::from_secs(*secs))
            .unwrap_or(spec_for(step).default_timeout)
    }

    /// The built-in marker table extended with the configured markers.
    pub fn rule_set(&self) -> Result<RuleSet> {
        let mut rules = RuleSet::builtin();
        for marker in &self.classifier.failure_markers {
            rules.push(Rule::failure(&marker.pattern, marker.kind)?);
        }
        for pattern in &self.classifier.success_markers {
            rules.push(Rule::success(pattern)?);
        }
        Ok(rules)
    }

    pub fn build_mode(&self) -> BuildMode {
        self.build_mode.unwrap_or_default()
    }

    pub fn archive_tool(&self) -> ArchiveTool {
        self.archive_tool.unwrap_or_default()
    }
}
