//! Pipeline steps, build modes and archive tool selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One stage of the previs build, in pipeline order.
///
/// The derived `Ord` follows declaration order, which is the fixed order in
/// which the stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    GeneratePrecombined,
    MergeCombinedObjects,
    ArchiveMeshes,
    #[serde(rename = "compress-psg")]
    CompressPSG,
    #[serde(rename = "build-cdx")]
    BuildCDX,
    GeneratePrevis,
    MergePrevis,
    FinalPackaging,
}

impl Step {
    /// Every step in pipeline order.
    pub const ALL: [Step; 8] = [
        Step::GeneratePrecombined,
        Step::MergeCombinedObjects,
        Step::ArchiveMeshes,
        Step::CompressPSG,
        Step::BuildCDX,
        Step::GeneratePrevis,
        Step::MergePrevis,
        Step::FinalPackaging,
    ];

    /// Zero-based position in the full pipeline.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Short machine name, as accepted on the command line.
    pub fn slug(self) -> &'static str {
        match self {
            Step::GeneratePrecombined => "generate-precombined",
            Step::MergeCombinedObjects => "merge-combined-objects",
            Step::ArchiveMeshes => "archive-meshes",
            Step::CompressPSG => "compress-psg",
            Step::BuildCDX => "build-cdx",
            Step::GeneratePrevis => "generate-previs",
            Step::MergePrevis => "merge-previs",
            Step::FinalPackaging => "final-packaging",
        }
    }

    /// Human readable name.
    pub fn title(self) -> &'static str {
        match self {
            Step::GeneratePrecombined => "Generate Precombined",
            Step::MergeCombinedObjects => "Merge Combined Objects",
            Step::ArchiveMeshes => "Archive Meshes",
            Step::CompressPSG => "Compress PSG",
            Step::BuildCDX => "Build CDX",
            Step::GeneratePrevis => "Generate Previs",
            Step::MergePrevis => "Merge Previs",
            Step::FinalPackaging => "Final Packaging",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

impl FromStr for Step {
    type Err = String;

    /// Accepts the slug, the title or the variant name in any case, or the
    /// one-based step number.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.trim().parse::<usize>() {
            return n
                .checked_sub(1)
                .and_then(|i| Step::ALL.get(i).copied())
                .ok_or_else(|| format!("step number must be between 1 and 8, got {}", n));
        }
        let wanted = normalize(s);
        Step::ALL
            .iter()
            .copied()
            .find(|step| normalize(step.slug()) == wanted)
            .ok_or_else(|| format!("unknown step: {}", s))
    }
}

/// How the previs data is generated.
///
/// `Clean` is the full rebuild; `Filtered` and `Xbox` skip the PSG
/// compression and CDX stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Clean,
    Filtered,
    Xbox,
}

impl BuildMode {
    pub const ALL: [BuildMode; 3] = [BuildMode::Clean, BuildMode::Filtered, BuildMode::Xbox];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildMode::Clean => "clean",
            BuildMode::Filtered => "filtered",
            BuildMode::Xbox => "xbox",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clean" => Ok(Self::Clean),
            "filtered" => Ok(Self::Filtered),
            "xbox" => Ok(Self::Xbox),
            _ => Err(format!(
                "unknown build mode: {} (expected clean, filtered or xbox)",
                s
            )),
        }
    }
}

/// Which archiver packs the `.ba2` files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArchiveTool {
    #[default]
    #[serde(rename = "archive2")]
    Archive2,
    #[serde(rename = "bsarch")]
    BSArch,
}

impl ArchiveTool {
    pub fn as_str(self) -> &'static str {
        match self {
            ArchiveTool::Archive2 => "archive2",
            ArchiveTool::BSArch => "bsarch",
        }
    }
}

impl fmt::Display for ArchiveTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveTool::Archive2 => f.write_str("Archive2"),
            ArchiveTool::BSArch => f.write_str("BSArch"),
        }
    }
}

impl FromStr for ArchiveTool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "archive2" => Ok(Self::Archive2),
            "bsarch" => Ok(Self::BSArch),
            _ => Err(format!(
                "unknown archive tool: {} (expected archive2 or bsarch)",
                s
            )),
        }
    }
}
