//! The fixed catalogue of pipeline steps.
//!
//! Each [`StepSpec`] names the tool family that runs the step, the artifacts
//! it needs and the artifacts it creates. Every artifact has exactly one
//! producing step, which is what lets a failed step clean up after itself
//! without touching anything an earlier step made.

use std::fmt;
use std::time::Duration;

use super::step::{BuildMode, Step};

/// The external program family a step drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolFamily {
    CreationKit,
    XEdit,
    Archiver,
}

impl fmt::Display for ToolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolFamily::CreationKit => f.write_str("Creation Kit"),
            ToolFamily::XEdit => f.write_str("xEdit"),
            ToolFamily::Archiver => f.write_str("Archiver"),
        }
    }
}

/// A file or directory that moves between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// The plugin being built. Supplied by the user, produced by no step.
    Plugin,
    /// Loose precombined `.nif` meshes.
    PrecombinedMeshes,
    /// `CombinedObjects.esp` written by the Creation Kit.
    CombinedObjectsPlugin,
    /// `<base> - Geometry.psg`.
    GeometryPsg,
    /// `<base> - Geometry.ba2`.
    GeometryArchive,
    /// `<base> - Geometry.csg`.
    GeometryCsg,
    /// `<base>.cdx`.
    Cdx,
    /// Loose `.uvd` visibility files.
    VisibilityData,
    /// `Previs.esp` written by the Creation Kit.
    PrevisPlugin,
    /// `<base> - Vis.ba2`.
    VisArchive,
}

impl Artifact {
    pub const ALL: [Artifact; 10] = [
        Artifact::Plugin,
        Artifact::PrecombinedMeshes,
        Artifact::CombinedObjectsPlugin,
        Artifact::GeometryPsg,
        Artifact::GeometryArchive,
        Artifact::GeometryCsg,
        Artifact::Cdx,
        Artifact::VisibilityData,
        Artifact::PrevisPlugin,
        Artifact::VisArchive,
    ];

    /// Directory artifacts are checked by counting files with this extension.
    pub fn directory_extension(&self) -> Option<&'static str> {
        match self {
            Artifact::PrecombinedMeshes => Some("nif"),
            Artifact::VisibilityData => Some("uvd"),
            _ => None,
        }
    }

    /// The step that creates this artifact, if any.
    pub fn producer(&self) -> Option<Step> {
        STEP_SPECS
            .iter()
            .find(|spec| spec.produces.contains(self))
            .map(|spec| spec.step)
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Artifact::Plugin => "plugin",
            Artifact::PrecombinedMeshes => "precombined meshes",
            Artifact::CombinedObjectsPlugin => "CombinedObjects.esp",
            Artifact::GeometryPsg => "geometry PSG",
            Artifact::GeometryArchive => "geometry archive",
            Artifact::GeometryCsg => "geometry CSG",
            Artifact::Cdx => "CDX",
            Artifact::VisibilityData => "visibility data",
            Artifact::PrevisPlugin => "Previs.esp",
            Artifact::VisArchive => "visibility archive",
        }
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Static metadata for one step.
#[derive(Debug)]
pub struct StepSpec {
    pub step: Step,
    pub tool: ToolFamily,
    /// Only part of the sequence in [`BuildMode::Clean`].
    pub clean_only: bool,
    /// Inputs that must be present before the tool runs.
    pub consumes: &'static [Artifact],
    /// Outputs this step owns. Stale copies are cleared before it runs and
    /// partial copies are removed when it fails.
    pub produces: &'static [Artifact],
    /// Outputs that must exist and be non-empty for the step to succeed.
    pub verifies: &'static [Artifact],
    /// Outputs the tool may finish writing after its process exits.
    pub late_outputs: &'static [Artifact],
    /// Inputs that are no longer needed once this step succeeds.
    pub retires: &'static [Artifact],
    /// The step edits the plugin in place and needs a backup.
    pub edits_plugin: bool,
    pub default_timeout: Duration,
}

impl StepSpec {
    pub fn applies_to(&self, mode: BuildMode) -> bool {
        !self.clean_only || mode == BuildMode::Clean
    }
}

static STEP_SPECS: [StepSpec; 8] = [
    StepSpec {
        step: Step::GeneratePrecombined,
        tool: ToolFamily::CreationKit,
        clean_only: false,
        consumes: &[Artifact::Plugin],
        produces: &[
            Artifact::PrecombinedMeshes,
            Artifact::CombinedObjectsPlugin,
            Artifact::GeometryPsg,
        ],
        verifies: &[Artifact::PrecombinedMeshes, Artifact::CombinedObjectsPlugin],
        late_outputs: &[Artifact::CombinedObjectsPlugin],
        retires: &[],
        edits_plugin: false,
        default_timeout: Duration::from_secs(1800),
    },
    StepSpec {
        step: Step::MergeCombinedObjects,
        tool: ToolFamily::XEdit,
        clean_only: false,
        consumes: &[Artifact::Plugin, Artifact::CombinedObjectsPlugin],
        produces: &[],
        verifies: &[Artifact::Plugin],
        late_outputs: &[],
        retires: &[],
        edits_plugin: true,
        default_timeout: Duration::from_secs(1200),
    },
    StepSpec {
        step: Step::ArchiveMeshes,
        tool: ToolFamily::Archiver,
        clean_only: false,
        consumes: &[Artifact::PrecombinedMeshes],
        produces: &[Artifact::GeometryArchive],
        verifies: &[Artifact::GeometryArchive],
        late_outputs: &[],
        retires: &[Artifact::PrecombinedMeshes],
        edits_plugin: false,
        default_timeout: Duration::from_secs(600),
    },
    StepSpec {
        step: Step::CompressPSG,
        tool: ToolFamily::CreationKit,
        clean_only: true,
        consumes: &[Artifact::GeometryPsg],
        produces: &[Artifact::GeometryCsg],
        verifies: &[Artifact::GeometryCsg],
        late_outputs: &[],
        retires: &[Artifact::GeometryPsg],
        edits_plugin: false,
        default_timeout: Duration::from_secs(600),
    },
    StepSpec {
        step: Step::BuildCDX,
        tool: ToolFamily::CreationKit,
        clean_only: true,
        consumes: &[Artifact::GeometryArchive],
        produces: &[Artifact::Cdx],
        verifies: &[Artifact::Cdx],
        late_outputs: &[],
        retires: &[],
        edits_plugin: false,
        default_timeout: Duration::from_secs(900),
    },
    StepSpec {
        step: Step::GeneratePrevis,
        tool: ToolFamily::CreationKit,
        clean_only: false,
        consumes: &[Artifact::Plugin],
        produces: &[Artifact::VisibilityData, Artifact::PrevisPlugin],
        verifies: &[Artifact::VisibilityData, Artifact::PrevisPlugin],
        late_outputs: &[Artifact::PrevisPlugin],
        retires: &[],
        edits_plugin: false,
        default_timeout: Duration::from_secs(2400),
    },
    StepSpec {
        step: Step::MergePrevis,
        tool: ToolFamily::XEdit,
        clean_only: false,
        consumes: &[Artifact::Plugin, Artifact::PrevisPlugin],
        produces: &[],
        verifies: &[Artifact::Plugin],
        late_outputs: &[],
        retires: &[],
        edits_plugin: true,
        default_timeout: Duration::from_secs(1200),
    },
    StepSpec {
        step: Step::FinalPackaging,
        tool: ToolFamily::Archiver,
        clean_only: false,
        consumes: &[Artifact::VisibilityData, Artifact::GeometryArchive],
        produces: &[Artifact::VisArchive],
        verifies: &[Artifact::VisArchive, Artifact::GeometryArchive],
        late_outputs: &[],
        retires: &[Artifact::VisibilityData],
        edits_plugin: false,
        default_timeout: Duration::from_secs(600),
    },
];

/// Metadata for a step.
pub fn spec_for(step: Step) -> &'static StepSpec {
    &STEP_SPECS[step.index()]
}

/// All step specs in pipeline order.
pub fn all_specs() -> &'static [StepSpec] {
    &STEP_SPECS
}

/// The ordered sequence of steps that run in `mode`.
pub fn steps_for(mode: BuildMode) -> Vec<Step> {
    STEP_SPECS
        .iter()
        .filter(|spec| spec.applies_to(mode))
        .map(|spec| spec.step)
        .collect()
}

/// The first step of `mode`'s sequence that is not in `completed`.
pub fn next_step(mode: BuildMode, completed: &[Step]) -> Option<Step> {
    steps_for(mode)
        .into_iter()
        .find(|step| !completed.contains(step))
}
