//! The build pipeline.
//!
//! - [`step`] - the eight steps, build modes and archive tools
//! - [`registry`] - per-step metadata and mode-dependent sequencing
//! - [`classifier`] - log marker rules
//! - [`contract`] - the [`PipelineStep`] interface
//! - [`tool_step`] - the tool-backed implementation of that interface
//! - [`state`] - resumable build state and the last-run report
//! - [`sequencer`] - the state machine that runs it all
//!
//! # Example
//!
//! ```
//! use previsbine::pipeline::{steps_for, BuildMode, Step};
//!
//! let steps = steps_for(BuildMode::Filtered);
//! assert_eq!(steps.len(), 6);
//! assert!(!steps.contains(&Step::CompressPSG));
//! ```

pub mod classifier;
pub mod contract;
pub mod layout;
pub mod outcome;
pub mod registry;
pub mod sequencer;
pub mod state;
pub mod step;
pub mod tool_step;

pub use classifier::{classify, Classification, Rule, RuleSet, Verdict};
pub use contract::{CancelToken, ExecContext, PipelineStep, RawToolResult, StepCatalog, Termination};
pub use layout::{
    count_files_with_extension, remove_path, remove_paths, DataLayout, RemovalReport, TEMPLATE_PLUGIN,
};
pub use outcome::{ErrorKind, StepFailure, StepOutcome, StepStatus};
pub use registry::{all_specs, next_step, spec_for, steps_for, Artifact, StepSpec, ToolFamily};
pub use sequencer::{resume_build, start_build, RunStatus, Sequencer, StatusRecord};
pub use state::{BuildState, HaltReport, RunPhase};
pub use step::{ArchiveTool, BuildMode, Step};
pub use tool_step::{artifact_summary, build_catalog, ToolStep};
