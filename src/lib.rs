//! previsbine - resumable precombine and previs builds for Fallout 4.
//!
//! Generating precombined meshes and previs data means driving the Creation
//! Kit, xEdit and an archiver through eight steps in a fixed order. Any of
//! them can crash or quietly produce nothing. previsbine runs the steps as a
//! state machine, classifies every attempt from the tool's logs and outputs,
//! and halts with a report that says exactly where to resume.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - Settings loading, merging, and validation
//! - [`error`] - Error types and result aliases
//! - [`pipeline`] - Steps, classification, build state and the sequencer
//! - [`sys`] - Platform helpers and interrupt handling
//! - [`tools`] - Creation Kit, xEdit and archiver collaborators
//! - [`ui`] - Interactive prompts, spinners, and terminal output
//!
//! # Example
//!
//! ```
//! use previsbine::pipeline::{start_build, ArchiveTool, BuildMode, Step};
//!
//! let state = start_build("MyMod.esp", BuildMode::Clean, "/tmp/build", ArchiveTool::Archive2);
//! assert_eq!(state.next_step(), Some(Step::GeneratePrecombined));
//! assert_eq!(state.sequence().len(), 8);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod sys;
pub mod tools;
pub mod ui;

pub use error::{PrevisError, Result};
