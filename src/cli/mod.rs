//! Command-line interface for previsbine.
//!
//! This module provides the CLI argument parsing using clap's derive macros
//! and command implementations.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{CleanArgs, Cli, Commands, CompletionsArgs, RunArgs, StatusArgs, StepsArgs};
pub use commands::{Command, CommandDispatcher, CommandResult};
