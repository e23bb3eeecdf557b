//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! # Architecture
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations. This allows:
//! - Single binary with subcommands (`previsbine run`, `previsbine status`)
//! - Shared settings loading and cancellation handling
//! - Consistent global flag handling

pub mod clean;
pub mod completions;
pub mod dispatcher;
pub mod run;
pub mod status;
pub mod steps;

pub use dispatcher::{Command, CommandDispatcher, CommandResult};
