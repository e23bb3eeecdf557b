//! Error types for previsbine operations.
//!
//! This module defines [`PrevisError`], the error type for everything that
//! happens *around* the pipeline (configuration, tool discovery, report I/O),
//! and a [`Result`] type alias for convenience.
//!
//! # Error Handling Strategy
//!
//! - Step failures are data: they are recorded as
//!   [`StepOutcome`](crate::pipeline::StepOutcome)s and end the run in a
//!   halted state, they never surface as `PrevisError`
//! - Use `PrevisError` for faults that stop a command before or after a run
//! - Use `anyhow::Error` (via `PrevisError::Other`) for unexpected errors

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for previsbine operations.
#[derive(Debug, Error)]
pub enum PrevisError {
    /// Configuration file not found at expected location.
    #[error("Configuration not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Failed to parse configuration file.
    #[error("Failed to parse config at {path}: {message}")]
    ConfigParseError { path: PathBuf, message: String },

    /// Invalid configuration structure or values.
    #[error("Invalid configuration: {message}")]
    ConfigValidationError { message: String },

    /// Plugin name rejected before the build starts.
    #[error("Invalid plugin '{name}': {reason}")]
    InvalidPlugin { name: String, reason: String },

    /// A required external tool is not installed where configured.
    #[error("{tool} not found at {path}")]
    ToolNotFound { tool: String, path: PathBuf },

    /// An external tool could not be started.
    #[error("Failed to launch {tool}: {message}")]
    ToolLaunch { tool: String, message: String },

    /// A classifier rule could not be compiled.
    #[error("Invalid log marker '{pattern}': {message}")]
    InvalidRule { pattern: String, message: String },

    /// Build state transition rejected.
    #[error("Invalid build state: {message}")]
    StateError { message: String },

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic wrapped error for anyhow interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias for previsbine operations.
pub type Result<T> = std::result::Result<T, PrevisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_parse_error_displays_path_and_message() {
        let err = PrevisError::ConfigParseError {
            path: PathBuf::from("/previsbine.yml"),
            message: "invalid syntax".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/previsbine.yml"));
        assert!(msg.contains("invalid syntax"));
    }

    #[test]
    fn invalid_plugin_displays_name_and_reason() {
        let err = PrevisError::InvalidPlugin {
            name: "Fallout4.esm".into(),
            reason: "base game master".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Fallout4.esm"));
        assert!(msg.contains("base game master"));
    }

    #[test]
    fn tool_not_found_displays_tool_and_path() {
        let err = PrevisError::ToolNotFound {
            tool: "Creation Kit".into(),
            path: PathBuf::from("/games/fo4/CreationKit.exe"),
        };
        let msg = err.to_string();
        assert!(msg.contains("Creation Kit"));
        assert!(msg.contains("CreationKit.exe"));
    }

    #[test]
    fn invalid_rule_displays_pattern() {
        let err = PrevisError::InvalidRule {
            pattern: "OUT OF".into(),
            message: "bad".into(),
        };
        assert!(err.to_string().contains("OUT OF"));
    }

    #[test]
    fn io_error_converts_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: PrevisError = io_err.into();
        assert!(matches!(err, PrevisError::Io(_)));
    }

    #[test]
    fn anyhow_error_is_transparent() {
        let err: PrevisError = anyhow::anyhow!("tool exploded").into();
        assert_eq!(err.to_string(), "tool exploded");
    }
}
