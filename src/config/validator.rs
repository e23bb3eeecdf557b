//! Validation of settings and plugin names before a build starts.

use crate::config::schema::Settings;
use crate::error::{PrevisError, Result};
use crate::pipeline::Step;

/// Base-game and DLC masters that must never be rebuilt.
pub const BASE_GAME_MASTERS: &[&str] = &[
    "Fallout4.esm",
    "DLCRobot.esm",
    "DLCworkshop01.esm",
    "DLCCoast.esm",
    "DLCworkshop02.esm",
    "DLCworkshop03.esm",
    "DLCNukaWorld.esm",
    "DLCUltraHighResolution.esm",
];

/// Plugin names the build itself writes, compared without extension.
pub const RESERVED_BUILD_NAMES: &[&str] = &["previs", "combinedobjects", "xprevispatch"];

pub const PLUGIN_EXTENSIONS: &[&str] = &["esp", "esm", "esl"];

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    pub message: String,
    pub step: Option<Step>,
}

/// Validate settings and return every problem found.
pub fn validate_config(settings: &Settings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (step, secs) in &settings.timeouts {
        if *secs == 0 {
            errors.push(ValidationError {
                rule: "zero-timeout".to_string(),
                message: format!("Timeout for '{}' must be greater than zero", step.slug()),
                step: Some(*step),
            });
        }
    }

    for marker in &settings.classifier.failure_markers {
        if marker.pattern.trim().is_empty() {
            errors.push(ValidationError {
                rule: "empty-marker".to_string(),
                message: "Failure marker patterns must not be empty".to_string(),
                step: None,
            });
        }
    }
    if settings
        .classifier
        .success_markers
        .iter()
        .any(|p| p.trim().is_empty())
    {
        errors.push(ValidationError {
            rule: "empty-marker".to_string(),
            message: "Success marker patterns must not be empty".to_string(),
            step: None,
        });
    }

    errors
}

/// Validate and return Result.
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate(settings: &Settings) -> Result<()> {
    let errors = validate_config(settings);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(PrevisError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}

/// Check a plugin name and normalise it.
///
/// A name without a plugin extension gets `.esp` appended.
///
/// # Errors
///
/// Returns `InvalidPlugin` for empty names, names containing spaces,
/// base-game masters and names the build reserves for its own output.
pub fn validate_plugin_name(name: &str) -> Result<String> {
    let invalid = |reason: &str| PrevisError::InvalidPlugin {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(invalid("plugin name cannot be empty"));
    }
    if trimmed.contains(char::is_whitespace) {
        return Err(invalid("plugin name cannot contain spaces"));
    }

    let has_extension = trimmed
        .rsplit_once('.')
        .is_some_and(|(_, ext)| PLUGIN_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e)));
    let plugin = if has_extension {
        trimmed.to_string()
    } else {
        format!("{}.esp", trimmed)
    };

    if BASE_GAME_MASTERS
        .iter()
        .any(|master| master.eq_ignore_ascii_case(&plugin))
    {
        return Err(invalid("base game masters cannot be rebuilt"));
    }

    let stem = plugin
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&plugin)
        .to_lowercase();
    if RESERVED_BUILD_NAMES.contains(&stem.as_str()) {
        return Err(invalid("this name is reserved for build output"));
    }

    Ok(plugin)
}
