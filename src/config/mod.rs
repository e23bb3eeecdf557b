//! Configuration loading, merging and validation.
//!
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Deep merging in [`merger`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use previsbine::config::{load_settings, validate};
//! use tempfile::TempDir;
//! use std::fs;
//!
//! let temp = TempDir::new().unwrap();
//! fs::write(temp.path().join("previsbine.yml"), "build_mode: filtered").unwrap();
//!
//! let settings = load_settings(temp.path(), None).unwrap();
//! validate(&settings).unwrap();
//! assert_eq!(settings.build_mode(), previsbine::pipeline::BuildMode::Filtered);
//! ```
//!
//! # Configuration File Locations
//!
//! Settings are merged in this order, later files winning:
//! 1. User global config (`~/.previsbine/config.yml`)
//! 2. Build directory config (`previsbine.yml`)
//! 3. Local overrides (`previsbine.local.yml`)

pub mod loader;
pub mod merger;
pub mod schema;
pub mod validator;

pub use loader::{
    load_config_value, load_merged_settings, load_settings, parse_settings, ConfigPaths,
};
pub use merger::{deep_merge, merge_configs};
pub use schema::{ClassifierSettings, FailureMarker, LogSettings, Settings, ToolPaths};
pub use validator::{validate, validate_config, validate_plugin_name, ValidationError};
