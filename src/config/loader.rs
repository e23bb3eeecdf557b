//! Configuration file discovery and loading.
//!
//! Unlike a project that must be initialised first, a build directory needs
//! no configuration file at all: every layer is optional and missing layers
//! fall back to [`Settings::default`].

use crate::config::merger::merge_configs;
use crate::config::schema::Settings;
use crate::error::{PrevisError, Result};
use crate::sys::dirs;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_DIR: &str = ".previsbine";
pub const PROJECT_CONFIG: &str = "previsbine.yml";
pub const LOCAL_CONFIG: &str = "previsbine.local.yml";

/// Paths to configuration files in merge order (later overrides earlier).
///
/// 1. User global config (`~/.previsbine/config.yml`)
/// 2. Project config (`previsbine.yml`)
/// 3. Local overrides (`previsbine.local.yml`)
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    pub user_global: Option<PathBuf>,
    pub project: Option<PathBuf>,
    pub project_local: Option<PathBuf>,
}

impl ConfigPaths {
    /// Discover config files for the given working directory.
    pub fn discover(working_dir: &Path) -> Self {
        Self::discover_with_home(working_dir, dirs::home_dir().as_deref())
    }

    /// Like [`ConfigPaths::discover`], with an explicit home directory.
    pub fn discover_with_home(working_dir: &Path, home: Option<&Path>) -> Self {
        Self {
            user_global: home
                .map(|h| h.join(CONFIG_DIR).join("config.yml"))
                .filter(|p| p.is_file()),
            project: Some(working_dir.join(PROJECT_CONFIG)).filter(|p| p.is_file()),
            project_local: Some(working_dir.join(LOCAL_CONFIG)).filter(|p| p.is_file()),
        }
    }

    /// All existing config paths in merge order.
    pub fn all_existing(&self) -> Vec<&PathBuf> {
        [&self.user_global, &self.project, &self.project_local]
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Load a config file as a raw YAML value, for merging.
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist and
/// `ConfigParseError` if the YAML is invalid.
pub fn load_config_value(path: &Path) -> Result<serde_yaml::Value> {
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PrevisError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            PrevisError::Io(e)
        }
    })?;

    serde_yaml::from_str(&content).map_err(|e| PrevisError::ConfigParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Parse YAML content into [`Settings`].
pub fn parse_settings(content: &str, source_path: &Path) -> Result<Settings> {
    if content.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(content).map_err(|e| PrevisError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Discover and merge every layer for `working_dir`.
pub fn load_merged_settings(working_dir: &Path) -> Result<Settings> {
    merge_paths(&ConfigPaths::discover(working_dir), working_dir)
}

fn merge_paths(paths: &ConfigPaths, working_dir: &Path) -> Result<Settings> {
    let mut layers = Vec::new();
    for path in paths.all_existing() {
        layers.push(load_config_value(path)?);
    }

    serde_yaml::from_value(merge_configs(&layers)).map_err(|e| PrevisError::ConfigParseError {
        path: working_dir.join(PROJECT_CONFIG),
        message: format!("Failed to parse merged config: {}", e),
    })
}

/// Load settings, honouring `--config`.
///
/// An explicit file is loaded on its own, without merging.
pub fn load_settings(working_dir: &Path, config_override: Option<&Path>) -> Result<Settings> {
    match config_override {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PrevisError::ConfigNotFound {
                        path: path.to_path_buf(),
                    }
                } else {
                    PrevisError::Io(e)
                }
            })?;
            parse_settings(&content, path)
        }
        None => load_merged_settings(working_dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ArchiveTool, BuildMode};
    use tempfile::TempDir;

    #[test]
    fn discover_finds_nothing_in_empty_dir() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::discover_with_home(temp.path(), None);
        assert!(paths.all_existing().is_empty());
    }

    #[test]
    fn all_existing_returns_in_merge_order() {
        let home = TempDir::new().unwrap();
        let work = TempDir::new().unwrap();
        fs::create_dir_all(home.path().join(CONFIG_DIR)).unwrap();
        fs::write(home.path().join(CONFIG_DIR).join("config.yml"), "").unwrap();
        fs::write(work.path().join(PROJECT_CONFIG), "").unwrap();
        fs::write(work.path().join(LOCAL_CONFIG), "").unwrap();

        let paths = ConfigPaths::discover_with_home(work.path(), Some(home.path()));
        let all = paths.all_existing();
        assert_eq!(all.len(), 3);
        assert!(all[0].starts_with(home.path()));
        assert!(all[2].ends_with(LOCAL_CONFIG));
    }

    #[test]
    fn missing_configs_give_defaults() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::discover_with_home(temp.path(), None);
        let settings = merge_paths(&paths, temp.path()).unwrap();
        assert_eq!(settings.artifact_wait_secs, 60);
        assert!(settings.tools.fallout4.is_none());
    }

    #[test]
    fn local_overrides_project() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(PROJECT_CONFIG),
            "build_mode: filtered\ntools:\n  fallout4: /fo4\n",
        )
        .unwrap();
        fs::write(
            temp.path().join(LOCAL_CONFIG),
            "build_mode: xbox\narchive_tool: bsarch\n",
        )
        .unwrap();

        let paths = ConfigPaths::discover_with_home(temp.path(), None);
        let settings = merge_paths(&paths, temp.path()).unwrap();
        assert_eq!(settings.build_mode(), BuildMode::Xbox);
        assert_eq!(settings.archive_tool(), ArchiveTool::BSArch);
        assert_eq!(settings.tools.fallout4, Some(PathBuf::from("/fo4")));
    }

    #[test]
    fn empty_layer_does_not_clear_others() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PROJECT_CONFIG), "artifact_wait_secs: 3\n").unwrap();
        fs::write(temp.path().join(LOCAL_CONFIG), "").unwrap();

        let paths = ConfigPaths::discover_with_home(temp.path(), None);
        let settings = merge_paths(&paths, temp.path()).unwrap();
        assert_eq!(settings.artifact_wait_secs, 3);
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(PROJECT_CONFIG);
        fs::write(&path, "tools: [unclosed").unwrap();
        let err = load_config_value(&path).unwrap_err();
        assert!(matches!(err, PrevisError::ConfigParseError { .. }));
    }

    #[test]
    fn wrong_type_is_parse_error() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PROJECT_CONFIG), "artifact_wait_secs: soon\n").unwrap();
        let paths = ConfigPaths::discover_with_home(temp.path(), None);
        assert!(matches!(
            merge_paths(&paths, temp.path()),
            Err(PrevisError::ConfigParseError { .. })
        ));
    }

    #[test]
    fn override_file_is_loaded_alone() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PROJECT_CONFIG), "build_mode: xbox\n").unwrap();
        let custom = temp.path().join("custom.yml");
        fs::write(&custom, "artifact_wait_secs: 1\n").unwrap();

        let settings = load_settings(temp.path(), Some(&custom)).unwrap();
        assert_eq!(settings.artifact_wait_secs, 1);
        assert_eq!(settings.build_mode(), BuildMode::Clean);
    }

    #[test]
    fn missing_override_is_not_found() {
        let temp = TempDir::new().unwrap();
        let err = load_settings(temp.path(), Some(&temp.path().join("nope.yml"))).unwrap_err();
        assert!(matches!(err, PrevisError::ConfigNotFound { .. }));
    }
}
