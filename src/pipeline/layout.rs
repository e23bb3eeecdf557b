//! Where build artifacts live inside the game's `Data` directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::contract::CancelToken;
use super::registry::Artifact;

/// Attempts made by [`remove_path`] before giving up.
const REMOVE_ATTEMPTS: u32 = 3;

/// Empty plugin shipped with the previs scripts, copied to start a new patch.
pub const TEMPLATE_PLUGIN: &str = "xPrevisPatch.esp";

/// Artifact paths for one plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    data_dir: PathBuf,
    plugin: String,
}

impl DataLayout {
    pub fn new(data_dir: impl Into<PathBuf>, plugin: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            plugin: plugin.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Plugin name without its extension.
    pub fn plugin_base(&self) -> &str {
        Path::new(&self.plugin)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.plugin)
    }

    pub fn plugin_path(&self) -> PathBuf {
        self.data_dir.join(&self.plugin)
    }

    /// Copy of the plugin taken before xEdit edits it.
    pub fn backup_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.backup", self.plugin))
    }

    /// Creation Kit output directory for precombined meshes.
    pub fn precombined_dir(&self) -> PathBuf {
        self.data_dir.join("PreCombined")
    }

    /// Creation Kit output directory for visibility data.
    pub fn previs_dir(&self) -> PathBuf {
        self.data_dir.join("Temp")
    }

    pub fn path(&self, artifact: Artifact) -> PathBuf {
        let base = self.plugin_base();
        match artifact {
            Artifact::Plugin => self.plugin_path(),
            Artifact::PrecombinedMeshes => self.precombined_dir(),
            Artifact::CombinedObjectsPlugin => self.data_dir.join("CombinedObjects.esp"),
            Artifact::GeometryPsg => self.data_dir.join(format!("{} - Geometry.psg", base)),
            Artifact::GeometryArchive => self.data_dir.join(format!("{} - Geometry.ba2", base)),
            Artifact::GeometryCsg => self.data_dir.join(format!("{} - Geometry.csg", base)),
            Artifact::Cdx => self.data_dir.join(format!("{}.cdx", base)),
            Artifact::VisibilityData => self.previs_dir(),
            Artifact::PrevisPlugin => self.data_dir.join("Previs.esp"),
            Artifact::VisArchive => self.data_dir.join(format!("{} - Vis.ba2", base)),
        }
    }

    /// Intermediate files and directories the build leaves behind.
    pub fn working_paths(&self) -> Vec<PathBuf> {
        vec![
            self.path(Artifact::PrecombinedMeshes),
            self.path(Artifact::CombinedObjectsPlugin),
            self.path(Artifact::GeometryPsg),
            self.path(Artifact::VisibilityData),
            self.path(Artifact::PrevisPlugin),
            self.backup_path(),
        ]
    }

    /// Everything a build writes for this plugin, excluding the plugin itself.
    pub fn generated_paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![
            self.path(Artifact::GeometryArchive),
            self.path(Artifact::GeometryCsg),
            self.path(Artifact::Cdx),
            self.path(Artifact::VisArchive),
        ];
        paths.extend(self.working_paths());
        paths
    }

    pub fn template_path(&self) -> PathBuf {
        self.data_dir.join(TEMPLATE_PLUGIN)
    }

    /// Create the plugin by copying [`TEMPLATE_PLUGIN`].
    pub fn create_plugin_from_template(&self) -> io::Result<PathBuf> {
        let template = self.template_path();
        if !template.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not found in {}", TEMPLATE_PLUGIN, self.data_dir.display()),
            ));
        }
        let target = self.plugin_path();
        if target.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", self.plugin),
            ));
        }
        fs::copy(&template, &target)?;
        Ok(target)
    }

    /// Whether the artifact is there in usable form: a non-empty file, or a
    /// directory holding at least one file of the expected type.
    pub fn is_present(&self, artifact: Artifact) -> bool {
        let path = self.path(artifact);
        match artifact.directory_extension() {
            Some(ext) => count_files_with_extension(&path, ext) > 0,
            None => is_non_empty_file(&path),
        }
    }
}

/// Count files below `dir` whose extension matches `ext`, ignoring case.
pub fn count_files_with_extension(dir: &Path, ext: &str) -> usize {
    if !dir.is_dir() {
        return 0;
    }
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        })
        .count()
}

pub fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

/// Remove a file or directory tree. A missing path is not an error.
///
/// Windows tools sometimes hold files open for a moment after exiting, so
/// removal is retried a few times.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let mut attempt = 1;
    loop {
        let result = if path.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        match result {
            Ok(()) => {
                debug!("Removed {}", path.display());
                return Ok(());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) if attempt < REMOVE_ATTEMPTS => {
                warn!(
                    "Failed to remove {} (attempt {}): {}",
                    path.display(),
                    attempt,
                    e
                );
                attempt += 1;
                thread::sleep(Duration::from_millis(200 * u64::from(attempt)));
            }
            Err(e) => return Err(e),
        }
    }
}

/// Paths removed and paths that could not be, from [`remove_paths`].
#[derive(Debug, Default)]
pub struct RemovalReport {
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, io::Error)>,
}

impl RemovalReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Remove every existing path, carrying on past failures.
pub fn remove_paths(paths: &[PathBuf]) -> RemovalReport {
    let mut report = RemovalReport::default();
    for path in paths.iter().filter(|p| p.exists()) {
        match remove_path(path) {
            Ok(()) => report.removed.push(path.clone()),
            Err(e) => report.failed.push((path.clone(), e)),
        }
    }
    report
}

/// Wait until `path` is a non-empty file.
///
/// Returns `false` if the deadline passes or the run is cancelled first.
pub fn wait_for_file(
    path: &Path,
    timeout: Duration,
    interval: Duration,
    cancel: &CancelToken,
) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if is_non_empty_file(path) {
            return true;
        }
        if cancel.is_cancelled() || Instant::now() >= deadline {
            return false;
        }
        thread::sleep(interval.min(deadline.saturating_duration_since(Instant::now())));
    }
}
