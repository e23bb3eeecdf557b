//! Small platform helpers: well-known directories, CI detection and
//! interrupt handling.

use std::env;
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::flag;

/// Exit code used when a second interrupt arrives before the run halts.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Well-known directories.
pub mod dirs {
    use std::env;
    use std::path::PathBuf;

    /// The current user's home directory.
    pub fn home_dir() -> Option<PathBuf> {
        let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
        env::var_os(var)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    }

    /// `~/Documents`, where the game keeps its per-user logs.
    pub fn documents_dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join("Documents"))
    }

    /// System temporary directory (`%TEMP%` on Windows).
    pub fn temp_dir() -> PathBuf {
        env::temp_dir()
    }
}

/// Check if running in a CI environment.
pub fn is_ci() -> bool {
    env::var("CI").is_ok()
        || env::var("GITHUB_ACTIONS").is_ok()
        || env::var("GITLAB_CI").is_ok()
        || env::var("JENKINS_URL").is_ok()
}

/// Route Ctrl-C and SIGTERM to `cancelled`.
///
/// The first signal only sets the flag, so the running tool is stopped and
/// the report is written. A second signal exits immediately.
pub fn install_interrupt_handler(cancelled: Arc<AtomicBool>) -> io::Result<()> {
    for signal in [SIGINT, SIGTERM] {
        // Registered first, so it sees the flag before this signal sets it.
        flag::register_conditional_shutdown(signal, FORCED_EXIT_CODE, Arc::clone(&cancelled))?;
        flag::register(signal, Arc::clone(&cancelled))?;
    }
    Ok(())
}
