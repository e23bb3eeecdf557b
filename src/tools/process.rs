//! Supervised execution of external tools.
//!
//! The tool runs in its own process group so that on timeout or
//! cancellation the whole tree can be killed, not just the direct child.
//! Both output streams are copied line by line into a transcript file that
//! holds nothing but the tool's own output, since it is classified as a log.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{PrevisError, Result};
use crate::pipeline::{CancelToken, Termination};

/// How often the child is polled.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Time between the polite and the forced kill.
const KILL_GRACE: Duration = Duration::from_secs(2);

/// How long to keep draining output after the child is gone.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// A program invocation.
#[derive(Debug, Clone, Default)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// The command line as it would be typed, for logs.
    pub fn display(&self) -> String {
        let mut parts = vec![quote(&self.program.display().to_string())];
        parts.extend(self.args.iter().map(|a| quote(a)));
        parts.join(" ")
    }
}

fn quote(s: &str) -> String {
    if s.contains(' ') {
        format!("\"{}\"", s)
    } else {
        s.to_string()
    }
}

/// How a supervised process ended.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    /// Exit code (None if killed).
    pub exit_code: Option<i32>,
    pub termination: Termination,
    pub duration: Duration,
    pub transcript: PathBuf,
}

enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Forward every line of `stream` until EOF.
///
/// Lines are read as bytes; invalid UTF-8 is replaced rather than ending
/// the copy, so the pipe is always drained.
fn pump(stream: impl Read, tx: mpsc::Sender<OutputLine>, wrap: fn(String) -> OutputLine) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']).to_string();
                // The receiver may be gone after the drain grace; keep
                // reading so the tool never blocks on a full pipe.
                let _ = tx.send(wrap(line));
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Output pipe closed: {}", e);
                break;
            }
        }
    }
}

/// Run `spec` to completion, killing it on timeout or cancellation.
///
/// Only a failure to start the program is an error; every way the program
/// can end is reported in the returned [`ProcessOutcome`].
pub fn run_supervised(
    spec: &ProcessSpec,
    timeout: Duration,
    cancel: &CancelToken,
    transcript: &Path,
) -> Result<ProcessOutcome> {
    if let Some(dir) = transcript.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut log = File::create(transcript)?;

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    isolate_process_group(&mut cmd);

    debug!("Spawning: {}", spec.display());
    let start = Instant::now();
    let mut child = cmd.spawn().map_err(|e| PrevisError::ToolLaunch {
        tool: spec.program.display().to_string(),
        message: e.to_string(),
    })?;

    let (tx, rx) = mpsc::channel();
    if let Some(stdout) = child.stdout.take() {
        let tx = tx.clone();
        thread::spawn(move || pump(stdout, tx, OutputLine::Stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        let tx = tx.clone();
        thread::spawn(move || pump(stderr, tx, OutputLine::Stderr));
    }
    drop(tx);

    let mut write_line = |line: OutputLine| {
        let result = match line {
            OutputLine::Stdout(text) => writeln!(log, "{}", text),
            OutputLine::Stderr(text) => writeln!(log, "[stderr] {}", text),
        };
        if let Err(e) = result {
            warn!("Failed to write transcript {}: {}", transcript.display(), e);
        }
    };

    let deadline = start + timeout;
    let (status, termination) = loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(line) => write_line(line),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => thread::sleep(POLL_INTERVAL),
        }

        if let Some(status) = child.try_wait()? {
            break (Some(status), Termination::Exited);
        }
        if cancel.is_cancelled() {
            warn!("Cancelling {}", spec.program.display());
            break (kill_tree(&mut child), Termination::Cancelled);
        }
        if Instant::now() >= deadline {
            warn!(
                "{} exceeded {}s, terminating",
                spec.program.display(),
                timeout.as_secs()
            );
            break (kill_tree(&mut child), Termination::TimedOut);
        }
    };

    // Output still buffered in the pipes; stop waiting if a stray
    // grandchild keeps them open.
    let drain_until = Instant::now() + DRAIN_GRACE;
    while let Some(left) = drain_until.checked_duration_since(Instant::now()) {
        match rx.recv_timeout(left) {
            Ok(line) => write_line(line),
            Err(_) => break,
        }
    }

    let duration = start.elapsed();
    let exit_code = match termination {
        Termination::Exited => status.and_then(|s| s.code()),
        _ => None,
    };
    match termination {
        Termination::Exited => debug!(
            "{} exited with {:?} after {:?}",
            spec.program.display(),
            exit_code,
            duration
        ),
        Termination::TimedOut => debug!("{} killed after {:?}", spec.program.display(), duration),
        Termination::Cancelled => {
            debug!("{} stopped after {:?}", spec.program.display(), duration)
        }
    }
    log.flush()?;

    Ok(ProcessOutcome {
        exit_code,
        termination,
        duration,
        transcript: transcript.to_path_buf(),
    })
}

#[cfg(unix)]
fn isolate_process_group(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(windows)]
fn isolate_process_group(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
}

#[cfg(not(any(unix, windows)))]
fn isolate_process_group(_cmd: &mut Command) {}

/// Terminate the child and everything it spawned, then reap it.
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> Option<ExitStatus> {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: kill() with a negative pid signals the process group we
    // created at spawn time; it has no memory-safety preconditions.
    unsafe {
        libc::kill(-pgid, libc::SIGTERM);
    }

    let grace_end = Instant::now() + KILL_GRACE;
    while Instant::now() < grace_end {
        if let Ok(Some(status)) = child.try_wait() {
            // The leader is gone but the group may linger.
            // SAFETY: same process group as above; signalling an empty
            // group only returns ESRCH.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
            return Some(status);
        }
        thread::sleep(POLL_INTERVAL);
    }

    // SAFETY: as above.
    unsafe {
        libc::kill(-pgid, libc::SIGKILL);
    }
    let _ = child.kill();
    child.wait().ok()
}

#[cfg(windows)]
fn kill_tree(child: &mut Child) -> Option<ExitStatus> {
    let pid = child.id().to_string();
    let killed = Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = killed {
        warn!("taskkill failed for pid {}: {}", pid, e);
    }
    let _ = child.kill();
    child.wait().ok()
}

#[cfg(not(any(unix, windows)))]
fn kill_tree(child: &mut Child) -> Option<ExitStatus> {
    let _ = child.kill();
    child.wait().ok()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn captures_both_streams_in_transcript() {
        let temp = TempDir::new().unwrap();
        let transcript = temp.path().join("logs").join("step.log");
        let outcome = run_supervised(
            &sh("echo hello; echo oops 1>&2"),
            Duration::from_secs(10),
            &CancelToken::new(),
            &transcript,
        )
        .unwrap();

        assert_eq!(outcome.termination, Termination::Exited);
        assert_eq!(outcome.exit_code, Some(0));
        let text = fs::read_to_string(&transcript).unwrap();
        assert!(text.contains("hello"));
        assert!(text.contains("[stderr] oops"));
        assert!(!text.contains("sh -c"), "command line leaked: {text}");
        assert!(!text.contains("exited with"));
    }

    #[test]
    fn invalid_utf8_does_not_end_the_transcript() {
        let temp = TempDir::new().unwrap();
        let transcript = temp.path().join("t.log");
        let outcome = run_supervised(
            &sh("printf 'caf\\351\\n'; head -c 300000 /dev/zero | tr '\\0' a; echo; \
                 echo 'OUT OF HANDLE ARRAY ENTRIES'"),
            Duration::from_secs(30),
            &CancelToken::new(),
            &transcript,
        )
        .unwrap();

        assert_eq!(outcome.exit_code, Some(0));
        let text = fs::read_to_string(&transcript).unwrap();
        assert!(text.starts_with("caf\u{FFFD}"));
        assert!(text.contains(&"a".repeat(300_000)));
        assert!(text.contains("OUT OF HANDLE ARRAY ENTRIES"));
    }

    #[test]
    fn invalid_utf8_on_stderr_is_kept() {
        let temp = TempDir::new().unwrap();
        let transcript = temp.path().join("t.log");
        run_supervised(
            &sh("printf '\\377\\376 bad\\n' 1>&2; echo 'FATAL: worldspace' 1>&2"),
            Duration::from_secs(10),
            &CancelToken::new(),
            &transcript,
        )
        .unwrap();

        let text = fs::read_to_string(&transcript).unwrap();
        assert!(text.contains("[stderr] FATAL: worldspace"));
    }

    #[test]
    fn reports_nonzero_exit_code() {
        let temp = TempDir::new().unwrap();
        let outcome = run_supervised(
            &sh("exit 3"),
            Duration::from_secs(10),
            &CancelToken::new(),
            &temp.path().join("t.log"),
        )
        .unwrap();
        assert_eq!(outcome.exit_code, Some(3));
    }

    #[test]
    fn kills_process_tree_on_timeout() {
        let temp = TempDir::new().unwrap();
        let start = Instant::now();
        let outcome = run_supervised(
            &sh("sleep 30 & sleep 30"),
            Duration::from_millis(300),
            &CancelToken::new(),
            &temp.path().join("t.log"),
        )
        .unwrap();

        assert_eq!(outcome.termination, Termination::TimedOut);
        assert_eq!(outcome.exit_code, None);
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn stops_when_cancelled() {
        let temp = TempDir::new().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = run_supervised(
            &sh("sleep 30"),
            Duration::from_secs(60),
            &cancel,
            &temp.path().join("t.log"),
        )
        .unwrap();
        assert_eq!(outcome.termination, Termination::Cancelled);
    }

    #[test]
    fn missing_program_is_launch_error() {
        let temp = TempDir::new().unwrap();
        let err = run_supervised(
            &ProcessSpec::new(temp.path().join("no-such-tool")),
            Duration::from_secs(1),
            &CancelToken::new(),
            &temp.path().join("t.log"),
        )
        .unwrap_err();
        assert!(matches!(err, PrevisError::ToolLaunch { .. }));
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let spec = ProcessSpec::new("xEdit.exe").arg("-script:Merge Previs");
        assert_eq!(spec.display(), "xEdit.exe \"-script:Merge Previs\"");
    }
}
