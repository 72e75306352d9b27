//! Solver process driver.
//!
//! An [`Invocation`] owns one `minizinc` subprocess from launch to release:
//! it writes the payload into a private directory, starts the process in
//! its own process group, exposes stdout line by line and captures stderr
//! in the background.
//!
//! On timeout or cancellation the process group receives SIGTERM, then
//! SIGKILL once the grace period elapses. Output still buffered in the pipe
//! is drained for at most one more grace period. Dropping an invocation
//! kills the process group and removes the directory unless the
//! configuration asks to keep it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use mznforge_config::SolverConfig;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::assembler::Payload;
use crate::error::ProcessError;

/// How the data reaches the solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataArg {
    /// `-D "<data>"`
    Inline(String),
    /// A `.dzn` file.
    File(PathBuf),
}

/// Why an invocation was stopped before the solver finished on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Timeout,
    Cancelled,
}

/// Requests cancellation of a running or queued invocation.
///
/// Clones share state; cancelling any clone cancels them all.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so waiting only ends on cancellation.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// What is known about a process after it exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    pub stderr: String,
    pub termination: Option<Termination>,
    pub elapsed: Duration,
}

/// One solver subprocess.
#[derive(Debug)]
pub struct Invocation {
    id: Uuid,
    name: String,
    payload: Payload,
    child: Child,
    pid: Option<u32>,
    stdout: Lines<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
    workdir: tempfile::TempDir,
    deadline: Option<Instant>,
    drain_deadline: Option<Instant>,
    grace: Duration,
    cancel: CancelHandle,
    termination: Option<Termination>,
    stdout_closed: bool,
    reaped: bool,
    started: Instant,
}

impl Invocation {
    /// Writes the payload files and launches the solver.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessError::InvalidConfig`] if the configuration asks for
    /// something the backend cannot do, and [`ProcessError::Spawn`] or
    /// [`ProcessError::Io`] if the files or the process cannot be created.
    pub fn start(
        payload: Payload,
        config: &SolverConfig,
        timeout: Option<Duration>,
    ) -> Result<Self, ProcessError> {
        Self::start_with_cancel(payload, config, timeout, CancelHandle::new())
    }

    /// Like [`start`](Self::start), stopping the process when `cancel` fires.
    pub fn start_with_cancel(
        payload: Payload,
        config: &SolverConfig,
        timeout: Option<Duration>,
        cancel: CancelHandle,
    ) -> Result<Self, ProcessError> {
        config
            .validate()
            .map_err(|err| ProcessError::InvalidConfig(err.to_string()))?;
        let backend_args = config
            .backend_args()
            .map_err(|err| ProcessError::InvalidConfig(err.to_string()))?;

        let id = Uuid::new_v4();
        let name = payload.name().to_string();
        let parent = config
            .output_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let workdir = tempfile::Builder::new()
            .prefix(&format!("mznforge-{name}-{id}"))
            .rand_bytes(0)
            .disable_cleanup(config.keep)
            .tempdir_in(&parent)?;

        let model_path = workdir.path().join("model.mzn");
        std::fs::write(&model_path, payload.model())?;
        debug!(event = "file_generated", id = %id, path = %model_path.display());

        let data = if payload.data().is_empty() {
            None
        } else if payload.data().len() < config.inline_data_threshold {
            Some(DataArg::Inline(payload.data().replace('\n', " ").trim_end().to_string()))
        } else {
            let data_path = workdir.path().join("data.dzn");
            std::fs::write(&data_path, payload.data())?;
            debug!(event = "file_generated", id = %id, path = %data_path.display());
            Some(DataArg::File(data_path))
        };

        let args = command_args(config, &backend_args, &model_path, data.as_ref());
        debug!(
            event = "command",
            id = %id,
            executable = %config.executable.display(),
            args = ?args,
        );

        let mut command = Command::new(&config.executable);
        command
            .args(&args)
            .current_dir(workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|err| ProcessError::Spawn {
            executable: config.executable.clone(),
            message: err.to_string(),
        })?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::Io("stdout was not captured".into()))?;
        let stderr = child.stderr.take().map(|mut pipe| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let started = Instant::now();
        let pid = child.id();
        info!(
            event = "invocation_start",
            id = %id,
            model = %name,
            solver = %config.solver,
            pid = pid.unwrap_or_default(),
            timeout_ms = timeout.map(|t| t.as_millis() as u64),
        );

        Ok(Self {
            id,
            name,
            payload,
            child,
            pid,
            stdout: BufReader::new(stdout).lines(),
            stderr,
            workdir,
            deadline: timeout.map(|t| started + t),
            drain_deadline: None,
            grace: config.grace_period(),
            cancel,
            termination: None,
            stdout_closed: false,
            reaped: false,
            started,
        })
    }

    /// Unique id of this invocation.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Base name of the payload.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Directory holding the generated files.
    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Set once the invocation was stopped by timeout or cancellation.
    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Reads the next stdout line.
    ///
    /// Returns `Ok(None)` at end of output. A timeout or cancellation stops
    /// the process and ends the output once the pipe is drained.
    pub async fn next_line(&mut self) -> Result<Option<String>, ProcessError> {
        if self.stdout_closed {
            return Ok(None);
        }
        loop {
            let limit = self.drain_deadline.or(self.deadline);
            let watch_cancel = self.termination.is_none();
            let cancel = self.cancel.clone();
            tokio::select! {
                line = self.stdout.next_line() => {
                    return match line {
                        Ok(Some(line)) => {
                            trace!(event = "stdout_line", id = %self.id, line = %line);
                            Ok(Some(line))
                        }
                        Ok(None) => {
                            self.stdout_closed = true;
                            Ok(None)
                        }
                        Err(err) => {
                            self.stdout_closed = true;
                            Err(err.into())
                        }
                    };
                }
                _ = sleep_until(limit) => {
                    if self.termination.is_some() {
                        warn!(event = "drain_abandoned", id = %self.id);
                        self.stdout_closed = true;
                        return Ok(None);
                    }
                    self.stop(Termination::Timeout).await;
                }
                _ = cancel.cancelled(), if watch_cancel => {
                    self.stop(Termination::Cancelled).await;
                }
            }
        }
    }

    /// Stops the invocation for `reason` and starts draining its output.
    ///
    /// Only the first call has an effect.
    pub async fn stop(&mut self, reason: Termination) {
        if self.termination.is_some() {
            return;
        }
        self.termination = Some(reason);
        info!(event = "invocation_stop", id = %self.id, reason = ?reason);
        self.terminate().await;
        self.drain_deadline = Some(Instant::now() + self.grace);
    }

    /// Terminates the process group: SIGTERM, grace period, SIGKILL.
    pub async fn terminate(&mut self) {
        if self.reaped {
            return;
        }
        self.signal_group(Signal::Term);
        if tokio::time::timeout(self.grace, self.child.wait()).await.is_err() {
            debug!(event = "kill", id = %self.id);
            self.signal_group(Signal::Kill);
            let _ = self.child.start_kill();
            let _ = self.child.wait().await;
        }
        self.reaped = true;
    }

    /// Waits for the process to exit and collects stderr.
    ///
    /// The timeout and cancellation still apply while waiting, so a solver
    /// that closed its output but keeps running is stopped.
    pub async fn wait(&mut self) -> Result<Completion, ProcessError> {
        if !self.reaped && self.termination.is_none() {
            let deadline = self.deadline;
            let cancel = self.cancel.clone();
            tokio::select! {
                biased;
                status = self.child.wait() => {
                    status?;
                }
                _ = sleep_until(deadline) => {
                    self.stop(Termination::Timeout).await;
                }
                _ = cancel.cancelled() => {
                    self.stop(Termination::Cancelled).await;
                }
            }
        }
        let status = self.child.wait().await?;
        self.reaped = true;
        let stderr = match self.stderr.take() {
            Some(task) => match tokio::time::timeout(self.grace.max(Duration::from_secs(1)), task).await {
                Ok(Ok(text)) => text,
                Ok(Err(err)) => return Err(ProcessError::Aborted(err.to_string())),
                Err(_) => String::new(),
            },
            None => String::new(),
        };
        Ok(Completion {
            exit_code: status.code(),
            stderr,
            termination: self.termination,
            elapsed: self.started.elapsed(),
        })
    }

    fn signal_group(&mut self, signal: Signal) {
        #[cfg(unix)]
        if let Some(pid) = self.pid.and_then(|p| i32::try_from(p).ok()) {
            let signo = match signal {
                Signal::Term => libc::SIGTERM,
                Signal::Kill => libc::SIGKILL,
            };
            // SAFETY: kill(2) has no memory-safety preconditions; a negative
            // pid addresses the process group created at spawn.
            unsafe {
                libc::kill(-pid, signo);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = signal;
            let _ = self.child.start_kill();
        }
    }
}

impl Drop for Invocation {
    fn drop(&mut self) {
        if !self.reaped {
            self.signal_group(Signal::Kill);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Builds the solver command line, without the executable.
pub fn command_args(
    config: &SolverConfig,
    backend_args: &[String],
    model: &Path,
    data: Option<&DataArg>,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--solver".into(),
        config.solver.id().into(),
        "--output-mode".into(),
        "dzn".into(),
    ];
    let options = &config.options;
    if options.output_time {
        args.push("--output-time".into());
    }
    if options.output_objective {
        args.push("--output-objective".into());
    }
    if options.statistics {
        args.push("-s".into());
    }
    for dir in &config.include {
        args.push("-I".into());
        args.push(dir.into());
    }
    if let Some(dir) = &config.stdlib_dir {
        args.push("--stdlib-dir".into());
        args.push(dir.into());
    }
    if let Some(dir) = &config.globals_dir {
        args.push("-G".into());
        args.push(dir.into());
    }
    if let Some(ms) = options.time_limit_ms {
        args.push("--time-limit".into());
        args.push(ms.to_string().into());
    }
    args.extend(backend_args.iter().map(OsString::from));
    args.extend(config.extra_args.iter().map(OsString::from));
    args.push(model.into());
    match data {
        Some(DataArg::Inline(text)) => {
            args.push("-D".into());
            args.push(text.into());
        }
        Some(DataArg::File(path)) => args.push(path.into()),
        None => {}
    }
    args
}

/// Runs `<executable> --version` and extracts the version number.
///
/// ```no_run
/// # async fn run() -> Result<(), mznforge_solver::ProcessError> {
/// let config = mznforge_config::SolverConfig::default();
/// let version = mznforge_solver::minizinc_version(&config).await?;
/// println!("MiniZinc {version}");
/// # Ok(())
/// # }
/// ```
pub async fn minizinc_version(config: &SolverConfig) -> Result<String, ProcessError> {
    let output = Command::new(&config.executable)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| ProcessError::Spawn {
            executable: config.executable.clone(),
            message: err.to_string(),
        })?;
    let text = String::from_utf8_lossy(&output.stdout);
    parse_version(&text).ok_or_else(|| ProcessError::Io(format!("no version in output: {}", text.trim())))
}

// "MiniZinc to FlatZinc converter, version 2.8.3, build 123" -> "2.8.3"
pub(crate) fn parse_version(text: &str) -> Option<String> {
    let (_, rest) = text.split_once("version ")?;
    let version: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let version = version.trim_end_matches('.');
    (!version.is_empty()).then(|| version.to_string())
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
