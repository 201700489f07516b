/// Process Runner - Spawn, Capture, Kill
///
/// **Core Responsibility:**
/// Run exactly one external command and resolve to a uniform
/// `{success, stdout, stderr}` triple.
///
/// **Guarantees:**
/// - Never returns an error: spawn failures and timeouts are encoded in `RunOutput`
/// - stdout/stderr are drained concurrently as they arrive, without a size cap
/// - Hard wall-clock timeout: the child is SIGKILLed and partial output is kept
/// - Exactly one of {exit, timeout, spawn failure} decides the outcome
///
/// Pipelines receive the runner as `Arc<dyn CommandRunner>`, so tests can swap
/// in a scripted fake.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Prefix of the marker appended to stderr when a run is killed on timeout.
pub const TIMEOUT_MARKER: &str = "[Execution timed out";

/// How long to keep draining pipes after the child is gone.
/// Grandchildren may hold the pipes open after a kill.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Returns true if the stderr text carries the runner's timeout marker.
pub fn is_timeout_marker(stderr: &str) -> bool {
    stderr.contains(TIMEOUT_MARKER)
}

/// A single command invocation
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Added on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub stdin: Option<String>,
    pub timeout_ms: u64,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            stdin: None,
            timeout_ms: kata_common::config::DEFAULT_TIMEOUT_MS,
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

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// How the process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Exit code is `None` when the process died from a signal
    Exited(Option<i32>),
    TimedOut,
    SpawnFailed(io::ErrorKind),
}

impl RunStatus {
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, RunStatus::SpawnFailed(_))
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, RunStatus::TimedOut)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub status: RunStatus,
    pub duration_ms: u64,
}

impl RunOutput {
    pub fn exit_code(&self) -> Option<i32> {
        match self.status {
            RunStatus::Exited(code) => code,
            _ => None,
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> RunOutput;
}

/// Runs commands as real OS processes via `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

fn spawn_reader<R>(reader: Option<R>, buffer: SharedBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut reader) = reader else { return };
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(&chunk[..n]);
                    }
                }
            }
        }
    })
}

fn take_buffer(buffer: &SharedBuffer) -> String {
    match buffer.lock() {
        Ok(mut buf) => String::from_utf8_lossy(&std::mem::take(&mut *buf)).into_owned(),
        Err(_) => String::new(),
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec) -> RunOutput {
        let start = Instant::now();

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %spec.program, error = %e, "Failed to spawn process");
                return RunOutput {
                    success: false,
                    stdout: String::new(),
                    stderr: format!("Failed to start '{}': {}", spec.program, e),
                    status: RunStatus::SpawnFailed(e.kind()),
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        };

        // Feed stdin from a separate task so a child that never reads cannot block us
        if let Some(mut stdin) = child.stdin.take() {
            let input = spec.stdin.clone();
            tokio::spawn(async move {
                if let Some(input) = input {
                    // Broken pipe just means the child stopped reading
                    let _ = stdin.write_all(input.as_bytes()).await;
                }
                let _ = stdin.shutdown().await;
            });
        }

        let stdout_buf: SharedBuffer = Arc::default();
        let stderr_buf: SharedBuffer = Arc::default();
        let mut stdout_task = spawn_reader(child.stdout.take(), stdout_buf.clone());
        let mut stderr_task = spawn_reader(child.stderr.take(), stderr_buf.clone());

        let mut wait_error = None;
        let timeout = Duration::from_millis(spec.timeout_ms);
        let status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(Ok(exit)) => RunStatus::Exited(exit.code()),
            Ok(Err(e)) => {
                wait_error = Some(e);
                RunStatus::Exited(None)
            }
            Err(_) => {
                warn!(
                    program = %spec.program,
                    timeout_ms = spec.timeout_ms,
                    "Process timed out - killing"
                );
                if let Err(e) = child.start_kill() {
                    warn!(program = %spec.program, error = %e, "Failed to kill timed-out process");
                }
                let _ = child.wait().await;
                RunStatus::TimedOut
            }
        };

        let _ = tokio::time::timeout(DRAIN_GRACE, async {
            let _ = (&mut stdout_task).await;
            let _ = (&mut stderr_task).await;
        })
        .await;
        stdout_task.abort();
        stderr_task.abort();

        let stdout = take_buffer(&stdout_buf);
        let mut stderr = take_buffer(&stderr_buf);

        if let Some(e) = wait_error {
            stderr.push_str(&format!("\nFailed to wait for process: {}", e));
        }
        if status.timed_out() {
            stderr.push_str(&format!("\n{} after {}ms]", TIMEOUT_MARKER, spec.timeout_ms));
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(
            program = %spec.program,
            status = ?status,
            duration_ms = duration_ms,
            stdout_bytes = stdout.len(),
            stderr_bytes = stderr.len(),
            "Process finished"
        );

        RunOutput {
            success: status == RunStatus::Exited(Some(0)),
            stdout,
            stderr,
            status,
            duration_ms,
        }
    }
}
