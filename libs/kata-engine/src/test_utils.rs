//! Scripted `CommandRunner` for pipeline tests.

use crate::runner::{CommandRunner, CommandSpec, RunOutput, RunStatus};
use async_trait::async_trait;
use std::io;
use std::sync::{Arc, Mutex};

type Responder = Box<dyn Fn(&CommandSpec) -> RunOutput + Send + Sync>;

/// Records every command it is asked to run and answers from a closure.
pub struct FakeRunner {
    calls: Mutex<Vec<CommandSpec>>,
    respond: Responder,
}

impl FakeRunner {
    pub fn new(respond: impl Fn(&CommandSpec) -> RunOutput + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> RunOutput {
        self.calls.lock().unwrap().push(spec.clone());
        (self.respond)(spec)
    }
}

pub fn exited(code: i32, stdout: &str, stderr: &str) -> RunOutput {
    RunOutput {
        success: code == 0,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        status: RunStatus::Exited(Some(code)),
        duration_ms: 1,
    }
}

pub fn spawn_failed(program: &str) -> RunOutput {
    RunOutput {
        success: false,
        stdout: String::new(),
        stderr: format!("Failed to start '{}': No such file or directory (os error 2)", program),
        status: RunStatus::SpawnFailed(io::ErrorKind::NotFound),
        duration_ms: 0,
    }
}

pub fn timed_out(stdout: &str, timeout_ms: u64) -> RunOutput {
    RunOutput {
        success: false,
        stdout: stdout.to_string(),
        stderr: format!("\n[Execution timed out after {}ms]", timeout_ms),
        status: RunStatus::TimedOut,
        duration_ms: timeout_ms,
    }
}
