mod process;
mod worker;

pub use process::ProcessSandbox;
pub use worker::{WorkerSandbox, WorkerState};

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::config::{ExecConfig, SandboxKind};

/// Raw captured streams from one harness run
///
/// A timed-out run carries empty streams: partial output from a killed
/// interpreter is not trusted.
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl RawOutput {
    pub fn from_timeout() -> Self {
        Self {
            timed_out: true,
            ..Self::default()
        }
    }
}

/// System-level sandbox failures
///
/// A timeout is not one of these; it comes back as data in `RawOutput`.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("no usable interpreter found (tried: {tried})")]
    RuntimeUnavailable { tried: String },

    #[error("failed to spawn interpreter process: {0}")]
    Spawn(std::io::Error),

    #[error("failed to capture interpreter output: {0}")]
    Capture(std::io::Error),

    #[error("sandbox worker already has a run in flight")]
    WorkerBusy,

    #[error("sandbox worker has been terminated")]
    WorkerTerminated,
}

/// Capability interface for executing a compiled harness in isolation
///
/// Implementations guarantee that whatever executes the harness does not
/// outlive the call: on success, on error and on deadline expiry alike the
/// underlying process or worker is reclaimed.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Runs the harness, bounding wall-clock time by `limit`
    ///
    /// Exit codes are not interpreted here; only the captured streams
    /// matter to the caller. A deadline expiry yields
    /// `Ok(RawOutput { timed_out: true, .. })`, not an error.
    async fn run(&self, harness: &str, limit: Duration) -> Result<RawOutput, SandboxError>;
}

/// Creates the sandbox implementation selected by configuration
///
/// Process sandboxing is the server default; the worker sandbox mirrors
/// the browser-side worker contract for embedding callers.
pub fn create_sandbox(config: &ExecConfig) -> Box<dyn Sandbox> {
    match config.sandbox {
        SandboxKind::Process => {
            log::info!("Creating process sandbox");
            Box::new(ProcessSandbox::new(config.interpreters.clone()))
        }
        SandboxKind::Worker => {
            log::info!("Creating worker sandbox");
            Box::new(WorkerSandbox::spawn(config.interpreters.clone()))
        }
    }
}

/// Builds the interpreter invocation for one harness run
///
/// `-I` puts CPython in isolated mode (no user site directory, environment
/// variables ignored); the harness travels as the `-c` argument so nothing
/// touches the filesystem. Stdin is closed, both output streams are piped,
/// and `kill_on_drop` backstops every early-exit path.
pub(crate) fn harness_command(binary: &str, harness: &str) -> Command {
    let mut cmd = Command::new(binary);
    cmd.arg("-I")
        .arg("-c")
        .arg(harness)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    cmd
}

/// Drains both pipes concurrently, then reaps the child
///
/// Reading the streams in parallel avoids the deadlock where the child
/// blocks on a full stderr pipe while this side waits on stdout. Invalid
/// UTF-8 from learner prints is replaced, not rejected.
pub(crate) async fn drain_child(child: &mut Child) -> std::io::Result<RawOutput> {
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let stdout_task = async {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stdout_pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<_, std::io::Error>(buf)
    };
    let stderr_task = async {
        let mut buf = Vec::new();
        if let Some(mut pipe) = stderr_pipe {
            pipe.read_to_end(&mut buf).await?;
        }
        Ok::<_, std::io::Error>(buf)
    };

    let (stdout_bytes, stderr_bytes) = tokio::try_join!(stdout_task, stderr_task)?;
    child.wait().await?;

    Ok(RawOutput {
        stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
        stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
        timed_out: false,
    })
}

/// Kills the child outright and reaps it so nothing is left behind
pub(crate) async fn kill_child(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        log::warn!("Failed to kill sandboxed interpreter: {e}");
    }
    let _ = child.wait().await;
}
