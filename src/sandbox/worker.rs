use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::{RawOutput, Sandbox, SandboxError, drain_child, harness_command, kill_child};

/// Lifecycle of a worker sandbox
///
/// Mirrors the browser-side worker contract: boot the interpreter once,
/// then serve runs until the watchdog or the owner destroys the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Uninitialized,
    Initializing,
    Ready,
    Running,
    Terminated,
}

enum WorkerCommand {
    Run {
        harness: String,
        reply: oneshot::Sender<Result<RawOutput, SandboxError>>,
    },
}

/// A sandbox hosted by a dedicated task that owns the interpreter
///
/// Commands travel over a channel; at most one run may be outstanding. The
/// deadline is enforced by a watchdog on the calling side, independent of
/// anything the worker does: when it fires, the worker is destroyed
/// outright (cancellation plus child kill) and a timeout result is
/// synthesized. A destroyed worker refuses further runs; callers wanting
/// per-run isolation create a fresh worker per call.
pub struct WorkerSandbox {
    commands: mpsc::Sender<WorkerCommand>,
    state: Arc<Mutex<WorkerState>>,
    shutdown: CancellationToken,
}

impl WorkerSandbox {
    /// Starts the worker task; interpreter resolution happens in the
    /// background while the handle is returned immediately
    pub fn spawn(candidates: Vec<String>) -> Self {
        let (commands, command_rx) = mpsc::channel(1);
        let state = Arc::new(Mutex::new(WorkerState::Uninitialized));
        let shutdown = CancellationToken::new();

        tokio::spawn(worker_loop(
            candidates,
            command_rx,
            Arc::clone(&state),
            shutdown.clone(),
        ));

        Self {
            commands,
            state,
            shutdown,
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Destroys the worker; any in-flight interpreter child is killed
    pub fn terminate(&self) {
        self.shutdown.cancel();
        *self.state.lock() = WorkerState::Terminated;
    }
}

impl Drop for WorkerSandbox {
    fn drop(&mut self) {
        // The worker task must not outlive its owner
        self.shutdown.cancel();
    }
}

#[async_trait]
impl Sandbox for WorkerSandbox {
    async fn run(&self, harness: &str, limit: Duration) -> Result<RawOutput, SandboxError> {
        {
            let mut state = self.state.lock();
            match *state {
                WorkerState::Terminated => return Err(SandboxError::WorkerTerminated),
                WorkerState::Running => return Err(SandboxError::WorkerBusy),
                _ => *state = WorkerState::Running,
            }
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        let command = WorkerCommand::Run {
            harness: harness.to_string(),
            reply: reply_tx,
        };
        if self.commands.send(command).await.is_err() {
            *self.state.lock() = WorkerState::Terminated;
            return Err(SandboxError::WorkerTerminated);
        }

        // Watchdog: independent of the worker's own execution
        match tokio::time::timeout(limit, reply_rx).await {
            Ok(Ok(result)) => {
                let mut state = self.state.lock();
                if *state != WorkerState::Terminated {
                    *state = WorkerState::Ready;
                }
                result
            }
            Ok(Err(_recv)) => {
                *self.state.lock() = WorkerState::Terminated;
                Err(SandboxError::WorkerTerminated)
            }
            Err(_elapsed) => {
                log::info!(
                    "Worker watchdog fired after {}ms, destroying worker",
                    limit.as_millis()
                );
                self.terminate();
                Ok(RawOutput::from_timeout())
            }
        }
    }
}

/// Resolves the first runnable interpreter, the boot phase of the worker
async fn resolve_interpreter(candidates: &[String]) -> Result<String, String> {
    for candidate in candidates {
        let probe = tokio::process::Command::new(candidate)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;
        if let Ok(output) = probe
            && output.status.success()
        {
            return Ok(candidate.clone());
        }
    }
    Err(candidates.join(", "))
}

async fn worker_loop(
    candidates: Vec<String>,
    mut commands: mpsc::Receiver<WorkerCommand>,
    state: Arc<Mutex<WorkerState>>,
    shutdown: CancellationToken,
) {
    {
        let mut state = state.lock();
        if *state == WorkerState::Uninitialized {
            *state = WorkerState::Initializing;
        }
    }

    let interpreter = resolve_interpreter(&candidates).await;
    match &interpreter {
        Ok(binary) => log::info!("Worker booted with interpreter '{binary}'"),
        Err(tried) => log::error!("Worker boot failed, no interpreter found (tried: {tried})"),
    }

    {
        // A run may already be queued; only advance an idle boot state
        let mut state = state.lock();
        if *state == WorkerState::Initializing {
            *state = WorkerState::Ready;
        }
    }

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                log::debug!("Worker shutting down");
                break;
            }

            command = commands.recv() => {
                let Some(WorkerCommand::Run { harness, reply }) = command else {
                    break;
                };
                let result = match &interpreter {
                    Ok(binary) => execute_run(binary, &harness, &shutdown).await,
                    Err(tried) => Err(SandboxError::RuntimeUnavailable {
                        tried: tried.clone(),
                    }),
                };
                // The caller may have given up; nothing to do about it
                let _ = reply.send(result);
            }
        }
    }
}

/// Spawns the interpreter child for one run
///
/// No deadline here: the calling side's watchdog cancels the token, which
/// kills the child before this future is dropped. Output buffers are scoped
/// to the call, so capture state cannot bleed into the next run whatever
/// the executed code did.
async fn execute_run(
    binary: &str,
    harness: &str,
    shutdown: &CancellationToken,
) -> Result<RawOutput, SandboxError> {
    let mut child = harness_command(binary, harness)
        .spawn()
        .map_err(SandboxError::Spawn)?;

    let drained = tokio::select! {
        _ = shutdown.cancelled() => None,
        drained = drain_child(&mut child) => Some(drained),
    };

    match drained {
        Some(Ok(output)) => Ok(output),
        Some(Err(e)) => {
            kill_child(&mut child).await;
            Err(SandboxError::Capture(e))
        }
        None => {
            kill_child(&mut child).await;
            Ok(RawOutput::from_timeout())
        }
    }
}
