use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Child;
use tokio::time::timeout;

use super::{RawOutput, Sandbox, SandboxError, drain_child, harness_command, kill_child};

/// Runs each harness in a freshly spawned interpreter subprocess
///
/// Candidates are tried in order; a binary that is simply not installed is
/// skipped, any other spawn failure is surfaced immediately so real
/// misconfiguration is not masked. Exhausting the list is a deployment
/// fault, not a learner fault.
pub struct ProcessSandbox {
    candidates: Vec<String>,
}

impl ProcessSandbox {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    fn spawn_interpreter(&self, harness: &str) -> Result<Child, SandboxError> {
        for candidate in &self.candidates {
            match harness_command(candidate, harness).spawn() {
                Ok(child) => {
                    log::debug!("Spawned interpreter '{candidate}'");
                    return Ok(child);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    log::debug!("Interpreter '{candidate}' not found, trying next candidate");
                }
                Err(e) => return Err(SandboxError::Spawn(e)),
            }
        }

        let tried = self.candidates.join(", ");
        log::error!("No interpreter available on this host (tried: {tried})");
        Err(SandboxError::RuntimeUnavailable { tried })
    }
}

#[async_trait]
impl Sandbox for ProcessSandbox {
    async fn run(&self, harness: &str, limit: Duration) -> Result<RawOutput, SandboxError> {
        let mut child = self.spawn_interpreter(harness)?;

        let outcome = timeout(limit, drain_child(&mut child)).await;
        match outcome {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => {
                kill_child(&mut child).await;
                Err(SandboxError::Capture(e))
            }
            Err(_elapsed) => {
                log::info!(
                    "Interpreter exceeded the {}ms deadline, killing it",
                    limit.as_millis()
                );
                kill_child(&mut child).await;
                Ok(RawOutput::from_timeout())
            }
        }
    }
}
