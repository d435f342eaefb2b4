use thiserror::Error;

use crate::sandbox::SandboxError;

/// Errors the orchestrator can return to its caller
///
/// Only input problems and system faults surface here. Every learner-code
/// outcome, timeouts included, comes back as a normal `ExecutionResult`.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("submitted code is empty")]
    EmptyCode,

    #[error("submitted code is too large: {actual} characters (limit {limit})")]
    CodeTooLarge { limit: usize, actual: usize },

    #[error("unknown challenge: {0}")]
    UnknownChallenge(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EvalError {
    /// Whether the caller is at fault (route layers map these to 4xx,
    /// everything else to 5xx)
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            EvalError::EmptyCode | EvalError::CodeTooLarge { .. } | EvalError::UnknownChallenge(_)
        )
    }
}
