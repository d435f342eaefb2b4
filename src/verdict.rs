use serde::Serialize;

use crate::parser::{ParsedOutput, TestOutcome, Verdict};

/// Learner-facing message for a run that hit the wall-clock deadline
pub const TIMEOUT_MESSAGE: &str = "Execution timed out: your code took too long to run";

/// The normalized verdict handed back to the caller
///
/// Exactly one of `missing_entry_point`, `setup_error` or a non-empty
/// `tests` list carries the outcome; `passed` is derived and is never true
/// when either error field is set. Serializes with the wire field names
/// (`missingEntryPoint`, `setupError`).
#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub title: String,
    pub passed: bool,
    pub tests: Vec<TestOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_entry_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_error: Option<String>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn from_parsed(title: &str, parsed: ParsedOutput) -> Self {
        let ParsedOutput {
            verdict,
            stdout,
            stderr,
        } = parsed;

        match verdict {
            Verdict::Tests(tests) => Self {
                title: title.to_string(),
                passed: !tests.is_empty() && tests.iter().all(|t| t.passed),
                tests,
                missing_entry_point: None,
                setup_error: None,
                stdout,
                stderr,
            },
            Verdict::MissingEntryPoint(name) => Self {
                title: title.to_string(),
                passed: false,
                tests: Vec::new(),
                missing_entry_point: Some(name),
                setup_error: None,
                stdout,
                stderr,
            },
            Verdict::SetupError(message) => Self {
                title: title.to_string(),
                passed: false,
                tests: Vec::new(),
                missing_entry_point: None,
                setup_error: Some(message),
                stdout,
                stderr,
            },
        }
    }

    /// Verdict for a run the sandbox had to kill at the deadline
    pub fn timed_out(title: &str) -> Self {
        Self {
            title: title.to_string(),
            passed: false,
            tests: Vec::new(),
            missing_entry_point: None,
            setup_error: Some(TIMEOUT_MESSAGE.to_string()),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.setup_error.as_deref() == Some(TIMEOUT_MESSAGE)
    }
}
