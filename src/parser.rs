use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::harness::{PAYLOAD_BEGIN, PAYLOAD_END};

/// Fallback message when no structured payload could be recovered and
/// stderr had nothing to say either
pub const NO_PAYLOAD_MESSAGE: &str = "no result payload produced by the interpreter";

/// One test entry decoded from the harness payload
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub index: u32,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the interpreter run amounted to
///
/// A tagged union rather than a bag of optional fields, so an outcome that
/// is simultaneously "missing entry point" and "has test results" cannot be
/// represented.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Per-test results, in registration order
    Tests(Vec<TestOutcome>),
    /// The learner's code never defined the required function; carries the
    /// entry-point name
    MissingEntryPoint(String),
    /// The code raised before any test ran, or no payload was recovered
    SetupError(String),
}

/// Parser output: the verdict plus the streams for display
#[derive(Debug, Clone)]
pub struct ParsedOutput {
    pub verdict: Verdict,
    /// Incidental print output, i.e. everything outside the payload span
    pub stdout: String,
    pub stderr: String,
}

/// Wire shape of the JSON between the sentinels
#[derive(Deserialize)]
struct RawPayload {
    entrypoint: Option<String>,
    #[serde(rename = "missingEntryPoint")]
    missing_entry_point: Option<bool>,
    #[serde(rename = "setupError")]
    setup_error: Option<String>,
    tests: Option<Vec<TestOutcome>>,
}

/// Recovers the structured payload from raw interpreter output
///
/// Total over its inputs: every (stdout, stderr) pair maps to a
/// `ParsedOutput`, never an error. When the sentinels are absent, out of
/// order or the span between them is not valid JSON, the verdict degrades
/// to `SetupError` built from stderr (typically a traceback).
pub fn parse_output(stdout: &str, stderr: &str) -> ParsedOutput {
    match extract_payload(stdout) {
        Some((payload, incidental)) => match serde_json::from_str::<RawPayload>(&payload) {
            Ok(raw) => ParsedOutput {
                verdict: verdict_from_payload(raw),
                stdout: incidental,
                stderr: stderr.to_string(),
            },
            Err(e) => {
                log::warn!("Payload between sentinels is not valid JSON: {e}");
                desync(stdout, stderr)
            }
        },
        None => desync(stdout, stderr),
    }
}

/// Finds the payload span, last-marker-pair-wins
///
/// The harness prints its payload last, so scanning from the end skips any
/// marker-like text the learner printed earlier. Returns the span contents
/// and the concatenation of everything outside it.
fn extract_payload(stdout: &str) -> Option<(String, String)> {
    let end = stdout.rfind(PAYLOAD_END)?;
    let begin = stdout[..end].rfind(PAYLOAD_BEGIN)?;

    let payload = stdout[begin + PAYLOAD_BEGIN.len()..end].trim().to_string();
    let incidental = format!(
        "{}{}",
        &stdout[..begin],
        &stdout[end + PAYLOAD_END.len()..]
    )
    .trim()
    .to_string();

    Some((payload, incidental))
}

fn verdict_from_payload(raw: RawPayload) -> Verdict {
    if let Some(message) = raw.setup_error {
        return Verdict::SetupError(message);
    }
    if raw.missing_entry_point.unwrap_or(false) {
        return Verdict::MissingEntryPoint(raw.entrypoint.unwrap_or_default());
    }
    match raw.tests {
        Some(tests) => Verdict::Tests(tests),
        None => Verdict::SetupError(NO_PAYLOAD_MESSAGE.to_string()),
    }
}

/// No usable payload: fall back to stderr as the diagnostic
fn desync(stdout: &str, stderr: &str) -> ParsedOutput {
    let message = if stderr.trim().is_empty() {
        NO_PAYLOAD_MESSAGE.to_string()
    } else {
        stderr.trim().to_string()
    };
    ParsedOutput {
        verdict: Verdict::SetupError(message),
        stdout: stdout.trim().to_string(),
        stderr: stderr.to_string(),
    }
}
