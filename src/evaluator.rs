use std::time::Duration;

use crate::config::ExecConfig;
use crate::error::EvalError;
use crate::harness::compile_harness;
use crate::parser::parse_output;
use crate::sandbox::Sandbox;
use crate::suite::SuiteRegistry;
use crate::verdict::ExecutionResult;

/// The single entry point the route layer calls
///
/// Owns the suite registry, one sandbox and the input policy. Everything a
/// learner's code can do comes back as an `ExecutionResult`; only bad input
/// and deployment faults are errors.
pub struct Evaluator {
    registry: SuiteRegistry,
    sandbox: Box<dyn Sandbox>,
    max_code_chars: usize,
    timeout: Duration,
}

impl Evaluator {
    pub fn new(registry: SuiteRegistry, sandbox: Box<dyn Sandbox>, config: &ExecConfig) -> Self {
        Self {
            registry,
            sandbox,
            max_code_chars: config.max_code_chars,
            timeout: config.timeout,
        }
    }

    /// Evaluates learner code against a registered challenge
    ///
    /// Input policy runs first: empty or oversized code and unknown
    /// challenge ids are rejected before any interpreter is spawned.
    pub async fn evaluate(
        &self,
        challenge_id: &str,
        code: &str,
    ) -> Result<ExecutionResult, EvalError> {
        if code.trim().is_empty() {
            return Err(EvalError::EmptyCode);
        }
        let length = code.chars().count();
        if length > self.max_code_chars {
            return Err(EvalError::CodeTooLarge {
                limit: self.max_code_chars,
                actual: length,
            });
        }
        let suite = self
            .registry
            .get(challenge_id)
            .ok_or_else(|| EvalError::UnknownChallenge(challenge_id.to_string()))?;

        log::info!(
            "Evaluating submission for challenge '{challenge_id}' ({} tests, {length} chars)",
            suite.tests.len()
        );

        let harness = compile_harness(code, suite)?;
        let raw = self.sandbox.run(&harness, self.timeout).await?;

        if raw.timed_out {
            log::info!("Submission for '{challenge_id}' hit the deadline");
            return Ok(ExecutionResult::timed_out(&suite.title));
        }

        let parsed = parse_output(&raw.stdout, &raw.stderr);
        let result = ExecutionResult::from_parsed(&suite.title, parsed);
        log::info!(
            "Challenge '{challenge_id}' evaluated: passed={}",
            result.passed
        );
        Ok(result)
    }
}
