use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

use pyjudge::config::ExecConfig;
use pyjudge::error::EvalError;
use pyjudge::evaluator::Evaluator;
use pyjudge::harness::{PAYLOAD_BEGIN, PAYLOAD_END};
use pyjudge::sandbox::{
    ProcessSandbox, RawOutput, Sandbox, SandboxError, WorkerSandbox, WorkerState,
};
use pyjudge::suite::SuiteRegistry;

const CORRECT_IS_PRIME: &str = r#"
def is_prime(n):
    if n < 2:
        return False
    for i in range(2, n):
        if n % i == 0:
            return False
    return True
"#;

const ALWAYS_TRUE_IS_PRIME: &str = "def is_prime(n):\n    return True\n";

// Checked by tests that need a real interpreter on the host; those tests
// skip themselves when none is installed.
fn python_available() -> bool {
    ["python3", "python"].iter().any(|bin| {
        std::process::Command::new(bin)
            .arg("--version")
            .output()
            .map(|out| out.status.success())
            .unwrap_or(false)
    })
}

macro_rules! require_python {
    () => {
        if !python_available() {
            eprintln!("skipping: no python interpreter on PATH");
            return;
        }
    };
}

/// Sandbox stub that counts spawns and replies with a canned output
struct CountingSandbox {
    calls: Arc<AtomicUsize>,
    stdout: String,
}

#[async_trait]
impl Sandbox for CountingSandbox {
    async fn run(&self, _harness: &str, _limit: Duration) -> Result<RawOutput, SandboxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawOutput {
            stdout: self.stdout.clone(),
            stderr: String::new(),
            timed_out: false,
        })
    }
}

/// Sandbox stub standing in for a host with no interpreter installed
struct UnavailableSandbox;

#[async_trait]
impl Sandbox for UnavailableSandbox {
    async fn run(&self, _harness: &str, _limit: Duration) -> Result<RawOutput, SandboxError> {
        Err(SandboxError::RuntimeUnavailable {
            tried: "python3, python".to_string(),
        })
    }
}

fn stub_evaluator(stdout: &str) -> (Evaluator, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let sandbox = CountingSandbox {
        calls: Arc::clone(&calls),
        stdout: stdout.to_string(),
    };
    let evaluator = Evaluator::new(
        SuiteRegistry::builtin(),
        Box::new(sandbox),
        &ExecConfig::default(),
    );
    (evaluator, calls)
}

fn process_evaluator(timeout: Duration) -> Evaluator {
    let config = ExecConfig {
        timeout,
        ..ExecConfig::default()
    };
    let sandbox = ProcessSandbox::new(config.interpreters.clone());
    Evaluator::new(SuiteRegistry::builtin(), Box::new(sandbox), &config)
}

// ---------- input policy (no interpreter involved) ----------

#[tokio::test]
async fn test_empty_code_is_rejected_without_spawning() {
    let (evaluator, calls) = stub_evaluator("");
    let result = evaluator.evaluate("is_prime", "   \n\t  ").await;
    assert!(matches!(result, Err(EvalError::EmptyCode)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversized_code_is_rejected_without_spawning() {
    let (evaluator, calls) = stub_evaluator("");
    let code = "x".repeat(8001);
    let result = evaluator.evaluate("is_prime", &code).await;

    match result {
        Err(EvalError::CodeTooLarge { limit, actual }) => {
            assert_eq!(limit, 8000);
            assert_eq!(actual, 8001);
        }
        other => panic!("expected CodeTooLarge, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_code_at_the_limit_is_accepted() {
    let payload = format!(
        "{PAYLOAD_BEGIN}\n{}\n{PAYLOAD_END}\n",
        json!({"tests": [{"index": 1, "passed": true}]})
    );
    let (evaluator, calls) = stub_evaluator(&payload);
    let code = format!("# {}", "x".repeat(7998));
    assert_eq!(code.chars().count(), 8000);

    let result = evaluator.evaluate("is_prime", &code).await.unwrap();
    assert!(result.passed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_challenge_is_rejected_without_spawning() {
    let (evaluator, calls) = stub_evaluator("");
    let result = evaluator.evaluate("no_such_challenge", "x = 1").await;

    match result {
        Err(EvalError::UnknownChallenge(id)) => assert_eq!(id, "no_such_challenge"),
        other => panic!("expected UnknownChallenge, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_input_errors_are_flagged_as_callers_fault() {
    let (evaluator, _) = stub_evaluator("");
    let err = evaluator.evaluate("is_prime", "").await.unwrap_err();
    assert!(err.is_input_error());

    let evaluator = Evaluator::new(
        SuiteRegistry::builtin(),
        Box::new(UnavailableSandbox),
        &ExecConfig::default(),
    );
    let err = evaluator.evaluate("is_prime", "x = 1").await.unwrap_err();
    assert!(!err.is_input_error());
}

#[tokio::test]
async fn test_suite_title_is_merged_into_the_result() {
    let payload = format!(
        "{PAYLOAD_BEGIN}\n{}\n{PAYLOAD_END}\n",
        json!({"entrypoint": "is_prime", "missingEntryPoint": true})
    );
    let (evaluator, _) = stub_evaluator(&payload);
    let result = evaluator.evaluate("is_prime", "x = 1").await.unwrap();

    assert_eq!(result.title, "Prime Check");
    assert_eq!(result.missing_entry_point.as_deref(), Some("is_prime"));
    assert!(!result.passed);
}

// ---------- end-to-end against a real interpreter ----------

#[tokio::test]
async fn test_correct_solution_passes_every_case() {
    require_python!();
    let evaluator = process_evaluator(Duration::from_secs(5));
    let result = evaluator
        .evaluate("is_prime", CORRECT_IS_PRIME)
        .await
        .unwrap();

    assert!(result.passed, "expected a pass, got {result:?}");
    assert_eq!(result.tests.len(), 4);
    for (i, test) in result.tests.iter().enumerate() {
        assert_eq!(test.index, (i + 1) as u32);
        assert!(test.passed);
        assert_eq!(test.value, test.expected);
    }
}

#[tokio::test]
async fn test_wrong_solution_reports_exactly_the_failing_cases() {
    require_python!();
    let evaluator = process_evaluator(Duration::from_secs(5));
    let result = evaluator
        .evaluate("is_prime", ALWAYS_TRUE_IS_PRIME)
        .await
        .unwrap();

    assert!(!result.passed);
    assert_eq!(result.tests.len(), 4);

    // Inputs 2 and 13 are prime; 4 and 1 are not
    let failed: Vec<u32> = result
        .tests
        .iter()
        .filter(|t| !t.passed)
        .map(|t| t.index)
        .collect();
    assert_eq!(failed, vec![2, 4]);

    // Failing entries keep both sides visible for diff display
    let second = &result.tests[1];
    assert_eq!(second.value, Some(json!(true)));
    assert_eq!(second.expected, Some(json!(false)));
}

#[tokio::test]
async fn test_syntax_error_becomes_setup_error() {
    require_python!();
    let evaluator = process_evaluator(Duration::from_secs(5));
    let result = evaluator
        .evaluate("is_prime", "def is_prime(n:\n    return True\n")
        .await
        .unwrap();

    assert!(!result.passed);
    assert!(result.tests.is_empty());
    let message = result.setup_error.expect("setup error should be set");
    assert!(!message.is_empty());
}

#[tokio::test]
async fn test_infinite_loop_is_killed_and_reported_as_timeout() {
    require_python!();
    let timeout = Duration::from_millis(700);
    let evaluator = process_evaluator(timeout);

    let start = Instant::now();
    let result = evaluator
        .evaluate("is_prime", "while True:\n    pass\n")
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(result.is_timeout(), "expected a timeout, got {result:?}");
    assert!(result.tests.is_empty());
    assert!(
        elapsed < timeout + Duration::from_secs(3),
        "evaluate took {elapsed:?}, deadline was {timeout:?}"
    );
}

#[tokio::test]
async fn test_missing_entry_point_is_reported_by_name() {
    require_python!();
    let evaluator = process_evaluator(Duration::from_secs(5));
    let result = evaluator
        .evaluate("is_prime", "def prime_check(n):\n    return True\n")
        .await
        .unwrap();

    assert!(!result.passed);
    assert!(result.tests.is_empty());
    assert_eq!(result.missing_entry_point.as_deref(), Some("is_prime"));
}

#[tokio::test]
async fn test_learner_prints_are_captured_as_incidental_stdout() {
    require_python!();
    let evaluator = process_evaluator(Duration::from_secs(5));
    let code = format!("print(\"debug: starting\")\n{CORRECT_IS_PRIME}");
    let result = evaluator.evaluate("is_prime", &code).await.unwrap();

    assert!(result.passed);
    assert!(result.stdout.contains("debug: starting"));
}

#[tokio::test]
async fn test_printed_sentinel_text_does_not_break_parsing() {
    require_python!();
    let evaluator = process_evaluator(Duration::from_secs(5));
    let code = format!("print(\"{PAYLOAD_BEGIN}\")\nprint(\"fake\")\n{CORRECT_IS_PRIME}");
    let result = evaluator.evaluate("is_prime", &code).await.unwrap();

    assert!(result.passed, "real payload should win, got {result:?}");
    assert!(result.stdout.contains("fake"));
}

#[tokio::test]
async fn test_repeated_evaluation_is_deterministic() {
    require_python!();
    let evaluator = process_evaluator(Duration::from_secs(5));

    let first = evaluator
        .evaluate("is_prime", ALWAYS_TRUE_IS_PRIME)
        .await
        .unwrap();
    let second = evaluator
        .evaluate("is_prime", ALWAYS_TRUE_IS_PRIME)
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_value(&first.tests).unwrap(),
        serde_json::to_value(&second.tests).unwrap()
    );
}

#[tokio::test]
async fn test_solution_loaded_from_file() {
    require_python!();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("solution.py");
    std::fs::write(&path, CORRECT_IS_PRIME).unwrap();

    let code = std::fs::read_to_string(&path).unwrap();
    let evaluator = process_evaluator(Duration::from_secs(5));
    let result = evaluator.evaluate("is_prime", &code).await.unwrap();
    assert!(result.passed);
}

// ---------- sandbox-level guarantees ----------

#[tokio::test]
async fn test_process_sandbox_reports_runtime_unavailable() {
    let sandbox = ProcessSandbox::new(vec!["definitely-not-a-python-9999".to_string()]);
    let result = sandbox.run("print(1)", Duration::from_secs(1)).await;
    assert!(matches!(
        result,
        Err(SandboxError::RuntimeUnavailable { .. })
    ));
}

#[tokio::test]
async fn test_process_sandbox_ignores_nonzero_exit_codes() {
    require_python!();
    let sandbox = ProcessSandbox::new(vec!["python3".to_string(), "python".to_string()]);
    let output = sandbox
        .run(
            "import sys\nprint(\"before exit\")\nsys.exit(3)",
            Duration::from_secs(5),
        )
        .await
        .unwrap();

    assert!(!output.timed_out);
    assert!(output.stdout.contains("before exit"));
}

#[tokio::test]
async fn test_worker_runs_a_harness_and_stays_ready() {
    require_python!();
    let worker = WorkerSandbox::spawn(vec!["python3".to_string(), "python".to_string()]);
    let output = worker
        .run("print(\"from worker\")", Duration::from_secs(5))
        .await
        .unwrap();

    assert!(output.stdout.contains("from worker"));
    assert_eq!(worker.state(), WorkerState::Ready);

    // A second run on the same worker is allowed once the first finished
    let output = worker
        .run("print(\"again\")", Duration::from_secs(5))
        .await
        .unwrap();
    assert!(output.stdout.contains("again"));
}

#[tokio::test]
async fn test_worker_watchdog_destroys_the_worker() {
    require_python!();
    let timeout = Duration::from_millis(500);
    let worker = WorkerSandbox::spawn(vec!["python3".to_string(), "python".to_string()]);

    let start = Instant::now();
    let output = worker.run("while True:\n    pass\n", timeout).await.unwrap();
    let elapsed = start.elapsed();

    assert!(output.timed_out);
    assert!(output.stdout.is_empty());
    assert!(
        elapsed < timeout + Duration::from_secs(3),
        "watchdog took {elapsed:?}"
    );
    assert_eq!(worker.state(), WorkerState::Terminated);

    let result = worker.run("print(1)", Duration::from_secs(1)).await;
    assert!(matches!(result, Err(SandboxError::WorkerTerminated)));
}
