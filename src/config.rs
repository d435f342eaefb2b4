use std::time::Duration;

use clap::Parser;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_CODE_CHARACTERS: usize = 8000;
pub const DEFAULT_INTERPRETERS: &[&str] = &["python3", "python"];

#[derive(Parser)]
#[command(name = "pyjudge", version = "1.0", about, long_about = None)]
pub struct CliArgs {
    /// Challenge id to evaluate against
    #[arg(long = "challenge", short = 'c')]
    pub challenge: String,

    /// Path to the solution file
    #[arg(long = "file", short = 'f')]
    pub file: String,

    /// Path to a JSON suite registry (uses the built-in registry if omitted)
    #[arg(long = "suites", short = 's')]
    pub suites_path: Option<String>,

    /// Sandbox implementation to run the code in
    #[arg(long = "sandbox", value_enum, default_value_t = SandboxKind::Process)]
    pub sandbox: SandboxKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SandboxKind {
    Process,
    Worker,
}

/// Execution policy for the core, environment-overridable
#[derive(Debug, Clone)]
pub struct ExecConfig {
    /// Interpreter binaries to try, in order
    pub interpreters: Vec<String>,
    /// Wall-clock deadline per submission
    pub timeout: Duration,
    /// Submission size ceiling, in characters
    pub max_code_chars: usize,
    pub sandbox: SandboxKind,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            interpreters: DEFAULT_INTERPRETERS.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_code_chars: DEFAULT_MAX_CODE_CHARACTERS,
            sandbox: SandboxKind::Process,
        }
    }
}

impl ExecConfig {
    /// Reads PYTHON_BIN, PYTHON_TIMEOUT_MS, MAX_CODE_CHARACTERS and
    /// JUDGE_SANDBOX, falling back to the defaults for anything unset
    /// or unparsable
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(bin) = std::env::var("PYTHON_BIN")
            && !bin.trim().is_empty()
        {
            // Environment-selected binary goes first, standard names stay
            // as fallbacks
            config.interpreters.insert(0, bin);
        }
        if let Some(ms) = parse_env("PYTHON_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(chars) = parse_env("MAX_CODE_CHARACTERS") {
            config.max_code_chars = chars;
        }
        if let Ok(kind) = std::env::var("JUDGE_SANDBOX") {
            config.sandbox = match kind.as_str() {
                "worker" => SandboxKind::Worker,
                _ => SandboxKind::Process,
            };
        }

        config
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
