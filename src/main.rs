use anyhow::Context;
use clap::Parser;

use pyjudge::config::{CliArgs, ExecConfig};
use pyjudge::evaluator::Evaluator;
use pyjudge::sandbox::create_sandbox;
use pyjudge::suite::SuiteRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = CliArgs::parse();
    let mut config = ExecConfig::from_env();
    config.sandbox = cli.sandbox;

    let registry = match &cli.suites_path {
        Some(path) => SuiteRegistry::from_file(path)
            .with_context(|| format!("Failed to load suite registry from {path}"))?,
        None => SuiteRegistry::builtin(),
    };
    log::info!("Suite registry loaded with {} challenges", registry.len());

    let code = std::fs::read_to_string(&cli.file)
        .with_context(|| format!("Failed to read solution file {}", cli.file))?;

    let sandbox = create_sandbox(&config);
    let evaluator = Evaluator::new(registry, sandbox, &config);

    match evaluator.evaluate(&cli.challenge, &code).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.passed {
                std::process::exit(1);
            }
        }
        Err(e) => {
            log::error!("Evaluation failed: {e}");
            std::process::exit(2);
        }
    }

    Ok(())
}
