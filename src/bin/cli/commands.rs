//! Command Execution Logic
//!
//! Configuration loading, input loading, evaluation and progress feedback for
//! the `cloneval` subcommands.

use crate::cli::args::*;
use crate::cli::output::*;
use anyhow::Context;
use console::Term;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

use cloneval_rs::io::loaders::{self, InputFormat};
use cloneval_rs::{DetectorRun, DuplicatePolicy, EvaluationConfig, EvaluationEngine};

/// Main evaluate command implementation
pub async fn evaluate_command(args: EvaluateArgs) -> anyhow::Result<()> {
    let config = load_configuration(args.config.as_deref()).await?;
    let config = apply_overrides(config, &args.overrides);
    config.validate()?;

    let inputs = detection_inputs(&args);
    if inputs.is_empty() {
        info!("No detector output given; every reference pair will be a false negative");
    }

    let progress = spinner(args.quiet);
    progress.set_message("Loading corpus and reference set...");
    let engine = match load_engine(config, &args.corpus, &args.reference).await {
        Ok(engine) => engine,
        Err(e) => {
            progress.finish_and_clear();
            error!("Failed to load benchmark: {:#}", e);
            return Err(e);
        }
    };

    progress.set_message(format!("Loading {} detector output file(s)...", inputs.len()));
    let mut runs = Vec::with_capacity(inputs.len());
    for (tool, path) in inputs {
        runs.push(load_run(tool, path).await?);
    }

    progress.set_message("Matching and scoring...");
    let report = tokio::task::spawn_blocking(move || engine.evaluate(runs))
        .await
        .context("evaluation task panicked")??;
    progress.finish_and_clear();

    let rendered = render_report(&report, args.format)?;
    match &args.output {
        Some(path) => {
            tokio::fs::write(path, rendered)
                .await
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            if !args.quiet {
                eprintln!("{} {}", "📄 Report written to".bright_green(), path.display().to_string().cyan());
            }
        }
        None => print!("{rendered}"),
    }

    if !args.quiet && (args.format != OutputFormat::Table || args.output.is_some()) {
        eprintln!();
        eprintln!("{}", render_tool_summary(&report));
    }

    Ok(())
}

/// Print default configuration in YAML format
pub async fn print_default_config() -> anyhow::Result<()> {
    println!("{}", "# Default cloneval configuration".dimmed());
    println!("{}", "# Save this to a file and customize as needed".dimmed());
    println!("{}", "# Usage: cloneval evaluate --config your-config.yml ...".dimmed());
    println!();

    let config = EvaluationConfig::default();
    let yaml_output = serde_yaml::to_string(&config)?;
    println!("{yaml_output}");

    Ok(())
}

/// Validate a configuration file
pub async fn validate_config(args: ValidateConfigArgs) -> anyhow::Result<()> {
    println!(
        "{} {}",
        "🔍 Validating configuration:".bright_blue().bold(),
        args.config.display().to_string().cyan()
    );
    println!();

    let config = match load_configuration(Some(&args.config)).await.and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => {
            println!("{}", "✅ Configuration file is valid!".bright_green().bold());
            println!();
            config
        }
        Err(e) => {
            eprintln!("{} {:#}", "❌ Configuration validation failed:".red(), e);
            eprintln!();
            eprintln!("{}", "💡 Tip: Use 'cloneval print-default-config' to see valid format".dimmed());
            return Err(e);
        }
    };

    println!("{}", render_config_summary(&config));
    if args.detailed {
        println!();
        println!("{}", serde_yaml::to_string(&config)?);
    }

    Ok(())
}

/// Load configuration from file or use defaults
pub async fn load_configuration(config_path: Option<&Path>) -> anyhow::Result<EvaluationConfig> {
    match config_path {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config = EvaluationConfig::from_yaml_str(&content)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(EvaluationConfig::default()),
    }
}

/// Command-line flags take precedence over file values
pub fn apply_overrides(mut config: EvaluationConfig, overrides: &ConfigOverrides) -> EvaluationConfig {
    if let Some(ratio) = overrides.overlap_ratio {
        config.overlap.ratio = ratio;
    }
    if let Some(strategy) = overrides.overlap_strategy {
        config.overlap.strategy = strategy.into();
    }
    if overrides.allow_duplicates {
        config.duplicates = DuplicatePolicy::Allow;
    }
    if let Some(policy) = overrides.duplicate_policy {
        config.duplicates = policy.into();
    }
    if let Some(min_similarity) = overrides.min_similarity {
        config.min_similarity = Some(min_similarity);
    }
    if let Some(min_lines) = overrides.min_lines {
        config.min_fragment_lines = min_lines;
    }
    if let Some(workers) = overrides.workers {
        config.max_workers = Some(workers);
    }
    config
}

/// `--detections` files named by stem, followed by explicit `--tool` entries
fn detection_inputs(args: &EvaluateArgs) -> Vec<(String, PathBuf)> {
    args.detections
        .iter()
        .map(|path| (loaders::tool_id_from_path(path), path.clone()))
        .chain(args.tools.iter().cloned())
        .collect()
}

async fn read_text(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn load_engine(
    config: EvaluationConfig,
    corpus: &Path,
    reference: &Path,
) -> anyhow::Result<EvaluationEngine> {
    let corpus_text = read_text(corpus).await?;
    let reference_text = read_text(reference).await?;
    let corpus = corpus.to_path_buf();
    let reference = reference.to_path_buf();

    let engine = tokio::task::spawn_blocking(move || {
        let fragments = loaders::parse_corpus(
            &corpus_text,
            &corpus.display().to_string(),
            InputFormat::from_path(&corpus),
        )?;
        let pairs = loaders::parse_reference(
            &reference_text,
            &reference.display().to_string(),
            InputFormat::from_path(&reference),
        )?;
        EvaluationEngine::new(config, fragments, pairs)
    })
    .await
    .context("loader task panicked")??;

    Ok(engine)
}

async fn load_run(tool: String, path: PathBuf) -> anyhow::Result<DetectorRun> {
    let text = read_text(&path).await?;
    let batch = tokio::task::spawn_blocking(move || {
        loaders::parse_detections(&text, &path.display().to_string(), InputFormat::from_path(&path))
    })
    .await
    .context("loader task panicked")??;
    Ok(batch.into_run(tool))
}

/// Spinner on stderr, hidden when quiet or not attached to a terminal
fn spinner(quiet: bool) -> ProgressBar {
    if quiet || !Term::stderr().is_term() {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloneval_rs::OverlapStrategy;

    #[test]
    fn test_overrides_take_precedence() {
        let overrides = ConfigOverrides {
            overlap_ratio: Some(0.5),
            overlap_strategy: Some(OverlapStrategyArg::Jaccard),
            allow_duplicates: true,
            min_lines: Some(6),
            workers: Some(2),
            ..ConfigOverrides::default()
        };
        let config = apply_overrides(EvaluationConfig::default(), &overrides);

        assert_eq!(config.overlap.ratio, 0.5);
        assert_eq!(config.overlap.strategy, OverlapStrategy::Jaccard);
        assert_eq!(config.duplicates, DuplicatePolicy::Allow);
        assert_eq!(config.min_fragment_lines, 6);
        assert_eq!(config.max_workers, Some(2));
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let config = apply_overrides(EvaluationConfig::default(), &ConfigOverrides::default());
        assert_eq!(config, EvaluationConfig::default());
    }
}
