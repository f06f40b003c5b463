//! CLI Argument Structures
//!
//! Command definitions and argument enums used by the `cloneval` binary.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use cloneval_rs::{DuplicatePolicy, OverlapStrategy};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Clone detection benchmark evaluator
#[derive(Parser)]
#[command(name = "cloneval")]
#[command(version = VERSION)]
#[command(about = "📐 Cloneval - Clone Detection Benchmark Evaluator")]
#[command(long_about = "
Score the output of code clone detectors against a labeled reference set of
clone pairs. Reports precision, recall and F1 per clone type and overall.

Common Usage:

  # Evaluate one detector (tool id taken from the file name)
  cloneval evaluate --corpus corpus.csv --reference reference.csv --detections nicad.csv

  # Compare several detectors, naming one explicitly
  cloneval evaluate --corpus corpus.csv --reference reference.csv \\
      --detections nicad.csv --tool ccfinder=out/ccfx_pairs.csv

  # Stricter matching, machine-readable output
  cloneval evaluate --corpus corpus.csv --reference reference.csv \\
      --detections nicad.csv --overlap-ratio 0.9 --format json --output scores.json

  # Inspect configuration
  cloneval print-default-config > cloneval.yml
  cloneval validate-config --config cloneval.yml
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Score detector output against the reference set
    Evaluate(Box<EvaluateArgs>),

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Validate a configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),
}

#[derive(Args)]
pub struct EvaluateArgs {
    /// Corpus file listing labeled fragments
    #[arg(long, value_name = "FILE")]
    pub corpus: PathBuf,

    /// Reference clone pair file
    #[arg(long, value_name = "FILE")]
    pub reference: PathBuf,

    /// Detector output file; the tool id is the file stem (repeatable)
    #[arg(short = 'd', long = "detections", value_name = "FILE")]
    pub detections: Vec<PathBuf>,

    /// Detector output with an explicit tool id, as NAME=FILE (repeatable)
    #[arg(long = "tool", value_name = "NAME=FILE", value_parser = parse_tool_spec)]
    pub tools: Vec<(String, PathBuf)>,

    /// Configuration file (YAML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(short = 'f', long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Write the report to FILE instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Suppress progress and summary output
    #[arg(short, long)]
    pub quiet: bool,

    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Command-line overrides applied on top of the configuration file
#[derive(Args, Default)]
pub struct ConfigOverrides {
    /// Minimum overlap ratio for a reported range to match a fragment (0.0-1.0)
    #[arg(long)]
    pub overlap_ratio: Option<f64>,

    /// Overlap measure used to match reported ranges to fragments
    #[arg(long, value_enum)]
    pub overlap_strategy: Option<OverlapStrategyArg>,

    /// Count repeated reports of a pair normally (same as --duplicate-policy allow)
    #[arg(long, conflicts_with = "duplicate_policy")]
    pub allow_duplicates: bool,

    /// Treatment of repeated reports of the same pair
    #[arg(long, value_enum)]
    pub duplicate_policy: Option<DuplicatePolicyArg>,

    /// Exclude reference pairs whose recorded similarity is below this (0.0-1.0)
    #[arg(long)]
    pub min_similarity: Option<f64>,

    /// Exclude reference pairs where either fragment has fewer lines
    #[arg(long)]
    pub min_lines: Option<u32>,

    /// Maximum number of worker threads
    #[arg(short = 'j', long)]
    pub workers: Option<usize>,
}

#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Also print the fully resolved configuration
    #[arg(long)]
    pub detailed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    Table,
    /// JSON report
    Json,
    /// YAML report
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OverlapStrategyArg {
    /// Intersection over fragment length
    Coverage,
    /// Intersection over union
    Jaccard,
    /// Identical spans only
    Exact,
}

impl From<OverlapStrategyArg> for OverlapStrategy {
    fn from(arg: OverlapStrategyArg) -> Self {
        match arg {
            OverlapStrategyArg::Coverage => Self::Coverage,
            OverlapStrategyArg::Jaccard => Self::Jaccard,
            OverlapStrategyArg::Exact => Self::Exact,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DuplicatePolicyArg {
    /// Later repeats are false positives
    Penalize,
    /// Later repeats are classified normally
    Allow,
    /// Later repeats are dropped
    Ignore,
}

impl From<DuplicatePolicyArg> for DuplicatePolicy {
    fn from(arg: DuplicatePolicyArg) -> Self {
        match arg {
            DuplicatePolicyArg::Penalize => Self::Penalize,
            DuplicatePolicyArg::Allow => Self::Allow,
            DuplicatePolicyArg::Ignore => Self::Ignore,
        }
    }
}

/// Parse `NAME=FILE`
fn parse_tool_spec(value: &str) -> Result<(String, PathBuf), String> {
    match value.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => Err(format!("expected NAME=FILE, got '{value}'")),
    }
}
