//! Configuration types and management for cloneval-rs.
//!
//! A single [`EvaluationConfig`] drives one evaluation run. It can be loaded
//! from YAML, and every section falls back to its default when omitted so a
//! partial file is always valid input.

pub mod validation;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::{CloneEvalError, Result, ResultExt};

pub use validation::{validate_bounded_u32, validate_positive_usize, validate_unit_range};

/// Geometric predicate used to resolve a reported range to labeled fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapStrategy {
    /// Intersection over the reference fragment's length
    Coverage,
    /// Intersection over union of both spans
    Jaccard,
    /// Spans must be identical
    Exact,
}

impl Default for OverlapStrategy {
    fn default() -> Self {
        Self::Coverage
    }
}

impl std::str::FromStr for OverlapStrategy {
    type Err = CloneEvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coverage" | "containment" => Ok(Self::Coverage),
            "jaccard" | "iou" => Ok(Self::Jaccard),
            "exact" => Ok(Self::Exact),
            other => Err(CloneEvalError::config_field(
                format!("Unknown overlap strategy '{other}' (expected coverage, jaccard or exact)"),
                "overlap.strategy",
            )),
        }
    }
}

/// How repeated reports of the same canonical pair are charged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Later repeats are false positives
    Penalize,
    /// Later repeats are classified like the first occurrence
    Allow,
    /// Later repeats are dropped from TP and FP alike
    Ignore,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self::Penalize
    }
}

impl std::str::FromStr for DuplicatePolicy {
    type Err = CloneEvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "penalize" => Ok(Self::Penalize),
            "allow" => Ok(Self::Allow),
            "ignore" => Ok(Self::Ignore),
            other => Err(CloneEvalError::config_field(
                format!("Unknown duplicate policy '{other}' (expected penalize, allow or ignore)"),
                "duplicates",
            )),
        }
    }
}

/// Overlap resolution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapConfig {
    /// Predicate used to compare a reported range with a fragment
    #[serde(default)]
    pub strategy: OverlapStrategy,

    /// Minimum overlap ratio (0.0-1.0) for the coverage and jaccard strategies
    #[serde(default = "OverlapConfig::default_ratio")]
    pub ratio: f64,
}

impl Default for OverlapConfig {
    fn default() -> Self {
        Self {
            strategy: OverlapStrategy::default(),
            ratio: Self::default_ratio(),
        }
    }
}

impl OverlapConfig {
    const fn default_ratio() -> f64 {
        0.7
    }

    /// Validate overlap settings
    pub fn validate(&self) -> Result<()> {
        validate_unit_range(self.ratio, "overlap.ratio")?;
        if self.strategy != OverlapStrategy::Exact && self.ratio <= 0.0 {
            return Err(CloneEvalError::config_field(
                "overlap.ratio must be greater than 0.0 unless strategy is exact",
                "overlap.ratio",
            ));
        }
        Ok(())
    }
}

/// Main configuration for an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Range-to-fragment resolution
    #[serde(default)]
    pub overlap: OverlapConfig,

    /// Charging of repeated reports
    #[serde(default)]
    pub duplicates: DuplicatePolicy,

    /// Reference pairs with a recorded similarity below this are not evaluated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_similarity: Option<f64>,

    /// Reference pairs whose fragments span fewer lines are not evaluated
    #[serde(default = "EvaluationConfig::default_min_fragment_lines")]
    pub min_fragment_lines: u32,

    /// Worker pool size for per-tool evaluation (None = available parallelism)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_workers: Option<usize>,

    /// Decimal places kept on precision, recall and F1
    #[serde(default = "EvaluationConfig::default_rounding_digits")]
    pub rounding_digits: u32,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            overlap: OverlapConfig::default(),
            duplicates: DuplicatePolicy::default(),
            min_similarity: None,
            min_fragment_lines: Self::default_min_fragment_lines(),
            max_workers: None,
            rounding_digits: Self::default_rounding_digits(),
        }
    }
}

impl EvaluationConfig {
    /// Upper bound for `rounding_digits`
    pub const MAX_ROUNDING_DIGITS: u32 = 10;

    const fn default_min_fragment_lines() -> u32 {
        1
    }

    const fn default_rounding_digits() -> u32 {
        4
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CloneEvalError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| CloneEvalError::config(format!("Invalid YAML configuration: {e}")))
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            CloneEvalError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Builder-style override of the overlap ratio
    pub fn with_overlap_ratio(mut self, ratio: f64) -> Self {
        self.overlap.ratio = ratio;
        self
    }

    /// Builder-style override of the duplicate policy
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicates = policy;
        self
    }

    /// Number of worker threads the runner should use
    pub fn effective_workers(&self) -> usize {
        self.max_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(1)
        })
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        self.overlap.validate()?;

        if let Some(min_similarity) = self.min_similarity {
            validate_unit_range(min_similarity, "min_similarity")?;
        }
        if let Some(workers) = self.max_workers {
            validate_positive_usize(workers, "max_workers")?;
        }
        validate_bounded_u32(
            self.rounding_digits,
            0,
            Self::MAX_ROUNDING_DIGITS,
            "rounding_digits",
        )?;

        Ok(())
    }
}
