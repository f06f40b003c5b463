//! Scorer: reduces per-tool verdicts to precision, recall and F1.
//!
//! Tier rows count reference pairs (TP = covered, FN = uncovered) and carry
//! the tool's full false-positive count, since a false positive belongs to no
//! tier. The overall row counts reported pairs for TP/FP and computes recall
//! over distinct covered reference pairs. All ratios define `0/0` as `0`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::EvaluationConfig;
use crate::corpus::reference::{CloneTier, ReferenceCloneSet, SimilarityBand};
use crate::evaluation::ingest::IngestStats;
use crate::evaluation::matcher::{MatchStats, ToolVerdicts, Verdict};

/// Scope of a score row. Tiers sort before the overall row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierScope {
    /// One clone-type tier
    Tier(CloneTier),
    /// All tiers together
    Overall,
}

impl fmt::Display for TierScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tier(tier) => write!(f, "{tier}"),
            Self::Overall => f.write_str("overall"),
        }
    }
}

/// Metrics of one tool in one scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    /// Tier or overall
    pub scope: TierScope,
    /// Tool identifier
    pub tool: String,
    /// True positives
    pub true_positives: usize,
    /// False positives
    pub false_positives: usize,
    /// False negatives
    pub false_negatives: usize,
    /// Distinct reference pairs covered
    pub covered: usize,
    /// Reference pairs evaluated in this scope
    pub reference_pairs: usize,
    /// TP / (TP + FP)
    pub precision: f64,
    /// Covered / reference pairs
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
}

/// Recall restricted to one similarity band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandRecall {
    /// Similarity band
    pub band: SimilarityBand,
    /// Reference pairs with a similarity inside the band
    pub reference_pairs: usize,
    /// Of which covered
    pub covered: usize,
    /// Covered / reference pairs
    pub recall: f64,
}

/// Non-metric counters for one tool, always reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    /// Tool identifier
    pub tool: String,
    /// Ingest counters (unlabeled, malformed, self matches, ...)
    pub ingest: IngestStats,
    /// Matching counters (duplicates, ...)
    pub matching: MatchStats,
    /// Recall per similarity band
    pub bands: Vec<BandRecall>,
}

/// Reference set statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceSummary {
    /// Pairs evaluated
    pub evaluated_pairs: usize,
    /// Pairs excluded by `min_similarity` / `min_fragment_lines`
    pub excluded_pairs: usize,
    /// Repeated records collapsed at load time
    pub repeated_records: usize,
    /// Evaluated pairs per tier
    pub by_tier: Vec<(CloneTier, usize)>,
}

/// Complete result of an evaluation run, handed to report emitters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Generation timestamp
    pub generated_at: DateTime<Utc>,
    /// Effective configuration
    pub config: EvaluationConfig,
    /// Fragments in the corpus
    pub fragments: usize,
    /// Reference set statistics
    pub reference: ReferenceSummary,
    /// Score rows sorted by scope then tool
    pub rows: Vec<ScoreRow>,
    /// Per-tool counters sorted by tool
    pub tools: Vec<ToolSummary>,
}

impl EvaluationReport {
    /// Row for `scope` and `tool`
    pub fn row(&self, scope: TierScope, tool: &str) -> Option<&ScoreRow> {
        self.rows
            .iter()
            .find(|row| row.scope == scope && row.tool == tool)
    }

    /// Summary for `tool`
    pub fn tool(&self, tool: &str) -> Option<&ToolSummary> {
        self.tools.iter().find(|summary| summary.tool == tool)
    }
}

/// `numerator / denominator`, with `0/0 = 0`.
pub fn safe_ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Harmonic mean of precision and recall, `0` when both are `0`.
pub fn f1_score(precision: f64, recall: f64) -> f64 {
    let sum = precision + recall;
    if sum <= 0.0 {
        0.0
    } else {
        2.0 * precision * recall / sum
    }
}

/// Round half away from zero to `digits` decimals.
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor
}

/// Turns matcher output into an ordered score table.
#[derive(Debug, Clone, Copy)]
pub struct Scorer {
    rounding_digits: u32,
}

impl Default for Scorer {
    fn default() -> Self {
        Self { rounding_digits: 4 }
    }
}

impl Scorer {
    /// Scorer rounding to `rounding_digits` decimals
    pub fn new(rounding_digits: u32) -> Self {
        Self { rounding_digits }
    }

    fn row(
        &self,
        scope: TierScope,
        tool: &str,
        counts: (usize, usize, usize),
        covered: usize,
        reference_pairs: usize,
    ) -> ScoreRow {
        let (true_positives, false_positives, false_negatives) = counts;
        let precision = safe_ratio(true_positives, true_positives + false_positives);
        let recall = safe_ratio(covered, reference_pairs);
        let f1 = f1_score(precision, recall);

        ScoreRow {
            scope,
            tool: tool.to_string(),
            true_positives,
            false_positives,
            false_negatives,
            covered,
            reference_pairs,
            precision: round_to(precision, self.rounding_digits),
            recall: round_to(recall, self.rounding_digits),
            f1: round_to(f1, self.rounding_digits),
        }
    }

    /// Score rows for every tool, sorted by scope then tool id.
    pub fn score(&self, reference: &ReferenceCloneSet, verdicts: &[ToolVerdicts]) -> Vec<ScoreRow> {
        let mut rows = Vec::with_capacity(verdicts.len() * (CloneTier::ALL.len() + 1));

        for tool in verdicts {
            let name = tool.tool.as_ref();
            let false_positives = tool.stats.false_positives;

            for tier in CloneTier::ALL {
                let (total, covered) = reference
                    .all_pairs(Some(tier))
                    .fold((0, 0), |(total, covered), pair| {
                        let hit = tool.reference_verdict(pair.id) == Verdict::TruePositive;
                        (total + 1, covered + usize::from(hit))
                    });
                rows.push(self.row(
                    TierScope::Tier(tier),
                    name,
                    (covered, false_positives, total - covered),
                    covered,
                    total,
                ));
            }

            let covered = tool.covered_count();
            rows.push(self.row(
                TierScope::Overall,
                name,
                (
                    tool.stats.true_positives,
                    false_positives,
                    tool.false_negatives.len(),
                ),
                covered,
                reference.len(),
            ));
        }

        rows.sort_by(|a, b| a.scope.cmp(&b.scope).then_with(|| a.tool.cmp(&b.tool)));
        rows
    }

    /// Recall per similarity band over pairs that record a similarity.
    pub fn band_recall(&self, reference: &ReferenceCloneSet, tool: &ToolVerdicts) -> Vec<BandRecall> {
        SimilarityBand::ALL
            .iter()
            .map(|&band| {
                let (total, covered) = reference
                    .all_pairs(None)
                    .filter(|pair| {
                        pair.similarity
                            .is_some_and(|s| SimilarityBand::from_similarity(s) == band)
                    })
                    .fold((0, 0), |(total, covered), pair| {
                        let hit = tool.reference_verdict(pair.id) == Verdict::TruePositive;
                        (total + 1, covered + usize::from(hit))
                    });
                BandRecall {
                    band,
                    reference_pairs: total,
                    covered,
                    recall: round_to(safe_ratio(covered, total), self.rounding_digits),
                }
            })
            .collect()
    }

    /// Per-tool counters sorted by tool id.
    pub fn summarize(&self, reference: &ReferenceCloneSet, verdicts: &[ToolVerdicts]) -> Vec<ToolSummary> {
        let mut summaries: Vec<ToolSummary> = verdicts
            .iter()
            .map(|tool| ToolSummary {
                tool: tool.tool.to_string(),
                ingest: tool.ingest,
                matching: tool.stats,
                bands: self.band_recall(reference, tool),
            })
            .collect();
        summaries.sort_by(|a, b| a.tool.cmp(&b.tool));
        summaries
    }
}
