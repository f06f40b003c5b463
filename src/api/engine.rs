//! Main evaluation engine implementation.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info};

use crate::core::config::EvaluationConfig;
use crate::core::errors::{CloneEvalError, Result};
use crate::corpus::fragments::FragmentIndex;
use crate::corpus::reference::{ReferenceCloneSet, ReferencePair};
use crate::evaluation::matcher::ToolVerdicts;
use crate::evaluation::runner::{DetectorRun, EvaluationRunner};
use crate::evaluation::scorer::{EvaluationReport, ReferenceSummary, Scorer};
use crate::io::loaders::{self, FragmentRecord, ReferenceRecord};

/// Evaluation engine: a frozen corpus and reference set, scored against detector runs.
#[derive(Debug)]
pub struct EvaluationEngine {
    config: EvaluationConfig,
    index: FragmentIndex,
    reference: ReferenceCloneSet,
    excluded_pairs: usize,
}

impl EvaluationEngine {
    /// Build the fragment index and reference set from parsed records.
    ///
    /// Any duplicate or unknown fragment aborts construction.
    pub fn new(
        config: EvaluationConfig,
        corpus: Vec<FragmentRecord>,
        reference: Vec<ReferenceRecord>,
    ) -> Result<Self> {
        info!("Initializing clone evaluation engine");
        config.validate()?;

        let mut index = FragmentIndex::new();
        for record in &corpus {
            index.load_with_id(
                &record.fragment_id,
                &record.unit,
                record.start_line,
                record.end_line,
            )?;
        }
        index.freeze();

        let mut full = ReferenceCloneSet::new();
        for record in &reference {
            let context = || {
                format!(
                    "reference pair ({}, {}, {})",
                    record.fragment_a, record.fragment_b, record.tier
                )
            };
            let a = index
                .by_external_id(&record.fragment_a)
                .ok_or_else(|| CloneEvalError::unknown_fragment(&record.fragment_a, context()))?;
            let b = index
                .by_external_id(&record.fragment_b)
                .ok_or_else(|| CloneEvalError::unknown_fragment(&record.fragment_b, context()))?;
            full.add_reference_pair(&index, a, b, record.tier, record.similarity)?;
        }

        let evaluated = full.filtered(&index, |pair| Self::is_evaluated(&config, &index, pair))?;
        let excluded_pairs = full.len() - evaluated.len();
        if excluded_pairs > 0 {
            debug!(
                "Excluded {} reference pairs below similarity/size thresholds",
                excluded_pairs
            );
        }

        info!(
            "Loaded {} fragments across {} units, {} reference pairs ({} evaluated)",
            index.len(),
            index.unit_count(),
            full.len(),
            evaluated.len()
        );

        Ok(Self {
            config,
            index,
            reference: evaluated,
            excluded_pairs,
        })
    }

    /// Load corpus and reference mapping from files.
    pub fn from_paths(config: EvaluationConfig, corpus: &Path, reference: &Path) -> Result<Self> {
        let corpus = loaders::load_corpus_file(corpus)?;
        let reference = loaders::load_reference_file(reference)?;
        Self::new(config, corpus, reference)
    }

    fn is_evaluated(config: &EvaluationConfig, index: &FragmentIndex, pair: &ReferencePair) -> bool {
        let similar_enough = match (config.min_similarity, pair.similarity) {
            (Some(min), Some(similarity)) => similarity >= min,
            _ => true,
        };
        let large_enough = [pair.key.first(), pair.key.second()].iter().all(|&handle| {
            index
                .get(handle)
                .is_some_and(|fragment| fragment.line_count() >= u64::from(config.min_fragment_lines))
        });
        similar_enough && large_enough
    }

    /// Effective configuration
    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Frozen fragment index
    pub fn index(&self) -> &FragmentIndex {
        &self.index
    }

    /// Reference pairs under evaluation
    pub fn reference(&self) -> &ReferenceCloneSet {
        &self.reference
    }

    /// Ingest and match every run, returning raw verdicts sorted by tool.
    pub fn match_runs(&self, runs: Vec<DetectorRun>) -> Result<Vec<ToolVerdicts>> {
        EvaluationRunner::new(&self.index, &self.reference, &self.config).run(runs)
    }

    /// Score detector runs against the reference set.
    pub fn evaluate(&self, runs: Vec<DetectorRun>) -> Result<EvaluationReport> {
        let verdicts = self.match_runs(runs)?;
        let scorer = Scorer::new(self.config.rounding_digits);

        let report = EvaluationReport {
            generated_at: Utc::now(),
            config: self.config.clone(),
            fragments: self.index.len(),
            reference: ReferenceSummary {
                evaluated_pairs: self.reference.len(),
                excluded_pairs: self.excluded_pairs,
                repeated_records: self.reference.repeated_records(),
                by_tier: self.reference.tier_counts(),
            },
            rows: scorer.score(&self.reference, &verdicts),
            tools: scorer.summarize(&self.reference, &verdicts),
        };

        info!(
            "Evaluation completed: {} tool(s), {} score rows",
            report.tools.len(),
            report.rows.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::reference::CloneTier;

    fn fragment(id: &str, unit: &str, start: u32, end: u32) -> FragmentRecord {
        FragmentRecord {
            fragment_id: id.into(),
            unit: unit.into(),
            start_line: start,
            end_line: end,
        }
    }

    fn reference(a: &str, b: &str, tier: CloneTier, similarity: Option<f64>) -> ReferenceRecord {
        ReferenceRecord {
            fragment_a: a.into(),
            fragment_b: b.into(),
            tier,
            similarity,
        }
    }

    #[test]
    fn test_unknown_reference_fragment_is_fatal() {
        let err = EvaluationEngine::new(
            EvaluationConfig::default(),
            vec![fragment("1", "A", 1, 5)],
            vec![reference("1", "9", CloneTier::Type1, None)],
        )
        .unwrap_err();

        assert!(err.is_fatal_load_error());
        assert!(err.to_string().contains("'9'"));
    }

    #[test]
    fn test_duplicate_fragment_is_fatal() {
        let err = EvaluationEngine::new(
            EvaluationConfig::default(),
            vec![fragment("1", "A", 1, 5), fragment("2", "A", 1, 5)],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, CloneEvalError::DuplicateFragment { .. }));
    }

    #[test]
    fn test_thresholds_exclude_reference_pairs() {
        let config = EvaluationConfig {
            min_similarity: Some(0.5),
            min_fragment_lines: 6,
            ..EvaluationConfig::default()
        };
        let engine = EvaluationEngine::new(
            config,
            vec![
                fragment("1", "A", 1, 10),
                fragment("2", "B", 1, 10),
                fragment("3", "C", 1, 3),
            ],
            vec![
                reference("1", "2", CloneTier::Type3, Some(0.8)),
                reference("1", "2", CloneTier::Type4, Some(0.3)),
                reference("1", "3", CloneTier::Type1, None),
            ],
        )
        .unwrap();

        assert_eq!(engine.reference().len(), 1);
        let report = engine.evaluate(vec![]).unwrap();
        assert_eq!(report.reference.excluded_pairs, 2);
        assert_eq!(report.reference.evaluated_pairs, 1);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EvaluationConfig::default().with_overlap_ratio(2.0);
        assert!(EvaluationEngine::new(config, vec![], vec![]).is_err());
    }
}
