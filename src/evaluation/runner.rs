//! Parallel evaluation of independent detector outputs.
//!
//! Each tool is ingested and matched on its own worker; the fragment index
//! and reference set are shared read-only. Results are ordered by tool id so
//! the outcome does not depend on scheduling.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::info;

use crate::core::config::EvaluationConfig;
use crate::core::errors::{CloneEvalError, Result};
use crate::corpus::fragments::FragmentIndex;
use crate::corpus::reference::ReferenceCloneSet;
use crate::evaluation::ingest::{DetectionIngest, ReportedPair};
use crate::evaluation::matcher::{Matcher, ToolVerdicts};
use crate::evaluation::overlap::policy_from_config;

/// One detector's output, as handed over by the loaders.
#[derive(Debug, Clone, Default)]
pub struct DetectorRun {
    /// Tool identifier
    pub tool: String,
    /// Reported pairs in output order
    pub pairs: Vec<ReportedPair>,
    /// Rows the loader could not parse
    pub malformed_rows: usize,
}

impl DetectorRun {
    /// Convenience constructor
    pub fn new(tool: impl Into<String>, pairs: Vec<ReportedPair>) -> Self {
        Self {
            tool: tool.into(),
            pairs,
            malformed_rows: 0,
        }
    }
}

/// Runs ingest and matching for every tool on a bounded worker pool.
#[derive(Debug)]
pub struct EvaluationRunner<'a> {
    index: &'a FragmentIndex,
    reference: &'a ReferenceCloneSet,
    config: &'a EvaluationConfig,
}

impl<'a> EvaluationRunner<'a> {
    /// Create a runner over a frozen index and its reference set
    pub fn new(
        index: &'a FragmentIndex,
        reference: &'a ReferenceCloneSet,
        config: &'a EvaluationConfig,
    ) -> Self {
        Self {
            index,
            reference,
            config,
        }
    }

    /// Merge runs sharing a tool id, keeping input order within the tool.
    pub fn merge_runs(runs: Vec<DetectorRun>) -> Vec<DetectorRun> {
        let mut merged: BTreeMap<String, DetectorRun> = BTreeMap::new();
        for run in runs {
            match merged.get_mut(&run.tool) {
                Some(existing) => {
                    existing.pairs.extend(run.pairs);
                    existing.malformed_rows += run.malformed_rows;
                }
                None => {
                    merged.insert(run.tool.clone(), run);
                }
            }
        }
        merged.into_values().collect()
    }

    /// Evaluate every run; verdicts come back sorted by tool id.
    pub fn run(&self, runs: Vec<DetectorRun>) -> Result<Vec<ToolVerdicts>> {
        let runs = Self::merge_runs(runs);
        let workers = self.config.effective_workers().min(runs.len().max(1));
        info!(
            "Evaluating {} tool(s) on {} worker(s) against {} reference pairs",
            runs.len(),
            workers,
            self.reference.len()
        );

        let policy = policy_from_config(&self.config.overlap);
        let ingest = DetectionIngest::new(self.index, policy.as_ref())?;
        let matcher = Matcher::new(self.reference, self.config.duplicates);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("cloneval-worker-{i}"))
            .build()
            .map_err(|e| CloneEvalError::internal(format!("failed to build worker pool: {e}")))?;

        let verdicts: Vec<ToolVerdicts> = pool.install(|| {
            runs.into_par_iter()
                .map(|run| {
                    let mut detections = ingest.ingest(&run.tool, run.pairs);
                    detections.stats.malformed += run.malformed_rows;
                    detections.stats.reported += run.malformed_rows;
                    let verdicts = matcher.match_detections(detections);
                    info!(
                        "{}: {} TP / {} FP / {} FN",
                        verdicts.tool,
                        verdicts.stats.true_positives,
                        verdicts.stats.false_positives,
                        verdicts.false_negatives.len()
                    );
                    verdicts
                })
                .collect()
        });

        Ok(verdicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::reference::CloneTier;
    use crate::evaluation::ingest::DetectionRange;

    fn setup() -> (FragmentIndex, ReferenceCloneSet) {
        let mut index = FragmentIndex::new();
        let a = index.load("A.java", 1, 10).unwrap();
        let b = index.load("B.java", 1, 10).unwrap();
        index.freeze();
        let mut reference = ReferenceCloneSet::new();
        reference
            .add_reference_pair(&index, a, b, CloneTier::Type2, None)
            .unwrap();
        (index, reference)
    }

    fn hit() -> ReportedPair {
        ReportedPair::new(
            DetectionRange::new("A.java", 1, 10),
            DetectionRange::new("B.java", 1, 10),
        )
    }

    #[test]
    fn test_results_sorted_by_tool() {
        let (index, reference) = setup();
        let config = EvaluationConfig {
            max_workers: Some(2),
            ..EvaluationConfig::default()
        };
        let runner = EvaluationRunner::new(&index, &reference, &config);

        let out = runner
            .run(vec![
                DetectorRun::new("zeta", vec![hit()]),
                DetectorRun::new("alpha", vec![]),
                DetectorRun::new("mid", vec![hit(), hit()]),
            ])
            .unwrap();

        let tools: Vec<&str> = out.iter().map(|v| v.tool.as_ref()).collect();
        assert_eq!(tools, vec!["alpha", "mid", "zeta"]);
        assert_eq!(out[0].false_negatives.len(), 1);
        assert_eq!(out[1].stats.false_positives, 1);
    }

    #[test]
    fn test_same_tool_runs_are_merged() {
        let mut second = DetectorRun::new("tool", vec![hit()]);
        second.malformed_rows = 2;
        let merged = EvaluationRunner::merge_runs(vec![DetectorRun::new("tool", vec![hit()]), second]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].pairs.len(), 2);
        assert_eq!(merged[0].malformed_rows, 2);
    }

    #[test]
    fn test_loader_malformed_rows_reach_stats() {
        let (index, reference) = setup();
        let config = EvaluationConfig::default();
        let mut run = DetectorRun::new("tool", vec![hit()]);
        run.malformed_rows = 3;

        let out = EvaluationRunner::new(&index, &reference, &config)
            .run(vec![run])
            .unwrap();
        assert_eq!(out[0].ingest.malformed, 3);
        assert_eq!(out[0].ingest.reported, 4);
    }
}
