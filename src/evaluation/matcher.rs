//! Matcher: classifies resolved reported pairs and reference pairs.
//!
//! Every resolved pair is looked up by canonical key in the reference set.
//! A hit covers all reference pairs stored under that key (one per tier) and
//! is a true positive tagged with the finest tier; a miss is a false
//! positive. Reference pairs left uncovered once the stream is exhausted are
//! false negatives.

use std::sync::Arc;

use ahash::AHashSet;
use bitvec::vec::BitVec;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::config::DuplicatePolicy;
use crate::corpus::reference::{CloneTier, PairKey, ReferenceCloneSet, ReferencePairId};
use crate::evaluation::coverage::CoverageLedger;
use crate::evaluation::ingest::{IngestStats, ToolDetections, UnlabeledDetection};

/// Classification of a reported or reference pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    /// Reported pair matching a reference pair
    TruePositive,
    /// Reported pair matching no reference pair
    FalsePositive,
    /// Reference pair no reported pair matched
    FalseNegative,
}

/// Verdict assigned to one resolved reported pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairVerdict {
    /// Position of the originating report in the tool's stream
    pub ordinal: usize,
    /// Canonical handle pair
    pub key: PairKey,
    /// TruePositive or FalsePositive
    pub verdict: Verdict,
    /// Finest tier matched (true positives only)
    pub tier: Option<CloneTier>,
    /// Whether the key had already been seen in this stream
    pub duplicate: bool,
}

/// Counters gathered while matching one tool's stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    /// Reported pairs classified TruePositive
    pub true_positives: usize,
    /// Reported pairs classified FalsePositive
    pub false_positives: usize,
    /// Repeated canonical keys seen (whatever the policy did with them)
    pub duplicates: usize,
    /// Repeats dropped under [`DuplicatePolicy::Ignore`]
    pub ignored_duplicates: usize,
}

/// Match result for one tool.
#[derive(Debug, Clone)]
pub struct ToolVerdicts {
    /// Tool identifier
    pub tool: Arc<str>,
    /// Verdicts of classified reported pairs, in stream order
    pub reported: Vec<PairVerdict>,
    /// Reference pairs nothing covered
    pub false_negatives: Vec<ReferencePairId>,
    /// Final covered flag per reference pair
    pub covered: BitVec,
    /// Reports touching unlabeled code
    pub unlabeled: Vec<UnlabeledDetection>,
    /// Ingest counters
    pub ingest: IngestStats,
    /// Matching counters
    pub stats: MatchStats,
}

impl ToolVerdicts {
    /// Whether reference pair `id` was covered
    pub fn is_covered(&self, id: ReferencePairId) -> bool {
        self.covered.get(id.index()).map_or(false, |bit| *bit)
    }

    /// Verdict of reference pair `id`: TruePositive once covered, FalseNegative otherwise
    pub fn reference_verdict(&self, id: ReferencePairId) -> Verdict {
        if self.is_covered(id) {
            Verdict::TruePositive
        } else {
            Verdict::FalseNegative
        }
    }

    /// Number of covered reference pairs
    pub fn covered_count(&self) -> usize {
        self.covered.count_ones()
    }
}

/// Classifies one tool's stream against a frozen reference set.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    reference: &'a ReferenceCloneSet,
    duplicates: DuplicatePolicy,
}

impl<'a> Matcher<'a> {
    /// Create a matcher
    pub fn new(reference: &'a ReferenceCloneSet, duplicates: DuplicatePolicy) -> Self {
        Self {
            reference,
            duplicates,
        }
    }

    /// Classify every resolved pair of `detections`, then every reference pair.
    pub fn match_detections(&self, detections: ToolDetections) -> ToolVerdicts {
        let ToolDetections {
            tool,
            pairs,
            unlabeled,
            stats: ingest,
        } = detections;

        let ledger = CoverageLedger::new(self.reference.len());
        let mut seen: AHashSet<PairKey> = AHashSet::with_capacity(pairs.len());
        let mut stats = MatchStats::default();
        let mut reported = Vec::with_capacity(pairs.len());

        for pair in &pairs {
            let duplicate = !seen.insert(pair.key);
            if duplicate {
                stats.duplicates += 1;
            }

            let verdict = match (duplicate, self.duplicates) {
                (true, DuplicatePolicy::Ignore) => {
                    debug!("{}: ignoring repeated pair {}", tool, pair.key);
                    stats.ignored_duplicates += 1;
                    continue;
                }
                (true, DuplicatePolicy::Penalize) => {
                    debug!("{}: penalizing repeated pair {}", tool, pair.key);
                    PairVerdict {
                        ordinal: pair.ordinal,
                        key: pair.key,
                        verdict: Verdict::FalsePositive,
                        tier: None,
                        duplicate,
                    }
                }
                _ => self.classify(&ledger, pair.ordinal, pair.key, duplicate),
            };

            match verdict.verdict {
                Verdict::TruePositive => stats.true_positives += 1,
                _ => stats.false_positives += 1,
            }
            reported.push(verdict);
        }

        let mut verdicts = ToolVerdicts {
            tool,
            reported,
            false_negatives: Vec::new(),
            covered: ledger.into_inner(),
            unlabeled,
            ingest,
            stats,
        };
        verdicts.false_negatives = self
            .reference
            .all_pairs(None)
            .map(|pair| pair.id)
            .filter(|&id| verdicts.reference_verdict(id) == Verdict::FalseNegative)
            .collect();

        debug!(
            "{}: {} TP, {} FP, {} FN, {} duplicates",
            verdicts.tool,
            verdicts.stats.true_positives,
            verdicts.stats.false_positives,
            verdicts.false_negatives.len(),
            verdicts.stats.duplicates
        );

        verdicts
    }

    fn classify(
        &self,
        ledger: &CoverageLedger,
        ordinal: usize,
        key: PairKey,
        duplicate: bool,
    ) -> PairVerdict {
        let matching = self.reference.pairs_for_key(key);
        if matching.is_empty() {
            return PairVerdict {
                ordinal,
                key,
                verdict: Verdict::FalsePositive,
                tier: None,
                duplicate,
            };
        }

        ledger.cover_all(matching);
        PairVerdict {
            ordinal,
            key,
            verdict: Verdict::TruePositive,
            tier: self.reference.finest_tier(key),
            duplicate,
        }
    }
}
