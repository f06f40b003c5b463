//! Detection ingest: maps a detector's reported ranges onto labeled fragments.
//!
//! Each endpoint of a reported pair is resolved to every fragment it overlaps
//! under the configured [`OverlapPolicy`]. A file-granularity report may
//! therefore fan out into many resolved pairs. Reports touching code the
//! corpus never labeled are kept aside as [`UnlabeledDetection`]s.

use std::sync::Arc;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::core::errors::{CloneEvalError, Result};
use crate::corpus::fragments::{FragmentHandle, FragmentIndex, LineSpan};
use crate::corpus::reference::PairKey;
use crate::evaluation::overlap::OverlapPolicy;

/// A line range reported by a detector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DetectionRange {
    /// Containing unit identifier
    pub unit: String,
    /// First reported line
    pub start_line: u32,
    /// Last reported line (inclusive)
    pub end_line: u32,
}

impl DetectionRange {
    /// Convenience constructor
    pub fn new(unit: impl Into<String>, start_line: u32, end_line: u32) -> Self {
        Self {
            unit: unit.into(),
            start_line,
            end_line,
        }
    }

    /// Span of the range, `None` if inverted
    pub fn span(&self) -> Option<LineSpan> {
        LineSpan::new(self.start_line, self.end_line)
    }
}

impl std::fmt::Display for DetectionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.unit, self.start_line, self.end_line)
    }
}

/// One clone pair as reported by a detector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportedPair {
    /// First reported range
    pub a: DetectionRange,
    /// Second reported range
    pub b: DetectionRange,
}

impl ReportedPair {
    /// Convenience constructor
    pub fn new(a: DetectionRange, b: DetectionRange) -> Self {
        Self { a, b }
    }
}

/// A reported pair expressed in fragment-handle space.
#[derive(Debug, Clone)]
pub struct ResolvedReportedPair {
    /// Tool that reported the pair
    pub tool: Arc<str>,
    /// Canonical handle pair
    pub key: PairKey,
    /// Position of the originating report in the tool's stream
    pub ordinal: usize,
    /// Original ranges, kept for traceability
    pub source: Arc<ReportedPair>,
}

/// Which endpoints of a report could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedSide {
    /// Only the first range
    First,
    /// Only the second range
    Second,
    /// Both ranges
    Both,
}

/// A report touching code the corpus did not label.
#[derive(Debug, Clone, Serialize)]
pub struct UnlabeledDetection {
    /// Position of the report in the tool's stream
    pub ordinal: usize,
    /// Unresolved endpoint(s)
    pub side: UnresolvedSide,
    /// Original ranges
    pub source: Arc<ReportedPair>,
}

/// Counters gathered while ingesting one tool's output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Reports received
    pub reported: usize,
    /// Resolved pairs produced (after fan-out)
    pub resolved: usize,
    /// Reports with at least one unresolvable range
    pub unlabeled: usize,
    /// Reports rejected as malformed (inverted ranges, unparsable rows)
    pub malformed: usize,
    /// Fan-out combinations whose endpoints resolved to the same fragment
    pub self_matches: usize,
}

/// Ingest result for one tool.
#[derive(Debug, Clone)]
pub struct ToolDetections {
    /// Tool identifier
    pub tool: Arc<str>,
    /// Resolved pairs in stream order
    pub pairs: Vec<ResolvedReportedPair>,
    /// Reports that touched unlabeled code
    pub unlabeled: Vec<UnlabeledDetection>,
    /// Counters
    pub stats: IngestStats,
}

/// Resolves reported ranges against a frozen [`FragmentIndex`].
#[derive(Debug)]
pub struct DetectionIngest<'a> {
    index: &'a FragmentIndex,
    policy: &'a dyn OverlapPolicy,
}

impl<'a> DetectionIngest<'a> {
    /// Create an ingest stage. The index must be frozen.
    pub fn new(index: &'a FragmentIndex, policy: &'a dyn OverlapPolicy) -> Result<Self> {
        if !index.is_frozen() {
            return Err(CloneEvalError::internal(
                "fragment index must be frozen before detections are ingested",
            ));
        }
        Ok(Self { index, policy })
    }

    /// Fragments `range` refers to under the overlap policy, in span order.
    pub fn resolve(&self, range: &DetectionRange) -> SmallVec<[FragmentHandle; 4]> {
        let Some(span) = range.span() else {
            return SmallVec::new();
        };

        self.index
            .intersecting(&range.unit, span)
            .into_iter()
            .filter(|&handle| {
                self.index
                    .get(handle)
                    .is_some_and(|fragment| self.policy.matches(span, fragment.span))
            })
            .collect()
    }

    /// Resolve one tool's reported pairs.
    pub fn ingest<I>(&self, tool: &str, reported: I) -> ToolDetections
    where
        I: IntoIterator<Item = ReportedPair>,
    {
        let tool: Arc<str> = Arc::from(tool);
        let mut stats = IngestStats::default();
        let mut pairs = Vec::new();
        let mut unlabeled = Vec::new();
        let mut report_keys: AHashSet<PairKey> = AHashSet::new();

        for (ordinal, report) in reported.into_iter().enumerate() {
            stats.reported += 1;

            if report.a.span().is_none() || report.b.span().is_none() {
                warn!(
                    "{}: skipping malformed report #{} ({} / {})",
                    tool, ordinal, report.a, report.b
                );
                stats.malformed += 1;
                continue;
            }

            let source = Arc::new(report);
            let first = self.resolve(&source.a);
            let second = self.resolve(&source.b);

            let side = match (first.is_empty(), second.is_empty()) {
                (false, false) => None,
                (true, false) => Some(UnresolvedSide::First),
                (false, true) => Some(UnresolvedSide::Second),
                (true, true) => Some(UnresolvedSide::Both),
            };
            if let Some(side) = side {
                debug!("{}: report #{} touches unlabeled code ({:?})", tool, ordinal, side);
                stats.unlabeled += 1;
                unlabeled.push(UnlabeledDetection {
                    ordinal,
                    side,
                    source,
                });
                continue;
            }

            // Overlapping endpoints can yield (x, y) and (y, x) from one report
            report_keys.clear();
            for &a in &first {
                for &b in &second {
                    match PairKey::new(a, b) {
                        Some(key) if report_keys.insert(key) => pairs.push(ResolvedReportedPair {
                            tool: Arc::clone(&tool),
                            key,
                            ordinal,
                            source: Arc::clone(&source),
                        }),
                        Some(_) => {}
                        None => stats.self_matches += 1,
                    }
                }
            }
        }

        stats.resolved = pairs.len();
        debug!(
            "{}: ingested {} reports into {} resolved pairs ({} unlabeled, {} malformed)",
            tool, stats.reported, stats.resolved, stats.unlabeled, stats.malformed
        );

        ToolDetections {
            tool,
            pairs,
            unlabeled,
            stats,
        }
    }
}
