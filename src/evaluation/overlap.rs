//! Overlap predicates deciding whether a reported line range refers to a
//! labeled fragment.
//!
//! Detectors rarely report the exact boundaries of a labeled fragment, so a
//! range is compared with each candidate fragment of the same unit through an
//! [`OverlapPolicy`]. The policy is chosen from [`OverlapConfig`] and kept
//! independent of the matcher.

use std::fmt::Debug;

use crate::core::config::{OverlapConfig, OverlapStrategy};
use crate::corpus::fragments::LineSpan;

/// Slack applied to ratio comparisons so `7/10 >= 0.7` holds despite float rounding.
const RATIO_EPSILON: f64 = 1e-9;

/// Geometric predicate between a reported range and a reference fragment.
pub trait OverlapPolicy: Debug + Send + Sync {
    /// Name used in logs and reports
    fn name(&self) -> &'static str;

    /// Overlap score in [0, 1]
    fn score(&self, reported: LineSpan, fragment: LineSpan) -> f64;

    /// Whether `reported` refers to `fragment`
    fn matches(&self, reported: LineSpan, fragment: LineSpan) -> bool;
}

fn share(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

fn meets_ratio(numerator: u64, denominator: u64, ratio: f64) -> bool {
    denominator > 0 && share(numerator, denominator) + RATIO_EPSILON >= ratio
}

/// Share of the fragment covered by the reported range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverageOverlap {
    /// Minimum intersection / fragment length
    pub ratio: f64,
}

impl OverlapPolicy for CoverageOverlap {
    fn name(&self) -> &'static str {
        "coverage"
    }

    fn score(&self, reported: LineSpan, fragment: LineSpan) -> f64 {
        share(reported.intersection(&fragment), fragment.len())
    }

    fn matches(&self, reported: LineSpan, fragment: LineSpan) -> bool {
        let shared = reported.intersection(&fragment);
        shared > 0 && meets_ratio(shared, fragment.len(), self.ratio)
    }
}

/// Intersection over union of both spans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JaccardOverlap {
    /// Minimum intersection / union
    pub ratio: f64,
}

impl OverlapPolicy for JaccardOverlap {
    fn name(&self) -> &'static str {
        "jaccard"
    }

    fn score(&self, reported: LineSpan, fragment: LineSpan) -> f64 {
        share(reported.intersection(&fragment), reported.union_len(&fragment))
    }

    fn matches(&self, reported: LineSpan, fragment: LineSpan) -> bool {
        let shared = reported.intersection(&fragment);
        shared > 0 && meets_ratio(shared, reported.union_len(&fragment), self.ratio)
    }
}

/// Reported range must equal the fragment span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExactSpan;

impl OverlapPolicy for ExactSpan {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn score(&self, reported: LineSpan, fragment: LineSpan) -> f64 {
        if reported == fragment {
            1.0
        } else {
            0.0
        }
    }

    fn matches(&self, reported: LineSpan, fragment: LineSpan) -> bool {
        reported == fragment
    }
}

/// Build the policy selected by `config`.
pub fn policy_from_config(config: &OverlapConfig) -> Box<dyn OverlapPolicy> {
    match config.strategy {
        OverlapStrategy::Coverage => Box::new(CoverageOverlap {
            ratio: config.ratio,
        }),
        OverlapStrategy::Jaccard => Box::new(JaccardOverlap {
            ratio: config.ratio,
        }),
        OverlapStrategy::Exact => Box::new(ExactSpan),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn span(start: u32, end: u32) -> LineSpan {
        LineSpan::new(start, end).unwrap()
    }

    #[test]
    fn test_coverage_threshold_is_inclusive() {
        let policy = CoverageOverlap { ratio: 0.7 };
        let fragment = span(1, 10);

        assert!(policy.matches(span(1, 7), fragment));
        assert!(!policy.matches(span(1, 6), fragment));
        assert_relative_eq!(policy.score(span(1, 7), fragment), 0.7);
    }

    #[test]
    fn test_coverage_measures_fragment_not_range() {
        let policy = CoverageOverlap { ratio: 0.7 };
        // A file-level report swallowing the whole fragment still covers it fully
        assert!(policy.matches(span(1, 1000), span(100, 120)));
        assert_relative_eq!(policy.score(span(1, 1000), span(100, 120)), 1.0);
    }

    #[test]
    fn test_disjoint_never_matches() {
        let coverage = CoverageOverlap { ratio: 0.0 };
        let jaccard = JaccardOverlap { ratio: 0.0 };
        assert!(!coverage.matches(span(1, 5), span(6, 10)));
        assert!(!jaccard.matches(span(1, 5), span(6, 10)));
    }

    #[test]
    fn test_jaccard_penalizes_oversized_ranges() {
        let policy = JaccardOverlap { ratio: 0.5 };
        assert!(!policy.matches(span(1, 1000), span(100, 120)));
        assert!(policy.matches(span(1, 10), span(1, 12)));
        assert_relative_eq!(policy.score(span(1, 10), span(6, 15)), 5.0 / 15.0);
    }

    #[test]
    fn test_full_width_range_does_not_overflow() {
        let whole = span(0, u32::MAX);
        let fragment = span(1, 9);
        let jaccard = JaccardOverlap { ratio: 0.5 };
        let coverage = CoverageOverlap { ratio: 0.7 };

        assert_eq!(whole.len(), 1 << 32);
        assert_eq!(whole.union_len(&fragment), 1 << 32);
        assert!(!jaccard.matches(whole, fragment));
        assert!(jaccard.score(whole, fragment) < 1e-8);
        assert!(coverage.matches(whole, fragment));
        assert!(coverage.matches(span(u32::MAX, u32::MAX), span(u32::MAX, u32::MAX)));
    }

    #[test]
    fn test_exact_span() {
        assert!(ExactSpan.matches(span(3, 9), span(3, 9)));
        assert!(!ExactSpan.matches(span(3, 9), span(3, 10)));
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = OverlapConfig::default();
        assert_eq!(policy_from_config(&config).name(), "coverage");

        config.strategy = OverlapStrategy::Jaccard;
        assert_eq!(policy_from_config(&config).name(), "jaccard");

        config.strategy = OverlapStrategy::Exact;
        assert_eq!(policy_from_config(&config).name(), "exact");
    }
}
