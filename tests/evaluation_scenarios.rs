//! End-to-end evaluation scenarios through the public engine API.

use approx::assert_relative_eq;
use cloneval_rs::io::loaders::{FragmentRecord, ReferenceRecord};
use cloneval_rs::{
    CloneTier, DetectionRange, DetectorRun, DuplicatePolicy, EvaluationConfig, EvaluationEngine,
    EvaluationReport, OverlapStrategy, ReportedPair, TierScope,
};

/// Four fragments, one per unit, each spanning lines 1-10.
fn corpus() -> Vec<FragmentRecord> {
    (1..=4)
        .map(|i| FragmentRecord {
            fragment_id: i.to_string(),
            unit: format!("F{i}.java"),
            start_line: 1,
            end_line: 10,
        })
        .collect()
}

fn reference(pairs: &[(u32, u32, CloneTier)]) -> Vec<ReferenceRecord> {
    pairs
        .iter()
        .map(|&(a, b, tier)| ReferenceRecord {
            fragment_a: a.to_string(),
            fragment_b: b.to_string(),
            tier,
            similarity: None,
        })
        .collect()
}

fn report(a: u32, b: u32) -> ReportedPair {
    ReportedPair::new(
        DetectionRange::new(format!("F{a}.java"), 1, 10),
        DetectionRange::new(format!("F{b}.java"), 1, 10),
    )
}

fn evaluate(
    config: EvaluationConfig,
    refs: &[(u32, u32, CloneTier)],
    reports: Vec<ReportedPair>,
) -> EvaluationReport {
    let engine = EvaluationEngine::new(config, corpus(), reference(refs)).unwrap();
    engine
        .evaluate(vec![DetectorRun::new("tool", reports)])
        .unwrap()
}

#[test]
fn exact_hit_scores_perfectly() {
    let report = evaluate(
        EvaluationConfig::default(),
        &[(1, 2, CloneTier::Type1)],
        vec![report(1, 2)],
    );

    let overall = report.row(TierScope::Overall, "tool").unwrap();
    assert_eq!(
        (overall.true_positives, overall.false_positives, overall.false_negatives),
        (1, 0, 0)
    );
    assert_relative_eq!(overall.precision, 1.0);
    assert_relative_eq!(overall.recall, 1.0);
    assert_relative_eq!(overall.f1, 1.0);
}

#[test]
fn unrelated_report_is_false_positive_and_miss() {
    let report = evaluate(
        EvaluationConfig::default(),
        &[(1, 2, CloneTier::Type1)],
        vec![report(3, 4)],
    );

    let overall = report.row(TierScope::Overall, "tool").unwrap();
    assert_eq!(
        (overall.true_positives, overall.false_positives, overall.false_negatives),
        (0, 1, 1)
    );
    assert_eq!(overall.precision, 0.0);
    assert_eq!(overall.recall, 0.0);
    assert_eq!(overall.f1, 0.0);
}

#[test]
fn tier_stacked_pair_covers_every_tier_once() {
    let report = evaluate(
        EvaluationConfig::default(),
        &[(1, 2, CloneTier::Type1), (1, 2, CloneTier::Type3)],
        vec![report(1, 2)],
    );

    for tier in [CloneTier::Type1, CloneTier::Type3] {
        let row = report.row(TierScope::Tier(tier), "tool").unwrap();
        assert_eq!(row.true_positives, 1, "{tier}");
        assert_eq!(row.false_negatives, 0, "{tier}");
    }

    let overall = report.row(TierScope::Overall, "tool").unwrap();
    assert_eq!(overall.true_positives, 1);
    assert_eq!(overall.false_positives, 0);
    assert_eq!(overall.covered, 2);
}

#[test]
fn empty_reference_set_yields_zero_not_nan() {
    let report = evaluate(EvaluationConfig::default(), &[], vec![report(1, 2)]);

    let overall = report.row(TierScope::Overall, "tool").unwrap();
    assert_eq!(
        (overall.true_positives, overall.false_positives, overall.false_negatives),
        (0, 1, 0)
    );
    assert_eq!(overall.recall, 0.0);
    assert_eq!(overall.precision, 0.0);
    assert!(report.rows.iter().all(|row| !row.f1.is_nan()));
}

#[test]
fn repeated_report_is_penalized_by_default() {
    let report = evaluate(
        EvaluationConfig::default(),
        &[(1, 2, CloneTier::Type1)],
        vec![report(1, 2), report(1, 2)],
    );

    let overall = report.row(TierScope::Overall, "tool").unwrap();
    assert_eq!(
        (overall.true_positives, overall.false_positives, overall.false_negatives),
        (1, 1, 0)
    );
    assert_relative_eq!(overall.precision, 0.5);
    assert_eq!(report.tool("tool").unwrap().matching.duplicates, 1);
}

#[test]
fn repeated_report_can_be_allowed_or_ignored() {
    let refs = [(1, 2, CloneTier::Type1)];

    let allowed = evaluate(
        EvaluationConfig::default().with_duplicate_policy(DuplicatePolicy::Allow),
        &refs,
        vec![report(1, 2), report(2, 1)],
    );
    let row = allowed.row(TierScope::Overall, "tool").unwrap();
    assert_eq!((row.true_positives, row.false_positives), (2, 0));

    let ignored = evaluate(
        EvaluationConfig::default().with_duplicate_policy(DuplicatePolicy::Ignore),
        &refs,
        vec![report(1, 2), report(2, 1)],
    );
    let row = ignored.row(TierScope::Overall, "tool").unwrap();
    assert_eq!((row.true_positives, row.false_positives), (1, 0));
    assert_eq!(ignored.tool("tool").unwrap().matching.ignored_duplicates, 1);
}

#[test]
fn every_tier_row_is_present_and_sorted() {
    let engine = EvaluationEngine::new(
        EvaluationConfig::default(),
        corpus(),
        reference(&[(1, 2, CloneTier::Type2)]),
    )
    .unwrap();
    let report = engine
        .evaluate(vec![
            DetectorRun::new("zeta", vec![report(1, 2)]),
            DetectorRun::new("alpha", vec![]),
        ])
        .unwrap();

    let order: Vec<(String, String)> = report
        .rows
        .iter()
        .map(|row| (row.scope.to_string(), row.tool.clone()))
        .collect();
    let expected: Vec<(String, String)> = ["T1", "T2", "T3", "T4", "overall"]
        .iter()
        .flat_map(|scope| {
            ["alpha", "zeta"]
                .iter()
                .map(move |tool| (scope.to_string(), tool.to_string()))
        })
        .collect();
    assert_eq!(order, expected);

    let empty_tier = report.row(TierScope::Tier(CloneTier::Type4), "zeta").unwrap();
    assert_eq!(empty_tier.true_positives, 0);
    assert_eq!(empty_tier.recall, 0.0);
}

#[test]
fn partial_overlap_resolves_under_coverage_ratio() {
    let engine = EvaluationEngine::new(
        EvaluationConfig::default().with_overlap_ratio(0.7),
        corpus(),
        reference(&[(1, 2, CloneTier::Type3)]),
    )
    .unwrap();

    let close = ReportedPair::new(
        DetectionRange::new("F1.java", 2, 9),
        DetectionRange::new("F2.java", 1, 12),
    );
    let far = ReportedPair::new(
        DetectionRange::new("F1.java", 1, 5),
        DetectionRange::new("F2.java", 1, 10),
    );
    let report = engine
        .evaluate(vec![
            DetectorRun::new("close", vec![close]),
            DetectorRun::new("far", vec![far]),
        ])
        .unwrap();

    assert_eq!(report.row(TierScope::Overall, "close").unwrap().true_positives, 1);
    let far_row = report.row(TierScope::Overall, "far").unwrap();
    assert_eq!(far_row.true_positives, 0);
    assert_eq!(report.tool("far").unwrap().ingest.unlabeled, 1);
}

#[test]
fn counters_conserve_reported_pairs() {
    let reports = vec![
        report(1, 2),
        report(2, 1),
        report(3, 4),
        ReportedPair::new(
            DetectionRange::new("F1.java", 1, 10),
            DetectionRange::new("Unlabeled.java", 1, 10),
        ),
        ReportedPair::new(
            DetectionRange::new("F1.java", 9, 2),
            DetectionRange::new("F2.java", 1, 10),
        ),
    ];

    for policy in [DuplicatePolicy::Penalize, DuplicatePolicy::Allow, DuplicatePolicy::Ignore] {
        let report = evaluate(
            EvaluationConfig::default().with_duplicate_policy(policy),
            &[(1, 2, CloneTier::Type1), (3, 4, CloneTier::Type2), (1, 3, CloneTier::Type4)],
            reports.clone(),
        );
        let summary = report.tool("tool").unwrap();
        let overall = report.row(TierScope::Overall, "tool").unwrap();

        assert_eq!(summary.ingest.reported, 5);
        assert_eq!(summary.ingest.malformed, 1);
        assert_eq!(summary.ingest.unlabeled, 1);
        assert_eq!(
            overall.true_positives + overall.false_positives,
            summary.ingest.resolved - summary.matching.ignored_duplicates,
            "{policy:?}"
        );
        assert_eq!(overall.covered + overall.false_negatives, 3);

        for tier in CloneTier::ALL {
            let row = report.row(TierScope::Tier(tier), "tool").unwrap();
            assert_eq!(row.true_positives + row.false_negatives, row.reference_pairs);
        }
    }
}

#[test]
fn full_width_reported_range_is_scored_not_fatal() {
    let mut config = EvaluationConfig::default().with_overlap_ratio(0.5);
    config.overlap.strategy = OverlapStrategy::Jaccard;

    let report = evaluate(
        config,
        &[(1, 2, CloneTier::Type1)],
        vec![
            ReportedPair::new(
                DetectionRange::new("F1.java", 0, u32::MAX),
                DetectionRange::new("F2.java", 1, 9),
            ),
            report(1, 2),
        ],
    );

    let summary = report.tool("tool").unwrap();
    assert_eq!(summary.ingest.reported, 2);
    assert_eq!(summary.ingest.unlabeled, 1);

    let overall = report.row(TierScope::Overall, "tool").unwrap();
    assert_eq!(
        (overall.true_positives, overall.false_positives, overall.false_negatives),
        (1, 0, 0)
    );
}
