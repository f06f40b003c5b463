//! Output Formatting and Display Functions
//!
//! Renders an [`EvaluationReport`] as tables, JSON or YAML.

use crate::cli::args::OutputFormat;
use tabled::{settings::Style as TableStyle, Table, Tabled};

use cloneval_rs::evaluation::scorer::ToolSummary;
use cloneval_rs::{EvaluationConfig, EvaluationReport};

#[derive(Tabled)]
struct ScoreTableRow {
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Tool")]
    tool: String,
    #[tabled(rename = "TP")]
    true_positives: usize,
    #[tabled(rename = "FP")]
    false_positives: usize,
    #[tabled(rename = "FN")]
    false_negatives: usize,
    #[tabled(rename = "Covered")]
    covered: String,
    #[tabled(rename = "Precision")]
    precision: String,
    #[tabled(rename = "Recall")]
    recall: String,
    #[tabled(rename = "F1")]
    f1: String,
}

#[derive(Tabled)]
struct SummaryTableRow {
    #[tabled(rename = "Tool")]
    tool: String,
    #[tabled(rename = "Reported")]
    reported: usize,
    #[tabled(rename = "Resolved")]
    resolved: usize,
    #[tabled(rename = "Unlabeled")]
    unlabeled: usize,
    #[tabled(rename = "Malformed")]
    malformed: usize,
    #[tabled(rename = "Self matches")]
    self_matches: usize,
    #[tabled(rename = "Duplicates")]
    duplicates: usize,
    #[tabled(rename = "Ignored dups")]
    ignored_duplicates: usize,
}

#[derive(Tabled)]
struct BandTableRow {
    #[tabled(rename = "Tool")]
    tool: String,
    #[tabled(rename = "Band")]
    band: String,
    #[tabled(rename = "Reference pairs")]
    reference_pairs: usize,
    #[tabled(rename = "Covered")]
    covered: usize,
    #[tabled(rename = "Recall")]
    recall: String,
}

#[derive(Tabled)]
struct ConfigRow {
    setting: String,
    value: String,
}

fn format_metric(value: f64, digits: u32) -> String {
    format!("{value:.prec$}", prec = digits as usize)
}

/// Render the full report in the requested format
pub fn render_report(report: &EvaluationReport, format: OutputFormat) -> anyhow::Result<String> {
    let rendered = match format {
        OutputFormat::Json => {
            let mut content = serde_json::to_string_pretty(report)?;
            content.push('\n');
            content
        }
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
        OutputFormat::Table => render_tables(report),
    };
    Ok(rendered)
}

fn render_tables(report: &EvaluationReport) -> String {
    let digits = report.config.rounding_digits;
    let mut out = String::new();

    out.push_str(&format!(
        "Fragments: {}  Reference pairs: {} evaluated, {} excluded, {} repeated records\n",
        report.fragments,
        report.reference.evaluated_pairs,
        report.reference.excluded_pairs,
        report.reference.repeated_records
    ));
    let tiers: Vec<String> = report
        .reference
        .by_tier
        .iter()
        .map(|(tier, count)| format!("{tier}={count}"))
        .collect();
    out.push_str(&format!("By tier: {}\n\n", tiers.join(" ")));

    if report.rows.is_empty() {
        out.push_str("No detector output evaluated.\n");
        return out;
    }

    let rows: Vec<ScoreTableRow> = report
        .rows
        .iter()
        .map(|row| ScoreTableRow {
            scope: row.scope.to_string(),
            tool: row.tool.clone(),
            true_positives: row.true_positives,
            false_positives: row.false_positives,
            false_negatives: row.false_negatives,
            covered: format!("{}/{}", row.covered, row.reference_pairs),
            precision: format_metric(row.precision, digits),
            recall: format_metric(row.recall, digits),
            f1: format_metric(row.f1, digits),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    out.push_str(&table.to_string());
    out.push_str("\n\n");

    out.push_str(&render_tool_summary(report));
    out.push('\n');

    let bands: Vec<BandTableRow> = report
        .tools
        .iter()
        .flat_map(|summary| band_rows(summary, digits))
        .collect();
    if !bands.is_empty() {
        let mut table = Table::new(bands);
        table.with(TableStyle::rounded());
        out.push('\n');
        out.push_str(&table.to_string());
        out.push('\n');
    }

    out
}

fn band_rows(summary: &ToolSummary, digits: u32) -> Vec<BandTableRow> {
    summary
        .bands
        .iter()
        .filter(|band| band.reference_pairs > 0)
        .map(|band| BandTableRow {
            tool: summary.tool.clone(),
            band: band.band.label().to_string(),
            reference_pairs: band.reference_pairs,
            covered: band.covered,
            recall: format_metric(band.recall, digits),
        })
        .collect()
}

/// Per-tool ingest and matching counters, shown even when all are zero
pub fn render_tool_summary(report: &EvaluationReport) -> String {
    let rows: Vec<SummaryTableRow> = report
        .tools
        .iter()
        .map(|summary| SummaryTableRow {
            tool: summary.tool.clone(),
            reported: summary.ingest.reported,
            resolved: summary.ingest.resolved,
            unlabeled: summary.ingest.unlabeled,
            malformed: summary.ingest.malformed,
            self_matches: summary.ingest.self_matches,
            duplicates: summary.matching.duplicates,
            ignored_duplicates: summary.matching.ignored_duplicates,
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    table.to_string()
}

/// Configuration summary table
pub fn render_config_summary(config: &EvaluationConfig) -> String {
    let rows = vec![
        ConfigRow {
            setting: "Overlap strategy".to_string(),
            value: format!("{:?}", config.overlap.strategy).to_lowercase(),
        },
        ConfigRow {
            setting: "Overlap ratio".to_string(),
            value: config.overlap.ratio.to_string(),
        },
        ConfigRow {
            setting: "Duplicate policy".to_string(),
            value: format!("{:?}", config.duplicates).to_lowercase(),
        },
        ConfigRow {
            setting: "Minimum similarity".to_string(),
            value: config
                .min_similarity
                .map_or_else(|| "none".to_string(), |s| s.to_string()),
        },
        ConfigRow {
            setting: "Minimum fragment lines".to_string(),
            value: config.min_fragment_lines.to_string(),
        },
        ConfigRow {
            setting: "Workers".to_string(),
            value: config.effective_workers().to_string(),
        },
        ConfigRow {
            setting: "Rounding digits".to_string(),
            value: config.rounding_digits.to_string(),
        },
    ];

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    table.to_string()
}
