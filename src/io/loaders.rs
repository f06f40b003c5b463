//! Input loaders for corpus, reference mapping and detector output.
//!
//! Two formats are understood: line-oriented comma-separated text (the
//! BigCloneEval convention, `#` comments and blank lines skipped) and JSON
//! arrays of records. The format is picked from the file extension.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::errors::{CloneEvalError, Result};
use crate::corpus::reference::CloneTier;
use crate::evaluation::ingest::{DetectionRange, ReportedPair};
use crate::evaluation::runner::DetectorRun;

/// Serialized form of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// Comma-separated records, one per line
    Lines,
    /// JSON array of records
    Json,
}

impl InputFormat {
    /// `.json` files are JSON, everything else is line records
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Lines,
        }
    }
}

/// One labeled fragment of the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentRecord {
    /// External fragment id
    pub fragment_id: String,
    /// Containing unit
    pub unit: String,
    /// First line
    pub start_line: u32,
    /// Last line
    pub end_line: u32,
}

/// One ground-truth clone pair, by external fragment id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    /// First fragment id
    pub fragment_a: String,
    /// Second fragment id
    pub fragment_b: String,
    /// Clone-type tier
    pub tier: CloneTier,
    /// Recorded similarity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

/// Parsed detector output with the count of rejected rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionBatch {
    /// Parsed pairs in file order
    pub pairs: Vec<ReportedPair>,
    /// Rows that could not be parsed
    pub malformed_rows: usize,
}

impl DetectionBatch {
    /// Attach a tool id
    pub fn into_run(self, tool: impl Into<String>) -> DetectorRun {
        DetectorRun {
            tool: tool.into(),
            pairs: self.pairs,
            malformed_rows: self.malformed_rows,
        }
    }
}

/// Non-empty, non-comment lines split on commas, with 1-based line numbers.
fn records(text: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    text.lines().enumerate().filter_map(|(i, line)| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            None
        } else {
            Some((i + 1, line.split(',').map(str::trim).collect()))
        }
    })
}

fn parse_line_number(source: &str, line: usize, field: &str, value: &str) -> Result<u32> {
    value.parse::<u32>().map_err(|e| {
        CloneEvalError::parse_at_line(source, line, format!("invalid {field} '{value}': {e}"))
    })
}

/// `dir,file` pairs are joined into one unit path, as in BigCloneEval's layout.
fn join_unit(dir: &str, file: &str) -> String {
    if dir.is_empty() {
        file.to_string()
    } else {
        format!("{dir}/{file}")
    }
}

/// Parse corpus records: `id,unit,start,end` or `id,dir,file,start,end`.
pub fn parse_corpus(text: &str, source: &str, format: InputFormat) -> Result<Vec<FragmentRecord>> {
    if format == InputFormat::Json {
        return serde_json::from_str(text).map_err(|e| {
            CloneEvalError::parse(source, format!("invalid corpus JSON: {e}"))
        });
    }

    records(text)
        .map(|(line, fields)| {
            let (fragment_id, unit, start, end) = match fields.as_slice() {
                [id, unit, start, end] => (*id, unit.to_string(), *start, *end),
                [id, dir, file, start, end] => (*id, join_unit(dir, file), *start, *end),
                _ => {
                    return Err(CloneEvalError::parse_at_line(
                        source,
                        line,
                        format!("expected 4 or 5 fields, found {}", fields.len()),
                    ))
                }
            };
            if fragment_id.is_empty() || unit.is_empty() {
                return Err(CloneEvalError::parse_at_line(
                    source,
                    line,
                    "fragment id and unit must not be empty",
                ));
            }
            Ok(FragmentRecord {
                fragment_id: fragment_id.to_string(),
                unit,
                start_line: parse_line_number(source, line, "start line", start)?,
                end_line: parse_line_number(source, line, "end line", end)?,
            })
        })
        .collect()
}

/// Parse reference records: `id_a,id_b,tier[,similarity]`.
pub fn parse_reference(text: &str, source: &str, format: InputFormat) -> Result<Vec<ReferenceRecord>> {
    if format == InputFormat::Json {
        return serde_json::from_str(text).map_err(|e| {
            CloneEvalError::parse(source, format!("invalid reference JSON: {e}"))
        });
    }

    records(text)
        .map(|(line, fields)| {
            let (a, b, tier, similarity) = match fields.as_slice() {
                [a, b, tier] => (*a, *b, *tier, None),
                [a, b, tier, similarity] => (*a, *b, *tier, Some(*similarity)),
                _ => {
                    return Err(CloneEvalError::parse_at_line(
                        source,
                        line,
                        format!("expected 3 or 4 fields, found {}", fields.len()),
                    ))
                }
            };
            let tier = tier
                .parse::<CloneTier>()
                .map_err(|e| CloneEvalError::parse_at_line(source, line, e.to_string()))?;
            let similarity = similarity
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<f64>().map_err(|e| {
                        CloneEvalError::parse_at_line(
                            source,
                            line,
                            format!("invalid similarity '{s}': {e}"),
                        )
                    })
                })
                .transpose()?;

            Ok(ReferenceRecord {
                fragment_a: a.to_string(),
                fragment_b: b.to_string(),
                tier,
                similarity,
            })
        })
        .collect()
}

fn parse_detection_fields(fields: &[&str]) -> Option<ReportedPair> {
    let range = |unit: String, start: &str, end: &str| -> Option<DetectionRange> {
        Some(DetectionRange::new(unit, start.parse().ok()?, end.parse().ok()?))
    };
    match fields {
        [ua, sa, ea, ub, sb, eb] => Some(ReportedPair::new(
            range(ua.to_string(), *sa, *ea)?,
            range(ub.to_string(), *sb, *eb)?,
        )),
        [da, fa, sa, ea, db, fb, sb, eb] => Some(ReportedPair::new(
            range(join_unit(da, fa), *sa, *ea)?,
            range(join_unit(db, fb), *sb, *eb)?,
        )),
        _ => None,
    }
}

/// Flat JSON detection record using the line format's field names.
#[derive(Debug, Deserialize)]
struct FlatDetection {
    unit_a: String,
    start_a: u32,
    end_a: u32,
    unit_b: String,
    start_b: u32,
    end_b: u32,
}

/// A JSON detection record: flat, or nested as `{"a": range, "b": range}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonDetection {
    Flat(FlatDetection),
    Nested(ReportedPair),
}

impl From<JsonDetection> for ReportedPair {
    fn from(record: JsonDetection) -> Self {
        match record {
            JsonDetection::Flat(f) => ReportedPair::new(
                DetectionRange::new(f.unit_a, f.start_a, f.end_a),
                DetectionRange::new(f.unit_b, f.start_b, f.end_b),
            ),
            JsonDetection::Nested(pair) => pair,
        }
    }
}

fn parse_json_detections(text: &str, source: &str) -> Result<DetectionBatch> {
    let records: Vec<serde_json::Value> = serde_json::from_str(text)
        .map_err(|e| CloneEvalError::parse(source, format!("invalid detection JSON: {e}")))?;

    let mut batch = DetectionBatch::default();
    for (position, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<JsonDetection>(record) {
            Ok(record) => batch.pairs.push(record.into()),
            Err(e) => {
                warn!("{}: skipping malformed detection record #{}: {}", source, position, e);
                batch.malformed_rows += 1;
            }
        }
    }
    Ok(batch)
}

/// Parse detector output: `unit,start,end,unit,start,end` (or the 8-field
/// `dir,file,start,end,dir,file,start,end` form). Bad rows are counted, not fatal;
/// in JSON only a document that is not an array fails the whole file.
pub fn parse_detections(text: &str, source: &str, format: InputFormat) -> Result<DetectionBatch> {
    let batch = match format {
        InputFormat::Json => parse_json_detections(text, source)?,
        InputFormat::Lines => {
            let mut batch = DetectionBatch::default();
            for (line, fields) in records(text) {
                match parse_detection_fields(&fields) {
                    Some(pair) => batch.pairs.push(pair),
                    None => {
                        warn!("{}: skipping malformed detection at line {}", source, line);
                        batch.malformed_rows += 1;
                    }
                }
            }
            batch
        }
    };
    debug!(
        "{}: parsed {} detections ({} malformed rows)",
        source,
        batch.pairs.len(),
        batch.malformed_rows
    );
    Ok(batch)
}

fn read_input(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| CloneEvalError::io(format!("Failed to read {}", path.display()), e))
}

/// Read and parse a corpus file
pub fn load_corpus_file(path: &Path) -> Result<Vec<FragmentRecord>> {
    parse_corpus(&read_input(path)?, &path.display().to_string(), InputFormat::from_path(path))
}

/// Read and parse a reference mapping file
pub fn load_reference_file(path: &Path) -> Result<Vec<ReferenceRecord>> {
    parse_reference(&read_input(path)?, &path.display().to_string(), InputFormat::from_path(path))
}

/// Read and parse a detector output file
pub fn load_detection_file(path: &Path) -> Result<DetectionBatch> {
    parse_detections(&read_input(path)?, &path.display().to_string(), InputFormat::from_path(path))
}

/// Tool id derived from a detection file name (its stem)
pub fn tool_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_lines_with_comments_and_dirs() {
        let text = "# id,unit,start,end\n\n1, A.java, 3, 9\n2,default,B.java,10,20\n";
        let records = parse_corpus(text, "corpus.csv", InputFormat::Lines).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].unit, "A.java");
        assert_eq!(records[0].start_line, 3);
        assert_eq!(records[1].unit, "default/B.java");
    }

    #[test]
    fn test_corpus_error_points_at_line() {
        let text = "1,A.java,3,9\n2,A.java,x,9\n";
        let err = parse_corpus(text, "corpus.csv", InputFormat::Lines).unwrap_err();
        match err {
            CloneEvalError::Parse { line, .. } => assert_eq!(line, Some(2)),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_reference_lines() {
        let text = "1,2,T1\n1,3,VST3,0.93\n2,3,T4,\n";
        let records = parse_reference(text, "ref.csv", InputFormat::Lines).unwrap();

        assert_eq!(records[0].tier, CloneTier::Type1);
        assert_eq!(records[0].similarity, None);
        assert_eq!(records[1].tier, CloneTier::Type3);
        assert_eq!(records[1].similarity, Some(0.93));
        assert_eq!(records[2].similarity, None);
    }

    #[test]
    fn test_reference_bad_tier_is_fatal() {
        let err = parse_reference("1,2,T7\n", "ref.csv", InputFormat::Lines).unwrap_err();
        assert!(err.to_string().contains("T7"));
    }

    #[test]
    fn test_detections_count_malformed_rows() {
        let text = "A.java,1,10,B.java,1,10\nsel,A.java,1,10,sel,B.java,1,10\nA.java,1\nA.java,x,10,B.java,1,10\n";
        let batch = parse_detections(text, "tool.csv", InputFormat::Lines).unwrap();

        assert_eq!(batch.pairs.len(), 2);
        assert_eq!(batch.pairs[1].a.unit, "sel/A.java");
        assert_eq!(batch.malformed_rows, 2);
    }

    #[test]
    fn test_json_inputs() {
        let corpus = r#"[{"fragment_id":"1","unit":"A.java","start_line":1,"end_line":4}]"#;
        assert_eq!(parse_corpus(corpus, "c.json", InputFormat::Json).unwrap().len(), 1);

        let reference = r#"[{"fragment_a":"1","fragment_b":"2","tier":"T2"}]"#;
        let parsed = parse_reference(reference, "r.json", InputFormat::Json).unwrap();
        assert_eq!(parsed[0].tier, CloneTier::Type2);

        let detections = r#"[{"a":{"unit":"A","start_line":1,"end_line":2},"b":{"unit":"B","start_line":3,"end_line":4}}]"#;
        let batch = parse_detections(detections, "d.json", InputFormat::Json).unwrap();
        assert_eq!(batch.pairs[0].b.start_line, 3);

        assert!(parse_detections("{", "d.json", InputFormat::Json).is_err());
    }

    #[test]
    fn test_json_detections_skip_bad_records() {
        let lines = "A,1,10,B,1,10\nA,x,10,B,1,10\n";
        let from_lines = parse_detections(lines, "d.csv", InputFormat::Lines).unwrap();

        let json = r#"[
            {"unit_a":"A","start_a":1,"end_a":10,"unit_b":"B","start_b":1,"end_b":10},
            {"unit_a":"A","start_a":"x","end_a":10,"unit_b":"B","start_b":1,"end_b":10}
        ]"#;
        let from_json = parse_detections(json, "d.json", InputFormat::Json).unwrap();

        assert_eq!(from_json, from_lines);
        assert_eq!(from_json.pairs.len(), 1);
        assert_eq!(from_json.malformed_rows, 1);
    }

    #[test]
    fn test_format_and_tool_id_from_path() {
        assert_eq!(InputFormat::from_path(Path::new("x/ref.JSON")), InputFormat::Json);
        assert_eq!(InputFormat::from_path(Path::new("x/ref.csv")), InputFormat::Lines);
        assert_eq!(tool_id_from_path(Path::new("out/nicad.csv")), "nicad");
    }

    #[test]
    fn test_load_files_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corpus.csv");
        std::fs::write(&path, "1,A.java,1,5\n").unwrap();

        let records = load_corpus_file(&path).unwrap();
        assert_eq!(records[0].end_line, 5);
        assert!(load_reference_file(&dir.path().join("missing.csv")).is_err());
    }
}
