//! Error types for the cloneval-rs library.
//!
//! Structural problems with the corpus or the reference mapping are fatal and
//! abort a run; they carry the identity of the offending fragment or pair so
//! the CLI can print it. Per-pair anomalies in detector output are never
//! errors, they are tallied as counters by the ingest and matcher stages.

use std::io;
use std::num::{ParseFloatError, ParseIntError};

use thiserror::Error;

/// Main result type for cloneval operations.
pub type Result<T> = std::result::Result<T, CloneEvalError>;

/// Error type for all cloneval operations.
#[derive(Error, Debug)]
pub enum CloneEvalError {
    /// I/O related errors
    #[error("I/O error: {message}")]
    Io {
        /// Human-readable error message
        message: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The same fragment triple (or external id) was loaded twice with conflicting metadata
    #[error("Duplicate fragment {unit}:{start_line}-{end_line}: {message}")]
    DuplicateFragment {
        /// Containing unit identifier
        unit: String,
        /// First line of the fragment
        start_line: u32,
        /// Last line of the fragment
        end_line: u32,
        /// What conflicted
        message: String,
    },

    /// A reference pair names a fragment that was never loaded
    #[error("Unknown fragment '{fragment}' referenced by {context}")]
    UnknownFragment {
        /// External id or handle of the missing fragment
        fragment: String,
        /// Record that referenced it
        context: String,
    },

    /// Mutation attempted after the fragment index was frozen
    #[error("Fragment index is frozen; cannot load {unit}:{start_line}-{end_line}")]
    IndexFrozen {
        /// Containing unit identifier
        unit: String,
        /// First line of the rejected fragment
        start_line: u32,
        /// Last line of the rejected fragment
        end_line: u32,
    },

    /// Fragment with an inverted line span
    #[error("Invalid fragment {unit}:{start_line}-{end_line}: start line exceeds end line")]
    InvalidFragment {
        /// Containing unit identifier
        unit: String,
        /// First line
        start_line: u32,
        /// Last line
        end_line: u32,
    },

    /// Reference pair that pairs a fragment with itself
    #[error("Invalid reference pair ({a}, {b}): {message}")]
    InvalidReferencePair {
        /// First endpoint
        a: String,
        /// Second endpoint
        b: String,
        /// Error description
        message: String,
    },

    /// Input record parsing errors
    #[error("Parse error in {source_name}{}: {message}", .line.map(|l| format!(" at line {l}")).unwrap_or_default())]
    Parse {
        /// File or stream being parsed
        source_name: String,
        /// Error description
        message: String,
        /// 1-based line number (if available)
        line: Option<usize>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config {
        /// Error description
        message: String,
        /// Configuration field that caused the error
        field: Option<String>,
    },

    /// Validation errors for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Error description
        message: String,
        /// Field or input that failed validation
        field: Option<String>,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error description
        message: String,
        /// Data type being serialized
        data_type: Option<String>,
        /// Underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal {
        /// Error description
        message: String,
        /// Additional context
        context: Option<String>,
    },
}

impl CloneEvalError {
    /// Create a new I/O error with context
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    /// Create a new duplicate fragment error
    pub fn duplicate_fragment(
        unit: impl Into<String>,
        start_line: u32,
        end_line: u32,
        message: impl Into<String>,
    ) -> Self {
        Self::DuplicateFragment {
            unit: unit.into(),
            start_line,
            end_line,
            message: message.into(),
        }
    }

    /// Create a new unknown fragment error
    pub fn unknown_fragment(fragment: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownFragment {
            fragment: fragment.into(),
            context: context.into(),
        }
    }

    /// Create a new parse error
    pub fn parse(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
            line: None,
        }
    }

    /// Create a new parse error pointing at a line
    pub fn parse_at_line(
        source_name: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.into(),
            line: Some(line),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new configuration error with field context
    pub fn config_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Whether this error invalidates the corpus or reference set as a whole.
    pub fn is_fatal_load_error(&self) -> bool {
        matches!(
            self,
            Self::DuplicateFragment { .. }
                | Self::UnknownFragment { .. }
                | Self::IndexFrozen { .. }
                | Self::InvalidFragment { .. }
                | Self::InvalidReferencePair { .. }
        )
    }

    /// Add context to an existing error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        match &mut self {
            Self::Internal { context: ctx, .. } => {
                *ctx = Some(context.into());
            }
            Self::Io { message, .. }
            | Self::Serialization { message, .. }
            | Self::Config { message, .. } => {
                *message = format!("{}: {message}", context.into());
            }
            _ => {}
        }
        self
    }
}

impl From<io::Error> for CloneEvalError {
    fn from(err: io::Error) -> Self {
        Self::io("I/O operation failed", err)
    }
}

impl From<serde_json::Error> for CloneEvalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: format!("JSON serialization failed: {err}"),
            data_type: Some("JSON".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml::Error> for CloneEvalError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Serialization {
            message: format!("YAML serialization failed: {err}"),
            data_type: Some("YAML".to_string()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<ParseIntError> for CloneEvalError {
    fn from(err: ParseIntError) -> Self {
        Self::validation(format!("Invalid integer: {err}"))
    }
}

impl From<ParseFloatError> for CloneEvalError {
    fn from(err: ParseFloatError) -> Self {
        Self::validation(format!("Invalid float: {err}"))
    }
}

/// Result extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    /// Add static context to an error result
    fn context(self, msg: &'static str) -> Result<T>;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<CloneEvalError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().with_context(f()))
    }

    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| e.into().with_context(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = CloneEvalError::config("Invalid configuration");
        assert!(matches!(err, CloneEvalError::Config { .. }));

        let err = CloneEvalError::parse("corpus.csv", "missing column");
        assert!(matches!(err, CloneEvalError::Parse { line: None, .. }));
    }

    #[test]
    fn test_parse_error_mentions_line() {
        let err = CloneEvalError::parse_at_line("reference.csv", 12, "bad tier 'T9'");
        let rendered = err.to_string();
        assert!(rendered.contains("reference.csv"));
        assert!(rendered.contains("line 12"));
        assert!(rendered.contains("T9"));
    }

    #[test]
    fn test_fatal_load_errors() {
        assert!(CloneEvalError::duplicate_fragment("a.java", 1, 5, "conflict").is_fatal_load_error());
        assert!(CloneEvalError::unknown_fragment("42", "reference line 3").is_fatal_load_error());
        assert!(!CloneEvalError::validation("ratio").is_fatal_load_error());
        assert!(!CloneEvalError::parse("x", "y").is_fatal_load_error());
    }

    #[test]
    fn test_duplicate_fragment_display_names_identity() {
        let err = CloneEvalError::duplicate_fragment("src/A.java", 10, 20, "id 7 vs id 8");
        let rendered = err.to_string();
        assert!(rendered.contains("src/A.java:10-20"));
        assert!(rendered.contains("id 7 vs id 8"));
    }

    #[test]
    fn test_error_with_context() {
        let err = CloneEvalError::internal("Something went wrong").with_context("During ingest");

        if let CloneEvalError::Internal { context, .. } = err {
            assert_eq!(context, Some("During ingest".to_string()));
        } else {
            panic!("Expected Internal error");
        }
    }

    #[test]
    fn test_result_extension() {
        let result: std::result::Result<i32, std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));

        let mapped = result.context("Failed to read corpus");
        match mapped {
            Err(CloneEvalError::Io { message, .. }) => {
                assert!(message.starts_with("Failed to read corpus"));
            }
            other => panic!("Expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn test_int_conversion_is_validation() {
        let err: CloneEvalError = "x".parse::<u32>().unwrap_err().into();
        assert!(matches!(err, CloneEvalError::Validation { .. }));
    }
}
