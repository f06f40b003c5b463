//! # Cloneval-RS: Clone Detection Benchmark Evaluator
//!
//! Scores the output of code clone detectors against a labeled reference set
//! of clone pairs. The library provides:
//!
//! - **Fragment Index**: labeled code fragments keyed by unit and line span
//! - **Reference Clone Set**: canonical, tier-stacked reference pairs
//! - **Detection Ingest**: overlap-based resolution of reported ranges
//! - **Matching**: true/false positive classification and coverage tracking
//! - **Scoring**: per-tier and overall precision, recall and F1
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        API Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │    Core      │   Corpus    │  Evaluation   │      I/O       │
//! │              │             │               │                │
//! │ • Config     │ • Fragments │ • Overlap     │ • Corpus       │
//! │ • Errors     │ • Reference │ • Ingest      │ • Reference    │
//! │              │             │ • Matcher     │ • Detections   │
//! │              │             │ • Scorer      │                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use cloneval_rs::{EvaluationConfig, EvaluationEngine};
//! use cloneval_rs::io::loaders;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EvaluationConfig::default().with_overlap_ratio(0.7);
//!     let engine = EvaluationEngine::from_paths(
//!         config,
//!         Path::new("corpus.csv"),
//!         Path::new("reference.csv"),
//!     )?;
//!
//!     let run = loaders::load_detection_file(Path::new("nicad.csv"))?.into_run("nicad");
//!     let report = engine.evaluate(vec![run])?;
//!     for row in &report.rows {
//!         println!("{} {}: F1 {:.4}", row.scope, row.tool, row.f1);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

// Configuration and error handling
pub mod core {
    //! Configuration and error types shared by every layer.

    pub mod config;
    pub mod errors;
}

// Labeled benchmark data
pub mod corpus {
    //! Fragment index and reference clone set.

    pub mod fragments;
    pub mod reference;
}

// Detector evaluation pipeline
pub mod evaluation {
    //! Ingest, matching and scoring of detector output.

    pub mod coverage;
    pub mod ingest;
    pub mod matcher;
    pub mod overlap;
    pub mod runner;
    pub mod scorer;
}

// Input formats
pub mod io {
    //! Loaders for corpus, reference and detection files.

    pub mod loaders;
}

// Public API and engine interface
pub mod api {
    //! High-level API and engine interface.

    pub mod engine;
}

// Re-export primary types for convenience
pub use api::engine::EvaluationEngine;
pub use core::config::{DuplicatePolicy, EvaluationConfig, OverlapConfig, OverlapStrategy};
pub use core::errors::{CloneEvalError, Result, ResultExt};
pub use corpus::fragments::{Fragment, FragmentHandle, FragmentIndex, LineSpan};
pub use corpus::reference::{CloneTier, PairKey, ReferenceCloneSet, ReferencePair, ReferencePairId};
pub use evaluation::ingest::{DetectionRange, ReportedPair};
pub use evaluation::runner::DetectorRun;
pub use evaluation::scorer::{EvaluationReport, ScoreRow, TierScope};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
