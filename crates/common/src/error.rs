//! Error types shared across Slidecast crates.
//!
//! Fatal failures are [`SlidecastError`] values. Conditions the run survives
//! (sparse alignment, a line timed by fallback, an untrusted offset) are
//! reported as [`Degradation`] values next to the result instead.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level error type for Slidecast operations.
#[derive(Debug, thiserror::Error)]
pub enum SlidecastError {
    #[error("Required input missing: {path}")]
    InputMissing { path: PathBuf },

    #[error(
        "Caption line {line} could not be matched \
         (candidate char {candidate_index}, timeline char {timeline_index})"
    )]
    LineMismatch {
        line: usize,
        candidate_index: usize,
        timeline_index: usize,
    },

    #[error("Render error in segment {index}: {message}")]
    Render { index: usize, message: String },

    #[error("Render batch failed: {} segment(s) failed, {} skipped", failures.len(), skipped.len())]
    BatchFailed {
        failures: Vec<SegmentFailure>,
        skipped: Vec<usize>,
    },

    #[error("Schedule error: {message}")]
    Schedule { message: String },

    #[error("Offset locator error: {message}")]
    Locator { message: String },

    #[error("Oracle error: {message}")]
    Oracle { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SlidecastError.
pub type SlidecastResult<T> = Result<T, SlidecastError>;

/// One failed segment inside a render batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentFailure {
    pub index: usize,
    pub message: String,
}

impl fmt::Display for SegmentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment {}: {}", self.index, self.message)
    }
}

impl SlidecastError {
    pub fn input_missing(path: impl Into<PathBuf>) -> Self {
        Self::InputMissing { path: path.into() }
    }

    pub fn render(index: usize, msg: impl Into<String>) -> Self {
        Self::Render {
            index,
            message: msg.into(),
        }
    }

    pub fn schedule(msg: impl Into<String>) -> Self {
        Self::Schedule {
            message: msg.into(),
        }
    }

    pub fn locator(msg: impl Into<String>) -> Self {
        Self::Locator {
            message: msg.into(),
        }
    }

    pub fn oracle(msg: impl Into<String>) -> Self {
        Self::Oracle {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}

/// A non-fatal condition that lowered the quality of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Force alignment found too few anchors; timestamps are interpolated.
    AlignmentLowConfidence {
        anchors: usize,
        semantic_chars: usize,
        coverage: f64,
    },

    /// A caption line was timed proportionally instead of by matching.
    LineMismatch {
        line: usize,
        candidate_index: usize,
        timeline_index: usize,
    },

    /// Correlation peak was below threshold; the nominal offset was used.
    OffsetLowConfidence {
        index: usize,
        confidence: f64,
        nominal_secs: f64,
    },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::AlignmentLowConfidence {
                anchors,
                semantic_chars,
                coverage,
            } => write!(
                f,
                "alignment low confidence: {anchors}/{semantic_chars} anchors ({:.1}%)",
                coverage * 100.0
            ),
            Degradation::LineMismatch {
                line,
                candidate_index,
                timeline_index,
            } => write!(
                f,
                "line {line} timed proportionally (candidate char {candidate_index}, timeline char {timeline_index})"
            ),
            Degradation::OffsetLowConfidence {
                index,
                confidence,
                nominal_secs,
            } => write!(
                f,
                "segment {index} offset low confidence ({confidence:.3}), using nominal {nominal_secs:.3}s"
            ),
        }
    }
}
