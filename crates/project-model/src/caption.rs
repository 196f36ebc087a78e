//! Caption-side data: candidate lines and timed caption entries.

use serde::{Deserialize, Serialize};

/// A display line proposed by the segmentation oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateLine {
    pub text: String,
}

impl CandidateLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<&str> for CandidateLine {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for CandidateLine {
    fn from(text: String) -> Self {
        Self { text }
    }
}

/// One timed caption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionEntry {
    pub text: String,
    pub start: f64,
    pub end: f64,

    /// Timed by proportional fallback rather than character matching.
    #[serde(default)]
    pub degraded: bool,
}

impl CaptionEntry {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            degraded: false,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// How far the candidate lines drifted from the script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftReport {
    /// Semantic candidate characters skipped while resynchronizing.
    pub skipped_candidate_chars: usize,

    /// Semantic timeline characters skipped while resynchronizing.
    pub skipped_timeline_chars: usize,

    /// Semantic timeline characters left after the last candidate character.
    pub unconsumed_timeline_chars: usize,

    /// Successful resynchronizations.
    pub resyncs: usize,

    /// Lines timed by proportional fallback.
    pub degraded_lines: Vec<usize>,
}

impl DriftReport {
    /// True if the candidate lines matched the script exactly.
    pub fn is_clean(&self) -> bool {
        self.skipped_candidate_chars == 0
            && self.skipped_timeline_chars == 0
            && self.unconsumed_timeline_chars == 0
            && self.degraded_lines.is_empty()
    }
}

/// True if every entry has `start < end` and entries never overlap.
pub fn captions_well_formed(entries: &[CaptionEntry]) -> bool {
    entries.iter().all(|e| e.start < e.end)
        && entries.windows(2).all(|w| w[1].start >= w[0].end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_line_serializes_as_plain_string() {
        let lines = vec![CandidateLine::from("今天"), CandidateLine::from("天氣很好")];
        let json = serde_json::to_string(&lines).unwrap();
        assert_eq!(json, r#"["今天","天氣很好"]"#);
    }

    #[test]
    fn test_well_formed_captions() {
        let entries = vec![
            CaptionEntry::new("a", 0.0, 1.0),
            CaptionEntry::new("b", 1.0, 2.5),
        ];
        assert!(captions_well_formed(&entries));

        let overlapping = vec![
            CaptionEntry::new("a", 0.0, 1.2),
            CaptionEntry::new("b", 1.0, 2.5),
        ];
        assert!(!captions_well_formed(&overlapping));

        let empty_span = vec![CaptionEntry::new("a", 1.0, 1.0)];
        assert!(!captions_well_formed(&empty_span));
    }

    #[test]
    fn test_clean_drift_report() {
        assert!(DriftReport::default().is_clean());
        let report = DriftReport {
            resyncs: 1,
            skipped_timeline_chars: 2,
            ..Default::default()
        };
        assert!(!report.is_clean());
    }
}
