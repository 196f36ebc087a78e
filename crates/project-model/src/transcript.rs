//! Transcript-side data: ASR tokens, the normalized script, and the
//! per-character timeline.
//!
//! Characters are tagged by their comparison key: `Some(key)` marks a
//! semantic character that takes part in alignment, `None` marks a skippable
//! one (whitespace, punctuation) that is carried for display only.

use serde::{Deserialize, Serialize};

/// One token emitted by the speech recognizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsrToken {
    /// Recognized text. May span several characters.
    pub text: String,

    /// Start time in seconds.
    pub start: f64,

    /// End time in seconds.
    pub end: f64,

    /// Recognizer confidence in `[0.0, 1.0]`.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl AsrToken {
    pub fn new(text: impl Into<String>, start: f64, end: f64, confidence: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            confidence,
        }
    }

    /// Token span, never negative.
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

/// One character of the normalized script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormChar {
    /// Original glyph, kept for display.
    pub ch: char,

    /// Canonical comparison key; `None` if the character is skippable.
    pub key: Option<char>,
}

impl NormChar {
    pub fn semantic(ch: char, key: char) -> Self {
        Self { ch, key: Some(key) }
    }

    pub fn skippable(ch: char) -> Self {
        Self { ch, key: None }
    }

    pub fn is_semantic(&self) -> bool {
        self.key.is_some()
    }
}

/// The author's script over the alignment alphabet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedScript {
    pub chars: Vec<NormChar>,
}

impl NormalizedScript {
    pub fn new(chars: Vec<NormChar>) -> Self {
        Self { chars }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Number of characters that take part in alignment.
    pub fn semantic_count(&self) -> usize {
        self.chars.iter().filter(|c| c.is_semantic()).count()
    }

    /// Comparison keys of the semantic characters, in order.
    pub fn semantic_keys(&self) -> impl Iterator<Item = char> + '_ {
        self.chars.iter().filter_map(|c| c.key)
    }

    /// The script text as displayed (original glyphs).
    pub fn text(&self) -> String {
        self.chars.iter().map(|c| c.ch).collect()
    }
}

/// How a timeline character got its timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharOrigin {
    /// Aligned to an identical ASR character.
    Matched,
    /// Aligned against a differing ASR character; the script glyph wins.
    Substituted,
    /// No ASR counterpart; placed between neighbouring anchors.
    Interpolated,
}

/// Timed script character.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CharTiming {
    pub ch: char,
    pub key: Option<char>,
    pub start: f64,
    pub end: f64,
    pub score: f64,
    pub origin: CharOrigin,
}

impl CharTiming {
    pub fn is_semantic(&self) -> bool {
        self.key.is_some()
    }
}

/// Overall trust in a character timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineQuality {
    #[default]
    Ok,
    /// Sparse or no anchors; timestamps are mostly interpolated.
    LowConfidence,
}

/// One timed entry per normalized script character.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterTimeline {
    pub chars: Vec<CharTiming>,
    pub quality: TimelineQuality,

    /// Semantic characters matched exactly against the ASR stream.
    pub anchors: usize,

    /// Semantic characters in the script.
    pub semantic_chars: usize,

    /// `anchors / semantic_chars`, 1.0 for a script without semantic characters.
    pub coverage: f64,
}

impl CharacterTimeline {
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn is_low_confidence(&self) -> bool {
        self.quality == TimelineQuality::LowConfidence
    }

    /// Start of the first character and end of the last, if any.
    pub fn span(&self) -> Option<(f64, f64)> {
        let first = self.chars.first()?;
        let last = self.chars.last()?;
        Some((first.start, last.end))
    }

    /// True if starts never decrease and no end precedes its start.
    pub fn is_monotonic(&self) -> bool {
        self.chars.iter().all(|c| c.end >= c.start)
            && self.chars.windows(2).all(|w| w[1].start >= w[0].start)
    }
}
