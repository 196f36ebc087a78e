//! Script normalization.
//!
//! Maps raw script text onto the alignment alphabet. Every character is kept
//! in order with its original glyph; what changes is the comparison key.
//! Whitespace and punctuation from both Latin and CJK conventions are
//! skippable and never take part in matching.

use std::borrow::Cow;
use std::collections::BTreeSet;

use slidecast_common::config::{CaptionConfig, ScriptVariant};
use zhconv::{zhconv, Variant};
use slidecast_project_model::transcript::{NormChar, NormalizedScript};

/// Punctuation skipped in addition to whitespace.
pub const DEFAULT_SKIP_PUNCTUATION: &str = ",.:;!?'\"()[]{}<>\
    、，。：；！？「」『』（）【】《》〈〉“”‘’…·～—";

/// Characters removed outright before tagging.
const DROPPED: &[char] = &['\r', '\u{feff}', '\u{200b}', '\u{200c}', '\u{200d}', '\u{2060}'];

/// Immutable set of skippable characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipSet {
    punctuation: BTreeSet<char>,
}

impl SkipSet {
    /// Whitespace plus the default punctuation class.
    pub fn new() -> Self {
        Self {
            punctuation: DEFAULT_SKIP_PUNCTUATION.chars().collect(),
        }
    }

    /// Default set extended with `extra`.
    pub fn with_extra(extra: &str) -> Self {
        let mut set = Self::new();
        set.punctuation
            .extend(extra.chars().filter(|c| !c.is_whitespace()));
        set
    }

    pub fn from_config(config: &CaptionConfig) -> Self {
        Self::with_extra(&config.extra_skip_chars)
    }

    pub fn contains(&self, c: char) -> bool {
        c.is_whitespace() || self.punctuation.contains(&c)
    }

    /// Comparison key of `c`, or `None` if it is skippable.
    pub fn key(&self, c: char) -> Option<char> {
        if self.contains(c) {
            None
        } else {
            Some(comparison_key(c))
        }
    }
}

impl Default for SkipSet {
    fn default() -> Self {
        Self::new()
    }
}

/// True for characters that never reach the normalized script.
pub fn is_dropped(c: char) -> bool {
    DROPPED.contains(&c)
}

/// Lower-case `c` and fold full-width ASCII forms to their narrow glyphs.
pub fn comparison_key(c: char) -> char {
    let folded = match c as u32 {
        0xFF01..=0xFF5E => char::from_u32(c as u32 - 0xFEE0).unwrap_or(c),
        _ => c,
    };
    folded.to_lowercase().next().unwrap_or(folded)
}

/// Convert Chinese text to the requested script variant. Text without
/// convertible characters comes back unchanged.
pub fn convert_variant(text: &str, variant: ScriptVariant) -> Cow<'_, str> {
    let target = match variant {
        ScriptVariant::Keep => return Cow::Borrowed(text),
        ScriptVariant::Traditional => Variant::ZhHant,
        ScriptVariant::Simplified => Variant::ZhHans,
    };
    Cow::Owned(zhconv(text, target))
}

/// Normalize raw script text.
///
/// Total and idempotent: normalizing the displayed text of a normalized
/// script yields the same script.
pub fn normalize(raw: &str, skip: &SkipSet) -> NormalizedScript {
    let chars = raw
        .chars()
        .filter(|c| !is_dropped(*c))
        .map(|c| match skip.key(c) {
            Some(key) => NormChar::semantic(c, key),
            None => NormChar::skippable(c),
        })
        .collect();
    NormalizedScript::new(chars)
}

/// Semantic keys of arbitrary text, in order.
pub fn semantic_keys(text: &str, skip: &SkipSet) -> Vec<char> {
    text.chars()
        .filter(|c| !is_dropped(*c))
        .filter_map(|c| skip.key(c))
        .collect()
}
