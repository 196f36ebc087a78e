//! Character-level force alignment.
//!
//! Reconciles the ASR token stream with the author's script. The script
//! always wins on wording; the ASR stream only contributes timing.
//!
//! 1. Token text is converted to the script's Chinese variant, then tokens
//!    are sorted by start and exploded to characters, each token's span
//!    divided evenly by character count.
//! 2. A longest-common-subsequence alignment over semantic keys yields the
//!    anchors (matched characters).
//! 3. Script runs between anchors borrow the ASR span between the same
//!    anchors when it is non-empty (substitution), otherwise they are
//!    interpolated between the neighbouring anchors. Runs outside the first
//!    or last anchor with no ASR counterpart inherit the boundary time.
//! 4. A final pass clamps starts to be non-decreasing.
//!
//! The LCS uses Hirschberg's divide and conquer so memory stays linear in
//! the ASR length for long scripts.

use slidecast_common::config::{CaptionConfig, ScriptVariant};
use slidecast_common::error::Degradation;
use slidecast_project_model::transcript::{
    AsrToken, CharOrigin, CharTiming, CharacterTimeline, NormalizedScript, TimelineQuality,
};

use crate::normalizer::{convert_variant, is_dropped, SkipSet};

/// Sub-problems at or below this many DP cells are solved with a full table.
const FULL_TABLE_CELLS: usize = 1 << 20;

/// Force-alignment engine.
#[derive(Debug, Clone)]
pub struct ForceAligner {
    skip: SkipSet,
    min_anchor_ratio: f64,
    asr_variant: ScriptVariant,
}

/// One exploded ASR character.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AsrChar {
    pub key: Option<char>,
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
}

impl ForceAligner {
    pub fn new(skip: SkipSet, min_anchor_ratio: f64) -> Self {
        Self {
            skip,
            min_anchor_ratio,
            asr_variant: ScriptVariant::default(),
        }
    }

    pub fn from_config(config: &CaptionConfig) -> Self {
        Self::new(SkipSet::from_config(config), config.min_anchor_ratio)
            .with_asr_variant(config.asr_variant)
    }

    /// Convert ASR text to `variant` before alignment.
    pub fn with_asr_variant(mut self, variant: ScriptVariant) -> Self {
        self.asr_variant = variant;
        self
    }

    /// Align `tokens` against `script`, producing one timing per script
    /// character.
    pub fn align(&self, script: &NormalizedScript, tokens: &[AsrToken]) -> CharacterTimeline {
        let converted: Vec<AsrToken>;
        let tokens = match self.asr_variant {
            ScriptVariant::Keep => tokens,
            variant => {
                converted = tokens
                    .iter()
                    .map(|t| AsrToken {
                        text: convert_variant(&t.text, variant).into_owned(),
                        ..t.clone()
                    })
                    .collect();
                &converted
            }
        };
        let asr = explode_tokens(tokens, &self.skip);
        let semantic_chars = script.semantic_count();

        let script_sem: Vec<usize> = (0..script.len())
            .filter(|&i| script.chars[i].is_semantic())
            .collect();
        let asr_sem: Vec<usize> = (0..asr.len()).filter(|&i| asr[i].key.is_some()).collect();

        let script_keys: Vec<char> = script_sem
            .iter()
            .filter_map(|&i| script.chars[i].key)
            .collect();
        let asr_keys: Vec<char> = asr_sem.iter().filter_map(|&i| asr[i].key).collect();

        let anchors: Vec<(usize, usize)> = lcs_pairs(&script_keys, &asr_keys)
            .into_iter()
            .map(|(s, a)| (script_sem[s], asr_sem[a]))
            .collect();

        let mut chars = if anchors.is_empty() {
            spread_uniform(script, recording_end(&asr))
        } else {
            place_with_anchors(script, &asr, &anchors)
        };
        clamp_monotonic(&mut chars);

        let coverage = if semantic_chars == 0 {
            1.0
        } else {
            anchors.len() as f64 / semantic_chars as f64
        };
        let low = semantic_chars > 0 && (anchors.is_empty() || coverage < self.min_anchor_ratio);
        let quality = if low {
            tracing::warn!(
                anchors = anchors.len(),
                semantic_chars,
                coverage,
                "Force alignment is low confidence; timestamps are mostly interpolated"
            );
            TimelineQuality::LowConfidence
        } else {
            TimelineQuality::Ok
        };

        tracing::debug!(
            script_chars = script.len(),
            asr_chars = asr.len(),
            anchors = anchors.len(),
            "Force alignment complete"
        );

        CharacterTimeline {
            chars,
            quality,
            anchors: anchors.len(),
            semantic_chars,
            coverage,
        }
    }
}

impl Default for ForceAligner {
    fn default() -> Self {
        Self::from_config(&CaptionConfig::default())
    }
}

/// The degradation to report for a timeline, if any.
pub fn timeline_degradation(timeline: &CharacterTimeline) -> Option<Degradation> {
    timeline
        .is_low_confidence()
        .then_some(Degradation::AlignmentLowConfidence {
            anchors: timeline.anchors,
            semantic_chars: timeline.semantic_chars,
            coverage: timeline.coverage,
        })
}

/// Sort tokens by start (stable) and divide each token's span evenly across
/// its characters.
pub fn explode_tokens(tokens: &[AsrToken], skip: &SkipSet) -> Vec<AsrChar> {
    let mut sorted: Vec<&AsrToken> = tokens.iter().collect();
    sorted.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut out = Vec::new();
    for token in sorted {
        let glyphs: Vec<char> = token.text.chars().filter(|c| !is_dropped(*c)).collect();
        if glyphs.is_empty() {
            continue;
        }
        let start = token.start.max(0.0);
        let end = token.end.max(start);
        let width = (end - start) / glyphs.len() as f64;
        for (i, c) in glyphs.into_iter().enumerate() {
            let char_start = start + width * i as f64;
            out.push(AsrChar {
                key: skip.key(c),
                start: char_start,
                end: char_start + width,
                confidence: token.confidence.clamp(0.0, 1.0),
            });
        }
    }
    out
}

fn recording_end(asr: &[AsrChar]) -> f64 {
    asr.iter().map(|c| c.end).fold(0.0, f64::max)
}

/// Degenerate case: no anchors, spread the script over the recording.
fn spread_uniform(script: &NormalizedScript, duration: f64) -> Vec<CharTiming> {
    let n = script.len().max(1) as f64;
    script
        .chars
        .iter()
        .enumerate()
        .map(|(i, c)| CharTiming {
            ch: c.ch,
            key: c.key,
            start: duration * i as f64 / n,
            end: duration * (i + 1) as f64 / n,
            score: 0.0,
            origin: CharOrigin::Interpolated,
        })
        .collect()
}

fn place_with_anchors(
    script: &NormalizedScript,
    asr: &[AsrChar],
    anchors: &[(usize, usize)],
) -> Vec<CharTiming> {
    let mut out: Vec<Option<CharTiming>> = vec![None; script.len()];

    for &(s, a) in anchors {
        let c = script.chars[s];
        out[s] = Some(CharTiming {
            ch: c.ch,
            key: c.key,
            start: asr[a].start,
            end: asr[a].end,
            score: asr[a].confidence,
            origin: CharOrigin::Matched,
        });
    }

    // Gap k lies between anchor k-1 and anchor k; gaps 0 and len are the
    // leading and trailing runs.
    for k in 0..=anchors.len() {
        let prev = k.checked_sub(1).map(|p| anchors[p]);
        let next = anchors.get(k).copied();

        let s_lo = prev.map_or(0, |(s, _)| s + 1);
        let s_hi = next.map_or(script.len(), |(s, _)| s);
        if s_lo >= s_hi {
            continue;
        }
        let a_lo = prev.map_or(0, |(_, a)| a + 1);
        let a_hi = next.map_or(asr.len(), |(_, a)| a);

        let run = s_hi - s_lo;
        if a_lo < a_hi {
            // Substitution: borrow the unmatched ASR span evenly.
            let span_start = asr[a_lo].start;
            let span_end = asr[a_hi - 1].end.max(span_start);
            let width = (span_end - span_start) / run as f64;
            let asr_run = a_hi - a_lo;
            for (offset, s) in (s_lo..s_hi).enumerate() {
                let c = script.chars[s];
                let source = &asr[a_lo + offset * asr_run / run];
                let start = span_start + width * offset as f64;
                out[s] = Some(CharTiming {
                    ch: c.ch,
                    key: c.key,
                    start,
                    end: start + width,
                    score: 0.5 * source.confidence,
                    origin: CharOrigin::Substituted,
                });
            }
        } else {
            let (left, right) = match (prev, next) {
                (Some((_, pa)), Some((_, na))) => (asr[pa].end, asr[na].start.max(asr[pa].end)),
                (None, Some((_, na))) => (asr[na].start, asr[na].start),
                (Some((_, pa)), None) => (asr[pa].end, asr[pa].end),
                (None, None) => (0.0, 0.0),
            };
            let width = (right - left) / run as f64;
            for (offset, s) in (s_lo..s_hi).enumerate() {
                let c = script.chars[s];
                let start = left + width * offset as f64;
                out[s] = Some(CharTiming {
                    ch: c.ch,
                    key: c.key,
                    start,
                    end: start + width,
                    score: 0.0,
                    origin: CharOrigin::Interpolated,
                });
            }
        }
    }

    out.into_iter().flatten().collect()
}

/// Starts never decrease; ends never precede their start.
fn clamp_monotonic(chars: &mut [CharTiming]) {
    let mut floor = 0.0_f64;
    for c in chars.iter_mut() {
        c.start = c.start.max(floor);
        c.end = c.end.max(c.start);
        floor = c.start;
    }
}

/// Index pairs `(i, j)` of one longest common subsequence of `a` and `b`,
/// increasing in both components.
pub fn lcs_pairs(a: &[char], b: &[char]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    hirschberg(a, b, 0, 0, &mut out);
    out
}

fn hirschberg(a: &[char], b: &[char], a_off: usize, b_off: usize, out: &mut Vec<(usize, usize)>) {
    if a.is_empty() || b.is_empty() {
        return;
    }
    if a.len() == 1 || a.len().saturating_mul(b.len()) <= FULL_TABLE_CELLS {
        lcs_full_table(a, b, a_off, b_off, out);
        return;
    }

    let mid = a.len() / 2;
    let left = lcs_row(a[..mid].iter(), b.iter(), b.len());
    let right = lcs_row(a[mid..].iter().rev(), b.iter().rev(), b.len());

    let m = b.len();
    let mut split = 0;
    let mut best = 0;
    for k in 0..=m {
        let total = left[k] + right[m - k];
        if total > best {
            best = total;
            split = k;
        }
    }

    hirschberg(&a[..mid], &b[..split], a_off, b_off, out);
    hirschberg(&a[mid..], &b[split..], a_off + mid, b_off + split, out);
}

/// Last row of the LCS length table: `row[j]` is the LCS length of all of
/// `a` against the first `j` items of `b`.
fn lcs_row<'a, A, B>(a: A, b: B, m: usize) -> Vec<u32>
where
    A: Iterator<Item = &'a char>,
    B: Iterator<Item = &'a char> + Clone,
{
    let mut prev = vec![0u32; m + 1];
    let mut cur = vec![0u32; m + 1];
    for x in a {
        cur[0] = 0;
        for (j, y) in b.clone().enumerate() {
            cur[j + 1] = if x == y {
                prev[j] + 1
            } else {
                prev[j + 1].max(cur[j])
            };
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev
}

fn lcs_full_table(a: &[char], b: &[char], a_off: usize, b_off: usize, out: &mut Vec<(usize, usize)>) {
    let (n, m) = (a.len(), b.len());
    let width = m + 1;
    // suffix[i * width + j] = LCS length of a[i..] and b[j..]
    let mut suffix = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            suffix[i * width + j] = if a[i] == b[j] {
                suffix[(i + 1) * width + j + 1] + 1
            } else {
                suffix[(i + 1) * width + j].max(suffix[i * width + j + 1])
            };
        }
    }

    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            out.push((a_off + i, b_off + j));
            i += 1;
            j += 1;
        } else if suffix[(i + 1) * width + j] >= suffix[i * width + j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;
    use proptest::prelude::*;

    fn tok(text: &str, start: f64, end: f64) -> AsrToken {
        AsrToken::new(text, start, end, 0.9)
    }

    #[test]
    fn test_exact_match_copies_asr_times() {
        let skip = SkipSet::new();
        let script = normalize("今天天氣很好。", &skip);
        let tokens = vec![tok("今天", 0.0, 1.0), tok("天氣", 1.0, 2.0), tok("很好", 2.0, 3.0)];
        let timeline = ForceAligner::default().align(&script, &tokens);

        assert_eq!(timeline.len(), 7);
        assert_eq!(timeline.anchors, 6);
        assert_eq!(timeline.quality, TimelineQuality::Ok);
        assert!((timeline.chars[0].start - 0.0).abs() < 1e-9);
        assert!((timeline.chars[1].end - 1.0).abs() < 1e-9);
        assert!((timeline.chars[5].end - 3.0).abs() < 1e-9);
        // Trailing period inherits the last anchor's end with zero width.
        assert_eq!(timeline.chars[6].origin, CharOrigin::Interpolated);
        assert!((timeline.chars[6].start - 3.0).abs() < 1e-9);
        assert!((timeline.chars[6].end - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_substitution_keeps_script_glyph() {
        let skip = SkipSet::new();
        let script = normalize("天氣很好", &skip);
        // ASR heard 汽 instead of 氣.
        let tokens = vec![tok("天汽很好", 0.0, 4.0)];
        let timeline = ForceAligner::default().align(&script, &tokens);

        assert_eq!(timeline.chars[1].ch, '氣');
        assert_eq!(timeline.chars[1].origin, CharOrigin::Substituted);
        assert!((timeline.chars[1].start - 1.0).abs() < 1e-9);
        assert!((timeline.chars[1].end - 2.0).abs() < 1e-9);
        assert!((timeline.chars[1].score - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_simplified_asr_anchors_on_traditional_script() {
        let skip = SkipSet::new();
        let script = normalize("這是一個瘋狂的時代，風來了，連豬都會飛。", &skip);
        let tokens = vec![
            tok("这是一个", 0.0, 1.0),
            tok("疯狂的时代", 1.0, 2.25),
            tok("风来了", 2.25, 3.0),
            tok("连猪都会飞", 3.0, 4.25),
        ];

        let timeline = ForceAligner::default().align(&script, &tokens);
        assert_eq!(timeline.anchors, 17);
        assert_eq!(timeline.semantic_chars, 17);
        assert_eq!(timeline.quality, TimelineQuality::Ok);
        assert!((timeline.coverage - 1.0).abs() < 1e-9);
        assert_eq!(timeline.chars[0].ch, '這');

        let kept = ForceAligner::default()
            .with_asr_variant(ScriptVariant::Keep)
            .align(&script, &tokens);
        assert!(kept.anchors < 17);
        assert!(kept.is_low_confidence());
    }

    #[test]
    fn test_deletion_is_interpolated_between_anchors() {
        let skip = SkipSet::new();
        let script = normalize("abcd", &skip);
        // ASR missed b and c entirely; a ends at 1.0, d starts at 3.0.
        let tokens = vec![tok("a", 0.0, 1.0), tok("d", 3.0, 4.0)];
        let timeline = ForceAligner::default().align(&script, &tokens);

        let b = timeline.chars[1];
        let c = timeline.chars[2];
        assert_eq!(b.origin, CharOrigin::Interpolated);
        assert!((b.start - 1.0).abs() < 1e-9);
        assert!((b.end - 2.0).abs() < 1e-9);
        assert!((c.start - 2.0).abs() < 1e-9);
        assert!((c.end - 3.0).abs() < 1e-9);
        assert_eq!(b.score, 0.0);
    }

    #[test]
    fn test_insertions_are_dropped() {
        let skip = SkipSet::new();
        let script = normalize("ab", &skip);
        let tokens = vec![tok("a", 0.0, 1.0), tok("uh", 1.0, 2.0), tok("b", 2.0, 3.0)];
        let timeline = ForceAligner::default().align(&script, &tokens);

        assert_eq!(timeline.len(), 2);
        assert!((timeline.chars[1].start - 2.0).abs() < 1e-9);
        assert_eq!(timeline.chars[1].origin, CharOrigin::Matched);
    }

    #[test]
    fn test_leading_run_inherits_first_anchor() {
        let skip = SkipSet::new();
        let script = normalize("xyab", &skip);
        let tokens = vec![tok("ab", 2.0, 3.0)];
        let timeline = ForceAligner::default().align(&script, &tokens);

        assert!((timeline.chars[0].start - 2.0).abs() < 1e-9);
        assert!((timeline.chars[1].end - 2.0).abs() < 1e-9);
        assert!(timeline.is_low_confidence());
    }

    #[test]
    fn test_no_common_characters_spreads_uniformly() {
        let skip = SkipSet::new();
        let script = normalize("abcd", &skip);
        let tokens = vec![tok("wxyz", 0.0, 8.0)];
        let timeline = ForceAligner::default().align(&script, &tokens);

        assert_eq!(timeline.anchors, 0);
        assert!(timeline.is_low_confidence());
        assert!((timeline.chars[1].start - 2.0).abs() < 1e-9);
        assert!((timeline.chars[3].end - 8.0).abs() < 1e-9);
        assert!(timeline_degradation(&timeline).is_some());
    }

    #[test]
    fn test_empty_inputs() {
        let skip = SkipSet::new();
        let timeline = ForceAligner::default().align(&normalize("", &skip), &[]);
        assert!(timeline.is_empty());
        assert_eq!(timeline.quality, TimelineQuality::Ok);

        let timeline = ForceAligner::default().align(&normalize("ab", &skip), &[]);
        assert_eq!(timeline.len(), 2);
        assert!(timeline.is_low_confidence());
    }

    #[test]
    fn test_unsorted_tokens_are_sorted_before_explosion() {
        let skip = SkipSet::new();
        let script = normalize("ab", &skip);
        let tokens = vec![tok("b", 1.0, 2.0), tok("a", 0.0, 1.0)];
        let timeline = ForceAligner::default().align(&script, &tokens);
        assert_eq!(timeline.anchors, 2);
        assert!((timeline.chars[0].start - 0.0).abs() < 1e-9);
    }

    #[test]
    fn test_hirschberg_matches_full_table_length() {
        let a: Vec<char> = "the quick brown fox jumps over".chars().collect();
        let b: Vec<char> = "a quick brown dog jumped over it".chars().collect();

        let mut full = Vec::new();
        lcs_full_table(&a, &b, 0, 0, &mut full);

        let row = lcs_row(a.iter(), b.iter(), b.len());
        assert_eq!(row[b.len()] as usize, full.len());

        let pairs = lcs_pairs(&a, &b);
        assert_eq!(pairs.len(), full.len());
        for w in pairs.windows(2) {
            assert!(w[1].0 > w[0].0 && w[1].1 > w[0].1);
        }
        for &(i, j) in &pairs {
            assert_eq!(a[i], b[j]);
        }
    }

    fn lcs_len_naive(a: &[char], b: &[char]) -> usize {
        let mut dp = vec![vec![0usize; b.len() + 1]; a.len() + 1];
        for i in 1..=a.len() {
            for j in 1..=b.len() {
                dp[i][j] = if a[i - 1] == b[j - 1] {
                    dp[i - 1][j - 1] + 1
                } else {
                    dp[i - 1][j].max(dp[i][j - 1])
                };
            }
        }
        dp[a.len()][b.len()]
    }

    #[test]
    fn test_divide_and_conquer_path_on_large_input() {
        // Large enough to force at least one Hirschberg split.
        let a: Vec<char> = (0..1500).map(|i| char::from(b'a' + (i * 7 % 13) as u8)).collect();
        let b: Vec<char> = (0..1000).map(|i| char::from(b'a' + (i * 5 % 11) as u8)).collect();
        assert!(a.len() * b.len() > FULL_TABLE_CELLS);

        let pairs = lcs_pairs(&a, &b);
        assert_eq!(pairs.len(), lcs_len_naive(&a, &b));
        for w in pairs.windows(2) {
            assert!(w[1].0 > w[0].0 && w[1].1 > w[0].1);
        }
    }

    proptest! {
        #[test]
        fn prop_lcs_pairs_are_optimal(a in "[abc]{0,24}", b in "[abc]{0,24}") {
            let a: Vec<char> = a.chars().collect();
            let b: Vec<char> = b.chars().collect();
            let pairs = lcs_pairs(&a, &b);
            prop_assert_eq!(pairs.len(), lcs_len_naive(&a, &b));
            for &(i, j) in &pairs {
                prop_assert_eq!(a[i], b[j]);
            }
        }

        #[test]
        fn prop_timeline_length_and_monotonic(
            script in "[今天氣很好，。ab ]{0,40}",
            words in proptest::collection::vec(("[今天氣很好abx]{1,4}", 0.0f64..2.0, 0.0f64..1.5), 0..12),
        ) {
            let skip = SkipSet::new();
            let script = normalize(&script, &skip);
            let mut t = 0.0;
            let tokens: Vec<AsrToken> = words
                .into_iter()
                .map(|(text, gap, dur)| {
                    let start = t + gap;
                    t = start + dur;
                    AsrToken::new(text, start, t, 0.8)
                })
                .collect();

            let timeline = ForceAligner::default().align(&script, &tokens);
            prop_assert_eq!(timeline.len(), script.len());
            prop_assert!(timeline.is_monotonic());
            for (c, n) in timeline.chars.iter().zip(&script.chars) {
                prop_assert_eq!(c.ch, n.ch);
            }
        }
    }
}
