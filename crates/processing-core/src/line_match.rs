//! Caption line matching.
//!
//! Walks two cursors in lockstep: cursor A over the concatenated candidate
//! lines, cursor B over the character timeline. Skippable characters on
//! either side are stepped over alone, equal semantic characters are consumed
//! together, and a difference triggers a bounded lookahead on both sides for
//! the nearest common character.
//!
//! Each line's span runs from the start of its first consumed timeline
//! character to the end of its last one, so adjacent captions meet without
//! overlapping. Error indices are character positions: `candidate_index`
//! within the trimmed text of the offending line, `timeline_index` within
//! the timeline.

use serde::{Deserialize, Serialize};
use slidecast_common::config::{CaptionConfig, MismatchPolicy};
use slidecast_common::error::{Degradation, SlidecastError, SlidecastResult};
use slidecast_project_model::caption::{CandidateLine, CaptionEntry, DriftReport};
use slidecast_project_model::transcript::CharacterTimeline;

use crate::normalizer::{is_dropped, SkipSet};

/// Floor for the configured minimum caption length, keeping `start < end`.
const MIN_CAPTION_FLOOR_SECS: f64 = 0.001;

/// Line matcher.
#[derive(Debug, Clone)]
pub struct LineMatcher {
    skip: SkipSet,
    resync_window: usize,
    policy: MismatchPolicy,
    min_caption_secs: f64,
}

/// Result of matching candidate lines onto a timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchOutcome {
    /// One entry per candidate line, in order.
    pub entries: Vec<CaptionEntry>,
    pub drift: DriftReport,
    pub degradations: Vec<Degradation>,
}

#[derive(Debug, Clone, Copy)]
struct CandChar {
    line: usize,
    pos: usize,
    key: char,
}

/// Per-line consumed timeline range plus fallback flag.
#[derive(Debug, Clone, Copy, Default)]
struct LineSpan {
    first: Option<usize>,
    last: Option<usize>,
    degraded: bool,
}

impl LineSpan {
    fn consume(&mut self, timeline_index: usize) {
        self.first.get_or_insert(timeline_index);
        self.last = Some(timeline_index);
    }
}

impl LineMatcher {
    pub fn new(skip: SkipSet, resync_window: usize, policy: MismatchPolicy, min_caption_secs: f64) -> Self {
        Self {
            skip,
            resync_window,
            policy,
            min_caption_secs,
        }
    }

    pub fn from_config(config: &CaptionConfig) -> Self {
        Self::new(
            SkipSet::from_config(config),
            config.resync_window,
            config.mismatch_policy,
            config.min_caption_secs,
        )
    }

    /// Time every candidate line against the timeline.
    pub fn match_lines(
        &self,
        lines: &[CandidateLine],
        timeline: &CharacterTimeline,
    ) -> SlidecastResult<MatchOutcome> {
        let texts: Vec<&str> = lines.iter().map(|l| l.text.trim()).collect();
        let cand = self.candidate_chars(&texts);
        let tl: Vec<usize> = (0..timeline.len())
            .filter(|&k| timeline.chars[k].is_semantic())
            .collect();
        let tl_keys: Vec<char> = tl.iter().filter_map(|&k| timeline.chars[k].key).collect();

        let mut drift = DriftReport::default();
        let mut degradations = Vec::new();

        if lines.is_empty() {
            if tl.len() > self.resync_window && self.policy == MismatchPolicy::Fail {
                return Err(SlidecastError::LineMismatch {
                    line: 0,
                    candidate_index: 0,
                    timeline_index: tl[0],
                });
            }
            drift.unconsumed_timeline_chars = tl.len();
            return Ok(MatchOutcome {
                entries: Vec::new(),
                drift,
                degradations,
            });
        }

        let mut spans = vec![LineSpan::default(); lines.len()];
        let (mut i, mut j) = (0, 0);

        while i < cand.len() && j < tl.len() {
            if cand[i].key == tl_keys[j] {
                spans[cand[i].line].consume(tl[j]);
                i += 1;
                j += 1;
                continue;
            }

            if let Some((di, dj)) = self.resync(&cand, &tl_keys, i, j) {
                tracing::debug!(
                    line = cand[i].line,
                    candidate_skip = di,
                    timeline_skip = dj,
                    "Resynchronized caption cursors"
                );
                drift.skipped_candidate_chars += di;
                drift.skipped_timeline_chars += dj;
                drift.resyncs += 1;
                // Skipped timeline characters pair with the skipped candidate
                // characters; any surplus stays with the open caption.
                for k in 0..dj {
                    let owner = if k < di { i + k } else { (i + di).saturating_sub(1) };
                    spans[cand[owner].line].consume(tl[j + k]);
                }
                i += di;
                j += dj;
                continue;
            }

            let line = cand[i].line;
            if self.policy == MismatchPolicy::Fail {
                return Err(SlidecastError::LineMismatch {
                    line,
                    candidate_index: cand[i].pos,
                    timeline_index: tl[j],
                });
            }

            // Proportional fallback: the line takes as many timeline
            // characters as it has semantic characters left.
            let line_end = cand[i..]
                .iter()
                .position(|c| c.line != line)
                .map_or(cand.len(), |p| i + p);
            let take = (line_end - i).min(tl.len() - j);
            for &k in &tl[j..j + take] {
                spans[line].consume(k);
            }
            self.mark_degraded(&mut spans, &mut drift, &mut degradations, line, cand[i].pos, tl[j]);
            i = line_end;
            j += take;
        }

        if i < cand.len() {
            let leftover = cand.len() - i;
            drift.skipped_candidate_chars += leftover;
            if leftover > self.resync_window {
                if self.policy == MismatchPolicy::Fail {
                    return Err(SlidecastError::LineMismatch {
                        line: cand[i].line,
                        candidate_index: cand[i].pos,
                        timeline_index: timeline.len(),
                    });
                }
                let mut last_line = None;
                for c in &cand[i..] {
                    if last_line != Some(c.line) {
                        last_line = Some(c.line);
                        self.mark_degraded(
                            &mut spans,
                            &mut drift,
                            &mut degradations,
                            c.line,
                            c.pos,
                            timeline.len(),
                        );
                    }
                }
            }
        }

        if j < tl.len() {
            let leftover = tl.len() - j;
            drift.unconsumed_timeline_chars = leftover;
            let target = cand.last().map_or(lines.len() - 1, |c| c.line);
            if leftover > self.resync_window {
                let candidate_index = texts[target].chars().count();
                if self.policy == MismatchPolicy::Fail {
                    return Err(SlidecastError::LineMismatch {
                        line: target,
                        candidate_index,
                        timeline_index: tl[j],
                    });
                }
                self.mark_degraded(
                    &mut spans,
                    &mut drift,
                    &mut degradations,
                    target,
                    candidate_index,
                    tl[j],
                );
            }
            for &k in &tl[j..] {
                spans[target].consume(k);
            }
        }

        let entries = self.build_entries(&texts, &spans, timeline);

        if !drift.is_clean() {
            tracing::info!(
                resyncs = drift.resyncs,
                skipped_candidate = drift.skipped_candidate_chars,
                skipped_timeline = drift.skipped_timeline_chars,
                unconsumed = drift.unconsumed_timeline_chars,
                "Candidate lines drifted from the script"
            );
        }

        Ok(MatchOutcome {
            entries,
            drift,
            degradations,
        })
    }

    fn candidate_chars(&self, texts: &[&str]) -> Vec<CandChar> {
        let mut out = Vec::new();
        for (line, text) in texts.iter().enumerate() {
            for (pos, c) in text.chars().enumerate() {
                if is_dropped(c) {
                    continue;
                }
                if let Some(key) = self.skip.key(c) {
                    out.push(CandChar { line, pos, key });
                }
            }
        }
        out
    }

    /// Nearest `(candidate_skip, timeline_skip)` that lands on equal
    /// characters, by total distance then fewer candidate skips.
    fn resync(&self, cand: &[CandChar], tl_keys: &[char], i: usize, j: usize) -> Option<(usize, usize)> {
        let max_di = self.resync_window.min(cand.len() - i - 1);
        let max_dj = self.resync_window.min(tl_keys.len() - j - 1);

        for total in 1..=(max_di + max_dj) {
            let di_lo = total.saturating_sub(max_dj);
            let di_hi = total.min(max_di);
            for di in di_lo..=di_hi {
                let dj = total - di;
                if cand[i + di].key == tl_keys[j + dj] {
                    return Some((di, dj));
                }
            }
        }
        None
    }

    fn mark_degraded(
        &self,
        spans: &mut [LineSpan],
        drift: &mut DriftReport,
        degradations: &mut Vec<Degradation>,
        line: usize,
        candidate_index: usize,
        timeline_index: usize,
    ) {
        if spans[line].degraded {
            return;
        }
        spans[line].degraded = true;
        drift.degraded_lines.push(line);
        tracing::warn!(
            line,
            candidate_index,
            timeline_index,
            "Caption line could not be matched; timing it proportionally"
        );
        degradations.push(Degradation::LineMismatch {
            line,
            candidate_index,
            timeline_index,
        });
    }

    fn build_entries(
        &self,
        texts: &[&str],
        spans: &[LineSpan],
        timeline: &CharacterTimeline,
    ) -> Vec<CaptionEntry> {
        let min_len = self.min_caption_secs.max(MIN_CAPTION_FLOOR_SECS);
        let mut boundary = timeline.span().map_or(0.0, |(start, _)| start);

        texts
            .iter()
            .zip(spans)
            .map(|(text, span)| {
                let (start, end) = match (span.first, span.last) {
                    (Some(first), Some(last)) => {
                        (timeline.chars[first].start, timeline.chars[last].end)
                    }
                    _ => (boundary, boundary),
                };
                let start = start.max(boundary);
                let end = end.max(start + min_len);
                boundary = end;
                CaptionEntry {
                    text: self.display_text(text),
                    start,
                    end,
                    degraded: span.degraded,
                }
            })
            .collect()
    }

    /// Strip exactly one trailing skippable character, unless that would
    /// leave nothing to show.
    fn display_text(&self, text: &str) -> String {
        let mut chars = text.chars();
        match chars.next_back() {
            Some(last) if self.skip.contains(last) && !chars.as_str().is_empty() => {
                chars.as_str().to_string()
            }
            _ => text.to_string(),
        }
    }
}

impl Default for LineMatcher {
    fn default() -> Self {
        Self::from_config(&CaptionConfig::default())
    }
}
