//! Caption pipeline.
//!
//! Raw script → normalized script → character timeline (from ASR tokens) →
//! candidate lines (from the segmentation oracle) → timed caption entries.
//! Intermediate results are optionally dumped as debug artifacts.

use std::path::{Path, PathBuf};

use slidecast_common::config::CaptionConfig;
use slidecast_common::error::{Degradation, SlidecastError, SlidecastResult};
use slidecast_processing_core::force_align::{timeline_degradation, ForceAligner};
use slidecast_processing_core::line_match::{LineMatcher, MatchOutcome};
use slidecast_processing_core::normalizer::{normalize, SkipSet};
use slidecast_project_model::artifacts::{write_artifact, ArtifactKind};
use slidecast_project_model::caption::{CandidateLine, CaptionEntry};
use slidecast_project_model::transcript::{AsrToken, CharacterTimeline, NormalizedScript};

use crate::oracle::{SegmentationOracle, TranscriptionOracle};

/// Everything one caption run produced.
#[derive(Debug, Clone)]
pub struct CaptionRun {
    pub script: NormalizedScript,
    pub tokens: Vec<AsrToken>,
    pub timeline: CharacterTimeline,
    pub lines: Vec<CandidateLine>,
    pub outcome: MatchOutcome,
    /// Alignment and line degradations, in the order they were raised.
    pub degradations: Vec<Degradation>,
}

impl CaptionRun {
    pub fn entries(&self) -> &[CaptionEntry] {
        &self.outcome.entries
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Caption pipeline wired from configuration.
#[derive(Debug, Clone)]
pub struct CaptionPipeline {
    skip: SkipSet,
    aligner: ForceAligner,
    matcher: LineMatcher,
    debug_dir: Option<PathBuf>,
}

impl CaptionPipeline {
    pub fn new(config: &CaptionConfig) -> Self {
        Self {
            skip: SkipSet::from_config(config),
            aligner: ForceAligner::from_config(config),
            matcher: LineMatcher::from_config(config),
            debug_dir: None,
        }
    }

    /// Dump debug artifacts into `dir`.
    pub fn with_debug_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.debug_dir = Some(dir.into());
        self
    }

    /// Run the full caption path for one narration track.
    pub fn run(
        &self,
        raw_script: &str,
        audio: &Path,
        asr: &dyn TranscriptionOracle,
        segmenter: &dyn SegmentationOracle,
    ) -> SlidecastResult<CaptionRun> {
        let script = normalize(raw_script, &self.skip);
        if script.semantic_count() == 0 {
            return Err(SlidecastError::config("script has no alignable characters"));
        }
        self.dump(ArtifactKind::NormalizedScript, &script);

        tracing::info!(oracle = asr.name(), audio = %audio.display(), "Transcribing narration");
        let tokens = asr.transcribe(audio)?;
        self.dump(ArtifactKind::AsrTokens, &tokens);

        let timeline = self.aligner.align(&script, &tokens);
        self.dump(ArtifactKind::Timeline, &timeline);

        let mut degradations = Vec::new();
        if let Some(degradation) = timeline_degradation(&timeline) {
            degradations.push(degradation);
        }

        tracing::info!(oracle = segmenter.name(), "Segmenting script into lines");
        let lines = segmenter.segment(&script)?;
        self.dump(ArtifactKind::CandidateLines, &lines);

        let outcome = self.matcher.match_lines(&lines, &timeline)?;
        degradations.extend(outcome.degradations.iter().cloned());

        for degradation in &degradations {
            tracing::warn!(%degradation, "Caption run degraded");
        }
        tracing::info!(
            lines = outcome.entries.len(),
            anchors = timeline.anchors,
            coverage = timeline.coverage,
            resyncs = outcome.drift.resyncs,
            "Captions matched"
        );

        Ok(CaptionRun {
            script,
            tokens,
            timeline,
            lines,
            outcome,
            degradations,
        })
    }

    fn dump<T: serde::Serialize>(&self, kind: ArtifactKind, payload: &T) {
        let Some(dir) = &self.debug_dir else {
            return;
        };
        match write_artifact(dir, kind, payload) {
            Ok(path) => tracing::debug!(path = %path.display(), "Wrote debug artifact"),
            Err(e) => tracing::warn!(error = %e, "Failed to write debug artifact"),
        }
    }
}

impl Default for CaptionPipeline {
    fn default() -> Self {
        Self::new(&CaptionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Vec<AsrToken>);

    impl TranscriptionOracle for Canned {
        fn transcribe(&self, _audio: &Path) -> SlidecastResult<Vec<AsrToken>> {
            Ok(self.0.clone())
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    struct Lines(Vec<&'static str>);

    impl SegmentationOracle for Lines {
        fn segment(&self, _script: &NormalizedScript) -> SlidecastResult<Vec<CandidateLine>> {
            Ok(self.0.iter().map(|&l| CandidateLine::from(l)).collect())
        }

        fn name(&self) -> &str {
            "lines"
        }
    }

    #[test]
    fn test_single_line_example() {
        let asr = Canned(vec![
            AsrToken::new("今天", 0.0, 1.0, 0.9),
            AsrToken::new("天氣", 1.0, 2.0, 0.9),
            AsrToken::new("很好", 2.0, 3.0, 0.9),
        ]);
        let run = CaptionPipeline::default()
            .run("今天天氣很好。", Path::new("narration.wav"), &asr, &Lines(vec!["今天天氣很好"]))
            .unwrap();

        assert_eq!(run.entries().len(), 1);
        let entry = &run.entries()[0];
        assert_eq!(entry.text, "今天天氣很好");
        assert!(entry.start.abs() < 1e-9);
        assert!((entry.end - 3.0).abs() < 1e-9);
        assert!(!run.is_degraded());
    }

    #[test]
    fn test_empty_script_is_rejected() {
        let err = CaptionPipeline::default()
            .run("。，  ", Path::new("a.wav"), &Canned(Vec::new()), &Lines(vec!["x"]))
            .unwrap_err();
        assert!(matches!(err, SlidecastError::Config { .. }));
    }

    #[test]
    fn test_unrelated_asr_is_flagged() {
        let asr = Canned(vec![AsrToken::new("xyz", 0.0, 3.0, 0.5)]);
        let run = CaptionPipeline::default()
            .run("今天天氣很好", Path::new("a.wav"), &asr, &Lines(vec!["今天天氣很好"]))
            .unwrap();
        assert!(run
            .degradations
            .iter()
            .any(|d| matches!(d, Degradation::AlignmentLowConfidence { .. })));
        assert_eq!(run.entries().len(), 1);
    }
}
