//! Time caption lines against the narration and write subtitles.

use std::path::PathBuf;

use slidecast_audio_ai::{
    save_subtitles, segmentation_request, CaptionPipeline, ParagraphSegmenter,
    RecordedSegmentation, RecordedTranscript, SegmentationOracle,
};
use slidecast_common::config::{AppConfig, MismatchPolicy};
use slidecast_processing_core::{normalize, SkipSet};

use super::load_folder;

pub fn run(
    config: &AppConfig,
    dir: PathBuf,
    transcript: Option<PathBuf>,
    lines: Option<PathBuf>,
    output: Option<PathBuf>,
    debug: bool,
    fallback: bool,
) -> anyhow::Result<()> {
    let Some(transcript) = transcript else {
        anyhow::bail!("--transcript is required to caption");
    };
    println!("Captioning material at: {}", dir.display());

    let folder = load_folder(&dir)?;
    let script = folder
        .read_script()
        .map_err(|e| anyhow::anyhow!("Failed to read script: {e}"))?;
    let audio = folder
        .avatar
        .clone()
        .unwrap_or_else(|| folder.root.join(slidecast_project_model::AVATAR_FILE));

    let mut captions = config.captions.clone();
    if fallback {
        captions.mismatch_policy = MismatchPolicy::ProportionalFallback;
    }

    let segmenter: Box<dyn SegmentationOracle> = match lines {
        Some(path) => Box::new(RecordedSegmentation::File(path)),
        None => Box::new(ParagraphSegmenter::new(
            captions.max_line_chars,
            SkipSet::from_config(&captions),
        )),
    };

    let mut pipeline = CaptionPipeline::new(&captions);
    if debug {
        pipeline = pipeline.with_debug_dir(&folder.root);
    }

    let run = pipeline.run(
        &script,
        &audio,
        &RecordedTranscript::new(transcript),
        segmenter.as_ref(),
    )?;

    let output = output.unwrap_or_else(|| folder.subtitle_path());
    save_subtitles(run.entries(), &output, &config.subtitle_style, &config.video)?;

    println!("  Segmenter: {}", segmenter.name());
    println!("  Script characters: {}", run.script.len());
    println!(
        "  Alignment anchors: {}/{} ({:.0}%)",
        run.timeline.anchors,
        run.timeline.semantic_chars,
        run.timeline.coverage * 100.0
    );
    println!("  Caption lines: {}", run.entries().len());
    if !run.outcome.drift.is_clean() {
        println!(
            "  Drift: {} resync(s), {} candidate / {} timeline chars skipped",
            run.outcome.drift.resyncs,
            run.outcome.drift.skipped_candidate_chars,
            run.outcome.drift.skipped_timeline_chars
        );
    }
    if run.is_degraded() {
        println!("\nDegraded:");
        for degradation in &run.degradations {
            println!("  - {degradation}");
        }
    }
    println!("\nSubtitles written: {}", output.display());

    Ok(())
}

/// Print the segmentation request for the folder's script.
pub fn print_prompt(config: &AppConfig, dir: PathBuf) -> anyhow::Result<()> {
    let folder = load_folder(&dir)?;
    let script = folder
        .read_script()
        .map_err(|e| anyhow::anyhow!("Failed to read script: {e}"))?;
    let skip = SkipSet::from_config(&config.captions);
    println!(
        "{}",
        segmentation_request(&normalize(&script, &skip), config.captions.max_line_chars)
    );
    Ok(())
}
