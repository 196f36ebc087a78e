//! Render every slide segment and assemble the final video.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use slidecast_audio_ai::{parse_srt, save_subtitles};
use slidecast_common::config::AppConfig;
use slidecast_processing_core::{boundary_drift, FrameScheduler};
use slidecast_project_model::segment::AudioSegmentSpec;
use slidecast_render_engine::{
    build_jobs, probe_duration, retime_captions, BatchProgress, FfmpegRenderer, ProgressCallback,
    RenderCoordinator,
};

use super::locate::locate_folder;
use super::{load_folder, work_dir};

pub async fn run(
    config: &AppConfig,
    dir: PathBuf,
    output: Option<PathBuf>,
    concurrency: Option<usize>,
    with_avatar: bool,
    with_subtitles: bool,
    keep_segments: bool,
) -> anyhow::Result<()> {
    println!("Assembling material at: {}", dir.display());

    if !FfmpegRenderer::is_available() {
        anyhow::bail!("ffmpeg and ffprobe are required in PATH (run `slidecast check`)");
    }

    let folder = load_folder(&dir)?;
    if folder.pairs.is_empty() {
        anyhow::bail!("No slide/narration pairs found in {}", dir.display());
    }
    let work = work_dir(&folder)?;
    let avatar = if with_avatar { folder.avatar.clone() } else { None };

    // Segment offsets: located in the avatar track when there is one,
    // otherwise the clips simply follow each other.
    let segments = match &avatar {
        Some(track) => {
            let (segments, degradations) = locate_folder(config, &folder, Some(track))?;
            for degradation in &degradations {
                println!("  Degraded: {degradation}");
            }
            segments
        }
        None => {
            let mut offset = 0.0;
            let mut segments = Vec::with_capacity(folder.pairs.len());
            for (index, pair) in folder.pairs.iter().enumerate() {
                let duration = probe_duration(&pair.audio)?;
                segments.push(AudioSegmentSpec::nominal(index, &pair.audio, duration, offset));
                offset += duration;
            }
            segments
        }
    };

    let durations: Vec<f64> = segments.iter().map(|s| s.duration_secs).collect();
    let schedule = FrameScheduler::from_config(config.video.fps, &config.schedule).schedule(&durations)?;
    println!(
        "  Segments: {} ({} frames @ {} fps, {:.2}s)",
        schedule.len(),
        schedule.total_frames,
        config.video.fps.ffmpeg_arg(),
        schedule.duration_secs()
    );

    let frame_ms = config.video.fps.frames_to_secs(1) * 1000.0;
    for (index, drift) in boundary_drift(&durations, &schedule).iter().enumerate() {
        if drift.exceeds_threshold_ms(frame_ms) {
            tracing::warn!(index, drift_ms = drift.drift_ms(), "Segment start drifts more than one frame");
        }
    }

    let images: Vec<PathBuf> = folder.pairs.iter().map(|p| p.image.clone()).collect();
    let segment_dir = work.join("segments");
    let jobs = build_jobs(
        &images,
        &segments,
        &schedule,
        None,
        avatar.as_deref(),
        &segment_dir,
    )?;

    let mut render = config.render.clone();
    if let Some(concurrency) = concurrency {
        render.concurrency = concurrency;
    }
    let coordinator = RenderCoordinator::from_config(&render);
    let renderer = Arc::new(FfmpegRenderer::new(config.video.clone(), render.avatar.clone()));

    let progress_cb: ProgressCallback = Box::new(|p: BatchProgress| {
        print!(
            "\r  Rendering: {}/{} segments ({} failed)  ",
            p.completed, p.total, p.failed
        );
        std::io::stdout().flush().ok();
    });
    let results = match coordinator.run(jobs, renderer.clone(), Some(progress_cb)).await {
        Ok(results) => results,
        Err(e) => {
            println!("\nRender failed: {e}");
            if let slidecast_common::SlidecastError::BatchFailed { failures, .. } = &e {
                for failure in failures {
                    println!("  - {failure}");
                }
            }
            return Err(e.into());
        }
    };
    println!();

    let concat = work.join("concat.mp4");
    renderer.concat_segments(&results, &concat)?;

    let subtitles = match (&folder.subtitle, with_subtitles) {
        (Some(srt), true) => {
            let content = std::fs::read_to_string(srt)?;
            let entries = retime_captions(&parse_srt(&content)?, &segments, &schedule);
            let ass = work.join("subtitles.ass");
            save_subtitles(&entries, &ass, &config.subtitle_style, &config.video)?;
            Some(ass)
        }
        (None, true) => {
            println!("  No {} found; skipping subtitles", slidecast_project_model::SUBTITLE_FILE);
            None
        }
        _ => None,
    };

    let output = output.unwrap_or_else(|| {
        config
            .output_dir
            .clone()
            .unwrap_or_else(|| folder.root.clone())
            .join("final.mp4")
    });
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }
    renderer.composite_final(&concat, None, subtitles.as_deref(), &output)?;

    if !keep_segments {
        std::fs::remove_dir_all(&work).ok();
    }

    println!("\nAssembly complete: {}", output.display());
    Ok(())
}
