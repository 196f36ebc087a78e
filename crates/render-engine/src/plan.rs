//! Turning located segments and a frame schedule into render jobs.

use std::path::{Path, PathBuf};

use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_project_model::caption::CaptionEntry;
use slidecast_project_model::segment::{AudioSegmentSpec, AudioSpan, FrameSchedule, OverlaySpec, RenderJob};

/// Shortest caption kept after retiming.
const MIN_RETIMED_SECS: f64 = 0.001;

/// Output file for segment `index`.
pub fn segment_output(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("seg_{index:03}.mp4"))
}

/// One render job per segment that has frames; zero-frame segments
/// (empty clips) contribute nothing to the video and are skipped.
///
/// Audio comes from `track` at each segment's located offset, or from the
/// segment's own clip when no track is given. When `overlay` is given, the
/// located offset is used inside the overlay clip so the talking head stays
/// in sync with the narration.
pub fn build_jobs(
    images: &[PathBuf],
    segments: &[AudioSegmentSpec],
    schedule: &FrameSchedule,
    track: Option<&Path>,
    overlay: Option<&Path>,
    out_dir: &Path,
) -> SlidecastResult<Vec<RenderJob>> {
    if images.len() != segments.len() || segments.len() != schedule.len() {
        return Err(SlidecastError::schedule(format!(
            "{} images, {} audio segments and {} frame specs do not line up",
            images.len(),
            segments.len(),
            schedule.len()
        )));
    }

    let mut jobs = Vec::with_capacity(segments.len());
    for ((image, segment), frames) in images.iter().zip(segments).zip(&schedule.segments) {
        if segment.index != frames.index {
            return Err(SlidecastError::schedule(format!(
                "audio segment {} paired with frame spec {}",
                segment.index, frames.index
            )));
        }
        if frames.frame_count == 0 {
            tracing::warn!(
                index = segment.index,
                clip = %segment.clip.display(),
                "Skipping segment with no frames (empty narration clip)"
            );
            continue;
        }
        jobs.push(RenderJob {
            index: segment.index,
            image: image.clone(),
            audio: match track {
                Some(track) => AudioSpan {
                    source: track.to_path_buf(),
                    offset_secs: segment.offset_secs,
                    duration_secs: segment.duration_secs,
                },
                None => AudioSpan {
                    source: segment.clip.clone(),
                    offset_secs: 0.0,
                    duration_secs: segment.duration_secs,
                },
            },
            frames: *frames,
            overlay: overlay.map(|source| OverlaySpec {
                source: source.to_path_buf(),
                offset_secs: segment.offset_secs,
            }),
            output: segment_output(out_dir, segment.index),
        });
    }
    Ok(jobs)
}

/// Move captions timed on the full narration track onto the assembled
/// video's timeline.
///
/// A track time inside segment `i` keeps its distance from the segment's
/// located offset and is placed relative to the segment's first frame.
/// Silence between clips collapses onto the segment boundary.
pub fn retime_captions(
    entries: &[CaptionEntry],
    segments: &[AudioSegmentSpec],
    schedule: &FrameSchedule,
) -> Vec<CaptionEntry> {
    let map = |t: f64| -> f64 {
        let Some(pos) = segments.iter().rposition(|s| s.offset_secs <= t) else {
            return 0.0;
        };
        let (Some(start), Some(frames)) = (schedule.start_secs(pos), schedule.segments.get(pos)) else {
            return t;
        };
        let span = schedule.fps.frames_to_secs(frames.frame_count);
        start + (t - segments[pos].offset_secs).clamp(0.0, span)
    };

    let mut floor = 0.0_f64;
    entries
        .iter()
        .map(|entry| {
            let start = map(entry.start).max(floor);
            let end = map(entry.end).max(start + MIN_RETIMED_SECS);
            floor = end;
            CaptionEntry {
                start,
                end,
                ..entry.clone()
            }
        })
        .collect()
}
