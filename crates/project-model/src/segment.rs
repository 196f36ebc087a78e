//! Assembly-side data: narration segments, frame specs, and render jobs.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use slidecast_common::FrameRate;

/// A narration clip and where it sits in the full composite track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSegmentSpec {
    /// Position in the slide order.
    pub index: usize,

    /// Narration clip for this segment.
    pub clip: PathBuf,

    /// Clip duration in seconds.
    pub duration_secs: f64,

    /// Offset of the clip inside the full track, in seconds.
    pub offset_secs: f64,

    /// Normalized correlation of the located offset, in `[0.0, 1.0]`.
    #[serde(default)]
    pub offset_confidence: f64,

    /// False if the nominal cumulative offset was used instead of the
    /// correlation peak.
    #[serde(default)]
    pub offset_located: bool,
}

impl AudioSegmentSpec {
    /// Spec with the offset set to the nominal cumulative position.
    pub fn nominal(index: usize, clip: impl Into<PathBuf>, duration_secs: f64, offset_secs: f64) -> Self {
        Self {
            index,
            clip: clip.into(),
            duration_secs,
            offset_secs,
            offset_confidence: 0.0,
            offset_located: false,
        }
    }

    pub fn end_secs(&self) -> f64 {
        self.offset_secs + self.duration_secs
    }
}

/// Frame-exact placement of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSpec {
    pub index: usize,
    pub frame_count: u64,
    pub start_frame: u64,
}

impl FrameSpec {
    /// First frame after this segment.
    pub fn end_frame(&self) -> u64 {
        self.start_frame + self.frame_count
    }
}

/// Frame specs for a whole assembly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameSchedule {
    pub fps: FrameRate,
    pub total_frames: u64,
    pub segments: Vec<FrameSpec>,
}

impl FrameSchedule {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Sum of the per-segment frame counts.
    pub fn frame_sum(&self) -> u64 {
        self.segments.iter().map(|s| s.frame_count).sum()
    }

    pub fn duration_secs(&self) -> f64 {
        self.fps.frames_to_secs(self.total_frames)
    }

    /// Segment start time in seconds, as the renderer will place it.
    pub fn start_secs(&self, position: usize) -> Option<f64> {
        self.segments
            .get(position)
            .map(|s| self.fps.frames_to_secs(s.start_frame))
    }
}

/// The slice of narration audio a segment plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSpan {
    pub source: PathBuf,
    pub offset_secs: f64,
    pub duration_secs: f64,
}

/// A picture-in-picture clip laid over a segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlaySpec {
    pub source: PathBuf,

    /// Where in the overlay clip this segment begins.
    pub offset_secs: f64,
}

/// One segment to render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    pub index: usize,
    pub image: PathBuf,
    pub audio: AudioSpan,
    pub frames: FrameSpec,
    #[serde(default)]
    pub overlay: Option<OverlaySpec>,
    pub output: PathBuf,
}

/// A rendered segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderResult {
    pub index: usize,
    pub output: PathBuf,
    pub frame_count: u64,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_helpers() {
        let schedule = FrameSchedule {
            fps: FrameRate::FPS_24,
            total_frames: 72,
            segments: vec![
                FrameSpec {
                    index: 0,
                    frame_count: 24,
                    start_frame: 0,
                },
                FrameSpec {
                    index: 1,
                    frame_count: 48,
                    start_frame: 24,
                },
            ],
        };
        assert_eq!(schedule.frame_sum(), 72);
        assert!((schedule.duration_secs() - 3.0).abs() < 1e-12);
        assert_eq!(schedule.start_secs(1), Some(1.0));
        assert_eq!(schedule.segments[1].end_frame(), 72);
        assert_eq!(schedule.start_secs(2), None);
    }

    #[test]
    fn test_render_job_overlay_is_optional_in_json() {
        let json = r#"{
            "index": 0,
            "image": "01.png",
            "audio": { "source": "01.mp3", "offset_secs": 0.0, "duration_secs": 2.0 },
            "frames": { "index": 0, "frame_count": 48, "start_frame": 0 },
            "output": "seg_000.mp4"
        }"#;
        let job: RenderJob = serde_json::from_str(json).unwrap();
        assert!(job.overlay.is_none());
        assert_eq!(job.frames.frame_count, 48);
    }
}
