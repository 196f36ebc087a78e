//! Frame and sample clock math.
//!
//! Every duration that reaches the renderer is eventually expressed as a
//! whole number of frames. Frame rates are kept rational so NTSC rates such
//! as 30000/1001 convert without accumulated error.

use serde::{Deserialize, Serialize};

/// A rational frame rate (`num / den` frames per second).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    pub num: u32,
    pub den: u32,
}

impl FrameRate {
    pub const FPS_24: FrameRate = FrameRate { num: 24, den: 1 };
    pub const FPS_25: FrameRate = FrameRate { num: 25, den: 1 };
    pub const FPS_30: FrameRate = FrameRate { num: 30, den: 1 };
    pub const NTSC_30: FrameRate = FrameRate {
        num: 30000,
        den: 1001,
    };

    /// Create a rate; a zero denominator is treated as 1.
    pub fn new(num: u32, den: u32) -> Self {
        Self {
            num,
            den: den.max(1),
        }
    }

    /// Integer frames per second.
    pub fn whole(fps: u32) -> Self {
        Self::new(fps, 1)
    }

    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.den.max(1) as f64
    }

    pub fn is_valid(&self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Exact (unrounded) frame count for a duration.
    pub fn frames_exact(&self, secs: f64) -> f64 {
        secs * self.num as f64 / self.den.max(1) as f64
    }

    /// Duration rounded to the nearest whole frame.
    pub fn frames_rounded(&self, secs: f64) -> u64 {
        self.frames_exact(secs).round().max(0.0) as u64
    }

    /// Seconds at the start of the given frame.
    pub fn frames_to_secs(&self, frames: u64) -> f64 {
        frames as f64 * self.den.max(1) as f64 / self.num.max(1) as f64
    }

    /// Rate as ffmpeg expects it on the command line (`24` or `30000/1001`).
    pub fn ffmpeg_arg(&self) -> String {
        if self.den <= 1 {
            self.num.to_string()
        } else {
            format!("{}/{}", self.num, self.den)
        }
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_24
    }
}

impl std::fmt::Display for FrameRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.den <= 1 {
            write!(f, "{} fps", self.num)
        } else {
            write!(f, "{:.3} fps ({}/{})", self.as_f64(), self.num, self.den)
        }
    }
}

/// Sample-domain clock for PCM buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleClock {
    pub sample_rate: u32,
}

impl SampleClock {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    pub fn samples_to_secs(&self, samples: usize) -> f64 {
        samples as f64 / self.sample_rate.max(1) as f64
    }

    /// Nearest sample index for a time; negative times clamp to zero.
    pub fn secs_to_samples(&self, secs: f64) -> usize {
        (secs * self.sample_rate as f64).round().max(0.0) as usize
    }
}

/// Drift between where audio says a segment starts and where the frame
/// schedule puts it.
#[derive(Debug, Clone, Copy)]
pub struct AvDrift {
    pub audio_secs: f64,
    pub video_secs: f64,
}

impl AvDrift {
    /// Drift in milliseconds (positive = video is late).
    pub fn drift_ms(&self) -> f64 {
        (self.video_secs - self.audio_secs) * 1000.0
    }

    pub fn exceeds_threshold_ms(&self, threshold_ms: f64) -> bool {
        self.drift_ms().abs() > threshold_ms
    }
}
