//! Application configuration.
//!
//! Each component receives its own section by reference; nothing in the
//! alignment or scheduling code reads ambient state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::clock::FrameRate;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory where finished videos are written when no output is given.
    pub output_dir: Option<PathBuf>,

    /// Output video parameters.
    pub video: VideoSettings,

    /// Caption alignment parameters.
    pub captions: CaptionConfig,

    /// Audio offset locator parameters.
    pub locator: LocatorConfig,

    /// Frame scheduler parameters.
    pub schedule: ScheduleConfig,

    /// Render coordinator parameters.
    pub render: RenderConfig,

    /// Burned-in subtitle styling.
    pub subtitle_style: SubtitleStyle,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Chinese script variant ASR text is converted to before alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptVariant {
    /// Leave ASR text as transcribed.
    Keep,
    /// Convert to Traditional characters.
    #[default]
    Traditional,
    /// Convert to Simplified characters.
    Simplified,
}

/// Output video parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoSettings {
    pub width: u32,
    pub height: u32,
    pub fps: FrameRate,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub audio_bitrate_kbps: u32,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: FrameRate::FPS_24,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "medium".to_string(),
            audio_bitrate_kbps: 192,
        }
    }
}

/// What the line matcher does when it cannot resynchronize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Fail the whole caption run.
    #[default]
    Fail,
    /// Time the offending line by its share of characters and flag it.
    ProportionalFallback,
}

/// Caption alignment parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionConfig {
    /// Characters treated as skippable in addition to the built-in set.
    pub extra_skip_chars: String,

    /// Lookahead bound (semantic characters per side) for resynchronization.
    pub resync_window: usize,

    /// Behaviour when resynchronization fails.
    pub mismatch_policy: MismatchPolicy,

    /// Anchor coverage below which the timeline is flagged low-confidence.
    pub min_anchor_ratio: f64,

    /// Shortest caption the exporter will emit, in seconds.
    pub min_caption_secs: f64,

    /// Semantic-character limit per line for the local segmenter.
    pub max_line_chars: usize,

    /// Variant the ASR text is converted to so it matches the script.
    pub asr_variant: ScriptVariant,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            extra_skip_chars: String::new(),
            resync_window: 32,
            mismatch_policy: MismatchPolicy::Fail,
            min_anchor_ratio: 0.8,
            min_caption_secs: 0.04,
            max_line_chars: 18,
            asr_variant: ScriptVariant::Traditional,
        }
    }
}

/// Audio offset locator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Half width of the search window around the nominal offset.
    /// `None` searches the whole track.
    pub search_half_window_secs: Option<f64>,

    /// Normalized correlation below which the nominal offset is used.
    pub min_confidence: f64,

    /// Sample rate clips and tracks are decoded to before correlation.
    pub analysis_sample_rate: u32,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            search_half_window_secs: Some(5.0),
            min_confidence: 0.5,
            analysis_sample_rate: 16_000,
        }
    }
}

/// How rounding remainder frames are distributed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemainderPolicy {
    /// One frame at a time to the segments that lost the most to rounding.
    #[default]
    LargestFraction,
    /// Everything to the last segment, spilling backwards if needed.
    LastSegment,
}

/// Frame scheduler parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub remainder_policy: RemainderPolicy,
}

/// What the render coordinator does after the first failed segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop dispatching new segments; let running ones finish.
    #[default]
    AbortBatch,
    /// Dispatch everything so every failure is reported.
    RunAll,
}

/// Render coordinator parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Maximum number of concurrent render invocations.
    pub concurrency: usize,

    pub failure_policy: FailurePolicy,

    /// Talking-head overlay placement.
    pub avatar: AvatarConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            failure_policy: FailurePolicy::AbortBatch,
            avatar: AvatarConfig::default(),
        }
    }
}

/// Crop of the talking-head clip and its placement in the output frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    pub crop_x: u32,
    pub crop_y: u32,
    pub crop_size: u32,
    /// Overlay width as a fraction of the output width.
    pub scale_ratio: f64,
    pub margin_x: u32,
    pub margin_y: u32,
    /// Apply a circular alpha mask.
    pub circle_mask: bool,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            crop_x: 200,
            crop_y: 550,
            crop_size: 650,
            scale_ratio: 0.12,
            margin_x: 30,
            margin_y: 30,
            circle_mask: true,
        }
    }
}

/// Burned-in subtitle styling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleStyle {
    pub font_name: String,
    pub font_size: u32,
    /// Color names understood by the ASS writer (`yellow`, `white`, ...).
    pub color: String,
    pub outline_color: String,
    pub outline_width: u32,
    /// Y coordinate of the visual center of the subtitle line.
    pub center_y: u32,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_name: "PingFang TC".to_string(),
            font_size: 96,
            color: "yellow".to_string(),
            outline_color: "black".to_string(),
            outline_width: 6,
            center_y: 1000,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "slidecast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &std::path::Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    pub fn save_to(&self, config_path: &std::path::Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Check values the algorithms cannot work with.
    pub fn validate(&self) -> Result<(), crate::error::SlidecastError> {
        use crate::error::SlidecastError;

        if !self.video.fps.is_valid() {
            return Err(SlidecastError::config("video.fps must be positive"));
        }
        if self.video.width == 0 || self.video.height == 0 {
            return Err(SlidecastError::config("video dimensions must be non-zero"));
        }
        if self.render.concurrency == 0 {
            return Err(SlidecastError::config("render.concurrency must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.locator.min_confidence) {
            return Err(SlidecastError::config(
                "locator.min_confidence must be within [0, 1]",
            ));
        }
        if self.captions.max_line_chars == 0 {
            return Err(SlidecastError::config(
                "captions.max_line_chars must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("slidecast").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_production_settings() {
        let config = AppConfig::default();
        assert_eq!(config.video.fps, FrameRate::FPS_24);
        assert_eq!(config.render.concurrency, 8);
        assert_eq!(config.captions.resync_window, 32);
        assert_eq!(config.captions.mismatch_policy, MismatchPolicy::Fail);
        assert_eq!(
            config.schedule.remainder_policy,
            RemainderPolicy::LargestFraction
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{ "render": { "concurrency": 2 }, "captions": { "mismatch_policy": "proportional_fallback" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.render.concurrency, 2);
        assert_eq!(config.render.failure_policy, FailurePolicy::AbortBatch);
        assert_eq!(
            config.captions.mismatch_policy,
            MismatchPolicy::ProportionalFallback
        );
        assert_eq!(config.video.width, 1920);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.render.concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir()
            .join("slidecast_test_config")
            .join("config.json");
        let _ = std::fs::remove_file(&path);

        let mut config = AppConfig::default();
        config.video.fps = FrameRate::NTSC_30;
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.video.fps, FrameRate::NTSC_30);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_unparseable_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join("slidecast_test_bad_config.json");
        std::fs::write(&path, "{ not json").unwrap();
        let loaded = AppConfig::load_from(&path);
        assert_eq!(loaded.render.concurrency, 8);
        std::fs::remove_file(&path).ok();
    }
}
