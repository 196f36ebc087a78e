//! Frame-exact schedule for a list of segment durations.

use slidecast_common::config::{AppConfig, RemainderPolicy};
use slidecast_processing_core::FrameScheduler;

use super::parse_fps;

pub fn run(
    config: &AppConfig,
    durations: Vec<f64>,
    fps: Option<String>,
    total: Option<u64>,
    last_segment: bool,
) -> anyhow::Result<()> {
    let fps = match fps {
        Some(raw) => parse_fps(&raw)?,
        None => config.video.fps,
    };
    let policy = if last_segment {
        RemainderPolicy::LastSegment
    } else {
        config.schedule.remainder_policy
    };

    let scheduler = FrameScheduler::new(fps, policy);
    let schedule = match total {
        Some(total) => scheduler.schedule_to_total(&durations, total)?,
        None => scheduler.schedule(&durations)?,
    };

    println!("{}", serde_json::to_string_pretty(&schedule)?);
    Ok(())
}
