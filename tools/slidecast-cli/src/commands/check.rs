//! Check external tools and configuration.

use slidecast_common::config::{config_file_path, AppConfig};
use slidecast_render_engine::FfmpegRenderer;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Slidecast System Check");
    println!("{}", "=".repeat(50));

    if FfmpegRenderer::is_available() {
        println!("[OK] ffmpeg and ffprobe found in PATH");
    } else {
        println!("[FAIL] ffmpeg/ffprobe not found in PATH");
    }

    let path = config_file_path();
    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[INFO] Config: defaults ({} not found)", path.display());
    }

    println!(
        "     Video: {}x{} @ {} fps, {} / {}",
        config.video.width,
        config.video.height,
        config.video.fps.ffmpeg_arg(),
        config.video.video_codec,
        config.video.audio_codec
    );
    println!(
        "     Render concurrency: {} ({:?})",
        config.render.concurrency, config.render.failure_policy
    );
    println!(
        "     Locator window: {}",
        config
            .locator
            .search_half_window_secs
            .map(|s| format!("±{s}s"))
            .unwrap_or_else(|| "full track".to_string())
    );

    println!();
    if FfmpegRenderer::is_available() {
        println!("Slidecast is ready.");
    } else {
        println!("Install ffmpeg to render videos; captions and scheduling still work.");
    }

    Ok(())
}
