//! ffmpeg invocation: per-segment renders, concatenation, and the final
//! composite with the talking-head inset and burned-in subtitles.
//!
//! Argument lists are built by pure functions so they can be checked
//! without running ffmpeg. Every command starts with `-y`.

use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Instant;

use slidecast_common::config::{AvatarConfig, VideoSettings};
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_project_model::segment::{RenderJob, RenderResult};

use crate::coordinator::SegmentRenderer;

/// Renders segments and the final video with the ffmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegRenderer {
    video: VideoSettings,
    avatar: AvatarConfig,
}

impl FfmpegRenderer {
    pub fn new(video: VideoSettings, avatar: AvatarConfig) -> Self {
        Self { video, avatar }
    }

    /// True if both `ffmpeg` and `ffprobe` are on `PATH`.
    pub fn is_available() -> bool {
        command_exists("ffmpeg") && command_exists("ffprobe")
    }

    pub fn video(&self) -> &VideoSettings {
        &self.video
    }

    fn cover_filter(&self) -> String {
        let (w, h) = (self.video.width, self.video.height);
        format!("scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1")
    }

    fn audio_args(&self) -> Vec<String> {
        vec![
            "-c:a".into(),
            self.video.audio_codec.clone(),
            "-b:a".into(),
            format!("{}k", self.video.audio_bitrate_kbps),
        ]
    }

    /// Arguments rendering one segment: the still image looped for exactly
    /// `frame_count` frames over its slice of narration, padded with
    /// silence if the slice is short.
    pub fn segment_args(&self, job: &RenderJob) -> Vec<String> {
        let fps = self.video.fps.ffmpeg_arg();
        let duration = self.video.fps.frames_to_secs(job.frames.frame_count);

        let mut args: Vec<String> = vec![
            "-y".into(),
            "-loop".into(),
            "1".into(),
            "-framerate".into(),
            fps.clone(),
            "-i".into(),
            path_arg(&job.image),
            "-ss".into(),
            secs_arg(job.audio.offset_secs),
            "-t".into(),
            secs_arg(job.audio.duration_secs),
            "-i".into(),
            path_arg(&job.audio.source),
        ];

        match &job.overlay {
            Some(overlay) => {
                let (x, y) = avatar_position(&self.avatar, &self.video);
                args.extend([
                    "-ss".into(),
                    secs_arg(overlay.offset_secs),
                    "-i".into(),
                    path_arg(&overlay.source),
                    "-filter_complex".into(),
                    format!(
                        "[0:v]{}[bg];[2:v]{}[av];[bg][av]overlay={x}:{y}:eof_action=pass[v]",
                        self.cover_filter(),
                        avatar_filter(&self.avatar, &self.video)
                    ),
                    "-map".into(),
                    "[v]".into(),
                    "-map".into(),
                    "1:a".into(),
                ]);
            }
            None => {
                args.extend(["-vf".into(), self.cover_filter()]);
            }
        }

        args.extend([
            "-af".into(),
            "apad".into(),
            "-r".into(),
            fps,
            "-frames:v".into(),
            job.frames.frame_count.to_string(),
            "-t".into(),
            secs_arg(duration),
            "-c:v".into(),
            self.video.video_codec.clone(),
            "-tune".into(),
            "stillimage".into(),
            "-preset".into(),
            self.video.preset.clone(),
            "-pix_fmt".into(),
            "yuv420p".into(),
        ]);
        args.extend(self.audio_args());
        args.push(path_arg(&job.output));
        args
    }

    /// Arguments stream-copying the segments listed in `list_file`.
    pub fn concat_args(list_file: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".into(),
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            path_arg(list_file),
            "-c".into(),
            "copy".into(),
            path_arg(output),
        ]
    }

    /// Concatenate rendered segments, in the given order, into `output`.
    pub fn concat_segments(&self, segments: &[RenderResult], output: &Path) -> SlidecastResult<()> {
        if segments.is_empty() {
            return Err(SlidecastError::render(0, "no segments to concatenate"));
        }
        let list_file = output.with_extension("concat.txt");
        let paths: Vec<&Path> = segments.iter().map(|s| s.output.as_path()).collect();
        std::fs::write(&list_file, concat_list(&paths))?;

        tracing::info!(
            segments = segments.len(),
            output = %output.display(),
            "Concatenating segments"
        );
        run_ffmpeg(&Self::concat_args(&list_file, output))
            .map_err(|e| SlidecastError::Other(anyhow::anyhow!("ffmpeg concat failed: {e}")))?;
        std::fs::remove_file(&list_file).ok();
        Ok(())
    }

    /// Arguments for the final composite: optional avatar inset and
    /// optional burned-in subtitles over the concatenated video.
    pub fn composite_args(
        &self,
        video: &Path,
        avatar: Option<&Path>,
        subtitles: Option<&Path>,
        output: &Path,
    ) -> Vec<String> {
        let mut args: Vec<String> = vec!["-y".into(), "-i".into(), path_arg(video)];
        if let Some(avatar) = avatar {
            args.extend(["-i".into(), path_arg(avatar)]);
        }

        let mut graph = Vec::new();
        let mut label = "0:v".to_string();
        if avatar.is_some() {
            let (x, y) = avatar_position(&self.avatar, &self.video);
            graph.push(format!(
                "[1:v]{}[av];[0:v][av]overlay={x}:{y}:shortest=1[composited]",
                avatar_filter(&self.avatar, &self.video)
            ));
            label = "composited".to_string();
        }
        if let Some(subtitles) = subtitles {
            graph.push(format!(
                "[{label}]ass='{}'[out]",
                escape_filter_path(subtitles)
            ));
            label = "out".to_string();
        }

        if graph.is_empty() {
            args.extend(["-c".into(), "copy".into()]);
        } else {
            args.extend([
                "-filter_complex".into(),
                graph.join(";"),
                "-map".into(),
                format!("[{label}]"),
                "-map".into(),
                "0:a".into(),
                "-c:v".into(),
                self.video.video_codec.clone(),
                "-preset".into(),
                self.video.preset.clone(),
                "-pix_fmt".into(),
                "yuv420p".into(),
            ]);
            args.extend(self.audio_args());
        }
        args.push(path_arg(output));
        args
    }

    /// Produce the final video.
    pub fn composite_final(
        &self,
        video: &Path,
        avatar: Option<&Path>,
        subtitles: Option<&Path>,
        output: &Path,
    ) -> SlidecastResult<()> {
        for input in std::iter::once(video).chain(avatar).chain(subtitles) {
            if !input.exists() {
                return Err(SlidecastError::input_missing(input));
            }
        }
        tracing::info!(
            output = %output.display(),
            avatar = avatar.is_some(),
            subtitles = subtitles.is_some(),
            "Compositing final video"
        );
        run_ffmpeg(&self.composite_args(video, avatar, subtitles, output))
            .map_err(|e| SlidecastError::Other(anyhow::anyhow!("ffmpeg composite failed: {e}")))
    }
}

impl SegmentRenderer for FfmpegRenderer {
    fn render(&self, job: &RenderJob) -> SlidecastResult<RenderResult> {
        for input in [&job.image, &job.audio.source] {
            if !input.exists() {
                return Err(SlidecastError::render(
                    job.index,
                    format!("missing input {}", input.display()),
                ));
            }
        }
        if let Some(parent) = job.output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let args = self.segment_args(job);
        tracing::debug!(index = job.index, args = ?args, "Running ffmpeg");
        let start = Instant::now();
        run_ffmpeg(&args).map_err(|e| SlidecastError::render(job.index, e))?;

        Ok(RenderResult {
            index: job.index,
            output: job.output.clone(),
            frame_count: job.frames.frame_count,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

/// Filter cropping, scaling, and optionally circle-masking the avatar.
pub fn avatar_filter(avatar: &AvatarConfig, video: &VideoSettings) -> String {
    let size = avatar_size(avatar, video);
    let mut filter = format!(
        "crop={s}:{s}:{x}:{y},scale={size}:{size}",
        s = avatar.crop_size,
        x = avatar.crop_x,
        y = avatar.crop_y,
    );
    if avatar.circle_mask {
        let center = size as f64 / 2.0;
        filter.push_str(&format!(
            ",format=rgba,geq=r='r(X,Y)':g='g(X,Y)':b='b(X,Y)':\
             a='if(gt(sqrt(pow(X-{center},2)+pow(Y-{center},2)),{center}),0,255)'"
        ));
    }
    filter
}

/// Edge length of the avatar inset in output pixels.
pub fn avatar_size(avatar: &AvatarConfig, video: &VideoSettings) -> u32 {
    ((video.width as f64 * avatar.scale_ratio).round() as u32).max(2)
}

/// Top-left corner of the bottom-right avatar inset.
pub fn avatar_position(avatar: &AvatarConfig, video: &VideoSettings) -> (u32, u32) {
    let size = avatar_size(avatar, video);
    (
        video.width.saturating_sub(size + avatar.margin_x),
        video.height.saturating_sub(size + avatar.margin_y),
    )
}

/// Concat demuxer list for `paths`.
pub fn concat_list(paths: &[&Path]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.display().to_string().replace('\'', "'\\''")))
        .collect()
}

/// Escape a path for use inside a single-quoted filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    path.display()
        .to_string()
        .replace('\\', "/")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Media duration in seconds, via ffprobe.
pub fn probe_duration(path: &Path) -> SlidecastResult<f64> {
    if !path.exists() {
        return Err(SlidecastError::input_missing(path));
    }
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .map_err(|e| SlidecastError::unsupported(format!("Failed to start ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(SlidecastError::Other(anyhow::anyhow!(
            "ffprobe failed on {} (status {}): {}",
            path.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    raw.lines()
        .next()
        .and_then(|line| line.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| {
            SlidecastError::Other(anyhow::anyhow!(
                "ffprobe reported no duration for {}",
                path.display()
            ))
        })
}

/// Arguments decoding any audio to mono 16-bit PCM WAV at `sample_rate`.
pub fn decode_args(input: &Path, output: &Path, sample_rate: u32) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        path_arg(input),
        "-vn".into(),
        "-ac".into(),
        "1".into(),
        "-ar".into(),
        sample_rate.to_string(),
        "-c:a".into(),
        "pcm_s16le".into(),
        path_arg(output),
    ]
}

/// Decode `input` to a mono WAV for offset location.
pub fn decode_to_wav(input: &Path, output: &Path, sample_rate: u32) -> SlidecastResult<PathBuf> {
    if !input.exists() {
        return Err(SlidecastError::input_missing(input));
    }
    run_ffmpeg(&decode_args(input, output, sample_rate))
        .map_err(|e| SlidecastError::Other(anyhow::anyhow!("ffmpeg decode failed: {e}")))?;
    Ok(output.to_path_buf())
}

/// Run ffmpeg to completion. The error is a message carrying the exit
/// status and stderr.
fn run_ffmpeg(args: &[String]) -> Result<(), String> {
    let mut child = Command::new("ffmpeg")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("Failed to start ffmpeg: {e}"))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| "Failed to capture ffmpeg stderr".to_string())?;

    // Drain stderr on its own thread so a full pipe cannot stall ffmpeg.
    let stderr_task = std::thread::spawn(move || -> String {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    });

    let status = child
        .wait()
        .map_err(|e| format!("Failed to wait on ffmpeg: {e}"))?;
    let stderr_output = stderr_task
        .join()
        .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

    if !status.success() {
        return Err(format!(
            "ffmpeg failed (status {}): {}",
            status,
            last_lines(stderr_output.trim(), 20)
        ));
    }
    Ok(())
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(n)..].join("\n")
}

fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn secs_arg(secs: f64) -> String {
    format!("{:.6}", secs.max(0.0))
}
