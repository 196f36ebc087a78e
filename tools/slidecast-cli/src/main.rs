//! Slidecast CLI: caption and assemble narrated slide videos.
//!
//! Usage:
//!   slidecast captions <DIR>    Time caption lines against the narration
//!   slidecast locate <DIR>      Locate each narration clip in the full track
//!   slidecast schedule <SECS>…  Frame-exact schedule for segment durations
//!   slidecast assemble <DIR>    Render, concatenate, and composite the video
//!   slidecast validate <DIR>    Check a material folder
//!   slidecast check             Check for ffmpeg/ffprobe and configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use slidecast_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "slidecast",
    about = "Narrated slide videos with frame-exact assembly and aligned captions",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/slidecast/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Time caption lines against the narration and write subtitles
    Captions {
        /// Material folder
        dir: PathBuf,

        /// Recorded ASR output (token array or Whisper word timestamps)
        #[arg(short, long, required_unless_present = "print_prompt")]
        transcript: Option<PathBuf>,

        /// Recorded segmentation response; the local segmenter is used if omitted
        #[arg(short, long)]
        lines: Option<PathBuf>,

        /// Output subtitle file (.srt, .vtt, or .ass)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write debug artifacts next to the material
        #[arg(long)]
        debug: bool,

        /// Time unmatched lines proportionally instead of failing
        #[arg(long)]
        fallback: bool,

        /// Print the request for a segmentation service and exit
        #[arg(long)]
        print_prompt: bool,
    },

    /// Locate each narration clip inside the full track
    Locate {
        /// Material folder
        dir: PathBuf,

        /// Full narration track (defaults to the avatar clip)
        #[arg(long)]
        track: Option<PathBuf>,
    },

    /// Compute a frame-exact schedule for segment durations
    Schedule {
        /// Segment durations in seconds
        #[arg(required = true)]
        durations: Vec<f64>,

        /// Frame rate (`24` or `30000/1001`)
        #[arg(long)]
        fps: Option<String>,

        /// Target total frame count (defaults to the rounded sum)
        #[arg(long)]
        total: Option<u64>,

        /// Put all remainder frames on the last segment
        #[arg(long)]
        last_segment: bool,
    },

    /// Render every slide segment and assemble the final video
    Assemble {
        /// Material folder
        dir: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum concurrent segment renders
        #[arg(long)]
        concurrency: Option<usize>,

        /// Skip the talking-head inset
        #[arg(long)]
        no_avatar: bool,

        /// Do not burn in subtitles
        #[arg(long)]
        no_subtitles: bool,

        /// Keep intermediate segment files
        #[arg(long)]
        keep_segments: bool,
    },

    /// Validate a material folder
    Validate {
        /// Material folder
        dir: PathBuf,
    },

    /// Check external tools and configuration
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    slidecast_common::logging::init_logging(&config.logging);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    match cli.command {
        Commands::Captions {
            dir,
            transcript,
            lines,
            output,
            debug,
            fallback,
            print_prompt,
        } => {
            if print_prompt {
                commands::captions::print_prompt(&config, dir)
            } else {
                commands::captions::run(&config, dir, transcript, lines, output, debug, fallback)
            }
        }
        Commands::Locate { dir, track } => commands::locate::run(&config, dir, track),
        Commands::Schedule {
            durations,
            fps,
            total,
            last_segment,
        } => commands::schedule::run(&config, durations, fps, total, last_segment),
        Commands::Assemble {
            dir,
            output,
            concurrency,
            no_avatar,
            no_subtitles,
            keep_segments,
        } => {
            commands::assemble::run(
                &config,
                dir,
                output,
                concurrency,
                !no_avatar,
                !no_subtitles,
                keep_segments,
            )
            .await
        }
        Commands::Validate { dir } => commands::validate::run(dir),
        Commands::Check => commands::check::run(&config),
    }
}
