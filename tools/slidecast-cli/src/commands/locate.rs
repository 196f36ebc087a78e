//! Locate each narration clip inside the full track.

use std::path::{Path, PathBuf};

use slidecast_audio_ai::{read_wav_mono, ClipInput, OffsetLocator};
use slidecast_common::config::AppConfig;
use slidecast_common::error::Degradation;
use slidecast_project_model::segment::AudioSegmentSpec;
use slidecast_project_model::MaterialFolder;
use slidecast_render_engine::decode_to_wav;

use super::{load_folder, work_dir};

pub fn run(config: &AppConfig, dir: PathBuf, track: Option<PathBuf>) -> anyhow::Result<()> {
    let folder = load_folder(&dir)?;
    let (specs, degradations) = locate_folder(config, &folder, track.as_deref())?;

    println!("{}", serde_json::to_string_pretty(&specs)?);
    for degradation in &degradations {
        eprintln!("degraded: {degradation}");
    }
    Ok(())
}

/// Decode the track and every clip to analysis WAVs and locate the clips.
pub fn locate_folder(
    config: &AppConfig,
    folder: &MaterialFolder,
    track: Option<&Path>,
) -> anyhow::Result<(Vec<AudioSegmentSpec>, Vec<Degradation>)> {
    let track = match track {
        Some(track) => track,
        None => folder
            .require_avatar()
            .map_err(|e| anyhow::anyhow!("No track to search: {e}"))?,
    };
    let work = work_dir(folder)?;
    let rate = config.locator.analysis_sample_rate;

    tracing::info!(track = %track.display(), clips = folder.pairs.len(), "Locating narration clips");
    let track_wav = decode_to_wav(track, &work.join("track.wav"), rate)?;
    let track_audio = read_wav_mono(&track_wav)?;

    let mut clips = Vec::with_capacity(folder.pairs.len());
    for pair in &folder.pairs {
        let wav = decode_to_wav(&pair.audio, &work.join(format!("clip_{}.wav", pair.stem)), rate)?;
        clips.push(ClipInput {
            path: pair.audio.clone(),
            audio: read_wav_mono(&wav)?,
        });
    }

    let locator = OffsetLocator::from_config(&config.locator);
    Ok(locator.locate_segments(&track_audio, &clips)?)
}
