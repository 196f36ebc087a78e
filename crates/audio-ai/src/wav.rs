//! Mono PCM loading and saving.
//!
//! The locator works on mono `f32` samples in `[-1.0, 1.0]`. Multi-channel
//! files are downmixed by averaging each frame.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use slidecast_common::clock::SampleClock;
use slidecast_common::error::{SlidecastError, SlidecastResult};

/// Mono PCM buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl PcmAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn clock(&self) -> SampleClock {
        SampleClock::new(self.sample_rate)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.clock().samples_to_secs(self.samples.len())
    }
}

/// Read a WAV file and downmix it to mono.
pub fn read_wav_mono(path: &Path) -> SlidecastResult<PcmAudio> {
    if !path.exists() {
        return Err(SlidecastError::input_missing(path));
    }

    let mut reader = WavReader::open(path)
        .map_err(|e| SlidecastError::locator(format!("cannot open {}: {e}", path.display())))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| SlidecastError::locator(format!("bad samples in {}: {e}", path.display())))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1u64 << spec.bits_per_sample.saturating_sub(1).min(31)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|e| {
                    SlidecastError::locator(format!("bad samples in {}: {e}", path.display()))
                })?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    tracing::debug!(
        path = %path.display(),
        sample_rate = spec.sample_rate,
        channels,
        samples = samples.len(),
        "Loaded WAV"
    );

    Ok(PcmAudio::new(samples, spec.sample_rate))
}

/// Write mono 16-bit PCM.
pub fn write_wav_mono(path: &Path, audio: &PcmAudio) -> SlidecastResult<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)
        .map_err(|e| SlidecastError::locator(format!("cannot create {}: {e}", path.display())))?;
    for &sample in &audio.samples {
        let scaled = (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32);
        writer
            .write_sample(scaled as i16)
            .map_err(|e| SlidecastError::locator(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| SlidecastError::locator(e.to_string()))?;
    Ok(())
}
