//! Audio offset locator.
//!
//! Finds where a narration clip sits inside the full composite track by
//! normalized cross-correlation in the frequency domain. The search is
//! limited to a window around the nominal offset (the summed durations of
//! the preceding clips); below the confidence threshold the nominal offset
//! is used instead.

use std::path::PathBuf;

use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use slidecast_common::config::LocatorConfig;
use slidecast_common::error::{Degradation, SlidecastError, SlidecastResult};
use slidecast_project_model::segment::AudioSegmentSpec;

use crate::wav::PcmAudio;

/// Energy per sample below which a track window counts as silent.
const SILENCE_ENERGY_PER_SAMPLE: f64 = 1e-10;

/// Result of locating one clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetEstimate {
    /// Offset to use, in seconds.
    pub offset_secs: f64,

    /// Normalized correlation at the peak, in `[0.0, 1.0]`.
    pub confidence: f64,

    /// False if `offset_secs` is the nominal fallback.
    pub located: bool,
}

/// A narration clip to locate.
#[derive(Debug, Clone)]
pub struct ClipInput {
    pub path: PathBuf,
    pub audio: PcmAudio,
}

/// Offset locator.
#[derive(Debug, Clone, Copy)]
pub struct OffsetLocator {
    half_window_secs: Option<f64>,
    min_confidence: f64,
}

impl OffsetLocator {
    pub fn new(half_window_secs: Option<f64>, min_confidence: f64) -> Self {
        Self {
            half_window_secs,
            min_confidence,
        }
    }

    pub fn from_config(config: &LocatorConfig) -> Self {
        Self::new(config.search_half_window_secs, config.min_confidence)
    }

    /// Locate `clip` in `track`, searching around `nominal_secs`.
    pub fn locate(
        &self,
        track: &PcmAudio,
        clip: &PcmAudio,
        nominal_secs: f64,
    ) -> SlidecastResult<OffsetEstimate> {
        if track.sample_rate != clip.sample_rate {
            return Err(SlidecastError::locator(format!(
                "sample rate mismatch: track {} Hz, clip {} Hz",
                track.sample_rate, clip.sample_rate
            )));
        }

        let fallback = OffsetEstimate {
            offset_secs: nominal_secs.max(0.0),
            confidence: 0.0,
            located: false,
        };

        let clock = track.clock();
        let nominal = clock.secs_to_samples(nominal_secs);
        let (win_start, win_end) = match self.half_window_secs {
            Some(half) => {
                let half = clock.secs_to_samples(half);
                let start = nominal.saturating_sub(half).min(track.len());
                let end = nominal
                    .saturating_add(half)
                    .saturating_add(clip.len())
                    .min(track.len());
                (start, end)
            }
            None => (0, track.len()),
        };

        if clip.is_empty() || win_end <= win_start || clip.len() > win_end - win_start {
            return Ok(fallback);
        }

        let (lag, confidence) = normalized_peak(&track.samples[win_start..win_end], &clip.samples)?;
        if confidence < self.min_confidence {
            return Ok(OffsetEstimate {
                confidence,
                ..fallback
            });
        }

        Ok(OffsetEstimate {
            offset_secs: clock.samples_to_secs(win_start + lag),
            confidence,
            located: true,
        })
    }

    /// Locate every clip in order. Each nominal offset is the summed
    /// duration of the clips before it.
    pub fn locate_segments(
        &self,
        track: &PcmAudio,
        clips: &[ClipInput],
    ) -> SlidecastResult<(Vec<AudioSegmentSpec>, Vec<Degradation>)> {
        let mut specs = Vec::with_capacity(clips.len());
        let mut degradations = Vec::new();
        let mut nominal = 0.0;

        for (index, clip) in clips.iter().enumerate() {
            let duration = clip.audio.duration_secs();
            let estimate = self.locate(track, &clip.audio, nominal)?;

            if !estimate.located {
                tracing::warn!(
                    index,
                    confidence = estimate.confidence,
                    nominal_secs = nominal,
                    "Offset correlation below threshold; using nominal offset"
                );
                degradations.push(Degradation::OffsetLowConfidence {
                    index,
                    confidence: estimate.confidence,
                    nominal_secs: nominal,
                });
            } else {
                tracing::debug!(
                    index,
                    offset_secs = estimate.offset_secs,
                    drift_ms = (estimate.offset_secs - nominal) * 1000.0,
                    confidence = estimate.confidence,
                    "Located segment offset"
                );
            }

            specs.push(AudioSegmentSpec {
                index,
                clip: clip.path.clone(),
                duration_secs: duration,
                offset_secs: estimate.offset_secs,
                offset_confidence: estimate.confidence,
                offset_located: estimate.located,
            });
            nominal += duration;
        }

        Ok((specs, degradations))
    }
}

impl Default for OffsetLocator {
    fn default() -> Self {
        Self::from_config(&LocatorConfig::default())
    }
}

/// Raw cross-correlation `r[k] = Σ window[t + k] · clip[t]` for every lag
/// where the clip fits inside the window.
pub fn cross_correlate(window: &[f32], clip: &[f32]) -> SlidecastResult<Vec<f64>> {
    if clip.is_empty() || clip.len() > window.len() {
        return Ok(Vec::new());
    }

    let n = (window.len() + clip.len() - 1).next_power_of_two();
    let mut planner = RealFftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut a = forward.make_input_vec();
    for (dst, &src) in a.iter_mut().zip(window) {
        *dst = src as f64;
    }
    let mut b = forward.make_input_vec();
    for (dst, &src) in b.iter_mut().zip(clip) {
        *dst = src as f64;
    }

    let mut spec_a = forward.make_output_vec();
    let mut spec_b = forward.make_output_vec();
    forward
        .process(&mut a, &mut spec_a)
        .map_err(|e| SlidecastError::locator(format!("forward FFT failed: {e}")))?;
    forward
        .process(&mut b, &mut spec_b)
        .map_err(|e| SlidecastError::locator(format!("forward FFT failed: {e}")))?;

    for (x, y) in spec_a.iter_mut().zip(&spec_b) {
        *x *= y.conj();
    }
    // DC and Nyquist bins of a real signal's spectrum are real.
    if let Some(first) = spec_a.first_mut() {
        first.im = 0.0;
    }
    if let Some(last) = spec_a.last_mut() {
        last.im = 0.0;
    }

    let mut out = inverse.make_output_vec();
    inverse
        .process(&mut spec_a, &mut out)
        .map_err(|e| SlidecastError::locator(format!("inverse FFT failed: {e}")))?;

    let scale = 1.0 / n as f64;
    let lags = window.len() - clip.len() + 1;
    Ok(out.into_iter().take(lags).map(|v| v * scale).collect())
}

/// Lag with the highest normalized correlation magnitude, and that value.
pub fn normalized_peak(window: &[f32], clip: &[f32]) -> SlidecastResult<(usize, f64)> {
    let raw = cross_correlate(window, clip)?;
    if raw.is_empty() {
        return Ok((0, 0.0));
    }

    let clip_energy: f64 = clip.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let silence = SILENCE_ENERGY_PER_SAMPLE * clip.len() as f64;
    if clip_energy <= silence {
        return Ok((0, 0.0));
    }

    let mut prefix = Vec::with_capacity(window.len() + 1);
    prefix.push(0.0f64);
    let mut acc = 0.0;
    for &s in window {
        acc += (s as f64) * (s as f64);
        prefix.push(acc);
    }

    let clip_norm = clip_energy.sqrt();
    let mut best = (0usize, 0.0f64);
    for (lag, r) in raw.iter().enumerate() {
        let energy = prefix[lag + clip.len()] - prefix[lag];
        if energy <= silence {
            continue;
        }
        let score = (r.abs() / (clip_norm * energy.sqrt())).min(1.0);
        if score > best.1 {
            best = (lag, score);
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic white-ish noise.
    fn noise(len: usize, seed: u64) -> Vec<f32> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state
                    .wrapping_mul(6364136223846793005)
                    .wrapping_add(1442695040888963407);
                ((state >> 33) as f32 / (1u64 << 31) as f32) - 0.5
            })
            .collect()
    }

    #[test]
    fn test_cross_correlate_matches_direct_sum() {
        let window = noise(50, 1);
        let clip = window[10..20].to_vec();
        let fast = cross_correlate(&window, &clip).unwrap();
        assert_eq!(fast.len(), 41);
        for (k, value) in fast.iter().enumerate() {
            let direct: f64 = clip
                .iter()
                .enumerate()
                .map(|(t, &c)| window[t + k] as f64 * c as f64)
                .sum();
            assert!((value - direct).abs() < 1e-6, "lag {k}");
        }
    }

    #[test]
    fn test_exact_subslice_is_found() {
        let rate = 1_000;
        let track = PcmAudio::new(noise(20_000, 7), rate);
        let clip = PcmAudio::new(track.samples[7_300..9_300].to_vec(), rate);

        let locator = OffsetLocator::new(Some(5.0), 0.5);
        let estimate = locator.locate(&track, &clip, 6.0).unwrap();
        assert!(estimate.located);
        assert!((estimate.offset_secs - 7.3).abs() <= 1.0 / rate as f64);
        assert!(estimate.confidence > 0.99);
    }

    #[test]
    fn test_unrelated_clip_falls_back_to_nominal() {
        let rate = 1_000;
        let track = PcmAudio::new(noise(10_000, 3), rate);
        let clip = PcmAudio::new(noise(2_000, 99), rate);

        let estimate = OffsetLocator::default().locate(&track, &clip, 2.0).unwrap();
        assert!(!estimate.located);
        assert!((estimate.offset_secs - 2.0).abs() < 1e-12);
        assert!(estimate.confidence < 0.5);
    }

    #[test]
    fn test_empty_and_oversize_clips() {
        let track = PcmAudio::new(noise(1_000, 5), 1_000);
        let locator = OffsetLocator::default();

        let empty = PcmAudio::new(Vec::new(), 1_000);
        assert!(!locator.locate(&track, &empty, 0.5).unwrap().located);

        let long = PcmAudio::new(noise(2_000, 5), 1_000);
        let estimate = locator.locate(&track, &long, 0.0).unwrap();
        assert!(!estimate.located);
        assert_eq!(estimate.offset_secs, 0.0);
    }

    #[test]
    fn test_sample_rate_mismatch_is_an_error() {
        let track = PcmAudio::new(noise(1_000, 5), 16_000);
        let clip = PcmAudio::new(noise(100, 5), 8_000);
        assert!(OffsetLocator::default().locate(&track, &clip, 0.0).is_err());
    }

    #[test]
    fn test_silent_window_scores_zero() {
        let window = vec![0.0f32; 100];
        let clip = noise(10, 2);
        assert_eq!(normalized_peak(&window, &clip).unwrap(), (0, 0.0));
    }
}
