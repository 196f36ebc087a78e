//! Frame-exact segment scheduling.
//!
//! Converts segment durations into whole frame counts whose sum equals the
//! target total exactly. Each duration is rounded on its own and the
//! difference to the target is then redistributed, so rounding error never
//! accumulates across segments.

use slidecast_common::clock::{AvDrift, FrameRate};
use slidecast_common::config::{RemainderPolicy, ScheduleConfig};
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_project_model::segment::{FrameSchedule, FrameSpec};

/// Frame scheduler.
#[derive(Debug, Clone, Copy)]
pub struct FrameScheduler {
    fps: FrameRate,
    policy: RemainderPolicy,
}

impl FrameScheduler {
    pub fn new(fps: FrameRate, policy: RemainderPolicy) -> Self {
        Self { fps, policy }
    }

    pub fn from_config(fps: FrameRate, config: &ScheduleConfig) -> Self {
        Self::new(fps, config.remainder_policy)
    }

    pub fn fps(&self) -> FrameRate {
        self.fps
    }

    /// Schedule `durations` (seconds); the total is the rounded sum of the
    /// durations at the frame rate.
    pub fn schedule(&self, durations: &[f64]) -> SlidecastResult<FrameSchedule> {
        validate_durations(durations)?;
        let total: f64 = durations.iter().sum();
        self.schedule_to_total(durations, self.fps.frames_rounded(total))
    }

    /// Schedule `durations` so the frame counts sum to `total_frames`.
    pub fn schedule_to_total(
        &self,
        durations: &[f64],
        total_frames: u64,
    ) -> SlidecastResult<FrameSchedule> {
        if !self.fps.is_valid() {
            return Err(SlidecastError::schedule(format!(
                "invalid frame rate {}/{}",
                self.fps.num, self.fps.den
            )));
        }
        validate_durations(durations)?;

        let positive: Vec<usize> = (0..durations.len())
            .filter(|&i| durations[i] > 0.0)
            .collect();
        if (total_frames as usize) < positive.len() {
            return Err(SlidecastError::schedule(format!(
                "target of {total_frames} frames cannot give each of {} segments a frame",
                positive.len()
            )));
        }
        if total_frames > 0 && positive.is_empty() {
            return Err(SlidecastError::schedule(format!(
                "target of {total_frames} frames but no segment has a positive duration"
            )));
        }

        let exact: Vec<f64> = durations.iter().map(|&d| self.fps.frames_exact(d)).collect();
        let mut counts: Vec<u64> = durations
            .iter()
            .zip(&exact)
            .map(|(&d, &e)| {
                let rounded = e.round() as u64;
                if d > 0.0 {
                    rounded.max(1)
                } else {
                    0
                }
            })
            .collect();

        let sum: u64 = counts.iter().sum();
        if sum != total_frames {
            tracing::debug!(
                rounded = sum,
                target = total_frames,
                policy = ?self.policy,
                "Redistributing frame remainder"
            );
            match self.policy {
                RemainderPolicy::LargestFraction => {
                    distribute_largest_fraction(&mut counts, &exact, &positive, sum, total_frames)
                }
                RemainderPolicy::LastSegment => {
                    distribute_last_segment(&mut counts, &positive, sum, total_frames)
                }
            }
        }

        let mut start_frame = 0;
        let segments = counts
            .iter()
            .enumerate()
            .map(|(index, &frame_count)| {
                let spec = FrameSpec {
                    index,
                    frame_count,
                    start_frame,
                };
                start_frame += frame_count;
                spec
            })
            .collect();

        Ok(FrameSchedule {
            fps: self.fps,
            total_frames,
            segments,
        })
    }
}

fn validate_durations(durations: &[f64]) -> SlidecastResult<()> {
    for (index, &d) in durations.iter().enumerate() {
        if !d.is_finite() || d < 0.0 {
            return Err(SlidecastError::schedule(format!(
                "segment {index} has invalid duration {d}"
            )));
        }
    }
    Ok(())
}

/// Highest score first, ties to the lower index.
fn ranked(positive: &[usize], score: impl Fn(usize) -> f64) -> Vec<usize> {
    let mut order = positive.to_vec();
    order.sort_by(|&a, &b| score(b).total_cmp(&score(a)).then(a.cmp(&b)));
    order
}

fn distribute_largest_fraction(
    counts: &mut [u64],
    exact: &[f64],
    positive: &[usize],
    sum: u64,
    target: u64,
) {
    if target > sum {
        let extra = target - sum;
        let n = positive.len() as u64;
        // Whole rounds give every segment a frame and leave the order
        // unchanged.
        let rounds = extra / n;
        for &i in positive {
            counts[i] += rounds;
        }
        let order = ranked(positive, |i| exact[i] - counts[i] as f64);
        for &i in order.iter().take((extra % n) as usize) {
            counts[i] += 1;
        }
    } else {
        let mut excess = sum - target;
        while excess > 0 {
            let order = ranked(positive, |i| counts[i] as f64 - exact[i]);
            for i in order {
                if excess == 0 {
                    break;
                }
                if counts[i] > 1 {
                    counts[i] -= 1;
                    excess -= 1;
                }
            }
        }
    }
}

/// Drift at each segment start between the cumulative narration time and
/// the scheduled frame boundary.
pub fn boundary_drift(durations: &[f64], schedule: &FrameSchedule) -> Vec<AvDrift> {
    let mut audio_secs = 0.0;
    let mut drift = Vec::with_capacity(schedule.len());
    for (position, duration) in durations.iter().enumerate().take(schedule.len()) {
        if let Some(video_secs) = schedule.start_secs(position) {
            drift.push(AvDrift {
                audio_secs,
                video_secs,
            });
        }
        audio_secs += duration;
    }
    drift
}

fn distribute_last_segment(counts: &mut [u64], positive: &[usize], sum: u64, target: u64) {
    let Some(&last) = positive.last() else {
        return;
    };
    if target > sum {
        counts[last] += target - sum;
    } else {
        let mut excess = sum - target;
        for &i in positive.iter().rev() {
            let removable = (counts[i] - 1).min(excess);
            counts[i] -= removable;
            excess -= removable;
            if excess == 0 {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scheduler(policy: RemainderPolicy) -> FrameScheduler {
        FrameScheduler::new(FrameRate::FPS_24, policy)
    }

    fn counts(schedule: &FrameSchedule) -> Vec<u64> {
        schedule.segments.iter().map(|s| s.frame_count).collect()
    }

    #[test]
    fn test_rounding_already_exact() {
        let schedule = scheduler(RemainderPolicy::LargestFraction)
            .schedule(&[2.33, 2.34, 2.33])
            .unwrap();
        assert_eq!(schedule.total_frames, 168);
        assert_eq!(counts(&schedule), vec![56, 56, 56]);
        let starts: Vec<u64> = schedule.segments.iter().map(|s| s.start_frame).collect();
        assert_eq!(starts, vec![0, 56, 112]);
    }

    #[test]
    fn test_largest_fraction_adds_to_biggest_loss() {
        // Exact frames: 24.48, 24.48, 24.48 -> rounded 24 each (72), total 73.
        let schedule = scheduler(RemainderPolicy::LargestFraction)
            .schedule(&[1.02, 1.02, 1.02])
            .unwrap();
        assert_eq!(schedule.total_frames, 73);
        assert_eq!(counts(&schedule), vec![25, 24, 24]);
    }

    #[test]
    fn test_largest_fraction_removes_from_biggest_gain() {
        // Exact frames: 12.5 (->13), 12.6 (->13), 0.0; target 25.
        let fps = FrameRate::whole(10);
        let schedule = FrameScheduler::new(fps, RemainderPolicy::LargestFraction)
            .schedule_to_total(&[1.25, 1.26, 0.0], 25)
            .unwrap();
        assert_eq!(counts(&schedule), vec![12, 13, 0]);
    }

    #[test]
    fn test_last_segment_policy() {
        let schedule = scheduler(RemainderPolicy::LastSegment)
            .schedule_to_total(&[1.0, 1.0, 1.0], 75)
            .unwrap();
        assert_eq!(counts(&schedule), vec![24, 24, 27]);

        let schedule = scheduler(RemainderPolicy::LastSegment)
            .schedule_to_total(&[1.0, 1.0, 0.1], 30)
            .unwrap();
        // 24 + 24 + 2 = 50, remove 20: last keeps 1, spill 19 from the middle.
        assert_eq!(counts(&schedule), vec![24, 5, 1]);
    }

    #[test]
    fn test_every_positive_segment_gets_a_frame() {
        let schedule = scheduler(RemainderPolicy::LargestFraction)
            .schedule(&[0.001, 0.001, 5.0])
            .unwrap();
        assert!(schedule.segments.iter().all(|s| s.frame_count >= 1));
        assert_eq!(schedule.frame_sum(), schedule.total_frames);
    }

    #[test]
    fn test_zero_duration_segment_gets_no_frames() {
        let schedule = scheduler(RemainderPolicy::LargestFraction)
            .schedule(&[1.0, 0.0, 1.0])
            .unwrap();
        assert_eq!(counts(&schedule), vec![24, 0, 24]);
    }

    #[test]
    fn test_ntsc_rate_sums_exactly() {
        let scheduler = FrameScheduler::new(FrameRate::NTSC_30, RemainderPolicy::LargestFraction);
        let durations = vec![3.7; 100];
        let schedule = scheduler.schedule(&durations).unwrap();
        assert_eq!(schedule.total_frames, FrameRate::NTSC_30.frames_rounded(370.0));
        assert_eq!(schedule.frame_sum(), schedule.total_frames);
    }

    #[test]
    fn test_errors() {
        let s = scheduler(RemainderPolicy::LargestFraction);
        assert!(s.schedule(&[1.0, -0.5]).is_err());
        assert!(s.schedule(&[f64::NAN]).is_err());
        assert!(s.schedule_to_total(&[1.0, 1.0, 1.0], 2).is_err());
        assert!(s.schedule_to_total(&[0.0, 0.0], 10).is_err());
        assert_eq!(s.schedule(&[]).unwrap().total_frames, 0);
    }

    #[test]
    fn test_boundary_drift() {
        let durations = [1.02, 1.02, 1.02];
        let schedule = scheduler(RemainderPolicy::LargestFraction)
            .schedule(&durations)
            .unwrap();
        let drift = boundary_drift(&durations, &schedule);
        assert_eq!(drift.len(), 3);
        assert!(drift[0].drift_ms().abs() < 1e-9);
        // Segment 0 got 25 frames for 1.02 s of audio.
        assert!((drift[1].drift_ms() - (25.0 / 24.0 - 1.02) * 1000.0).abs() < 1e-6);
        let frame_ms = 1000.0 / 24.0;
        assert!(drift.iter().all(|d| !d.exceeds_threshold_ms(frame_ms)));
    }

    proptest! {
        #[test]
        fn prop_sum_is_exact(
            durations in proptest::collection::vec(0.001f64..30.0, 1..40),
            slack in 0u64..500,
            policy_last in any::<bool>(),
            ntsc in any::<bool>(),
        ) {
            let fps = if ntsc { FrameRate::NTSC_30 } else { FrameRate::FPS_25 };
            let policy = if policy_last { RemainderPolicy::LastSegment } else { RemainderPolicy::LargestFraction };
            let scheduler = FrameScheduler::new(fps, policy);
            let target = durations.len() as u64 + slack;

            let schedule = scheduler.schedule_to_total(&durations, target).unwrap();
            prop_assert_eq!(schedule.frame_sum(), target);
            prop_assert!(schedule.segments.iter().all(|s| s.frame_count >= 1));
            for w in schedule.segments.windows(2) {
                prop_assert_eq!(w[1].start_frame, w[0].end_frame());
            }

            let natural = scheduler.schedule(&durations).unwrap();
            prop_assert_eq!(natural.frame_sum(), natural.total_frames);
        }
    }
}
