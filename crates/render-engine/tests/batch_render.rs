use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use slidecast_common::config::{FailurePolicy, RemainderPolicy};
use slidecast_common::error::{SlidecastError, SlidecastResult};
use slidecast_common::FrameRate;
use slidecast_project_model::segment::{AudioSegmentSpec, FrameSchedule, FrameSpec, RenderJob, RenderResult};
use slidecast_render_engine::{build_jobs, concat_list, RenderCoordinator, SegmentRenderer};

/// Writes a small marker file per segment; later segments finish first.
struct MarkerRenderer {
    fail_on: Option<usize>,
}

impl SegmentRenderer for MarkerRenderer {
    fn render(&self, job: &RenderJob) -> SlidecastResult<RenderResult> {
        std::thread::sleep(Duration::from_millis(40u64.saturating_sub(job.index as u64 * 5)));
        if self.fail_on == Some(job.index) {
            return Err(SlidecastError::render(job.index, "encoder crashed"));
        }
        std::fs::write(&job.output, format!("{} frames", job.frames.frame_count))?;
        Ok(RenderResult {
            index: job.index,
            output: job.output.clone(),
            frame_count: job.frames.frame_count,
            elapsed_ms: 0,
        })
    }

    fn name(&self) -> &str {
        "marker"
    }
}

fn schedule(counts: &[u64]) -> FrameSchedule {
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
    FrameSchedule {
        fps: FrameRate::FPS_24,
        total_frames: start_frame,
        segments,
    }
}

fn jobs(out_dir: &Path, n: usize) -> Vec<RenderJob> {
    let images: Vec<PathBuf> = (1..=n).map(|i| PathBuf::from(format!("{i:02}.png"))).collect();
    let segments: Vec<AudioSegmentSpec> = (0..n)
        .map(|i| AudioSegmentSpec::nominal(i, format!("{:02}.mp3", i + 1), 1.0, i as f64))
        .collect();
    let counts: Vec<u64> = (0..n as u64).map(|i| 20 + i).collect();
    build_jobs(&images, &segments, &schedule(&counts), None, None, out_dir).unwrap()
}

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("slidecast_render_{name}_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[tokio::test]
async fn test_batch_renders_in_index_order() {
    let dir = temp_dir("ok");
    let results = RenderCoordinator::new(4, FailurePolicy::AbortBatch)
        .run(jobs(&dir, 8), Arc::new(MarkerRenderer { fail_on: None }), None)
        .await
        .unwrap();

    let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
    assert_eq!(indices, (0..8).collect::<Vec<_>>());
    let total: u64 = results.iter().map(|r| r.frame_count).sum();
    assert_eq!(total, schedule(&(0..8u64).map(|i| 20 + i).collect::<Vec<u64>>()).total_frames);

    let paths: Vec<&Path> = results.iter().map(|r| r.output.as_path()).collect();
    let list = concat_list(&paths);
    let first = list.lines().next().unwrap();
    assert!(first.ends_with("seg_000.mp4'"));
    assert!(results.iter().all(|r| r.output.exists()));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_failure_never_yields_partial_list() {
    let dir = temp_dir("fail");
    let err = RenderCoordinator::new(2, FailurePolicy::AbortBatch)
        .run(jobs(&dir, 6), Arc::new(MarkerRenderer { fail_on: Some(1) }), None)
        .await
        .unwrap_err();

    match err {
        SlidecastError::BatchFailed { failures, skipped } => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].index, 1);
            assert!(failures[0].message.contains("encoder crashed"));
            assert!(!skipped.contains(&1));
        }
        other => panic!("unexpected error: {other}"),
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_empty_clip_does_not_fail_the_batch() {
    let dir = temp_dir("empty_clip");
    let images: Vec<PathBuf> = (1..=3).map(|i| PathBuf::from(format!("{i:02}.png"))).collect();
    let segments = vec![
        AudioSegmentSpec::nominal(0, "01.mp3", 1.0, 0.0),
        AudioSegmentSpec::nominal(1, "02.mp3", 0.0, 1.0),
        AudioSegmentSpec::nominal(2, "03.mp3", 1.0, 1.0),
    ];
    let schedule = schedule(&[24, 0, 24]);
    let jobs = build_jobs(&images, &segments, &schedule, None, None, &dir).unwrap();

    let results = RenderCoordinator::default()
        .run(jobs, Arc::new(MarkerRenderer { fail_on: None }), None)
        .await
        .unwrap();
    let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 2]);
    let total: u64 = results.iter().map(|r| r.frame_count).sum();
    assert_eq!(total, schedule.total_frames);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_default_policies() {
    assert_eq!(FailurePolicy::default(), FailurePolicy::AbortBatch);
    assert_eq!(RemainderPolicy::default(), RemainderPolicy::LargestFraction);
}
