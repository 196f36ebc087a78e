//! Bounded-parallel segment rendering.
//!
//! Every job is spawned up front; a semaphore admits at most `concurrency`
//! of them into a blocking renderer call at a time. Under
//! [`FailurePolicy::AbortBatch`] the first failure raises a shared flag and
//! jobs that have not started yet are skipped. Running jobs always finish:
//! the renderer cannot be preempted.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use slidecast_common::config::{FailurePolicy, RenderConfig};
use slidecast_common::error::{SegmentFailure, SlidecastError, SlidecastResult};
use slidecast_project_model::segment::{RenderJob, RenderResult};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Renders one segment. Implementations block.
pub trait SegmentRenderer: Send + Sync {
    fn render(&self, job: &RenderJob) -> SlidecastResult<RenderResult>;

    /// Renderer name.
    fn name(&self) -> &str;
}

/// Batch progress, reported after every finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Jobs that finished, successfully or not.
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
}

/// Progress callback for a render batch.
pub type ProgressCallback = Box<dyn Fn(BatchProgress) + Send + Sync>;

enum JobOutcome {
    Rendered(RenderResult),
    Failed(SegmentFailure),
    Skipped(usize),
}

/// Render coordinator.
#[derive(Debug, Clone, Copy)]
pub struct RenderCoordinator {
    concurrency: usize,
    failure_policy: FailurePolicy,
}

impl RenderCoordinator {
    pub fn new(concurrency: usize, failure_policy: FailurePolicy) -> Self {
        Self {
            concurrency: concurrency.max(1),
            failure_policy,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.concurrency, config.failure_policy)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Render every job and return the results in index order.
    ///
    /// Any failure yields a single [`SlidecastError::BatchFailed`] listing
    /// every failed index and every index that was never started.
    pub async fn run(
        &self,
        jobs: Vec<RenderJob>,
        renderer: Arc<dyn SegmentRenderer>,
        progress: Option<ProgressCallback>,
    ) -> SlidecastResult<Vec<RenderResult>> {
        validate_jobs(&jobs)?;

        let total = jobs.len();
        tracing::info!(
            segments = total,
            concurrency = self.concurrency,
            policy = ?self.failure_policy,
            renderer = renderer.name(),
            "Starting render batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let abort = Arc::new(AtomicBool::new(false));
        let abort_on_failure = self.failure_policy == FailurePolicy::AbortBatch;
        let started = Instant::now();

        let mut tasks = JoinSet::new();
        for job in jobs {
            let semaphore = semaphore.clone();
            let abort = abort.clone();
            let renderer = renderer.clone();
            tasks.spawn(async move {
                let index = job.index;
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return JobOutcome::Skipped(index);
                };
                if abort.load(Ordering::SeqCst) {
                    return JobOutcome::Skipped(index);
                }

                let rendered = tokio::task::spawn_blocking(move || renderer.render(&job)).await;
                let outcome = match rendered {
                    Ok(Ok(result)) => JobOutcome::Rendered(result),
                    Ok(Err(e)) => JobOutcome::Failed(SegmentFailure {
                        index,
                        message: e.to_string(),
                    }),
                    Err(e) => JobOutcome::Failed(SegmentFailure {
                        index,
                        message: if e.is_panic() {
                            "renderer panicked".to_string()
                        } else {
                            format!("render task cancelled: {e}")
                        },
                    }),
                };
                if abort_on_failure && matches!(outcome, JobOutcome::Failed(_)) {
                    abort.store(true, Ordering::SeqCst);
                }
                outcome
            });
        }

        let mut results = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut skipped = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| {
                SlidecastError::Other(anyhow::anyhow!("render task join failed: {e}"))
            })?;
            match outcome {
                JobOutcome::Rendered(result) => {
                    tracing::debug!(
                        index = result.index,
                        frames = result.frame_count,
                        elapsed_ms = result.elapsed_ms,
                        "Segment rendered"
                    );
                    results.push(result);
                }
                JobOutcome::Failed(failure) => {
                    tracing::warn!(index = failure.index, error = %failure.message, "Segment render failed");
                    failures.push(failure);
                }
                JobOutcome::Skipped(index) => {
                    skipped.push(index);
                    continue;
                }
            }
            if let Some(cb) = &progress {
                cb(BatchProgress {
                    completed: results.len() + failures.len(),
                    total,
                    failed: failures.len(),
                });
            }
        }

        if !failures.is_empty() {
            failures.sort_by_key(|f| f.index);
            skipped.sort_unstable();
            tracing::error!(
                failed = failures.len(),
                skipped = skipped.len(),
                "Render batch failed"
            );
            return Err(SlidecastError::BatchFailed { failures, skipped });
        }

        results.sort_by_key(|r| r.index);
        tracing::info!(
            segments = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Render batch complete"
        );
        Ok(results)
    }
}

impl Default for RenderCoordinator {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

fn validate_jobs(jobs: &[RenderJob]) -> SlidecastResult<()> {
    let mut seen = HashSet::with_capacity(jobs.len());
    for job in jobs {
        if !seen.insert(job.index) {
            return Err(SlidecastError::render(job.index, "duplicate segment index"));
        }
        if job.frames.index != job.index {
            return Err(SlidecastError::render(
                job.index,
                format!("frame spec belongs to segment {}", job.frames.index),
            ));
        }
        if job.frames.frame_count == 0 {
            return Err(SlidecastError::render(job.index, "frame count is zero"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    use slidecast_project_model::segment::{AudioSpan, FrameSpec};

    fn job(index: usize) -> RenderJob {
        RenderJob {
            index,
            image: PathBuf::from(format!("{index:02}.png")),
            audio: AudioSpan {
                source: PathBuf::from("full.wav"),
                offset_secs: index as f64,
                duration_secs: 1.0,
            },
            frames: FrameSpec {
                index,
                frame_count: 24,
                start_frame: index as u64 * 24,
            },
            overlay: None,
            output: PathBuf::from(format!("seg_{index:03}.mp4")),
        }
    }

    /// Sleeps longer for lower indices so completion order is reversed.
    struct FakeRenderer {
        fail: Vec<usize>,
        panic_on: Option<usize>,
        active: AtomicUsize,
        peak: AtomicUsize,
        rendered: Mutex<Vec<usize>>,
    }

    impl FakeRenderer {
        fn new(fail: Vec<usize>) -> Self {
            Self {
                fail,
                panic_on: None,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                rendered: Mutex::new(Vec::new()),
            }
        }
    }

    impl SegmentRenderer for FakeRenderer {
        fn render(&self, job: &RenderJob) -> SlidecastResult<RenderResult> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5 + (10 - job.index.min(10) as u64) * 3));
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.rendered.lock().unwrap().push(job.index);

            if self.panic_on == Some(job.index) {
                panic!("boom");
            }
            if self.fail.contains(&job.index) {
                return Err(SlidecastError::render(job.index, "ffmpeg exited 1"));
            }
            Ok(RenderResult {
                index: job.index,
                output: job.output.clone(),
                frame_count: job.frames.frame_count,
                elapsed_ms: 1,
            })
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn test_results_in_index_order() {
        let renderer = Arc::new(FakeRenderer::new(Vec::new()));
        let coordinator = RenderCoordinator::new(3, FailurePolicy::AbortBatch);
        let results = coordinator
            .run((0..10).map(job).collect(), renderer.clone(), None)
            .await
            .unwrap();

        let indices: Vec<usize> = results.iter().map(|r| r.index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
        assert!(renderer.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_single_failure_aborts_batch() {
        let renderer = Arc::new(FakeRenderer::new(vec![0]));
        let coordinator = RenderCoordinator::new(1, FailurePolicy::AbortBatch);
        let err = coordinator
            .run((0..5).map(job).collect(), renderer.clone(), None)
            .await
            .unwrap_err();

        match err {
            SlidecastError::BatchFailed { failures, skipped } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 0);
                assert_eq!(skipped, vec![1, 2, 3, 4]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(*renderer.rendered.lock().unwrap(), vec![0]);
    }

    #[tokio::test]
    async fn test_run_all_reports_every_failure() {
        let renderer = Arc::new(FakeRenderer::new(vec![1, 3]));
        let coordinator = RenderCoordinator::new(2, FailurePolicy::RunAll);
        let err = coordinator
            .run((0..5).map(job).collect(), renderer.clone(), None)
            .await
            .unwrap_err();

        match err {
            SlidecastError::BatchFailed { failures, skipped } => {
                let failed: Vec<usize> = failures.iter().map(|f| f.index).collect();
                assert_eq!(failed, vec![1, 3]);
                assert!(skipped.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(renderer.rendered.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_panic_is_a_failure_of_that_index() {
        let mut fake = FakeRenderer::new(Vec::new());
        fake.panic_on = Some(2);
        let err = RenderCoordinator::new(4, FailurePolicy::RunAll)
            .run((0..4).map(job).collect(), Arc::new(fake), None)
            .await
            .unwrap_err();

        match err {
            SlidecastError::BatchFailed { failures, .. } => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].index, 2);
                assert!(failures[0].message.contains("panicked"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_progress_reports_each_result() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p));

        RenderCoordinator::new(2, FailurePolicy::AbortBatch)
            .run(
                (0..4).map(job).collect(),
                Arc::new(FakeRenderer::new(Vec::new())),
                Some(progress),
            )
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(
            seen.last().copied(),
            Some(BatchProgress {
                completed: 4,
                total: 4,
                failed: 0
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_jobs_rejected_before_dispatch() {
        let renderer = Arc::new(FakeRenderer::new(Vec::new()));
        let coordinator = RenderCoordinator::default();

        let duplicate = vec![job(0), job(0)];
        assert!(coordinator.run(duplicate, renderer.clone(), None).await.is_err());

        let mut mismatched = job(1);
        mismatched.frames.index = 2;
        assert!(coordinator.run(vec![mismatched], renderer.clone(), None).await.is_err());

        let mut empty = job(0);
        empty.frames.frame_count = 0;
        assert!(coordinator.run(vec![empty], renderer.clone(), None).await.is_err());

        assert!(renderer.rendered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let results = RenderCoordinator::default()
            .run(Vec::new(), Arc::new(FakeRenderer::new(Vec::new())), None)
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
