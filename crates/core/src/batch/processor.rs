//! Per-file pipeline and the bounded worker pool that runs it.

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::{BatchError, JobError};
use super::types::{BatchSummary, EncodeJob, JobResult};
use crate::config::Config;
use crate::encoder::{CapabilitySnapshot, EncodeCommandBuilder, SpotlightInputs};
use crate::geometry::{plan_geometry, TARGET_RATIO};
use crate::media::{FfmpegTool, MediaError, MediaProber, Transcoder};
use crate::overlay::OverlayAssets;
use crate::runner::{format_duration, ProgressDisplay, ProgressRunner, Shutdown};
use crate::sizing::SizeLimiter;

/// Normalizes videos into the spotlight format.
///
/// Cloning is cheap and every clone shares the same shutdown signal.
#[derive(Clone)]
pub struct SpotlightProcessor {
    config: Arc<Config>,
    prober: Arc<dyn MediaProber>,
    transcoder: Arc<dyn Transcoder>,
    display: ProgressDisplay,
    shutdown_tx: broadcast::Sender<()>,
    cancelled: Arc<AtomicBool>,
}

impl SpotlightProcessor {
    pub fn new(
        config: Config,
        prober: Arc<dyn MediaProber>,
        transcoder: Arc<dyn Transcoder>,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config: Arc::new(config),
            prober,
            transcoder,
            display: ProgressDisplay::hidden(),
            shutdown_tx,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Creates a processor backed by the ffmpeg/ffprobe binaries from `config`.
    pub fn with_ffmpeg(config: Config) -> Self {
        let tool = Arc::new(FfmpegTool::new(config.tools.clone()));
        Self::new(config, tool.clone(), tool)
    }

    pub fn with_display(mut self, display: ProgressDisplay) -> Self {
        self.display = display;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stops the batch: no new jobs start and running transcoders are killed.
    pub fn shutdown(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!("Shutdown requested");
        }
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Listener that also reports a shutdown requested before subscribing.
    fn subscribe(&self) -> Shutdown {
        let mut shutdown = Shutdown::new(self.shutdown_tx.subscribe());
        if self.is_cancelled() {
            shutdown.mark_shutdown();
        }
        shutdown
    }

    fn runner(&self) -> ProgressRunner {
        ProgressRunner::new(Arc::clone(&self.transcoder), self.config.runner.clone())
            .with_display(self.display.clone())
    }

    /// Probes the host once for hardware encoders.
    pub async fn detect_capabilities(&self) -> CapabilitySnapshot {
        CapabilitySnapshot::detect(self.transcoder.as_ref(), &self.config.hardware).await
    }

    /// Builds the job for `source` writing into `output_folder`.
    pub fn job_for(
        &self,
        source: &Path,
        output_folder: &Path,
        capabilities: Arc<CapabilitySnapshot>,
        max_output_size_mb: f64,
    ) -> EncodeJob {
        let settings = self.config.encode.clone();
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string());
        EncodeJob {
            source_path: source.to_path_buf(),
            output_path: output_folder.join(format!("{}.{}", stem, settings.format.extension())),
            settings,
            capabilities,
            max_output_size_mb,
        }
    }

    /// Runs the full pipeline for one file.
    ///
    /// Every failure except cancellation is reported as a failed
    /// [`JobResult`].
    pub async fn process_one_video(&self, job: &EncodeJob) -> Result<JobResult, JobError> {
        let mut shutdown = self.subscribe();
        self.process_with(job, &mut shutdown).await
    }

    async fn process_with(
        &self,
        job: &EncodeJob,
        shutdown: &mut Shutdown,
    ) -> Result<JobResult, JobError> {
        let filename = job.filename();
        let started = Instant::now();

        match self.encode(job, shutdown).await {
            Ok(final_size_mb) => Ok(JobResult::success(
                filename,
                started.elapsed().as_secs_f64(),
                final_size_mb,
            )),
            Err(JobError::Cancelled) => {
                remove_partial(&job.output_path).await;
                Err(JobError::Cancelled)
            }
            Err(err) => {
                let elapsed = started.elapsed().as_secs_f64();
                error!(file = %filename, error = %err, "Error processing video");
                let diagnostics = err.diagnostics();
                for line in &diagnostics {
                    debug!(file = %filename, "{}", line);
                }
                let result =
                    JobResult::failure(filename, elapsed, err.to_string(), diagnostics);
                match err {
                    JobError::SizeConstraintUnmet { final_size_mb, .. } => {
                        Ok(result.with_final_size(final_size_mb))
                    }
                    _ => {
                        remove_partial(&job.output_path).await;
                        Ok(result)
                    }
                }
            }
        }
    }

    /// Probe, plan, render overlays, encode, then enforce the size budget.
    async fn encode(&self, job: &EncodeJob, shutdown: &mut Shutdown) -> Result<f64, JobError> {
        if self.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let filename = job.filename();
        let started = Instant::now();

        let info = self.prober.probe(&job.source_path).await?;
        if info.width == 0 || info.height == 0 {
            return Err(MediaError::probe_failed(format!(
                "no video dimensions in {}",
                job.source_path.display()
            ))
            .into());
        }

        let plan = plan_geometry(info.width, info.height);
        let ratio = info.width as f64 / info.height as f64;
        if plan.is_uncropped(info.width, info.height) {
            info!(file = %filename, "Video already has 3:4 aspect ratio");
        } else if ratio > TARGET_RATIO {
            info!(file = %filename, crop_width = plan.crop_width, "Cropping width to 3:4 aspect ratio");
        } else {
            info!(file = %filename, crop_height = plan.crop_height, "Cropping height to 3:4 aspect ratio");
        }

        let temp_root = &self.config.batch.temp_dir;
        let stem = job
            .source_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "video".to_string());
        let assets = OverlayAssets::spawn_render(
            plan,
            temp_root.clone(),
            stem,
            self.config.overlay.border_rgba,
        )
        .await?;

        let builder = EncodeCommandBuilder::new(&job.settings, &job.capabilities);
        let command = builder.spotlight(
            &plan,
            SpotlightInputs {
                source: &job.source_path,
                mask: assets.mask_path(),
                border: assets.border_path(),
            },
            &job.output_path,
            info.duration_secs,
        );

        info!(
            file = %filename,
            "Input: {}x{} → Output: {}x{} (3:4 with borders), duration {}",
            info.width,
            info.height,
            plan.canvas_width,
            plan.canvas_height,
            if info.has_duration() {
                format_duration(info.duration_secs)
            } else {
                "unknown".to_string()
            }
        );

        let runner = self.runner();
        runner
            .run(&filename, &command.args, info.duration_secs, shutdown)
            .await?;
        drop(assets);

        let processing_secs = started.elapsed().as_secs_f64();
        info!(
            file = %filename,
            encoder = %command.encoder,
            "Processed in {}",
            format_duration(processing_secs)
        );
        if info.has_duration() && processing_secs > 0.0 {
            info!(
                file = %filename,
                "Average speed: {:.1}x realtime",
                info.duration_secs / processing_secs
            );
        }

        let limiter = SizeLimiter::new(&runner, &self.config.sizing, temp_root);
        let report = limiter
            .enforce(
                &job.output_path,
                &builder,
                info.duration_secs,
                job.max_output_size_mb,
                shutdown,
            )
            .await?;
        if report.reencoded() {
            info!(
                file = %filename,
                attempts = report.attempts,
                "Size {:.2} MB → {:.2} MB",
                report.initial_size_mb,
                report.final_size_mb
            );
        }

        Ok(report.final_size_mb)
    }

    /// Processes `files` into `output_folder` with up to `workers` jobs at once.
    ///
    /// Capabilities are detected once and shared by all jobs. Jobs start in
    /// the given order; completion order is not defined. A shutdown stops
    /// new jobs, cancels running ones, and returns the finished results in
    /// [`BatchError::Cancelled`].
    pub async fn process_batch(
        &self,
        files: Vec<PathBuf>,
        output_folder: &Path,
        workers: Option<usize>,
        max_output_size_mb: f64,
    ) -> Result<BatchSummary, BatchError> {
        let started_at = Utc::now();
        let started = Instant::now();
        let mut shutdown = self.subscribe();

        tokio::fs::create_dir_all(output_folder)
            .await
            .map_err(|source| BatchError::OutputDirectory {
                path: output_folder.to_path_buf(),
                source,
            })?;

        let capabilities = Arc::new(self.detect_capabilities().await);
        let workers = workers.unwrap_or_else(|| self.config.batch.worker_count()).max(1);
        info!(
            videos = files.len(),
            workers,
            max_output_size_mb,
            "Processing {} videos with {} workers",
            files.len(),
            workers
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let (result_tx, mut result_rx) = mpsc::channel::<JobResult>(files.len().max(1));
        let mut handles: Vec<(String, JoinHandle<()>)> = Vec::with_capacity(files.len());
        let mut claimed: HashMap<PathBuf, String> = HashMap::new();
        let mut conflicts = Vec::new();

        for source in &files {
            let job = self.job_for(source, output_folder, Arc::clone(&capabilities), max_output_size_mb);
            let filename = job.filename();
            if let Some(owner) = claimed.get(&job.output_path) {
                let err = JobError::OutputConflict {
                    path: job.output_path.clone(),
                    claimed_by: owner.clone(),
                };
                warn!(file = %filename, error = %err, "Skipping video");
                conflicts.push(JobResult::failure(filename, 0.0, err.to_string(), Vec::new()));
                continue;
            }
            claimed.insert(job.output_path.clone(), filename.clone());

            let permit = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            if self.is_cancelled() {
                break;
            }

            let processor = self.clone();
            let tx = result_tx.clone();

            debug!(file = %filename, "Starting job");
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let mut shutdown = processor.subscribe();
                match processor.process_with(&job, &mut shutdown).await {
                    Ok(result) => {
                        let _ = tx.send(result).await;
                    }
                    Err(e) => debug!(file = %job.filename(), error = %e, "Job stopped"),
                }
            });
            handles.push((filename, handle));
        }
        drop(result_tx);

        let (names, tasks): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(tasks).await;

        let mut results = conflicts;
        while let Some(result) = result_rx.recv().await {
            results.push(result);
        }
        for (filename, outcome) in names.into_iter().zip(joined) {
            if let Err(e) = outcome {
                if e.is_panic() {
                    error!(file = %filename, "Job panicked");
                    results.push(JobResult::failure(filename, 0.0, "Job panicked", Vec::new()));
                }
            }
        }

        for result in &results {
            if result.succeeded {
                info!(file = %result.filename, "✓ {}", result.filename);
            } else {
                warn!(file = %result.filename, "✗ {}", result.filename);
            }
        }

        if self.is_cancelled() {
            warn!(completed = results.len(), "Batch cancelled");
            return Err(BatchError::Cancelled { partial: results });
        }

        let summary = BatchSummary::from_results(results, started_at, started.elapsed());
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Bulk processing complete: {} succeeded, {} failed",
            summary.succeeded,
            summary.failed
        );
        Ok(summary)
    }
}

/// Deletes a partially written output, if present.
async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockBehavior, MockTranscoder};
    use std::time::Duration;

    struct Fixture {
        mock: Arc<MockTranscoder>,
        processor: SpotlightProcessor,
        input: tempfile::TempDir,
        output: tempfile::TempDir,
        scratch: tempfile::TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let mock = Arc::new(MockTranscoder::new());
            let scratch = tempfile::tempdir().unwrap();
            let mut config = Config::default();
            config.batch.temp_dir = scratch.path().to_path_buf();
            config.batch.show_progress = false;
            let processor = SpotlightProcessor::new(config, mock.clone(), mock.clone());
            Self {
                mock,
                processor,
                input: tempfile::tempdir().unwrap(),
                output: tempfile::tempdir().unwrap(),
                scratch,
            }
        }

        fn job(&self, name: &str) -> EncodeJob {
            let source = fixtures::source_file(self.input.path(), name);
            self.processor.job_for(
                &source,
                self.output.path(),
                Arc::new(CapabilitySnapshot::default()),
                10.0,
            )
        }

        fn scratch_is_empty(&self) -> bool {
            std::fs::read_dir(self.scratch.path()).unwrap().count() == 0
        }
    }

    #[tokio::test]
    async fn test_process_one_video_success() {
        let fx = Fixture::new();
        let job = fx.job("wide.mov");

        let result = fx.processor.process_one_video(&job).await.unwrap();
        assert!(result.succeeded, "{:?}", result.error);
        assert_eq!(result.filename, "wide.mov");
        assert_eq!(result.final_size_mb, Some(1.0));
        assert!(job.output_path.ends_with("wide.mp4"));
        assert!(job.output_path.exists());

        let runs = fx.mock.invocations().await;
        assert_eq!(runs.len(), 1);
        let graph = runs[0]
            .iter()
            .find(|a| a.starts_with("[0:v]crop="))
            .unwrap();
        assert!(graph.starts_with("[0:v]crop=300:400:250:0"));
        assert!(runs[0].iter().any(|a| a.ends_with("wide_mask.png")));
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_encode_failure_becomes_failed_result() {
        let fx = Fixture::new();
        fx.mock
            .set_behavior("broken", MockBehavior::Fail { exit_code: 1 })
            .await;
        let job = fx.job("broken.mp4");

        let result = fx.processor.process_one_video(&job).await.unwrap();
        assert!(!result.succeeded);
        assert!(result.error.unwrap().contains("Encoding failed"));
        assert!(result.diagnostics.iter().any(|l| l == "Conversion failed!"));
        assert!(!job.output_path.exists());
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_probe_failure_becomes_failed_result() {
        let fx = Fixture::new();
        fx.mock.set_probe_error("corrupt.mp4").await;
        let job = fx.job("corrupt.mp4");

        let result = fx.processor.process_one_video(&job).await.unwrap();
        assert!(!result.succeeded);
        assert!(result.error.unwrap().contains("Could not get video info"));
        assert!(fx.mock.invocations().await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_output_is_reencoded() {
        let fx = Fixture::new();
        fx.mock.set_output_sizes_mb("clip.mp4", &[14.0, 9.0]).await;
        let job = fx.job("clip.mp4");

        let result = fx.processor.process_one_video(&job).await.unwrap();
        assert!(result.succeeded);
        assert_eq!(result.final_size_mb, Some(9.0));
        assert_eq!(fx.mock.spawns(), 3);
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_unmet_budget_keeps_output() {
        let fx = Fixture::new();
        fx.mock.set_output_sizes_mb("clip.mp4", &[14.0, 12.0, 11.0]).await;
        let job = fx.job("clip.mp4");

        let result = fx.processor.process_one_video(&job).await.unwrap();
        assert!(!result.succeeded);
        assert_eq!(result.final_size_mb, Some(11.0));
        assert!(result.error.unwrap().contains("size requirements"));
        assert!(job.output_path.exists());
        assert_eq!(fx.mock.spawns(), 5);
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let fx = Fixture::new();
        let job = fx.job("clip.mp4");
        fx.processor.shutdown();

        let err = fx.processor.process_one_video(&job).await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(fx.mock.spawns(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_kills_running_encode() {
        let fx = Fixture::new();
        fx.mock.set_behavior("stuck", MockBehavior::Hang).await;
        let job = fx.job("stuck.mp4");

        let processor = fx.processor.clone();
        let task = tokio::spawn(async move { processor.process_one_video(&job).await });

        while fx.mock.spawns() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        fx.processor.shutdown();

        let err = task.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(fx.mock.kills(), 1);
        assert!(!fx.output.path().join("stuck.mp4").exists());
        assert!(fx.scratch_is_empty());
    }

    #[tokio::test]
    async fn test_zero_dimensions_rejected() {
        let fx = Fixture::new();
        fx.mock
            .set_default_info(fixtures::descriptor(0, 0, 5.0))
            .await;
        let result = fx.processor.process_one_video(&fx.job("audio.mp4")).await.unwrap();
        assert!(!result.succeeded);
        assert_eq!(fx.mock.spawns(), 0);
    }
}
