//! Size-constrained re-encode integration tests.
//!
//! These tests run single jobs end to end with scripted output sizes:
//! - Outputs within budget are never re-encoded
//! - At most two re-encode attempts, each at a lower bitrate
//! - An unmet budget fails the job but keeps the output
//! - Codec-specific two-pass arguments

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use spotlight_core::{
    batch::{EncodeJob, JobResult, SpotlightProcessor},
    config::Config,
    encoder::{CapabilitySnapshot, OutputCodec},
    testing::{fixtures, MockBehavior, MockTranscoder},
};

/// Test helper running one source through the processor.
struct TestHarness {
    processor: SpotlightProcessor,
    mock: Arc<MockTranscoder>,
    input_dir: TempDir,
    output_dir: TempDir,
    scratch_dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(Config::default())
    }

    fn with_config(mut config: Config) -> Self {
        let scratch_dir = TempDir::new().expect("Failed to create scratch dir");
        config.batch.temp_dir = scratch_dir.path().to_path_buf();

        let mock = Arc::new(MockTranscoder::new());
        let processor = SpotlightProcessor::new(config, mock.clone(), mock.clone());

        Self {
            processor,
            mock,
            input_dir: TempDir::new().expect("Failed to create input dir"),
            output_dir: TempDir::new().expect("Failed to create output dir"),
            scratch_dir,
        }
    }

    /// A one-minute source named `name`.
    async fn job(&self, name: &str) -> EncodeJob {
        let source = fixtures::source_file(self.input_dir.path(), name);
        self.mock
            .set_probe_result(&source, fixtures::descriptor(1280, 720, 60.0))
            .await;
        self.processor.job_for(
            &source,
            self.output_dir.path(),
            Arc::new(CapabilitySnapshot::default()),
            10.0,
        )
    }

    async fn process(&self, job: &EncodeJob) -> JobResult {
        self.processor
            .process_one_video(job)
            .await
            .expect("job was not cancelled")
    }

    /// Video bitrates requested by the final pass of each attempt.
    async fn second_pass_bitrates(&self) -> Vec<String> {
        self.mock
            .invocations()
            .await
            .iter()
            .filter(|args| args.iter().any(|a| a.ends_with("oversized.mp4")))
            .filter(|args| !args.iter().any(|a| a == "-an"))
            .filter_map(|args| {
                let i = args.iter().position(|a| a == "-b:v")?;
                args.get(i + 1).cloned()
            })
            .collect()
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch_dir.path()).unwrap().count() == 0
    }

    fn output(&self, name: &str) -> PathBuf {
        self.output_dir.path().join(name)
    }
}

#[tokio::test]
async fn test_within_budget_skips_reencode() {
    let harness = TestHarness::new();
    harness.mock.set_output_sizes_mb("clip.mp4", &[9.9]).await;
    let job = harness.job("clip.mp4").await;

    let result = harness.process(&job).await;

    assert!(result.succeeded);
    assert_eq!(harness.mock.spawns(), 1);
    assert!(harness.second_pass_bitrates().await.is_empty());
}

#[tokio::test]
async fn test_first_attempt_meets_budget() {
    let harness = TestHarness::new();
    harness.mock.set_output_sizes_mb("clip.mp4", &[14.0, 9.5]).await;
    let job = harness.job("clip.mp4").await;

    let result = harness.process(&job).await;

    assert!(result.succeeded);
    assert_eq!(result.final_size_mb, Some(9.5));
    assert_eq!(harness.second_pass_bitrates().await, vec!["1143k"]);
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_second_attempt_targets_smaller_size() {
    let harness = TestHarness::new();
    harness
        .mock
        .set_output_sizes_mb("clip.mp4", &[14.0, 10.5, 9.75])
        .await;
    let job = harness.job("clip.mp4").await;

    let result = harness.process(&job).await;

    assert!(result.succeeded);
    assert_eq!(result.final_size_mb, Some(9.75));
    assert_eq!(harness.second_pass_bitrates().await, vec!["1143k", "1080k"]);
}

#[tokio::test]
async fn test_gives_up_after_two_attempts() {
    let harness = TestHarness::new();
    harness
        .mock
        .set_output_sizes_mb("clip.mp4", &[14.0, 12.0, 11.0, 1.0])
        .await;
    let job = harness.job("clip.mp4").await;

    let result = harness.process(&job).await;

    assert!(!result.succeeded);
    assert_eq!(result.final_size_mb, Some(11.0));
    assert!(result.error.unwrap().contains("Failed to meet size requirements"));
    // One spotlight encode plus two passes for each of two attempts.
    assert_eq!(harness.mock.spawns(), 5);
    assert!(harness.output("clip.mp4").exists());
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_reencode_uses_constrained_audio() {
    let harness = TestHarness::new();
    harness.mock.set_output_sizes_mb("clip.mp4", &[14.0, 9.0]).await;
    let job = harness.job("clip.mp4").await;

    harness.process(&job).await;

    let passes = harness.mock.invocations_matching("oversized.mp4").await;
    assert_eq!(passes.len(), 2);
    assert!(passes[0].iter().any(|a| a == "-an"));
    assert!(passes[0].iter().any(|a| a == "null"));
    assert!(passes[1].iter().any(|a| a == "128k"));
    assert!(passes[1].iter().any(|a| a == "libx264"));
}

#[tokio::test]
async fn test_h265_two_pass_uses_x265_params() {
    let mut config = Config::default();
    config.encode.codec = OutputCodec::H265;
    let harness = TestHarness::with_config(config);
    harness.mock.set_output_sizes_mb("clip.mp4", &[14.0, 9.0]).await;
    let job = harness.job("clip.mp4").await;

    let result = harness.process(&job).await;

    assert!(result.succeeded);
    let passes = harness.mock.invocations_matching("oversized.mp4").await;
    assert!(passes[0].iter().any(|a| a.starts_with("pass=1:stats=")));
    assert!(passes[1].iter().any(|a| a.starts_with("pass=2:stats=")));
    assert!(passes[1].iter().any(|a| a == "libx265"));
}

#[tokio::test]
async fn test_failed_pass_removes_output() {
    let harness = TestHarness::new();
    harness.mock.set_output_sizes_mb("clip.mp4", &[14.0]).await;
    harness
        .mock
        .set_behavior("passlog", MockBehavior::Fail { exit_code: 1 })
        .await;
    let job = harness.job("clip.mp4").await;

    let result = harness.process(&job).await;

    assert!(!result.succeeded);
    assert!(result.error.unwrap().contains("Encoding failed"));
    assert!(!harness.output("clip.mp4").exists());
    assert!(harness.scratch_is_empty());
}

#[tokio::test]
async fn test_custom_retry_factor() {
    let mut config = Config::default();
    config.sizing.retry_factor = 0.5;
    let harness = TestHarness::with_config(config);
    harness
        .mock
        .set_output_sizes_mb("clip.mp4", &[14.0, 11.0, 5.0])
        .await;
    let job = harness.job("clip.mp4").await;

    let result = harness.process(&job).await;

    assert!(result.succeeded);
    let bitrates = harness.second_pass_bitrates().await;
    assert_eq!(bitrates.len(), 2);
    // 5 MB over one minute leaves (5·8·1024·1024 − 128000·60) / 60000 · 0.9 ≈ 513.9 kbps.
    assert_eq!(bitrates[1], "513k");
}
