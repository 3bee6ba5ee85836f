//! Drives one transcoder process from spawn to exit.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::config::RunnerConfig;
use super::error::{tail_lines, EncodeError};
use super::progress::{FfmpegStatsParser, ProgressDisplay, ProgressParser, RunProgress};
use super::shutdown::Shutdown;
use crate::media::{TranscodeProcess, Transcoder};

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Starting,
    Running,
    /// Progress crossed the completion threshold and a stop was requested.
    CompletionDetected,
    /// Reading has ended; waiting for the process to exit.
    Finalizing,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }
}

/// A run that exited with status 0.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Every diagnostic line the transcoder printed.
    pub lines: Vec<String>,
    /// Whether the completion threshold was reached while reading.
    pub completion_detected: bool,
    pub elapsed: Duration,
}

enum Driven {
    Exited(Option<i32>),
    TimedOut,
    Io(std::io::Error),
}

/// Per-run bookkeeping.
struct RunTracker {
    label: String,
    state: RunState,
    lines: Vec<String>,
    progress: RunProgress,
    completion_detected: bool,
}

impl RunTracker {
    fn transition(&mut self, next: RunState) {
        if self.state != next {
            debug!(label = %self.label, from = ?self.state, to = ?next, "Runner state change");
            self.state = next;
        }
    }

    /// Records the terminal state and hands back the captured lines.
    fn finish(mut self, terminal: RunState) -> (Vec<String>, bool) {
        debug_assert!(terminal.is_terminal());
        self.transition(terminal);
        self.progress.finish();
        (self.lines, self.completion_detected)
    }
}

/// Runs the transcoder while tracking progress, completion, and timeouts.
pub struct ProgressRunner {
    transcoder: Arc<dyn Transcoder>,
    parser: Arc<dyn ProgressParser>,
    config: RunnerConfig,
    display: ProgressDisplay,
}

impl ProgressRunner {
    /// Creates a runner with the ffmpeg stats parser and no visible output.
    pub fn new(transcoder: Arc<dyn Transcoder>, config: RunnerConfig) -> Self {
        Self {
            transcoder,
            parser: Arc::new(FfmpegStatsParser),
            config,
            display: ProgressDisplay::hidden(),
        }
    }

    pub fn with_display(mut self, display: ProgressDisplay) -> Self {
        self.display = display;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn ProgressParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs the transcoder with `args` to completion.
    ///
    /// `duration_secs` is the media duration used for progress and the exit
    /// timeout (0 if unknown). Partial output is left on disk on every error
    /// path; cleaning it up is the caller's job.
    pub async fn run(
        &self,
        label: &str,
        args: &[String],
        duration_secs: f64,
        shutdown: &mut Shutdown,
    ) -> Result<RunOutcome, EncodeError> {
        if shutdown.is_shutdown() {
            return Err(EncodeError::Cancelled);
        }

        let started = Instant::now();
        let mut tracker = RunTracker {
            label: label.to_string(),
            state: RunState::Starting,
            lines: Vec::new(),
            progress: self.display.start(label, duration_secs),
            completion_detected: false,
        };

        debug!(label, transcoder = self.transcoder.name(), args = ?args, "Spawning transcoder");
        let mut process = match self.transcoder.spawn(args).await {
            Ok(process) => process,
            Err(e) => {
                tracker.finish(RunState::Failed);
                return Err(EncodeError::Spawn(e));
            }
        };
        tracker.transition(RunState::Running);

        let exit_timeout = self.config.exit_timeout(duration_secs);
        let driven = tokio::select! {
            biased;
            _ = shutdown.recv() => None,
            driven = self.drive(process.as_mut(), &mut tracker, duration_secs, exit_timeout) => Some(driven),
        };

        let tail_len = self.config.error_tail_lines;
        match driven {
            None => {
                warn!(label, "Interrupted, terminating transcoder");
                kill(process.as_mut(), label).await;
                tracker.finish(RunState::Cancelled);
                Err(EncodeError::Cancelled)
            }
            Some(Driven::TimedOut) => {
                warn!(
                    label,
                    timeout_secs = exit_timeout.as_secs(),
                    "Timed out waiting for transcoder to finish, terminating"
                );
                kill(process.as_mut(), label).await;
                let (lines, _) = tracker.finish(RunState::TimedOut);
                Err(EncodeError::TimedOut {
                    timeout_secs: exit_timeout.as_secs(),
                    tail: tail_lines(&lines, tail_len),
                })
            }
            Some(Driven::Io(e)) => {
                kill(process.as_mut(), label).await;
                tracker.finish(RunState::Failed);
                Err(EncodeError::Io(e))
            }
            Some(Driven::Exited(Some(0))) => {
                let (lines, completion_detected) = tracker.finish(RunState::Succeeded);
                debug!(label, lines = lines.len(), "Transcoder finished");
                Ok(RunOutcome {
                    lines,
                    completion_detected,
                    elapsed: started.elapsed(),
                })
            }
            Some(Driven::Exited(exit_code)) => {
                let (lines, _) = tracker.finish(RunState::Failed);
                let tail = tail_lines(&lines, tail_len);
                warn!(label, exit_code = ?exit_code, "Transcoder failed");
                for line in &tail {
                    warn!(label, "  {}", line);
                }
                Err(EncodeError::failed(exit_code, tail))
            }
        }
    }

    /// Reads diagnostics until the stream ends or finalization is detected,
    /// then waits for exit.
    async fn drive(
        &self,
        process: &mut dyn TranscodeProcess,
        tracker: &mut RunTracker,
        duration_secs: f64,
        exit_timeout: Duration,
    ) -> Driven {
        let idle = self.config.finalize_idle();

        loop {
            let next = if tracker.state == RunState::CompletionDetected {
                match timeout(idle, process.next_line()).await {
                    Ok(next) => next,
                    Err(_) => {
                        debug!(label = %tracker.label, "No output after completion, finalizing");
                        break;
                    }
                }
            } else {
                process.next_line().await
            };

            let line = match next {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => return Driven::Io(e),
            };

            if tracker.state == RunState::CompletionDetected && self.parser.is_summary(&line) {
                tracker.lines.push(line);
                break;
            }

            if let Some(sample) = self.parser.parse_line(&line) {
                if duration_secs > 0.0 && tracker.state == RunState::Running {
                    let percent = sample.percent(duration_secs);
                    if percent >= self.config.completion_threshold_percent {
                        tracker.progress.complete();
                        tracker.completion_detected = true;
                        tracker.transition(RunState::CompletionDetected);
                        if let Err(e) = process.request_stop().await {
                            debug!(label = %tracker.label, error = %e, "Stop request not delivered");
                        }
                    } else {
                        tracker
                            .progress
                            .update(sample, percent, self.config.render_delta_percent);
                    }
                }
            }

            tracker.lines.push(line);
        }

        tracker.transition(RunState::Finalizing);
        match timeout(exit_timeout, process.wait()).await {
            Ok(Ok(code)) => Driven::Exited(code),
            Ok(Err(e)) => Driven::Io(e),
            Err(_) => Driven::TimedOut,
        }
    }
}

async fn kill(process: &mut dyn TranscodeProcess, label: &str) {
    if let Err(e) = process.kill().await {
        debug!(label, error = %e, "Failed to kill transcoder");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBehavior, MockTranscoder};
    use tokio::sync::broadcast;

    fn args(output: &str) -> Vec<String> {
        vec![
            "-i".to_string(),
            "/in/source.mp4".to_string(),
            "-t".to_string(),
            "10".to_string(),
            "-y".to_string(),
            output.to_string(),
        ]
    }

    fn runner(mock: &Arc<MockTranscoder>) -> ProgressRunner {
        ProgressRunner::new(mock.clone(), RunnerConfig::default())
    }

    #[tokio::test]
    async fn test_successful_run_requests_stop_at_completion() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let mock = Arc::new(MockTranscoder::new());

        let outcome = runner(&mock)
            .run("out.mp4", &args(output.to_str().unwrap()), 10.0, &mut Shutdown::never())
            .await
            .unwrap();

        assert!(outcome.completion_detected);
        assert_eq!(mock.stop_requests(), 1);
        assert!(outcome.lines.iter().any(|l| l.contains("time=")));
        assert!(outcome.lines.last().unwrap().contains("video:"));
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_unknown_duration_never_requests_stop() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.mp4");
        let mock = Arc::new(MockTranscoder::new());

        let outcome = runner(&mock)
            .run("out.mp4", &args(output.to_str().unwrap()), 0.0, &mut Shutdown::never())
            .await
            .unwrap();

        assert!(!outcome.completion_detected);
        assert_eq!(mock.stop_requests(), 0);
    }

    #[tokio::test]
    async fn test_failure_surfaces_tail() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("broken.mp4");
        let mock = Arc::new(MockTranscoder::new());
        mock.set_behavior("broken", MockBehavior::Fail { exit_code: 1 })
            .await;

        let err = runner(&mock)
            .run("broken.mp4", &args(output.to_str().unwrap()), 10.0, &mut Shutdown::never())
            .await
            .unwrap_err();

        match err {
            EncodeError::Failed { exit_code, tail } => {
                assert_eq!(exit_code, Some(1));
                assert!(!tail.is_empty());
                assert!(tail.len() <= 10);
                assert!(tail.iter().any(|l| l.contains("Conversion failed")));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_after_completion_finalizes() {
        let mock = Arc::new(MockTranscoder::new());
        mock.set_behavior(
            "quiet",
            MockBehavior::Script {
                lines: vec!["frame=300 time=00:00:10.00 bitrate=1000kbits/s".to_string()],
                silent_tail: true,
                hang_on_wait: false,
                exit_code: 0,
            },
        )
        .await;

        let started = tokio::time::Instant::now();
        let outcome = runner(&mock)
            .run("quiet.mp4", &args("/nowhere/quiet.mp4"), 10.0, &mut Shutdown::never())
            .await
            .unwrap();

        assert!(outcome.completion_detected);
        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(started.elapsed() < Duration::from_secs(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exit_wait_times_out() {
        let mock = Arc::new(MockTranscoder::new());
        mock.set_behavior(
            "stuck",
            MockBehavior::Script {
                lines: vec!["frame=10 time=00:00:01.00".to_string()],
                silent_tail: false,
                hang_on_wait: true,
                exit_code: 0,
            },
        )
        .await;

        let err = runner(&mock)
            .run("stuck.mp4", &args("/nowhere/stuck.mp4"), 10.0, &mut Shutdown::never())
            .await
            .unwrap_err();

        match err {
            EncodeError::TimedOut { timeout_secs, tail } => {
                assert_eq!(timeout_secs, 300);
                assert_eq!(tail.len(), 1);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.kills(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_kills_child() {
        let mock = Arc::new(MockTranscoder::new());
        mock.set_behavior("hang", MockBehavior::Hang).await;
        let (tx, rx) = broadcast::channel(1);
        let mut shutdown = Shutdown::new(rx);

        let runner = runner(&mock);
        let run_args = args("/nowhere/hang.mp4");
        let run = runner.run("hang.mp4", &run_args, 10.0, &mut shutdown);
        let trigger = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tx.send(()).unwrap();
        };
        let (result, _) = tokio::join!(run, trigger);

        assert!(matches!(result, Err(EncodeError::Cancelled)));
        assert_eq!(mock.kills(), 1);
        assert!(shutdown.is_shutdown());
    }

    #[tokio::test]
    async fn test_already_shut_down_does_not_spawn() {
        let mock = Arc::new(MockTranscoder::new());
        let (tx, rx) = broadcast::channel(1);
        let mut shutdown = Shutdown::new(rx);
        tx.send(()).unwrap();
        shutdown.recv().await;

        let err = runner(&mock)
            .run("x.mp4", &args("/nowhere/x.mp4"), 10.0, &mut shutdown)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(mock.invocations().await.is_empty());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let mock = Arc::new(MockTranscoder::new());
        mock.set_spawn_error(true).await;

        let err = runner(&mock)
            .run("x.mp4", &args("/nowhere/x.mp4"), 10.0, &mut Shutdown::never())
            .await
            .unwrap_err();
        assert!(matches!(err, EncodeError::Spawn(_)));
    }
}
