//! Mock prober/transcoder for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::media::{
    MediaDescriptor, MediaError, MediaProber, ToolOutput, TranscodeProcess, Transcoder,
};

const MB: u64 = 1024 * 1024;

const SUMMARY_LINE: &str = "video:1520kB audio:94kB subtitle:0kB other streams:0kB \
                            global headers:0kB muxing overhead: 0.312%";

/// How a matching transcoder run behaves.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Prints stats up to 100%, then the summary, and exits 0.
    Succeed,
    /// Prints some stats and an error, then exits with `exit_code`.
    Fail { exit_code: i32 },
    /// Prints one stats line, then goes silent and never exits until killed.
    Hang,
    /// Prints `lines` verbatim.
    Script {
        lines: Vec<String>,
        /// Block instead of ending the stream after the last line.
        silent_tail: bool,
        /// Never return from `wait`.
        hang_on_wait: bool,
        exit_code: i32,
    },
}

#[derive(Debug, Default)]
struct Counters {
    spawns: AtomicUsize,
    stop_requests: AtomicUsize,
    kills: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

/// Mock implementation of [`MediaProber`] and [`Transcoder`].
///
/// Provides controllable behavior for testing:
/// - Canned probe results and probe failures
/// - Per-file run behavior (succeed, fail, hang, scripted output)
/// - Scripted output file sizes, so size-limit logic can be driven
/// - Recorded invocations and process counters for assertions
///
/// Runs that name an output file create it (sparse) with the configured
/// size, including failing runs, which leave a partial file behind as the
/// real transcoder does.
#[derive(Debug)]
pub struct MockTranscoder {
    /// Recorded argument lists of every invoke and spawn.
    invocations: Arc<RwLock<Vec<Vec<String>>>>,
    /// Pre-configured probe results by path.
    probe_results: Arc<RwLock<HashMap<PathBuf, MediaDescriptor>>>,
    /// File names whose probe fails.
    probe_errors: Arc<RwLock<HashSet<String>>>,
    /// File names whose probe panics.
    probe_panics: Arc<RwLock<HashSet<String>>>,
    /// Default descriptor for unknown files.
    default_info: Arc<RwLock<MediaDescriptor>>,
    /// Behaviors keyed by a substring of any argument; first match wins.
    behaviors: Arc<RwLock<Vec<(String, MockBehavior)>>>,
    /// Output sizes in bytes by output file name, consumed one per run.
    output_sizes: Arc<RwLock<HashMap<String, VecDeque<u64>>>>,
    default_output_size: Arc<RwLock<u64>>,
    /// Stdout returned for `-encoders`.
    encoders_output: Arc<RwLock<String>>,
    invoke_error: Arc<RwLock<bool>>,
    spawn_error: Arc<RwLock<bool>>,
    /// Delay before each diagnostic line.
    line_delay: Arc<RwLock<Duration>>,
    counters: Arc<Counters>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    /// Create a new mock transcoder.
    pub fn new() -> Self {
        Self {
            invocations: Arc::new(RwLock::new(Vec::new())),
            probe_results: Arc::new(RwLock::new(HashMap::new())),
            probe_errors: Arc::new(RwLock::new(HashSet::new())),
            probe_panics: Arc::new(RwLock::new(HashSet::new())),
            default_info: Arc::new(RwLock::new(Self::create_default_info())),
            behaviors: Arc::new(RwLock::new(Vec::new())),
            output_sizes: Arc::new(RwLock::new(HashMap::new())),
            default_output_size: Arc::new(RwLock::new(MB)),
            encoders_output: Arc::new(RwLock::new(String::new())),
            invoke_error: Arc::new(RwLock::new(false)),
            spawn_error: Arc::new(RwLock::new(false)),
            line_delay: Arc::new(RwLock::new(Duration::ZERO)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// 800x400 h264 clip, 5 seconds at 30 fps.
    pub fn create_default_info() -> MediaDescriptor {
        MediaDescriptor {
            width: 800,
            height: 400,
            codec_name: "h264".to_string(),
            duration_secs: 5.0,
            frame_rate: 30.0,
        }
    }

    /// Get all recorded invocations.
    pub async fn invocations(&self) -> Vec<Vec<String>> {
        self.invocations.read().await.clone()
    }

    /// Recorded invocations with an argument containing `pattern`.
    pub async fn invocations_matching(&self, pattern: &str) -> Vec<Vec<String>> {
        self.invocations
            .read()
            .await
            .iter()
            .filter(|args| args.iter().any(|a| a.contains(pattern)))
            .cloned()
            .collect()
    }

    /// Set a probe result for a specific path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, info: MediaDescriptor) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), info);
    }

    /// Make probing fail for files with this name.
    pub async fn set_probe_error(&self, file_name: &str) {
        self.probe_errors.write().await.insert(file_name.to_string());
    }

    /// Make probing panic for files with this name.
    pub async fn set_probe_panic(&self, file_name: &str) {
        self.probe_panics.write().await.insert(file_name.to_string());
    }

    /// Set the default descriptor for probing unknown files.
    pub async fn set_default_info(&self, info: MediaDescriptor) {
        *self.default_info.write().await = info;
    }

    /// Runs whose arguments contain `pattern` behave as `behavior`.
    pub async fn set_behavior(&self, pattern: &str, behavior: MockBehavior) {
        self.behaviors
            .write()
            .await
            .push((pattern.to_string(), behavior));
    }

    /// Successive runs writing `file_name` produce these sizes (megabytes).
    /// The last size repeats once the list is exhausted.
    pub async fn set_output_sizes_mb(&self, file_name: &str, sizes_mb: &[f64]) {
        let sizes = sizes_mb.iter().map(|mb| (mb * MB as f64) as u64).collect();
        self.output_sizes
            .write()
            .await
            .insert(file_name.to_string(), sizes);
    }

    /// Size of outputs without a scripted size.
    pub async fn set_default_output_size_mb(&self, size_mb: f64) {
        *self.default_output_size.write().await = (size_mb * MB as f64) as u64;
    }

    /// Set stdout of the encoder listing.
    pub async fn set_encoders_output(&self, stdout: &str) {
        *self.encoders_output.write().await = stdout.to_string();
    }

    /// Make every `invoke` fail as if the binary were missing.
    pub async fn set_invoke_error(&self, fail: bool) {
        *self.invoke_error.write().await = fail;
    }

    /// Make every `spawn` fail as if the binary were missing.
    pub async fn set_spawn_error(&self, fail: bool) {
        *self.spawn_error.write().await = fail;
    }

    /// Delay each emitted line, to keep runs in flight for a while.
    pub async fn set_line_delay(&self, delay: Duration) {
        *self.line_delay.write().await = delay;
    }

    /// Number of processes spawned.
    pub fn spawns(&self) -> usize {
        self.counters.spawns.load(Ordering::SeqCst)
    }

    /// Number of graceful stop requests received.
    pub fn stop_requests(&self) -> usize {
        self.counters.stop_requests.load(Ordering::SeqCst)
    }

    /// Number of processes killed.
    pub fn kills(&self) -> usize {
        self.counters.kills.load(Ordering::SeqCst)
    }

    /// Highest number of processes alive at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }

    async fn behavior_for(&self, args: &[String]) -> MockBehavior {
        self.behaviors
            .read()
            .await
            .iter()
            .find(|(pattern, _)| args.iter().any(|a| a.contains(pattern.as_str())))
            .map(|(_, behavior)| behavior.clone())
            .unwrap_or(MockBehavior::Succeed)
    }

    async fn next_output_size(&self, file_name: &str) -> u64 {
        let mut sizes = self.output_sizes.write().await;
        match sizes.get_mut(file_name) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_default(),
            Some(queue) => match queue.front() {
                Some(size) => *size,
                None => *self.default_output_size.read().await,
            },
            None => *self.default_output_size.read().await,
        }
    }

    /// Media duration the run covers: `-t` if given, else the probed input.
    async fn run_duration(&self, args: &[String]) -> f64 {
        if let Some(t) = value_after(args, "-t").and_then(|v| v.parse::<f64>().ok()) {
            return t;
        }
        match value_after(args, "-i") {
            Some(input) => match self.probe(Path::new(input)).await {
                Ok(info) => info.duration_secs,
                Err(_) => 0.0,
            },
            None => 0.0,
        }
    }

    /// Creates the output (and pass log) files the real transcoder would.
    async fn write_outputs(&self, args: &[String]) {
        if let Some(prefix) = value_after(args, "-passlogfile") {
            let _ = std::fs::write(format!("{}-0.log", prefix), b"pass stats");
        }

        let null_output = value_after(args, "-f") == Some("null");
        if null_output {
            return;
        }
        let input = value_after(args, "-i");
        let Some(output) = args
            .last()
            .filter(|o| args.len() > 1 && !o.starts_with('-') && input != Some(o.as_str()))
        else {
            return;
        };
        let path = Path::new(output);
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let size = self.next_output_size(file_name).await;
        let _ = std::fs::File::create(path).and_then(|f| f.set_len(size));
    }
}

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

fn stats_line(secs: f64) -> String {
    let hours = (secs / 3600.0) as u64;
    let minutes = ((secs % 3600.0) / 60.0) as u64;
    let seconds = secs % 60.0;
    format!(
        "frame={:5} fps= 30 q=28.0 size={:8}kB time={:02}:{:02}:{:05.2} bitrate=1200.0kbits/s speed=2.00x",
        (secs * 30.0) as u64,
        (secs * 150.0) as u64,
        hours,
        minutes,
        seconds
    )
}

fn stats_lines(duration: f64, upto: f64) -> Vec<String> {
    if duration <= 0.0 {
        return vec![stats_line(1.0)];
    }
    [0.25, 0.5, 0.75, 1.0]
        .iter()
        .filter(|f| **f <= upto)
        .map(|f| stats_line(duration * f))
        .collect()
}

#[async_trait]
impl MediaProber for MockTranscoder {
    async fn probe(&self, path: &Path) -> Result<MediaDescriptor, MediaError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.probe_panics.read().await.contains(&file_name) {
            panic!("mock probe panicked for {}", file_name);
        }
        if self.probe_errors.read().await.contains(&file_name) {
            return Err(MediaError::probe_failed(format!(
                "ffprobe failed: {}: Invalid data found when processing input",
                path.display()
            )));
        }

        if let Some(info) = self.probe_results.read().await.get(path) {
            return Ok(info.clone());
        }
        Ok(self.default_info.read().await.clone())
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, args: &[String]) -> Result<ToolOutput, MediaError> {
        self.invocations.write().await.push(args.to_vec());
        if *self.invoke_error.read().await {
            return Err(MediaError::tool_not_found("ffmpeg", "ffmpeg"));
        }

        if args.iter().any(|a| a == "-encoders") {
            return Ok(ToolOutput {
                exit_code: Some(0),
                stdout: self.encoders_output.read().await.clone(),
                stderr: String::new(),
            });
        }

        self.write_outputs(args).await;
        match self.behavior_for(args).await {
            MockBehavior::Fail { exit_code } => Ok(ToolOutput {
                exit_code: Some(exit_code),
                stdout: String::new(),
                stderr: "Conversion failed!".to_string(),
            }),
            _ => Ok(ToolOutput {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: SUMMARY_LINE.to_string(),
            }),
        }
    }

    async fn spawn(&self, args: &[String]) -> Result<Box<dyn TranscodeProcess>, MediaError> {
        self.invocations.write().await.push(args.to_vec());
        if *self.spawn_error.read().await {
            return Err(MediaError::tool_not_found("ffmpeg", "ffmpeg"));
        }

        let duration = self.run_duration(args).await;
        let behavior = self.behavior_for(args).await;
        self.write_outputs(args).await;

        let header = vec![
            "ffmpeg version 7.0 Copyright (c) 2000-2024 the FFmpeg developers".to_string(),
            "Press [q] to stop, [?] for help".to_string(),
        ];
        let (lines, silent_tail, hang_on_wait, exit_code) = match behavior {
            MockBehavior::Succeed => {
                let mut lines = header;
                lines.extend(stats_lines(duration, 1.0));
                lines.push(SUMMARY_LINE.to_string());
                (lines, false, false, 0)
            }
            MockBehavior::Fail { exit_code } => {
                let mut lines = header;
                lines.extend(stats_lines(duration, 0.25));
                lines.push("[vost#0:0/libx264 @ 0x600] Error while encoding frame".to_string());
                lines.push("Conversion failed!".to_string());
                (lines, false, false, exit_code)
            }
            MockBehavior::Hang => {
                let mut lines = header;
                lines.extend(stats_lines(duration, 0.25));
                (lines, true, true, 0)
            }
            MockBehavior::Script {
                lines,
                silent_tail,
                hang_on_wait,
                exit_code,
            } => (lines, silent_tail, hang_on_wait, exit_code),
        };

        self.counters.spawns.fetch_add(1, Ordering::SeqCst);
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_active.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(MockProcess {
            lines: lines.into(),
            silent_tail,
            hang_on_wait,
            exit_code,
            line_delay: *self.line_delay.read().await,
            killed: false,
            counters: Arc::clone(&self.counters),
        }))
    }
}

/// In-memory stand-in for a running transcoder.
struct MockProcess {
    lines: VecDeque<String>,
    silent_tail: bool,
    hang_on_wait: bool,
    exit_code: i32,
    line_delay: Duration,
    killed: bool,
    counters: Arc<Counters>,
}

impl Drop for MockProcess {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TranscodeProcess for MockProcess {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        if self.killed {
            return Ok(None);
        }
        if !self.line_delay.is_zero() {
            tokio::time::sleep(self.line_delay).await;
        }
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            None if self.silent_tail => std::future::pending().await,
            None => Ok(None),
        }
    }

    async fn request_stop(&mut self) -> std::io::Result<()> {
        self.counters.stop_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        if self.killed {
            return Ok(None);
        }
        if self.hang_on_wait {
            std::future::pending::<()>().await;
        }
        Ok(Some(self.exit_code))
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        if !self.killed {
            self.killed = true;
            self.counters.kills.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
