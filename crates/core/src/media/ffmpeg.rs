//! FFmpeg/FFprobe-backed implementations of the tool seams.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tracing::debug;

use super::config::ToolConfig;
use super::error::MediaError;
use super::traits::{MediaProber, TranscodeProcess, Transcoder};
use super::types::{parse_frame_rate, MediaDescriptor, ToolOutput};

/// Runs the real ffmpeg and ffprobe binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegTool {
    config: ToolConfig,
}

impl FfmpegTool {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    fn ffmpeg_error(&self, e: std::io::Error) -> MediaError {
        if e.kind() == std::io::ErrorKind::NotFound {
            MediaError::tool_not_found("ffmpeg", &self.config.ffmpeg_path)
        } else {
            MediaError::Io(e)
        }
    }

    fn ffprobe_error(&self, e: std::io::Error) -> MediaError {
        if e.kind() == std::io::ErrorKind::NotFound {
            MediaError::tool_not_found("ffprobe", &self.config.ffprobe_path)
        } else {
            MediaError::Io(e)
        }
    }

    /// Checks that both binaries run, returning ffmpeg's version line.
    pub async fn validate(&self) -> Result<String, MediaError> {
        let ffmpeg = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| self.ffmpeg_error(e))?;

        Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await
            .map_err(|e| self.ffprobe_error(e))?;

        let stdout = String::from_utf8_lossy(&ffmpeg.stdout);
        let version = stdout.lines().next().unwrap_or("ffmpeg").trim().to_string();
        debug!(version = %version, "Transcoder available");
        Ok(version)
    }

    /// Parses `ffprobe -of json` output for the first video stream.
    pub(crate) fn parse_probe_output(output: &str) -> Result<MediaDescriptor, MediaError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            width: Option<u32>,
            height: Option<u32>,
            codec_name: Option<String>,
            duration: Option<String>,
            r_frame_rate: Option<String>,
        }

        let probe: ProbeOutput = serde_json::from_str(output)
            .map_err(|e| MediaError::parse_error(format!("Failed to parse ffprobe output: {}", e)))?;

        let stream = probe
            .streams
            .into_iter()
            .next()
            .ok_or_else(|| MediaError::probe_failed("no video stream found"))?;

        let (width, height) = match (stream.width, stream.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            _ => return Err(MediaError::probe_failed("video stream has no dimensions")),
        };

        Ok(MediaDescriptor {
            width,
            height,
            codec_name: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
            duration_secs: stream
                .duration
                .as_deref()
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0),
            frame_rate: stream
                .r_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .unwrap_or(0.0),
        })
    }
}

#[async_trait]
impl MediaProber for FfmpegTool {
    async fn probe(&self, path: &Path) -> Result<MediaDescriptor, MediaError> {
        if !path.exists() {
            return Err(MediaError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,codec_name,duration,r_frame_rate",
                "-of",
                "json",
            ])
            .arg(path)
            .output()
            .await
            .map_err(|e| self.ffprobe_error(e))?;

        if !output.status.success() {
            return Err(MediaError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Self::parse_probe_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[async_trait]
impl Transcoder for FfmpegTool {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn invoke(&self, args: &[String]) -> Result<ToolOutput, MediaError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.ffmpeg_error(e))?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn spawn(&self, args: &[String]) -> Result<Box<dyn TranscodeProcess>, MediaError> {
        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.ffmpeg_error(e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::Io(std::io::Error::other("stderr was not captured")))?;
        let stdin = child.stdin.take();

        Ok(Box::new(FfmpegProcess {
            child,
            stdin,
            records: StderrRecords::new(BufReader::new(stderr)),
        }))
    }
}

/// Splits a diagnostic stream on `\n` and `\r`.
///
/// ffmpeg ends each periodic stats report with a bare carriage return, so
/// newline-only splitting would hold every report of a run in one line.
/// Empty records are skipped.
pub(crate) struct StderrRecords<R> {
    reader: R,
    pending: Vec<u8>,
}

impl<R: AsyncBufRead + Unpin> StderrRecords<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            reader,
            pending: Vec::new(),
        }
    }

    pub(crate) async fn next_record(&mut self) -> std::io::Result<Option<String>> {
        loop {
            let chunk = self.reader.fill_buf().await?;
            if chunk.is_empty() {
                return Ok((!self.pending.is_empty()).then(|| self.take()));
            }

            match chunk.iter().position(|b| *b == b'\n' || *b == b'\r') {
                Some(end) => {
                    self.pending.extend_from_slice(&chunk[..end]);
                    self.reader.consume(end + 1);
                    if !self.pending.is_empty() {
                        return Ok(Some(self.take()));
                    }
                }
                None => {
                    let len = chunk.len();
                    self.pending.extend_from_slice(chunk);
                    self.reader.consume(len);
                }
            }
        }
    }

    fn take(&mut self) -> String {
        let record = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        record
    }
}

/// A spawned ffmpeg child with its stderr exposed as records.
struct FfmpegProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    records: StderrRecords<BufReader<ChildStderr>>,
}

#[async_trait]
impl TranscodeProcess for FfmpegProcess {
    async fn next_line(&mut self) -> std::io::Result<Option<String>> {
        self.records.next_record().await
    }

    /// Sends ffmpeg's interactive `q` command, which finalizes the container.
    async fn request_stop(&mut self) -> std::io::Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.write_all(b"q").await?;
            stdin.flush().await?;
        }
        Ok(())
    }

    async fn wait(&mut self) -> std::io::Result<Option<i32>> {
        // Closing stdin keeps ffmpeg from blocking on interactive input.
        self.stdin.take();
        let status = self.child.wait().await?;
        Ok(status.code())
    }

    async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }
}
