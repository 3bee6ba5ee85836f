//! Types shared by the prober and transcoder seams.

use serde::{Deserialize, Serialize};

/// Properties of the first video stream of a source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub width: u32,
    pub height: u32,
    pub codec_name: String,
    /// Stream duration in seconds (0.0 when the container does not report one).
    pub duration_secs: f64,
    pub frame_rate: f64,
}

impl MediaDescriptor {
    /// Whether the duration is known and usable for progress and bitrate math.
    pub fn has_duration(&self) -> bool {
        self.duration_secs > 0.0
    }
}

/// Captured result of a tool that was run to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Parses an ffprobe frame rate such as `"24000/1001"` or `"30"`.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den > 0.0 {
                Some(num / den)
            } else {
                None
            }
        }
        None => raw.trim().parse::<f64>().ok(),
    }
}
