use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    /// The ffmpeg or ffprobe binary could not be started.
    #[error("{tool} is not installed or not on PATH (looked for {path})")]
    ToolNotFound { tool: &'static str, path: PathBuf },

    #[error("Source video does not exist: {path}")]
    InputNotFound { path: PathBuf },

    /// ffprobe ran but reported no usable video stream.
    #[error("ffprobe failed: {reason}")]
    ProbeFailed { reason: String },

    #[error("Unreadable ffprobe output: {reason}")]
    ParseError { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn tool_not_found(tool: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::ToolNotFound {
            tool,
            path: path.into(),
        }
    }

    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    pub fn parse_error(reason: impl Into<String>) -> Self {
        Self::ParseError {
            reason: reason.into(),
        }
    }

    /// True when a binary is missing rather than a source being bad.
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, Self::ToolNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MediaError::probe_failed("no video stream");
        assert_eq!(err.to_string(), "ffprobe failed: no video stream");

        let err = MediaError::tool_not_found("ffmpeg", "/opt/ffmpeg");
        assert_eq!(
            err.to_string(),
            "ffmpeg is not installed or not on PATH (looked for /opt/ffmpeg)"
        );
    }

    #[test]
    fn test_is_tool_missing() {
        assert!(MediaError::tool_not_found("ffprobe", "ffprobe").is_tool_missing());
        assert!(!MediaError::parse_error("bad json").is_tool_missing());
    }
}
