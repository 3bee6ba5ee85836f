//! Error types for a single transcoder run.

use thiserror::Error;

use crate::media::MediaError;

/// Why a transcoder run did not succeed.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The transcoder exited with a non-zero status.
    #[error("Transcoder exited with code {}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none".to_string()))]
    Failed {
        exit_code: Option<i32>,
        /// Last diagnostic lines before exit.
        tail: Vec<String>,
    },

    /// The transcoder did not exit within the allowed time and was killed.
    #[error("Transcoder timed out after {timeout_secs}s")]
    TimedOut { timeout_secs: u64, tail: Vec<String> },

    /// The run was interrupted by a shutdown request.
    #[error("Encode cancelled")]
    Cancelled,

    /// The transcoder could not be started.
    #[error("Failed to start transcoder: {0}")]
    Spawn(#[from] MediaError),

    /// Reading the diagnostic stream or waiting on the process failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EncodeError {
    pub fn failed(exit_code: Option<i32>, tail: Vec<String>) -> Self {
        Self::Failed { exit_code, tail }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Diagnostic lines captured before the failure, if any.
    pub fn tail(&self) -> &[String] {
        match self {
            Self::Failed { tail, .. } | Self::TimedOut { tail, .. } => tail,
            _ => &[],
        }
    }
}

/// Returns the last `n` entries of `lines`.
pub(crate) fn tail_lines(lines: &[String], n: usize) -> Vec<String> {
    lines[lines.len().saturating_sub(n)..].to_vec()
}
