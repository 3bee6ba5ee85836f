//! Error types for the batch module.

use std::path::PathBuf;
use thiserror::Error;

use super::types::JobResult;
use crate::media::MediaError;
use crate::overlay::OverlayError;
use crate::runner::EncodeError;
use crate::sizing::SizingError;

/// Errors that end a single job.
#[derive(Debug, Error)]
pub enum JobError {
    /// Probing the source failed.
    #[error("Could not get video info: {0}")]
    Media(#[from] MediaError),

    /// Rendering the mask or border failed.
    #[error("Failed to generate overlay assets: {0}")]
    Overlay(#[from] OverlayError),

    /// The transcoder failed, timed out, or could not start.
    #[error("Encoding failed: {0}")]
    Encode(EncodeError),

    /// The output stayed above its size budget after every re-encode.
    #[error("Failed to meet size requirements: {final_size_mb:.2} MB exceeds {budget_mb} MB")]
    SizeConstraintUnmet { final_size_mb: f64, budget_mb: f64 },

    /// An earlier video in the batch already writes the same output file.
    #[error("Output {} is already produced by {claimed_by}", path.display())]
    OutputConflict { path: PathBuf, claimed_by: String },

    /// The batch was interrupted.
    #[error("Job was cancelled")]
    Cancelled,

    /// Filesystem error outside the transcoder.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl JobError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Transcoder diagnostics worth showing alongside the error.
    pub fn diagnostics(&self) -> Vec<String> {
        match self {
            Self::Encode(e) => e.tail().to_vec(),
            _ => Vec::new(),
        }
    }
}

impl From<EncodeError> for JobError {
    fn from(err: EncodeError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::Encode(err)
        }
    }
}

impl From<SizingError> for JobError {
    fn from(err: SizingError) -> Self {
        match err {
            SizingError::Unmet {
                final_size_mb,
                budget_mb,
                ..
            } => Self::SizeConstraintUnmet {
                final_size_mb,
                budget_mb,
            },
            SizingError::Encode(e) => e.into(),
            SizingError::Io { path, source } => Self::Io { path, source },
        }
    }
}

/// Errors that end a whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Interrupted; `partial` holds the jobs that finished first.
    #[error("Batch cancelled after {} completed jobs", partial.len())]
    Cancelled { partial: Vec<JobResult> },

    /// The output folder could not be created.
    #[error("Failed to create output directory {path}: {source}")]
    OutputDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transcoder could not be started.
    #[error("Transcoder unavailable: {0}")]
    Tool(#[from] MediaError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_encode_maps_to_cancelled() {
        assert!(JobError::from(EncodeError::Cancelled).is_cancelled());
        let sizing = SizingError::Encode(EncodeError::Cancelled);
        assert!(JobError::from(sizing).is_cancelled());
    }

    #[test]
    fn test_unmet_keeps_sizes() {
        let err = JobError::from(SizingError::Unmet {
            final_size_mb: 11.5,
            budget_mb: 10.0,
            attempts: 2,
        });
        assert!(matches!(
            err,
            JobError::SizeConstraintUnmet { final_size_mb, budget_mb }
                if final_size_mb == 11.5 && budget_mb == 10.0
        ));
        assert!(err.to_string().contains("11.50 MB"));
    }

    #[test]
    fn test_diagnostics_come_from_encode_tail() {
        let err = JobError::from(EncodeError::failed(
            Some(1),
            vec!["Conversion failed!".to_string()],
        ));
        assert_eq!(err.diagnostics(), vec!["Conversion failed!".to_string()]);
        assert!(JobError::Cancelled.diagnostics().is_empty());
    }

    #[test]
    fn test_output_conflict_names_owner() {
        let err = JobError::OutputConflict {
            path: PathBuf::from("/out/a.mp4"),
            claimed_by: "a.mov".to_string(),
        };
        assert_eq!(err.to_string(), "Output /out/a.mp4 is already produced by a.mov");
        assert!(err.diagnostics().is_empty());
    }
}
