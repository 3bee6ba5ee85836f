//! Types for the batch module.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::encoder::{CapabilitySnapshot, EncodeSettings};
use crate::runner::format_duration;

/// One source file to normalize.
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub settings: EncodeSettings,
    /// Shared host snapshot, detected once per batch.
    pub capabilities: Arc<CapabilitySnapshot>,
    pub max_output_size_mb: f64,
}

impl EncodeJob {
    /// Source file name, used as the job label.
    pub fn filename(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.source_path.display().to_string())
    }
}

/// Outcome of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResult {
    pub filename: String,
    pub succeeded: bool,
    pub processing_time_secs: f64,
    /// Size of the output left on disk, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_size_mb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Transcoder lines surfaced for a failed job.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl JobResult {
    pub fn success(filename: impl Into<String>, processing_time_secs: f64, final_size_mb: f64) -> Self {
        Self {
            filename: filename.into(),
            succeeded: true,
            processing_time_secs,
            final_size_mb: Some(final_size_mb),
            error: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn failure(
        filename: impl Into<String>,
        processing_time_secs: f64,
        error: impl Into<String>,
        diagnostics: Vec<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            succeeded: false,
            processing_time_secs,
            final_size_mb: None,
            error: Some(error.into()),
            diagnostics,
        }
    }

    pub fn with_final_size(mut self, final_size_mb: f64) -> Self {
        self.final_size_mb = Some(final_size_mb);
        self
    }
}

/// Aggregate of a finished batch.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub total_elapsed: Duration,
    /// Results ordered by file name.
    pub results: Vec<JobResult>,
    pub started_at: DateTime<Utc>,
}

impl BatchSummary {
    /// Builds a summary. The outcome does not depend on completion order.
    pub fn from_results(
        mut results: Vec<JobResult>,
        started_at: DateTime<Utc>,
        total_elapsed: Duration,
    ) -> Self {
        results.sort_by(|a, b| a.filename.cmp(&b.filename));
        let succeeded = results.iter().filter(|r| r.succeeded).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
            total_elapsed,
            results,
            started_at,
        }
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Mean processing time of successful jobs.
    pub fn average_secs_per_success(&self) -> Option<f64> {
        if self.succeeded == 0 {
            return None;
        }
        let total: f64 = self
            .results
            .iter()
            .filter(|r| r.succeeded)
            .map(|r| r.processing_time_secs)
            .sum();
        Some(total / self.succeeded as f64)
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processing complete: {} succeeded, {} failed", self.succeeded, self.failed)?;
        write!(
            f,
            "Total processing time: {}",
            format_duration(self.total_elapsed.as_secs_f64())
        )?;
        if let Some(avg) = self.average_secs_per_success() {
            write!(f, "\nAverage time per video: {}", format_duration(avg))?;
        }
        for result in self.results.iter().filter(|r| !r.succeeded) {
            write!(
                f,
                "\n  failed: {} ({})",
                result.filename,
                result.error.as_deref().unwrap_or("unknown error")
            )?;
        }
        Ok(())
    }
}
