//! Two-pass re-encode loop that brings an output under its size budget.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{info, warn};

use super::bitrate::{target_bitrate, BYTES_PER_MB};
use super::config::SizingConfig;
use crate::encoder::EncodeCommandBuilder;
use crate::runner::{EncodeError, ProgressRunner, Shutdown};

/// Errors from enforcing the size budget.
#[derive(Debug, Error)]
pub enum SizingError {
    /// Every allowed attempt still produced an oversized file.
    #[error("Output is {final_size_mb:.2} MB after {attempts} re-encode attempts, limit is {budget_mb} MB")]
    Unmet {
        final_size_mb: f64,
        budget_mb: f64,
        attempts: u32,
    },

    /// A pass of the re-encode failed.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Measuring, copying, or staging files failed.
    #[error("I/O error during re-encode of {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SizingError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of a size check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeReport {
    pub initial_size_mb: f64,
    pub final_size_mb: f64,
    /// Re-encode attempts performed (0 when already within budget).
    pub attempts: u32,
}

impl SizeReport {
    pub fn reencoded(&self) -> bool {
        self.attempts > 0
    }
}

/// Size of `path` in megabytes.
pub async fn file_size_mb(path: &Path) -> Result<f64, std::io::Error> {
    let metadata = tokio::fs::metadata(path).await?;
    Ok(metadata.len() as f64 / BYTES_PER_MB)
}

/// Enforces the size budget on freshly encoded outputs.
pub struct SizeLimiter<'a> {
    runner: &'a ProgressRunner,
    config: &'a SizingConfig,
    temp_root: &'a Path,
}

impl<'a> SizeLimiter<'a> {
    pub fn new(runner: &'a ProgressRunner, config: &'a SizingConfig, temp_root: &'a Path) -> Self {
        Self {
            runner,
            config,
            temp_root,
        }
    }

    async fn work_dir(&self) -> Result<TempDir, SizingError> {
        tokio::fs::create_dir_all(self.temp_root)
            .await
            .map_err(|e| SizingError::io(self.temp_root, e))?;
        tempfile::Builder::new()
            .prefix("reencode-")
            .tempdir_in(self.temp_root)
            .map_err(|e| SizingError::io(self.temp_root, e))
    }

    /// Measures `output` and, if it exceeds `budget_mb`, re-encodes it in place.
    ///
    /// The oversized copy and pass logs live in a private directory removed on
    /// return. Each attempt after the first targets `retry_factor` times the
    /// previous target, while success is always judged against `budget_mb`.
    pub async fn enforce(
        &self,
        output: &Path,
        builder: &EncodeCommandBuilder<'_>,
        duration_secs: f64,
        budget_mb: f64,
        shutdown: &mut Shutdown,
    ) -> Result<SizeReport, SizingError> {
        let label = output
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let initial_size_mb = file_size_mb(output)
            .await
            .map_err(|e| SizingError::io(output, e))?;
        if initial_size_mb <= budget_mb {
            info!(file = %label, size_mb = format!("{:.2}", initial_size_mb), "Output within size limit");
            return Ok(SizeReport {
                initial_size_mb,
                final_size_mb: initial_size_mb,
                attempts: 0,
            });
        }

        warn!(
            file = %label,
            size_mb = format!("{:.2}", initial_size_mb),
            budget_mb,
            "Output exceeds size limit by {:.2} MB",
            initial_size_mb - budget_mb
        );

        let work_dir = self.work_dir().await?;
        let extension = output
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        let oversized = work_dir.path().join(format!("oversized.{}", extension));
        tokio::fs::copy(output, &oversized)
            .await
            .map_err(|e| SizingError::io(&oversized, e))?;
        let passlog = work_dir.path().join("passlog");

        let audio_kbps = self.config.constrained_audio_bitrate_kbps;
        let mut target_mb = budget_mb;
        let mut final_size_mb = initial_size_mb;

        for attempt in 1..=self.config.max_attempts {
            let bitrate = target_bitrate(self.config, duration_secs, target_mb, audio_kbps);
            let command =
                builder.two_pass(&oversized, output, &passlog, bitrate as u32, audio_kbps);
            info!(
                file = %label,
                attempt,
                target_mb = format!("{:.2}", target_mb),
                bitrate_kbps = command.bitrate_kbps,
                encoder = %command.encoder,
                "Re-encoding to meet size limit"
            );

            self.runner
                .run(
                    &format!("{} (pass 1/2)", label),
                    &command.analysis,
                    duration_secs,
                    shutdown,
                )
                .await?;
            self.runner
                .run(
                    &format!("{} (pass 2/2)", label),
                    &command.encode,
                    duration_secs,
                    shutdown,
                )
                .await?;

            final_size_mb = file_size_mb(output)
                .await
                .map_err(|e| SizingError::io(output, e))?;
            if final_size_mb <= budget_mb {
                info!(
                    file = %label,
                    "Reduced from {:.2} MB to {:.2} MB",
                    initial_size_mb,
                    final_size_mb
                );
                return Ok(SizeReport {
                    initial_size_mb,
                    final_size_mb,
                    attempts: attempt,
                });
            }

            warn!(
                file = %label,
                attempt,
                size_mb = format!("{:.2}", final_size_mb),
                "Size still exceeds limit"
            );
            target_mb *= self.config.retry_factor;
        }

        Err(SizingError::Unmet {
            final_size_mb,
            budget_mb,
            attempts: self.config.max_attempts,
        })
    }
}
