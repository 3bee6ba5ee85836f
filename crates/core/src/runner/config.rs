//! Configuration for the progress-tracked runner.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds and timeouts for a transcoder run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Progress at which the transcoder is asked to finalize.
    #[serde(default = "default_completion_threshold")]
    pub completion_threshold_percent: f64,

    /// Minimum progress change that triggers a redraw.
    #[serde(default = "default_render_delta")]
    pub render_delta_percent: f64,

    /// Silence after completion that ends the read loop.
    #[serde(default = "default_finalize_idle")]
    pub finalize_idle_secs: u64,

    /// Lower bound of the exit wait, scaled to twice the source duration.
    #[serde(default = "default_exit_timeout_floor")]
    pub exit_timeout_floor_secs: u64,

    /// Diagnostic lines surfaced on failure.
    #[serde(default = "default_error_tail_lines")]
    pub error_tail_lines: usize,
}

fn default_completion_threshold() -> f64 {
    99.5
}

fn default_render_delta() -> f64 {
    0.1
}

fn default_finalize_idle() -> u64 {
    30
}

fn default_exit_timeout_floor() -> u64 {
    300
}

fn default_error_tail_lines() -> usize {
    10
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            completion_threshold_percent: default_completion_threshold(),
            render_delta_percent: default_render_delta(),
            finalize_idle_secs: default_finalize_idle(),
            exit_timeout_floor_secs: default_exit_timeout_floor(),
            error_tail_lines: default_error_tail_lines(),
        }
    }
}

impl RunnerConfig {
    /// Exit wait for a source of `duration_secs`: `max(floor, 2 × duration)`.
    pub fn exit_timeout(&self, duration_secs: f64) -> Duration {
        let floor = self.exit_timeout_floor_secs as f64;
        let scaled = if duration_secs > 0.0 {
            duration_secs * 2.0
        } else {
            0.0
        };
        Duration::from_secs_f64(floor.max(scaled))
    }

    pub fn finalize_idle(&self) -> Duration {
        Duration::from_secs(self.finalize_idle_secs)
    }
}
