//! Progress-tracked execution of the transcoder.
//!
//! [`ProgressRunner`] spawns the transcoder through the [`crate::media::Transcoder`]
//! seam and walks it through
//! `Starting → Running → CompletionDetected → Finalizing → {Succeeded, Failed, TimedOut}`.
//!
//! - Each diagnostic line goes through a [`ProgressParser`]; the bar is
//!   redrawn only when progress moves by at least `render_delta_percent`.
//! - At `completion_threshold_percent` the runner asks the transcoder to
//!   finalize, then reads until the closing summary or `finalize_idle_secs`
//!   of silence.
//! - The exit wait is bounded by `max(exit_timeout_floor_secs, 2 × duration)`.
//! - A [`Shutdown`] notification kills the child and yields
//!   [`EncodeError::Cancelled`].

mod config;
mod error;
mod process;
mod progress;
mod shutdown;

pub use config::RunnerConfig;
pub use error::EncodeError;
pub use process::{ProgressRunner, RunOutcome, RunState};
pub use progress::{
    format_duration, FfmpegStatsParser, ProgressDisplay, ProgressParser, ProgressSample,
    RunProgress,
};
pub use shutdown::Shutdown;
