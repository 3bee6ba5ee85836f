//! Seams to the external media tools (prober and transcoder).
//!
//! Everything that shells out to ffmpeg/ffprobe goes through the traits in
//! this module, so the rest of the pipeline can be exercised with mocks.

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::ToolConfig;
pub use error::MediaError;
pub use ffmpeg::FfmpegTool;
pub use traits::{MediaProber, TranscodeProcess, Transcoder};
pub use types::{parse_frame_rate, MediaDescriptor, ToolOutput};
