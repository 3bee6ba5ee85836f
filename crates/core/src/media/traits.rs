//! Trait definitions for the external media tools.
//!
//! The prober and transcoder are collaborators behind narrow seams so the
//! pipeline can run against [`crate::testing::MockTranscoder`] without any
//! binaries installed.

use async_trait::async_trait;
use std::path::Path;

use super::error::MediaError;
use super::types::{MediaDescriptor, ToolOutput};

/// Describes the first video stream of a media file.
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<MediaDescriptor, MediaError>;
}

/// Runs the transcoder binary.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Returns the name of this transcoder implementation.
    fn name(&self) -> &str;

    /// Runs the transcoder to completion and captures its output.
    async fn invoke(&self, args: &[String]) -> Result<ToolOutput, MediaError>;

    /// Spawns the transcoder with its diagnostic stream exposed line by line.
    async fn spawn(&self, args: &[String]) -> Result<Box<dyn TranscodeProcess>, MediaError>;
}

/// A running transcoder process.
#[async_trait]
pub trait TranscodeProcess: Send {
    /// Next line of the diagnostic stream, `None` at end of stream.
    async fn next_line(&mut self) -> std::io::Result<Option<String>>;

    /// Asks the process to finish writing its output and exit.
    async fn request_stop(&mut self) -> std::io::Result<()>;

    /// Waits for exit and returns the exit code (`None` if killed by a signal).
    async fn wait(&mut self) -> std::io::Result<Option<i32>>;

    /// Forcibly terminates the process.
    async fn kill(&mut self) -> std::io::Result<()>;
}
