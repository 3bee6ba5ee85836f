//! Batch orchestration.
//!
//! [`SpotlightProcessor`] runs each file through probe → geometry → overlays →
//! encode → size limit, and fans a batch out over a semaphore-bounded pool of
//! tokio tasks, one per transcoder child.
//!
//! # Example
//!
//! ```ignore
//! use spotlight_core::batch::{discover_videos, SpotlightProcessor};
//! use spotlight_core::config::Config;
//!
//! let processor = SpotlightProcessor::with_ffmpeg(Config::default());
//! let files = discover_videos("input".as_ref()).await?
//!     .into_iter()
//!     .map(|v| v.path)
//!     .collect();
//!
//! let summary = processor
//!     .process_batch(files, "output".as_ref(), Some(4), 10.0)
//!     .await?;
//! println!("{}", summary);
//! ```

mod config;
mod discovery;
mod error;
mod processor;
mod types;

pub use config::BatchConfig;
pub use discovery::{
    discover_videos, generate_samples, is_video_file, sample_args, select_videos, VideoFile,
    SAMPLE_VIDEOS, VIDEO_EXTENSIONS,
};
pub use error::{BatchError, JobError};
pub use processor::SpotlightProcessor;
pub use types::{BatchSummary, EncodeJob, JobResult};
