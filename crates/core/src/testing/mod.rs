//! Testing utilities and mock implementations.
//!
//! [`MockTranscoder`] stands in for both ffprobe and ffmpeg, so the whole
//! pipeline can be exercised without any media binaries installed.
//!
//! # Example
//!
//! ```rust,ignore
//! use spotlight_core::testing::{MockBehavior, MockTranscoder};
//!
//! let mock = MockTranscoder::new();
//! mock.set_output_sizes_mb("clip.mp4", &[14.0, 9.5]).await;
//! mock.set_behavior("broken", MockBehavior::Fail { exit_code: 1 }).await;
//! ```

mod mock_transcoder;

pub use mock_transcoder::{MockBehavior, MockTranscoder};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::media::MediaDescriptor;

    /// A descriptor with the given size and duration.
    pub fn descriptor(width: u32, height: u32, duration_secs: f64) -> MediaDescriptor {
        MediaDescriptor {
            width,
            height,
            codec_name: "h264".to_string(),
            duration_secs,
            frame_rate: 30.0,
        }
    }

    /// Creates an empty placeholder source file in `dir`.
    pub fn source_file(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"not really a video").expect("write fixture");
        path
    }
}
