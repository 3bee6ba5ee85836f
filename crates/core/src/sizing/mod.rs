//! Size-constrained re-encoding.
//!
//! When an encoded output exceeds its budget, [`SizeLimiter`] re-encodes it
//! with a software two-pass encode at a bitrate computed by
//! [`target_bitrate`]. A second attempt targets a smaller size; after
//! `max_attempts` the job fails with [`SizingError::Unmet`].

mod bitrate;
mod config;
mod reencode;

pub use bitrate::{calculate_target_bitrate, target_bitrate, BYTES_PER_MB, FALLBACK_BITRATE_KBPS};
pub use config::SizingConfig;
pub use reencode::{file_size_mb, SizeLimiter, SizeReport, SizingError};
