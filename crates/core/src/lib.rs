pub mod batch;
pub mod config;
pub mod encoder;
pub mod geometry;
pub mod media;
pub mod overlay;
pub mod runner;
pub mod sizing;
pub mod testing;

pub use batch::{
    discover_videos, select_videos, BatchError, BatchSummary, EncodeJob, JobError, JobResult,
    SpotlightProcessor,
};
pub use config::{
    load_config, load_config_from_str, load_config_with_defaults, validate_config, Config,
    ConfigError,
};
pub use encoder::{CapabilitySnapshot, EncodeSettings, OutputCodec, OutputFormat};
pub use geometry::{plan_geometry, GeometryPlan};
pub use media::{FfmpegTool, MediaDescriptor, MediaError, MediaProber, Transcoder};
pub use runner::{EncodeError, ProgressDisplay};
pub use sizing::{calculate_target_bitrate, SizingError};
