use serde::{Deserialize, Serialize};

use crate::batch::BatchConfig;
use crate::encoder::{EncodeSettings, HardwareConfig};
use crate::media::ToolConfig;
use crate::overlay::DEFAULT_BORDER_RGBA;
use crate::runner::RunnerConfig;
use crate::sizing::SizingConfig;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolConfig,
    #[serde(default)]
    pub encode: EncodeSettings,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub batch: BatchConfig,
}

/// Overlay appearance
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OverlayConfig {
    /// Border colour as `[r, g, b, a]`.
    #[serde(default = "default_border_rgba")]
    pub border_rgba: [u8; 4],
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            border_rgba: default_border_rgba(),
        }
    }
}

fn default_border_rgba() -> [u8; 4] {
    DEFAULT_BORDER_RGBA
}
