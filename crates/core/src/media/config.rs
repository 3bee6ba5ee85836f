use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where to find ffmpeg and ffprobe. Bare names are resolved through `PATH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self::with_paths("ffmpeg", "ffprobe")
    }
}

impl ToolConfig {
    pub fn with_paths(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg.into(),
            ffprobe_path: ffprobe.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve_through_path() {
        let config = ToolConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
    }

    #[test]
    fn test_partial_toml_keeps_other_default() {
        let config: ToolConfig = toml::from_str(r#"ffmpeg_path = "/opt/bin/ffmpeg""#).unwrap();
        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/bin/ffmpeg"));
        assert_eq!(config.ffprobe_path, PathBuf::from("ffprobe"));
    }
}
