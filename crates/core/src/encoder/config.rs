//! Configuration for the encode stage.

use serde::{Deserialize, Serialize};

use super::codec::{OutputCodec, OutputFormat};

/// Output settings for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodeSettings {
    /// Output video codec.
    #[serde(default)]
    pub codec: OutputCodec,

    /// Output container.
    #[serde(default)]
    pub format: OutputFormat,

    /// Size budget per output file in megabytes.
    #[serde(default = "default_max_output_size_mb")]
    pub max_output_size_mb: f64,

    /// AAC bitrate for the initial encode.
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate_kbps: u32,

    /// Audio sample rate in Hz.
    #[serde(default = "default_sample_rate")]
    pub audio_sample_rate_hz: u32,
}

fn default_max_output_size_mb() -> f64 {
    10.0
}

fn default_audio_bitrate() -> u32 {
    192
}

fn default_sample_rate() -> u32 {
    48_000
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            codec: OutputCodec::default(),
            format: OutputFormat::default(),
            max_output_size_mb: default_max_output_size_mb(),
            audio_bitrate_kbps: default_audio_bitrate(),
            audio_sample_rate_hz: default_sample_rate(),
        }
    }
}

/// Hardware encoder policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Allow hardware encoders at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Widest canvas the hardware encoder accepts.
    #[serde(default = "default_max_width")]
    pub max_width: u32,

    /// Tallest canvas the hardware encoder accepts.
    #[serde(default = "default_max_height")]
    pub max_height: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_max_width() -> u32 {
    4096
}

fn default_max_height() -> u32 {
    2304
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_width: default_max_width(),
            max_height: default_max_height(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = EncodeSettings::default();
        assert_eq!(settings.codec, OutputCodec::H264);
        assert_eq!(settings.format, OutputFormat::Mp4);
        assert_eq!(settings.max_output_size_mb, 10.0);
        assert_eq!(settings.audio_bitrate_kbps, 192);
        assert_eq!(settings.audio_sample_rate_hz, 48_000);
    }

    #[test]
    fn test_partial_settings_from_toml() {
        let settings: EncodeSettings = toml::from_str(
            r#"
            codec = "h265"
            max_output_size_mb = 25.0
            "#,
        )
        .unwrap();
        assert_eq!(settings.codec, OutputCodec::H265);
        assert_eq!(settings.format, OutputFormat::Mp4);
        assert_eq!(settings.max_output_size_mb, 25.0);
    }

    #[test]
    fn test_default_hardware_ceiling() {
        let hw = HardwareConfig::default();
        assert!(hw.enabled);
        assert_eq!((hw.max_width, hw.max_height), (4096, 2304));
    }
}
