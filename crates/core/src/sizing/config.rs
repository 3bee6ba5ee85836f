//! Configuration for the size-constrained re-encode.

use serde::{Deserialize, Serialize};

/// Bitrate targeting and retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizingConfig {
    /// AAC bitrate used while re-encoding to fit the budget.
    #[serde(default = "default_constrained_audio")]
    pub constrained_audio_bitrate_kbps: u32,

    /// Fraction of the computed video bitrate actually requested.
    #[serde(default = "default_safety_margin")]
    pub safety_margin: f64,

    #[serde(default = "default_min_bitrate")]
    pub min_bitrate_kbps: f64,

    #[serde(default = "default_max_bitrate")]
    pub max_bitrate_kbps: f64,

    /// Budget multiplier applied before each retry.
    #[serde(default = "default_retry_factor")]
    pub retry_factor: f64,

    /// Re-encode attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_constrained_audio() -> u32 {
    128
}

fn default_safety_margin() -> f64 {
    0.90
}

fn default_min_bitrate() -> f64 {
    500.0
}

fn default_max_bitrate() -> f64 {
    5000.0
}

fn default_retry_factor() -> f64 {
    0.95
}

fn default_max_attempts() -> u32 {
    2
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            constrained_audio_bitrate_kbps: default_constrained_audio(),
            safety_margin: default_safety_margin(),
            min_bitrate_kbps: default_min_bitrate(),
            max_bitrate_kbps: default_max_bitrate(),
            retry_factor: default_retry_factor(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SizingConfig::default();
        assert_eq!(config.constrained_audio_bitrate_kbps, 128);
        assert_eq!(config.retry_factor, 0.95);
        assert_eq!(config.max_attempts, 2);
        assert_eq!((config.min_bitrate_kbps, config.max_bitrate_kbps), (500.0, 5000.0));
    }

    #[test]
    fn test_override_retry_factor() {
        let config: SizingConfig = toml::from_str("retry_factor = 0.8").unwrap();
        assert_eq!(config.retry_factor, 0.8);
        assert_eq!(config.safety_margin, 0.90);
    }
}
