//! Video bitrate needed to land a file under a size budget.

use super::config::SizingConfig;

/// Bitrate used when the duration is unknown.
pub const FALLBACK_BITRATE_KBPS: f64 = 2000.0;

/// Bytes per megabyte, as used for all size budgets.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Target video bitrate (kbps) for `duration_secs` of media to fit in
/// `target_size_mb` next to an `audio_kbps` audio track, using the default
/// margin and clamp.
pub fn calculate_target_bitrate(duration_secs: f64, target_size_mb: f64, audio_kbps: u32) -> f64 {
    target_bitrate(&SizingConfig::default(), duration_secs, target_size_mb, audio_kbps)
}

/// Like [`calculate_target_bitrate`] with the margin and clamp from `config`.
pub fn target_bitrate(
    config: &SizingConfig,
    duration_secs: f64,
    target_size_mb: f64,
    audio_kbps: u32,
) -> f64 {
    if duration_secs <= 0.0 {
        return FALLBACK_BITRATE_KBPS;
    }

    let total_bits = target_size_mb * 8.0 * BYTES_PER_MB;
    let audio_bits = audio_kbps as f64 * 1000.0 * duration_secs;
    let video_bits = total_bits - audio_bits;
    let kbps = video_bits / duration_secs / 1000.0 * config.safety_margin;

    kbps.clamp(config.min_bitrate_kbps, config.max_bitrate_kbps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_minute_ten_megabytes() {
        let kbps = calculate_target_bitrate(60.0, 10.0, 192);
        assert!(kbps > 500.0 && kbps < 5000.0);
        // (10·8·1024·1024 − 192000·60) / 60 / 1000 · 0.90
        assert!((kbps - 1085.49).abs() < 0.1, "got {}", kbps);
    }

    #[test]
    fn test_clamped_low() {
        // Audio alone exceeds the budget.
        assert_eq!(calculate_target_bitrate(600.0, 1.0, 192), 500.0);
    }

    #[test]
    fn test_clamped_high() {
        assert_eq!(calculate_target_bitrate(1.0, 100.0, 128), 5000.0);
    }

    #[test]
    fn test_unknown_duration_falls_back() {
        assert_eq!(calculate_target_bitrate(0.0, 10.0, 128), FALLBACK_BITRATE_KBPS);
        assert_eq!(calculate_target_bitrate(-3.0, 10.0, 128), FALLBACK_BITRATE_KBPS);
    }

    #[test]
    fn test_smaller_target_lowers_bitrate() {
        let full = calculate_target_bitrate(60.0, 10.0, 128);
        let reduced = calculate_target_bitrate(60.0, 10.0 * 0.95, 128);
        assert!(reduced < full);
    }

    #[test]
    fn test_custom_margin() {
        let config = SizingConfig {
            safety_margin: 1.0,
            ..Default::default()
        };
        let kbps = target_bitrate(&config, 60.0, 10.0, 192);
        assert!((kbps - 1206.1).abs() < 0.1, "got {}", kbps);
    }
}
