use super::{types::Config, ConfigError};

fn invalid(message: impl Into<String>) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.into()))
}

/// Validate configuration
/// Currently validates:
/// - Size budget is positive
/// - Bitrate bounds are positive and ordered
/// - Retry factor and safety margin are within (0, 1]
/// - Worker count, hardware ceiling and attempts are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.encode.max_output_size_mb <= 0.0 {
        return invalid("encode.max_output_size_mb must be greater than 0");
    }

    let sizing = &config.sizing;
    if sizing.min_bitrate_kbps <= 0.0 {
        return invalid("sizing.min_bitrate_kbps must be greater than 0");
    }
    if sizing.min_bitrate_kbps > sizing.max_bitrate_kbps {
        return invalid(format!(
            "sizing.min_bitrate_kbps ({}) exceeds sizing.max_bitrate_kbps ({})",
            sizing.min_bitrate_kbps, sizing.max_bitrate_kbps
        ));
    }
    if !(sizing.retry_factor > 0.0 && sizing.retry_factor <= 1.0) {
        return invalid("sizing.retry_factor must be in (0, 1]");
    }
    if !(sizing.safety_margin > 0.0 && sizing.safety_margin <= 1.0) {
        return invalid("sizing.safety_margin must be in (0, 1]");
    }
    if sizing.max_attempts == 0 {
        return invalid("sizing.max_attempts cannot be 0");
    }

    if config.hardware.max_width == 0 || config.hardware.max_height == 0 {
        return invalid("hardware.max_width and hardware.max_height cannot be 0");
    }

    if config.batch.workers == Some(0) {
        return invalid("batch.workers cannot be 0");
    }

    let runner = &config.runner;
    if !(runner.completion_threshold_percent > 0.0 && runner.completion_threshold_percent <= 100.0) {
        return invalid("runner.completion_threshold_percent must be in (0, 100]");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_zero_budget_fails() {
        let mut config = Config::default();
        config.encode.max_output_size_mb = 0.0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_inverted_bitrate_bounds_fails() {
        let mut config = Config::default();
        config.sizing.min_bitrate_kbps = 6000.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_retry_factor_range() {
        let mut config = Config::default();
        config.sizing.retry_factor = 1.0;
        assert!(validate_config(&config).is_ok());
        config.sizing.retry_factor = 1.2;
        assert!(validate_config(&config).is_err());
        config.sizing.retry_factor = 0.0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_workers_fails() {
        let mut config = Config::default();
        config.batch.workers = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_hardware_ceiling_fails() {
        let mut config = Config::default();
        config.hardware.max_height = 0;
        assert!(validate_config(&config).is_err());
    }
}
