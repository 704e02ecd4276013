use super::{types::PostprocConfig, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Max picture and output dimensions are positive
/// - Default JPEG quality is within 1..=100
/// - Tag capacity is not 0
pub fn validate_config(config: &PostprocConfig) -> Result<(), ConfigError> {
    if !config.max_picture.is_positive() {
        return Err(ConfigError::ValidationError(format!(
            "max_picture must be positive, got {}",
            config.max_picture
        )));
    }

    if !config.output_dimensions.is_positive() {
        return Err(ConfigError::ValidationError(format!(
            "output_dimensions must be positive, got {}",
            config.output_dimensions
        )));
    }

    if !(1..=100).contains(&config.default_quality) {
        return Err(ConfigError::ValidationError(format!(
            "default_quality must be within 1..=100, got {}",
            config.default_quality
        )));
    }

    if config.tag_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "tag_capacity cannot be 0".to_string(),
        ));
    }

    Ok(())
}
