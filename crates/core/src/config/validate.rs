use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - ffmpeg path is not empty
/// - Segment buffer is not 0
/// - Segment prefix is not empty
/// - The job's transcode invariants (boundaries, profiles)
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.encoder.ffmpeg_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "encoder.ffmpeg_path cannot be empty".to_string(),
        ));
    }

    if config.encoder.segment_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "encoder.segment_buffer cannot be 0".to_string(),
        ));
    }

    if config.job.segment_prefix.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "job.segment_prefix cannot be empty".to_string(),
        ));
    }

    config
        .job
        .boundaries()
        .map_err(|e| ConfigError::ValidationError(format!("job: {}", e)))?;

    Ok(())
}
