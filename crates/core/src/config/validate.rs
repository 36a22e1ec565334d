use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Document timeout is not 0 (transcode and archive runs may be unbounded)
/// - Scheduler event buffer is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.tools.document_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "tools.document_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.scheduler.event_buffer == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.event_buffer cannot be 0".to_string(),
        ));
    }

    Ok(())
}
