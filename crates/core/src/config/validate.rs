use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - ffmpeg path is not empty
/// - logging filter is not empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.ffmpeg.ffmpeg_path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "ffmpeg.ffmpeg_path cannot be empty".to_string(),
        ));
    }

    if config.logging.filter.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "logging.filter cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LoggingConfig;
    use crate::transcoder::TranscoderConfig;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_empty_ffmpeg_path_fails() {
        let config = Config {
            ffmpeg: TranscoderConfig::default().with_ffmpeg_path(""),
            logging: LoggingConfig::default(),
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_blank_filter_fails() {
        let config = Config {
            logging: LoggingConfig {
                filter: "  ".to_string(),
                json: false,
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }
}
