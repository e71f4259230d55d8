//! Configuration validation.

use super::error::{ConfigError, ConfigResult};
use super::schema::{FerruleConfig, FunctionConfig, LogOutput, LoggingConfig};

/// Checks values the schema alone cannot rule out.
pub fn validate_config(config: &FerruleConfig) -> ConfigResult<()> {
    validate_function_config(&config.function)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_function_config(function: &FunctionConfig) -> ConfigResult<()> {
    if function.name.trim().is_empty() {
        return Err(ConfigError::missing_field("function.name"));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File {
        match &logging.file_path {
            None => return Err(ConfigError::missing_field("logging.file_path")),
            Some(path) if path.file_name().is_none() => {
                return Err(ConfigError::validation(format!(
                    "logging.file_path must name a file, got '{}'",
                    path.display()
                )));
            }
            Some(_) => {}
        }
    }

    if let Some(target) = logging.filters.keys().find(|target| target.trim().is_empty()) {
        return Err(ConfigError::validation(format!(
            "Log filter target may not be blank, got '{target}'"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogLevel;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&FerruleConfig::default()).is_ok());
    }

    #[test]
    fn test_blank_function_name() {
        let mut config = FerruleConfig::default();
        config.function.name = "  ".into();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "function.name"));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = FerruleConfig::default();
        config.logging.output = LogOutput::File;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField { field } if field == "logging.file_path"));

        config.logging.file_path = Some(PathBuf::from("/"));
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        config.logging.file_path = Some(PathBuf::from("logs/ferrule.log"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_blank_filter_target() {
        let mut config = FerruleConfig::default();
        config.logging.filters.insert(String::new(), LogLevel::Debug);
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }
}
