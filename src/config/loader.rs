//! Configuration loading from disk.

use std::path::Path;
use std::fs;
use crate::config::schema::PipelineConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 { write!(f, ", ")?; }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<PipelineConfig, ConfigError> {
    let config: PipelineConfig = toml::from_str(content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load the file when given, otherwise validated defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<PipelineConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => {
            let config = PipelineConfig::default();
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [gateway]
            bind_address = "0.0.0.0:9000"
            fallback_identifiers = ["fair"]
            "#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.gateway.bind_address, "0.0.0.0:9000");
        assert_eq!(config.gateway.fallback_identifiers, vec!["fair"]);
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[engine\nbroken").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_display() {
        let err = parse_config("[engine]\nlookup_timeout_ms = 0\n").unwrap_err();
        let text = err.to_string();
        assert!(text.starts_with("Validation failed: "), "{}", text);
        assert!(text.contains("engine.lookup_timeout_ms"));
    }

    #[test]
    fn test_demo_config_is_valid() {
        let config = parse_config(include_str!("../../demos/pipeline.toml")).unwrap();
        assert_eq!(config.spec_store.specifications_path.as_deref(), Some("demos/dice.json"));
        assert_eq!(config.simulator.dice.len(), 4);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
