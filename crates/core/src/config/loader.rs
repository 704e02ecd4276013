use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::PostprocConfig, ConfigError};

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<PostprocConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: PostprocConfig = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("CAMPOST_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<PostprocConfig, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionPolicy;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_empty_uses_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config.default_quality, 85);
        assert_eq!(config.tag_capacity, 23);
        assert_eq!(config.session_policy, SessionPolicy::AlwaysRecreate);
        assert_eq!(config.device.make, "QCOM-AA");
    }

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
default_quality = 92
session_policy = "reuse_when_unchanged"

[output_dimensions]
width = 1920
height = 1080

[device]
make = "Acme"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.default_quality, 92);
        assert_eq!(config.output_dimensions.width, 1920);
        assert_eq!(config.session_policy, SessionPolicy::ReuseWhenUnchanged);
        assert_eq!(config.device.make, "Acme");
        assert_eq!(config.device.model, "QCAM-AA");
    }

    #[test]
    fn test_load_config_from_str_bad_policy() {
        let toml = r#"session_policy = "sometimes""#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/campost.toml"));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
processor_name = "rear-camera"
tag_capacity = 30

[max_picture]
width = 4000
height = 3000
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.processor_name, "rear-camera");
        assert_eq!(config.tag_capacity, 30);
        assert_eq!(config.max_picture.width, 4000);
    }
}
