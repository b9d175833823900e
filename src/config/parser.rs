use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Missing sections and keys take their defaults.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use channel_harvest::config::load_config;
///
/// let config = load_config(Path::new("harvest.toml")).unwrap();
/// println!("Method: {}", config.harvest.method);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    validate(&config)?;
    Ok(config)
}

/// Parses TOML text into a configuration without validating it
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Computes a SHA-256 hash of the effective configuration
///
/// The configuration is serialized back to TOML first, so command-line
/// overrides and defaults are part of the hash while formatting and
/// comments of the file are not. Stored with every run to detect a changed
/// configuration on resume.
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash
/// * `Err(ConfigError)` - The configuration could not be serialized
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let canonical = toml::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HarvestMethod;
    use crate::plan::Granularity;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[harvest]
method = "cc-index"
year = 2024
batch-size = 250
patterns = ["*.youtube.com/@*"]

[index]
max-attempts = 3
collinfo-path = "./collinfo.json"

[user-agent]
crawler-name = "TestHarvester"
crawler-version = "1.0"
contact-url = "https://example.com/about"
contact-email = "admin@example.com"

[sink]
database-path = "./test.db"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.harvest.method, HarvestMethod::CcIndex);
        assert_eq!(config.harvest.year, Some(2024));
        assert_eq!(config.harvest.batch_size, 250);
        assert_eq!(config.index.max_attempts, 3);
        assert_eq!(config.index.collinfo_path.as_deref(), Some("./collinfo.json"));
        assert_eq!(config.user_agent.crawler_name, "TestHarvester");
        assert_eq!(config.sink.database_path, "./test.db");
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let file = create_temp_config(
            r#"
[harvest]
start-date = "2024-01-01"
end-date = "2024-03-31"
granularity = "days:7"
"#,
        );
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.harvest.method, HarvestMethod::Wayback);
        assert_eq!(config.harvest.granularity, Granularity::Days(7));
        assert_eq!(config.index.cdx_match_type, "prefix");
        assert_eq!(config.harvest.batch_size, 500);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_unknown_granularity_is_parse_error() {
        let result = parse_config("[harvest]\ngranularity = \"fortnight\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[harvest]\nbatch-size = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_config_hash_tracks_effective_values() {
        let config = parse_config("[harvest]\nbatch-size = 100\n").unwrap();
        let reformatted = parse_config("# comment\n[harvest]\nbatch-size    =    100\n").unwrap();

        let hash1 = compute_config_hash(&config).unwrap();
        let hash2 = compute_config_hash(&reformatted).unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);

        let mut changed = config.clone();
        changed.harvest.batch_size = 101;
        assert_ne!(hash1, compute_config_hash(&changed).unwrap());
    }
}
