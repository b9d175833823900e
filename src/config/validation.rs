use crate::config::types::{Config, HarvestConfig, HarvestMethod, IndexConfig, SinkConfig, UserAgentConfig};
use crate::plan::Granularity;
use crate::ConfigError;
use url::Url;

/// Largest accepted batch size
const MAX_BATCH_SIZE: usize = 10_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvest_config(&config.harvest)?;
    validate_index_config(&config.index)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_sink_config(&config.sink)?;
    Ok(())
}

/// Validates harvest configuration
fn validate_harvest_config(config: &HarvestConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 || config.batch_size > MAX_BATCH_SIZE {
        return Err(ConfigError::Validation(format!(
            "batch_size must be between 1 and {}, got {}",
            MAX_BATCH_SIZE, config.batch_size
        )));
    }

    if config.page_size < 1 {
        return Err(ConfigError::Validation(
            "page_size must be >= 1".to_string(),
        ));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1".to_string(),
        ));
    }

    if config.granularity == Granularity::Days(0) {
        return Err(ConfigError::Validation(
            "granularity window must be at least one day".to_string(),
        ));
    }

    if let (Some(start), Some(end)) = (config.start_date, config.end_date) {
        if start > end {
            return Err(ConfigError::Validation(format!(
                "start_date {} is after end_date {}",
                start, end
            )));
        }
    }

    if config.method == HarvestMethod::CcIndex {
        match config.year {
            None => {
                return Err(ConfigError::Validation(
                    "year is required for the cc-index method".to_string(),
                ))
            }
            Some(year) if !(1990..=9999).contains(&year) => {
                return Err(ConfigError::InvalidValue(format!(
                    "year must be a 4-digit year, got {}",
                    year
                )))
            }
            Some(_) => {}
        }
    }

    for pattern in &config.patterns {
        if pattern.trim().is_empty() || pattern.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "pattern '{}' must be non-empty and contain no whitespace",
                pattern
            )));
        }
    }

    Ok(())
}

/// Validates index endpoints and retry bounds
fn validate_index_config(config: &IndexConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("cc_index_url", &config.cc_index_url),
        ("collinfo_url", &config.collinfo_url),
        ("cdx_url", &config.cdx_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl(format!(
                "{} must use http or https, got '{}'",
                name, value
            )));
        }
    }

    if !matches!(
        config.cdx_match_type.as_str(),
        "exact" | "prefix" | "host" | "domain"
    ) {
        return Err(ConfigError::InvalidValue(format!(
            "cdx_match_type must be one of exact, prefix, host, domain; got '{}'",
            config.cdx_match_type
        )));
    }

    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(
            "max_attempts must be >= 1".to_string(),
        ));
    }

    if config.initial_backoff_ms > config.max_backoff_ms {
        return Err(ConfigError::Validation(format!(
            "initial_backoff_ms ({}) cannot exceed max_backoff_ms ({})",
            config.initial_backoff_ms, config.max_backoff_ms
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "request_timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    if config.crawler_version.is_empty() || config.crawler_version.chars().any(char::is_whitespace) {
        return Err(ConfigError::Validation(format!(
            "crawler_version must be non-empty without whitespace, got '{}'",
            config.crawler_version
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates sink configuration
fn validate_sink_config(config: &SinkConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    // Domain part should contain at least one dot
    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_batch_size_bounds() {
        let mut config = Config::default();
        config.harvest.batch_size = 0;
        assert!(validate(&config).is_err());
        config.harvest.batch_size = MAX_BATCH_SIZE + 1;
        assert!(validate(&config).is_err());
        config.harvest.batch_size = MAX_BATCH_SIZE;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_cc_index_requires_year() {
        let mut config = Config::default();
        config.harvest.method = HarvestMethod::CcIndex;
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));

        config.harvest.year = Some(24);
        assert!(matches!(validate(&config), Err(ConfigError::InvalidValue(_))));

        config.harvest.year = Some(2024);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_start_after_end() {
        let mut config = Config::default();
        config.harvest.start_date = NaiveDate::from_ymd_opt(2024, 2, 1);
        config.harvest.end_date = NaiveDate::from_ymd_opt(2024, 1, 1);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_backoff_bounds() {
        let mut config = Config::default();
        config.index.initial_backoff_ms = 120_000;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.index.max_attempts = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_endpoint_urls() {
        let mut config = Config::default();
        config.index.cdx_url = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));

        let mut config = Config::default();
        config.index.cc_index_url = "ftp://index.example.org".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_patterns() {
        let mut config = Config::default();
        config.harvest.patterns = vec!["youtube.com/@".to_string(), " ".to_string()];
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_crawler_name() {
        let mut config = Config::default();
        config.user_agent.crawler_name = "bad name!".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@c.com").is_err());
    }
}
