use std::time::Duration;

use crate::config::ConfigProvider;
use crate::error::ConfigError;

/// Section holding the database settings
pub const DATABASE_SECTION: &str = "DatabaseMaqs";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_POOL_SIZE: u32 = 1;

/// Database driver settings
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub connection_string: String,
    /// Provider name looked up in the provider registry
    pub provider: String,
    pub timeout: Duration,
    pub pool_size: u32,
}

impl DatabaseConfig {
    pub fn new(provider: impl Into<String>, connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            provider: provider.into(),
            timeout: DEFAULT_TIMEOUT,
            pool_size: DEFAULT_POOL_SIZE,
        }
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn from_provider(config: &dyn ConfigProvider) -> Result<Self, ConfigError> {
        let connection_string = config.get_required(DATABASE_SECTION, "DataBaseConnectionString")?;
        let provider = config.get_required(DATABASE_SECTION, "DataBaseProviderType")?;
        let timeout = config.get_duration_secs(DATABASE_SECTION, "DatabaseTimeout", DEFAULT_TIMEOUT)?;

        let pool_size = match config.get_value(DATABASE_SECTION, "DatabasePoolSize") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "DatabasePoolSize".to_string(),
                        value: raw,
                        reason: "expected a positive integer".to_string(),
                    })
                }
            },
            None => DEFAULT_POOL_SIZE,
        };

        Ok(Self {
            connection_string,
            provider,
            timeout,
            pool_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_from_provider() {
        let config = Config::new().with_section(
            DATABASE_SECTION,
            [
                ("DataBaseConnectionString", "sqlite::memory:"),
                ("DataBaseProviderType", "SQLITE"),
                ("DatabaseTimeout", "5"),
                ("DatabasePoolSize", "4"),
            ],
        );

        let settings = DatabaseConfig::from_provider(&config).unwrap();
        assert_eq!(settings.connection_string, "sqlite::memory:");
        assert_eq!(settings.provider, "SQLITE");
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(settings.pool_size, 4);
    }

    #[test]
    fn test_required_values_and_pool_size_validation() {
        let missing = Config::new().with_value(DATABASE_SECTION, "DataBaseProviderType", "sqlite");
        assert!(matches!(
            DatabaseConfig::from_provider(&missing),
            Err(ConfigError::MissingValue { ref key, .. }) if key == "DataBaseConnectionString"
        ));

        let zero = missing
            .with_value(DATABASE_SECTION, "DataBaseConnectionString", "sqlite::memory:")
            .with_value(DATABASE_SECTION, "DatabasePoolSize", "0");
        assert!(matches!(
            DatabaseConfig::from_provider(&zero),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
