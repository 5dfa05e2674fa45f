//! Configuration provider
//!
//! Settings are grouped into named sections of string key/value pairs. Files in
//! YAML, JSON or TOML are merged in load order (later files win) and environment
//! variables of the form `MAQS_<SECTION>__<KEY>` override anything loaded from disk.
//!
//! Components never read process-wide settings; they receive an
//! `Arc<dyn ConfigProvider>` and resolve the typed view they need.

use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::logging::{LogType, LoggingEnabled, MessageType};

/// Section holding the general framework settings
pub const GENERAL_SECTION: &str = "MagenicMaqs";

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "MAQS_";

/// Read access to configuration values
pub trait ConfigProvider: Send + Sync {
    /// Look up a raw value
    fn get_value(&self, section: &str, key: &str) -> Option<String>;

    /// Look up a value, falling back to `default` when absent
    fn get_value_or(&self, section: &str, key: &str, default: &str) -> String {
        self.get_value(section, key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Look up a value that must be present
    fn get_required(&self, section: &str, key: &str) -> Result<String, ConfigError> {
        self.get_value(section, key)
            .ok_or_else(|| ConfigError::MissingValue {
                section: section.to_string(),
                key: key.to_string(),
            })
    }

    /// Look up a duration expressed in milliseconds
    fn get_duration_ms(&self, section: &str, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        match self.get_value(section, key) {
            Some(raw) => parse_number(key, &raw).map(Duration::from_millis),
            None => Ok(default),
        }
    }

    /// Look up a duration expressed in seconds
    fn get_duration_secs(&self, section: &str, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        match self.get_value(section, key) {
            Some(raw) => parse_number(key, &raw).map(Duration::from_secs),
            None => Ok(default),
        }
    }

    /// Look up a YES/NO or true/false flag
    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get_value(section, key) {
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" | "1" => Ok(true),
                "no" | "false" | "0" => Ok(false),
                _ => Err(ConfigError::UnsupportedValue {
                    key: key.to_string(),
                    value: raw,
                }),
            },
            None => Ok(default),
        }
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

/// Scalar values accepted in configuration files
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ScalarValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{}", b),
            ScalarValue::Integer(i) => write!(f, "{}", i),
            ScalarValue::Float(v) => write!(f, "{}", v),
            ScalarValue::Text(s) => write!(f, "{}", s),
        }
    }
}

type RawSections = HashMap<String, HashMap<String, ScalarValue>>;

/// In-memory, file-backed configuration provider
#[derive(Debug, Clone, Default)]
pub struct Config {
    sections: HashMap<String, HashMap<String, String>>,
    sources: Vec<PathBuf>,
}

impl Config {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration file and apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::new();
        config.load_file(path)?;
        config.apply_environment_overrides();
        Ok(config)
    }

    /// Add (or replace) a single value
    pub fn with_value(mut self, section: &str, key: &str, value: impl Into<String>) -> Self {
        self.set_value(section, key, value);
        self
    }

    /// Add a whole section of values
    pub fn with_section<I, K, V>(mut self, section: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries = self.sections.entry(section.to_string()).or_default();
        for (key, value) in values {
            entries.insert(key.into(), value.into());
        }
        self
    }

    /// Set a single value
    pub fn set_value(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Files loaded so far, in load order
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// All values of a section
    pub fn section(&self, section: &str) -> Option<&HashMap<String, String>> {
        self.sections.get(section)
    }

    /// Merge a configuration file into this configuration; its values win
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let raw: RawSections = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => {
                return Err(ConfigError::InvalidFormat {
                    message: format!("Unsupported config file format: {}", path.display()),
                })
            }
        };

        for (section, values) in raw {
            let entries = self.sections.entry(section).or_default();
            for (key, value) in values {
                entries.insert(key, value.to_string());
            }
        }

        log::debug!("Loaded configuration from {}", path.display());
        self.sources.push(path.to_path_buf());
        Ok(())
    }

    /// Apply `MAQS_<SECTION>__<KEY>` environment variables
    pub fn apply_environment_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply overrides from an explicit variable list
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let Some(rest) = name.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let Some((section, key)) = rest.split_once("__") else {
                continue;
            };
            if section.is_empty() || key.is_empty() {
                continue;
            }

            // Environment names lose their case, so match existing entries case-insensitively
            let section_name = self
                .sections
                .keys()
                .find(|s| s.eq_ignore_ascii_case(section))
                .cloned()
                .unwrap_or_else(|| section.to_string());
            let entries = self.sections.entry(section_name).or_default();
            let key_name = entries
                .keys()
                .find(|k| k.eq_ignore_ascii_case(key))
                .cloned()
                .unwrap_or_else(|| key.to_string());

            log::debug!("Configuration override from environment: {}", name);
            entries.insert(key_name, value);
        }
    }
}

impl ConfigProvider for Config {
    fn get_value(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section)?.get(key).cloned()
    }
}

/// General framework settings
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralConfig {
    pub logging: LoggingEnabled,
    pub log_level: MessageType,
    pub log_type: LogType,
    pub log_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            logging: LoggingEnabled::No,
            log_level: MessageType::Information,
            log_type: LogType::Console,
            log_dir: std::env::temp_dir().join("maqs-logs"),
        }
    }
}

impl GeneralConfig {
    /// Resolve the general settings from a provider
    pub fn from_provider(config: &dyn ConfigProvider) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let logging = parse_setting(config, "Log")?.unwrap_or(defaults.logging);
        let log_level = parse_setting(config, "LogLevel")?.unwrap_or(defaults.log_level);
        let log_type = parse_setting(config, "LogType")?.unwrap_or(defaults.log_type);
        let log_dir = config
            .get_value(GENERAL_SECTION, "FileLoggerPath")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        Ok(Self {
            logging,
            log_level,
            log_type,
            log_dir,
        })
    }
}

fn parse_setting<T>(config: &dyn ConfigProvider, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr<Err = ConfigError>,
{
    config
        .get_value(GENERAL_SECTION, key)
        .map(|raw| raw.parse::<T>())
        .transpose()
}
