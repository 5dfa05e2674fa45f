use std::time::Duration;
use thiserror::Error;

/// Core error types for the test framework
#[derive(Error, Debug)]
pub enum MaqsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("Manager store error: {0}")]
    Store(#[from] StoreError),

    #[error("Web service error: {0}")]
    WebService(#[from] WebServiceError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Selenium error: {0}")]
    Selenium(#[from] SeleniumError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Soft assert error: {0}")]
    SoftAssert(#[from] SoftAssertError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration lookup and parsing errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {message}")]
    InvalidFormat { message: String },

    #[error("Missing configuration value {section}:{key}")]
    MissingValue { section: String, key: String },

    #[error("Unsupported value '{value}' for {key}")]
    UnsupportedValue { key: String, value: String },

    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Driver manager lifecycle errors
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Driver construction failed: {0}")]
    Construction(String),

    #[error("Driver disposal failed: {0}")]
    Disposal(String),

    #[error("Driver manager for {0} has been disposed")]
    Disposed(String),

    #[error("The {0} driver has been closed")]
    Closed(String),
}

/// Manager store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("A driver manager is already registered under {0}")]
    AlreadyExists(String),

    #[error("No driver manager registered under {0}")]
    NotFound(String),

    #[error("Driver manager under {key} is not a {expected}")]
    TypeMismatch { key: String, expected: String },
}

/// Web service driver errors
#[derive(Error, Debug)]
pub enum WebServiceError {
    #[error("Request timeout after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Expected status {expected} but got {actual}: {body}")]
    UnexpectedStatus {
        expected: u16,
        actual: u16,
        body: String,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Database driver errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Unsupported database provider: {0}")]
    UnsupportedProvider(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),
}

/// Browser session errors
#[derive(Error, Debug)]
pub enum SeleniumError {
    #[error("Unsupported browser: {0}")]
    UnsupportedBrowser(String),

    #[error("Session creation failed: {0}")]
    SessionCreation(String),

    #[error("WebDriver command {command} failed: {error}: {message}")]
    Command {
        command: String,
        error: String,
        message: String,
    },

    #[error("WebDriver protocol error: {0}")]
    Protocol(String),
}

/// Logger errors
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logger has been closed")]
    Closed,
}

/// Raised when a test finishes with failed soft asserts
#[derive(Error, Debug)]
pub enum SoftAssertError {
    #[error("{} soft assert(s) failed: {}", failures.len(), failures.join("; "))]
    Failed { failures: Vec<String> },
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, MaqsError>;

impl From<serde_json::Error> for WebServiceError {
    fn from(err: serde_json::Error) -> Self {
        WebServiceError::Serialization(err.to_string())
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::Query(err.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::InvalidFormat {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::InvalidFormat {
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::InvalidFormat {
            message: err.to_string(),
        }
    }
}
