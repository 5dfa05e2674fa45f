//! Test loggers
//!
//! Framework internals report through the `log` facade. Test code writes to a
//! [`Logger`], which filters by [`MessageType`] and either forwards to the facade
//! ([`ConsoleLogger`]), appends to a per-test text file ([`FileLogger`]) or keeps
//! lines in memory ([`MemoryLogger`]).

use chrono::Utc;
use parking_lot::Mutex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::config::GeneralConfig;
use crate::error::{ConfigError, LoggingError};

/// Message categories, ordered from most to least severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MessageType {
    Error,
    Warning,
    Success,
    Generic,
    Step,
    Action,
    Information,
    Verbose,
    /// Logger level that writes nothing
    Suspended,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Error => "ERROR",
            MessageType::Warning => "WARNING",
            MessageType::Success => "SUCCESS",
            MessageType::Generic => "GENERIC",
            MessageType::Step => "STEP",
            MessageType::Action => "ACTION",
            MessageType::Information => "INFORMATION",
            MessageType::Verbose => "VERBOSE",
            MessageType::Suspended => "SUSPENDED",
        }
    }

    /// Whether a logger at `level` writes messages of this type
    pub fn is_logged_at(self, level: MessageType) -> bool {
        level != MessageType::Suspended && self != MessageType::Suspended && self <= level
    }

    fn log_level(self) -> log::Level {
        match self {
            MessageType::Error => log::Level::Error,
            MessageType::Warning => log::Level::Warn,
            MessageType::Success | MessageType::Generic | MessageType::Step => log::Level::Info,
            MessageType::Action | MessageType::Information => log::Level::Info,
            MessageType::Verbose | MessageType::Suspended => log::Level::Debug,
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Ok(MessageType::Error),
            "WARNING" => Ok(MessageType::Warning),
            "SUCCESS" => Ok(MessageType::Success),
            "GENERIC" => Ok(MessageType::Generic),
            "STEP" => Ok(MessageType::Step),
            "ACTION" => Ok(MessageType::Action),
            "INFORMATION" => Ok(MessageType::Information),
            "VERBOSE" => Ok(MessageType::Verbose),
            "SUSPENDED" => Ok(MessageType::Suspended),
            _ => Err(ConfigError::UnsupportedValue {
                key: "LogLevel".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Whether a test logs, and whether the log survives a passing test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingEnabled {
    Yes,
    No,
    /// Log during the test, discard the log file if the test passes
    OnFail,
}

impl LoggingEnabled {
    pub fn is_enabled(self) -> bool {
        !matches!(self, LoggingEnabled::No)
    }
}

impl FromStr for LoggingEnabled {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "YES" => Ok(LoggingEnabled::Yes),
            "NO" => Ok(LoggingEnabled::No),
            "ONFAIL" => Ok(LoggingEnabled::OnFail),
            _ => Err(ConfigError::UnsupportedValue {
                key: "Log".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Logger backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogType {
    Console,
    Txt,
}

impl FromStr for LogType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CONSOLE" => Ok(LogType::Console),
            "TXT" => Ok(LogType::Txt),
            _ => Err(ConfigError::UnsupportedValue {
                key: "LogType".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// A test-scoped logger
pub trait Logger: Send + Sync {
    /// Write a message if its type passes the logger level
    fn log_message(&self, message_type: MessageType, message: &str) -> Result<(), LoggingError>;

    /// Current logging level
    fn level(&self) -> MessageType;

    /// Change the logging level
    fn set_level(&self, level: MessageType);

    /// File backing this logger, if any
    fn log_path(&self) -> Option<PathBuf> {
        None
    }

    /// Release any held resources; later writes may fail
    fn close(&self) {}

    fn should_log(&self, message_type: MessageType) -> bool {
        message_type.is_logged_at(self.level())
    }
}

/// Logger that forwards to the `log` facade
pub struct ConsoleLogger {
    level: Mutex<MessageType>,
}

impl ConsoleLogger {
    pub fn new(level: MessageType) -> Self {
        Self {
            level: Mutex::new(level),
        }
    }
}

impl Default for ConsoleLogger {
    fn default() -> Self {
        Self::new(MessageType::Information)
    }
}

impl Logger for ConsoleLogger {
    fn log_message(&self, message_type: MessageType, message: &str) -> Result<(), LoggingError> {
        if self.should_log(message_type) {
            log::log!(message_type.log_level(), "{}: {}", message_type, message);
        }
        Ok(())
    }

    fn level(&self) -> MessageType {
        *self.level.lock()
    }

    fn set_level(&self, level: MessageType) {
        *self.level.lock() = level;
    }
}

/// Logger that appends timestamped lines to a text file
pub struct FileLogger {
    path: PathBuf,
    file: Mutex<Option<File>>,
    level: Mutex<MessageType>,
}

impl FileLogger {
    /// Create (or append to) `<dir>/<sanitized name>.txt`
    pub fn new(dir: &Path, name: &str, level: MessageType) -> Result<Self, LoggingError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.txt", sanitize_file_name(name)));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
            level: Mutex::new(level),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Logger for FileLogger {
    fn log_message(&self, message_type: MessageType, message: &str) -> Result<(), LoggingError> {
        if !self.should_log(message_type) {
            return Ok(());
        }

        let mut guard = self.file.lock();
        let file = guard.as_mut().ok_or(LoggingError::Closed)?;
        writeln!(
            file,
            "{} {}:\t{}",
            Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            message_type,
            message
        )?;
        Ok(())
    }

    fn level(&self) -> MessageType {
        *self.level.lock()
    }

    fn set_level(&self, level: MessageType) {
        *self.level.lock() = level;
    }

    fn log_path(&self) -> Option<PathBuf> {
        Some(self.path.clone())
    }

    fn close(&self) {
        if let Some(mut file) = self.file.lock().take() {
            if let Err(e) = file.flush() {
                log::warn!("Failed to flush log file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Logger that keeps formatted lines in memory
pub struct MemoryLogger {
    lines: Mutex<Vec<(MessageType, String)>>,
    level: Mutex<MessageType>,
}

impl MemoryLogger {
    pub fn new(level: MessageType) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            level: Mutex::new(level),
        }
    }

    /// Snapshot of everything logged so far
    pub fn messages(&self) -> Vec<(MessageType, String)> {
        self.lines.lock().clone()
    }

    /// Messages of a single type
    pub fn messages_of(&self, message_type: MessageType) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|(t, _)| *t == message_type)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|(_, m)| m.contains(needle))
    }
}

impl Default for MemoryLogger {
    fn default() -> Self {
        Self::new(MessageType::Verbose)
    }
}

impl Logger for MemoryLogger {
    fn log_message(&self, message_type: MessageType, message: &str) -> Result<(), LoggingError> {
        if self.should_log(message_type) {
            self.lines.lock().push((message_type, message.to_string()));
        }
        Ok(())
    }

    fn level(&self) -> MessageType {
        *self.level.lock()
    }

    fn set_level(&self, level: MessageType) {
        *self.level.lock() = level;
    }
}

/// Build the logger for one test from the general settings
pub fn create_logger(config: &GeneralConfig, test_name: &str) -> Result<Arc<dyn Logger>, LoggingError> {
    if !config.logging.is_enabled() {
        return Ok(Arc::new(ConsoleLogger::new(config.log_level)));
    }

    match config.log_type {
        LogType::Console => Ok(Arc::new(ConsoleLogger::new(config.log_level))),
        LogType::Txt => {
            let name = format!("{} - {}", test_name, Utc::now().format("%Y-%m-%d-%H-%M-%S-%3f"));
            let logger = FileLogger::new(&config.log_dir, &name, config.log_level)?;
            Ok(Arc::new(logger))
        }
    }
}

/// Replace characters that are invalid in file names
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '~',
            c if c.is_control() => '~',
            c => c,
        })
        .collect()
}
