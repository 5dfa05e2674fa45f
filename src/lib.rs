//! MAQS - test automation building blocks
//!
//! Every test gets a [`TestObject`] holding its logger, soft asserts and a
//! [`ManagerStore`] of driver managers. Managers create their driver (HTTP
//! client, database pool, browser session) lazily on first use, can be
//! overridden before or during the test, and are disposed exactly once when the
//! test ends. When logging is enabled, web service and database drivers are
//! wrapped in event-firing decorators that report each operation.

pub mod error;
pub mod config;
pub mod logging;
pub mod event;
pub mod soft_assert;
pub mod driver;
pub mod manager;
pub mod manager_store;
pub mod test_object;
pub mod web_service;
pub mod database;
pub mod selenium;
pub mod base_test;

// Re-export commonly used types
pub use error::{
    ConfigError, DatabaseError, DriverError, LoggingError, MaqsError, Result, SeleniumError, SoftAssertError,
    StoreError, WebServiceError,
};
pub use config::{Config, ConfigProvider, GeneralConfig, GENERAL_SECTION};
pub use logging::{
    create_logger, ConsoleLogger, FileLogger, LogType, Logger, LoggingEnabled, MemoryLogger, MessageType,
};
pub use event::{
    DriverEvent, DriverEventKind, EventBus, EventEmitter, EventError, EventFilter, EventListener, EventSubscription,
    LoggingListener,
};
pub use soft_assert::SoftAssert;
pub use driver::{driver_factory, DriverFactory, ManagedDriver};
pub use manager::{DriverManager, ManagedDriverManager};
pub use manager_store::{manager_key, ManagerStore};
pub use test_object::{DriverContext, TestObject};
pub use web_service::{
    EventFiringWebServiceDriver, HttpMethod, WebRequest, WebResponse, WebService, WebServiceConfig, WebServiceDriver,
    WebServiceDriverManager,
};
pub use database::{
    Database, DatabaseConfig, DatabaseDriver, DatabaseDriverManager, EventFiringDatabaseDriver, ProviderRegistry, Row,
};
pub use selenium::{BrowserSize, BrowserType, SeleniumConfig, SeleniumDriverManager, WebDriverSession};
pub use base_test::{BaseTest, DatabaseTest, SeleniumTest, TestOutcome, TestResult, TestSetup, WebServiceTest};
