//! SQL database driver

pub mod config;
pub mod driver;
pub mod event_firing;
pub mod manager;
pub mod provider;

pub use config::{DatabaseConfig, DATABASE_SECTION};
pub use driver::{Database, DatabaseDriver, Row};
pub use event_firing::EventFiringDatabaseDriver;
pub use manager::DatabaseDriverManager;
pub use provider::{connect_any, ConnectionFactory, ConnectionSettings, ProviderRegistry};
