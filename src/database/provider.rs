//! Database providers by name
//!
//! A provider turns connection settings into an `AnyPool`. The default registry
//! knows `sqlite`, `postgres` (also `postgresql`) and `mysql`; callers can
//! register their own providers before the first connection is made.

use futures::future::{BoxFuture, FutureExt};
use parking_lot::RwLock;
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::AnyPool;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Once};
use std::time::Duration;

use super::config::DatabaseConfig;
use crate::error::DatabaseError;

/// Settings handed to a provider when connecting
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub connection_string: String,
    pub timeout: Duration,
    pub pool_size: u32,
}

impl From<&DatabaseConfig> for ConnectionSettings {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            connection_string: config.connection_string.clone(),
            timeout: config.timeout,
            pool_size: config.pool_size,
        }
    }
}

/// Async constructor for a provider's connection pool
pub type ConnectionFactory =
    Arc<dyn Fn(ConnectionSettings) -> BoxFuture<'static, Result<AnyPool, DatabaseError>> + Send + Sync>;

/// Registry mapping provider names to connection factories
pub struct ProviderRegistry {
    providers: RwLock<HashMap<String, ConnectionFactory>>,
}

impl ProviderRegistry {
    /// Registry without any provider
    pub fn empty() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the built-in sqlx providers
    pub fn with_defaults() -> Self {
        let registry = Self::empty();
        registry.register("sqlite", |settings: ConnectionSettings| async move {
            let url = if settings.connection_string.starts_with("sqlite:") {
                settings.connection_string.clone()
            } else {
                format!("sqlite:{}", settings.connection_string)
            };
            connect_any(&url, &settings).await
        });
        for name in ["postgres", "postgresql", "mysql"] {
            registry.register(name, |settings: ConnectionSettings| async move {
                connect_any(&settings.connection_string, &settings).await
            });
        }
        registry
    }

    /// Register (or replace) a provider; names are case-insensitive
    pub fn register<F, Fut>(&self, name: &str, factory: F)
    where
        F: Fn(ConnectionSettings) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<AnyPool, DatabaseError>> + Send + 'static,
    {
        let factory: ConnectionFactory = Arc::new(move |settings| factory(settings).boxed());
        if self
            .providers
            .write()
            .insert(normalize(name), factory)
            .is_some()
        {
            log::debug!("Replaced database provider {}", name);
        }
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.providers.read().contains_key(&normalize(name))
    }

    /// Registered provider names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Open a pool through the named provider
    pub async fn connect(&self, name: &str, settings: ConnectionSettings) -> Result<AnyPool, DatabaseError> {
        let factory = self
            .providers
            .read()
            .get(&normalize(name))
            .cloned()
            .ok_or_else(|| DatabaseError::UnsupportedProvider(name.to_string()))?;

        log::debug!("Connecting to {} database", name);
        factory(settings).await
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

static INSTALL_DRIVERS: Once = Once::new();

/// Open an `AnyPool` with the pool size and timeout from `settings`
pub async fn connect_any(url: &str, settings: &ConnectionSettings) -> Result<AnyPool, DatabaseError> {
    INSTALL_DRIVERS.call_once(install_default_drivers);

    AnyPoolOptions::new()
        .max_connections(settings.pool_size.max(1))
        .acquire_timeout(settings.timeout)
        // Keep connections for the whole test so in-memory databases survive
        .idle_timeout(None)
        .max_lifetime(None)
        .connect(url)
        .await
        .map_err(|e| DatabaseError::Connection(format!("Failed to connect to {}: {}", redact(url), e)))
}

/// Hide the password part of a connection URL
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            let credentials = &url[scheme_end + 3..at];
            match credentials.find(':') {
                Some(colon) => format!(
                    "{}{}:***{}",
                    &url[..scheme_end + 3],
                    &credentials[..colon],
                    &url[at..]
                ),
                None => url.to_string(),
            }
        }
        _ => url.to_string(),
    }
}
