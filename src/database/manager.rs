use async_trait::async_trait;
use futures::FutureExt;
use sqlx::AnyPool;
use std::any::Any;
use std::sync::Arc;

use super::config::DatabaseConfig;
use super::driver::{Database, DatabaseDriver};
use super::event_firing::EventFiringDatabaseDriver;
use super::provider::ProviderRegistry;
use crate::driver::{driver_factory, DriverFactory};
use crate::error::{MaqsError, Result};
use crate::event::EventEmitter;
use crate::manager::{DriverManager, ManagedDriverManager};
use crate::test_object::DriverContext;

const EVENT_SOURCE: &str = "database";

/// Lazily connects the test's database driver
pub struct DatabaseDriverManager {
    inner: DriverManager<dyn Database>,
    emitter: Option<EventEmitter>,
}

impl DatabaseDriverManager {
    pub fn new(factory: DriverFactory<dyn Database>, context: &DriverContext) -> Self {
        let emitter = context
            .logging
            .is_enabled()
            .then(|| EventEmitter::new(EVENT_SOURCE, context.events.clone()));

        let inner = DriverManager::new("database", decorating(factory, emitter.clone()))
            .with_logger(context.logger.clone());

        Self { inner, emitter }
    }

    /// Manager that connects with the `DatabaseMaqs` settings on first use
    pub fn from_config(context: &DriverContext, registry: Arc<ProviderRegistry>) -> Self {
        let config = context.config.clone();
        let factory = driver_factory(move || {
            let config = config.clone();
            let registry = registry.clone();
            async move {
                let settings = DatabaseConfig::from_provider(config.as_ref())?;
                let driver: Arc<dyn Database> = Arc::new(DatabaseDriver::connect(&settings, &registry).await?);
                Ok::<_, MaqsError>(driver)
            }
        });

        Self::new(factory, context)
    }

    /// The test's driver, connected on first use
    pub async fn get_database_driver(&self) -> Result<Arc<dyn Database>> {
        self.inner.get_driver().await
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    pub fn is_event_firing(&self) -> bool {
        self.emitter.is_some()
    }

    /// Install a prebuilt driver
    pub async fn override_driver(&self, driver: DatabaseDriver) -> Result<()> {
        self.override_database(Arc::new(driver)).await
    }

    /// Install a driver over an open connection pool
    pub async fn override_connection(&self, pool: AnyPool, provider: &str) -> Result<()> {
        self.override_driver(DatabaseDriver::new(pool, provider)).await
    }

    /// Install any database implementation
    pub async fn override_database(&self, driver: Arc<dyn Database>) -> Result<()> {
        let driver = decorate(driver, self.emitter.as_ref());
        self.inner.override_driver(driver).await
    }

    pub async fn override_factory(&self, factory: DriverFactory<dyn Database>) -> Result<()> {
        self.inner
            .override_factory(decorating(factory, self.emitter.clone()))
            .await
    }

    pub async fn dispose(&self) -> Result<()> {
        self.inner.dispose().await
    }
}

/// Wrap `driver` for event firing unless it already fires events
fn decorate(driver: Arc<dyn Database>, emitter: Option<&EventEmitter>) -> Arc<dyn Database> {
    match emitter {
        Some(emitter) if !driver.as_any().is::<EventFiringDatabaseDriver>() => {
            Arc::new(EventFiringDatabaseDriver::new(driver, emitter.clone()))
        }
        _ => driver,
    }
}

fn decorating(factory: DriverFactory<dyn Database>, emitter: Option<EventEmitter>) -> DriverFactory<dyn Database> {
    Box::new(move || {
        let pending = factory();
        let emitter = emitter.clone();
        async move {
            let driver = pending.await?;
            Ok::<_, MaqsError>(decorate(driver, emitter.as_ref()))
        }
        .boxed()
    })
}

#[async_trait]
impl ManagedDriverManager for DatabaseDriverManager {
    fn kind(&self) -> &str {
        self.inner.kind()
    }

    fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    async fn dispose(&self) -> Result<()> {
        self.inner.dispose().await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
