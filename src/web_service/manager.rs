use async_trait::async_trait;
use futures::FutureExt;
use reqwest::{Client, Url};
use std::any::Any;
use std::sync::Arc;

use super::config::WebServiceConfig;
use super::driver::{WebService, WebServiceDriver};
use super::event_firing::EventFiringWebServiceDriver;
use crate::driver::{driver_factory, DriverFactory};
use crate::error::{MaqsError, Result};
use crate::event::EventEmitter;
use crate::manager::{DriverManager, ManagedDriverManager};
use crate::test_object::DriverContext;

const EVENT_SOURCE: &str = "web_service";

/// Lazily creates the test's web service driver
///
/// When the owning test logs, every driver handed out (built or overridden) is
/// wrapped in an [`EventFiringWebServiceDriver`].
pub struct WebServiceDriverManager {
    inner: DriverManager<dyn WebService>,
    emitter: Option<EventEmitter>,
}

impl WebServiceDriverManager {
    pub fn new(factory: DriverFactory<dyn WebService>, context: &DriverContext) -> Self {
        let emitter = context
            .logging
            .is_enabled()
            .then(|| EventEmitter::new(EVENT_SOURCE, context.events.clone()));

        let inner = DriverManager::new("web service", decorating(factory, emitter.clone()))
            .with_logger(context.logger.clone());

        Self { inner, emitter }
    }

    /// Manager whose driver is built from the `WebServiceMaqs` settings on first use
    pub fn from_config(context: &DriverContext) -> Self {
        let config = context.config.clone();
        let factory = driver_factory(move || {
            let config = config.clone();
            async move {
                let settings = WebServiceConfig::from_provider(config.as_ref())?;
                let driver: Arc<dyn WebService> = Arc::new(WebServiceDriver::from_config(&settings)?);
                Ok::<_, MaqsError>(driver)
            }
        });

        Self::new(factory, context)
    }

    /// The test's driver, built on first use
    pub async fn get_web_service_driver(&self) -> Result<Arc<dyn WebService>> {
        self.inner.get_driver().await
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    pub fn is_event_firing(&self) -> bool {
        self.emitter.is_some()
    }

    /// Install a prebuilt driver
    pub async fn override_driver(&self, driver: WebServiceDriver) -> Result<()> {
        self.override_web_service(Arc::new(driver)).await
    }

    /// Install a driver over an existing HTTP client
    pub async fn override_client(&self, client: Client, base_url: Url, timeout: std::time::Duration) -> Result<()> {
        self.override_driver(WebServiceDriver::new(client, base_url, timeout)).await
    }

    /// Install any web service implementation
    pub async fn override_web_service(&self, driver: Arc<dyn WebService>) -> Result<()> {
        let driver = decorate(driver, self.emitter.as_ref());
        self.inner.override_driver(driver).await
    }

    /// Replace the factory; the next request builds from it
    pub async fn override_factory(&self, factory: DriverFactory<dyn WebService>) -> Result<()> {
        self.inner
            .override_factory(decorating(factory, self.emitter.clone()))
            .await
    }

    pub async fn dispose(&self) -> Result<()> {
        self.inner.dispose().await
    }
}

/// Wrap `driver` for event firing unless it already fires events
fn decorate(driver: Arc<dyn WebService>, emitter: Option<&EventEmitter>) -> Arc<dyn WebService> {
    match emitter {
        Some(emitter) if !driver.as_any().is::<EventFiringWebServiceDriver>() => {
            Arc::new(EventFiringWebServiceDriver::new(driver, emitter.clone()))
        }
        _ => driver,
    }
}

fn decorating(factory: DriverFactory<dyn WebService>, emitter: Option<EventEmitter>) -> DriverFactory<dyn WebService> {
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
impl ManagedDriverManager for WebServiceDriverManager {
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
