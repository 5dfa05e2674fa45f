use async_trait::async_trait;
use std::any::Any;
use std::sync::Arc;

use super::browser::create_session;
use super::config::SeleniumConfig;
use super::session::WebDriverSession;
use crate::driver::{driver_factory, DriverFactory};
use crate::error::{MaqsError, Result};
use crate::manager::{DriverManager, ManagedDriverManager};
use crate::test_object::DriverContext;

/// Lazily starts the test's browser session
pub struct SeleniumDriverManager {
    inner: DriverManager<WebDriverSession>,
}

impl SeleniumDriverManager {
    pub fn new(factory: DriverFactory<WebDriverSession>, context: &DriverContext) -> Self {
        Self {
            inner: DriverManager::new("selenium", factory).with_logger(context.logger.clone()),
        }
    }

    /// Manager that starts a session with the `SeleniumMaqs` settings on first use
    pub fn from_config(context: &DriverContext) -> Self {
        let config = context.config.clone();
        let factory = driver_factory(move || {
            let config = config.clone();
            async move {
                let settings = SeleniumConfig::from_provider(config.as_ref())?;
                let session = create_session(&settings).await?;
                Ok::<_, MaqsError>(Arc::new(session))
            }
        });

        Self::new(factory, context)
    }

    /// The test's browser session, started on first use
    pub async fn get_web_driver(&self) -> Result<Arc<WebDriverSession>> {
        self.inner.get_driver().await
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.is_initialized()
    }

    /// Install an already started session
    pub async fn override_session(&self, session: WebDriverSession) -> Result<()> {
        self.inner.override_driver(Arc::new(session)).await
    }

    pub async fn override_factory(&self, factory: DriverFactory<WebDriverSession>) -> Result<()> {
        self.inner.override_factory(factory).await
    }

    pub async fn dispose(&self) -> Result<()> {
        self.inner.dispose().await
    }
}

#[async_trait]
impl ManagedDriverManager for SeleniumDriverManager {
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
