//! Per-test lifecycle
//!
//! [`BaseTest::run`] builds a fresh [`TestObject`] for each test, lets the
//! [`TestSetup`] register its driver managers, runs the body, and tears down:
//! failure artifacts are captured only from drivers that already exist, every
//! manager is disposed, and an `ONFAIL` log of a passing test is deleted.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::{ConfigProvider, GeneralConfig};
use crate::database::{DatabaseDriverManager, ProviderRegistry};
use crate::error::Result;
use crate::logging::{create_logger, LoggingEnabled, MessageType};
use crate::selenium::{capture_screenshot, save_page_source, SeleniumDriverManager};
use crate::test_object::TestObject;
use crate::web_service::WebServiceDriverManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestOutcome {
    Passed,
    Failed,
}

/// Summary of one test run
#[derive(Debug, Clone)]
pub struct TestResult {
    pub name: String,
    pub outcome: TestOutcome,
    pub error: Option<String>,
    pub associated_files: Vec<PathBuf>,
    pub duration: Duration,
}

impl TestResult {
    pub fn passed(&self) -> bool {
        self.outcome == TestOutcome::Passed
    }
}

/// Test-type specific wiring
#[async_trait]
pub trait TestSetup: Send + Sync {
    /// Register the driver managers this kind of test uses
    async fn register_managers(&self, test_object: &TestObject) -> Result<()>;

    /// Save diagnostics for a failed test
    ///
    /// Implementations must only touch drivers that are already initialized.
    async fn capture_failure_artifacts(&self, _test_object: &TestObject) -> Result<()> {
        Ok(())
    }
}

/// Runs tests with a fresh test object each
pub struct BaseTest<S: TestSetup> {
    setup: S,
    config: Arc<dyn ConfigProvider>,
    general: GeneralConfig,
}

impl<S: TestSetup> BaseTest<S> {
    pub fn new(setup: S, config: Arc<dyn ConfigProvider>) -> Result<Self> {
        let general = GeneralConfig::from_provider(config.as_ref())?;
        Ok(Self {
            setup,
            config,
            general,
        })
    }

    pub fn setup(&self) -> &S {
        &self.setup
    }

    pub fn general_config(&self) -> &GeneralConfig {
        &self.general
    }

    /// Build the test object for `name` and register the setup's managers
    pub async fn create_test_object(&self, name: &str) -> Result<Arc<TestObject>> {
        let logger = create_logger(&self.general, name)?;
        let test_object = TestObject::new(name, logger.clone(), self.config.clone())
            .with_logging(self.general.logging)
            .with_log_dir(self.general.log_dir.clone());

        if let Some(path) = logger.log_path() {
            test_object.add_associated_file(path);
        }

        self.setup.register_managers(&test_object).await?;
        test_object.log(MessageType::Information, &format!("Starting test {}", name));
        Ok(Arc::new(test_object))
    }

    /// Capture artifacts on failure, dispose drivers and clean up the log
    pub async fn teardown(&self, test_object: &TestObject, outcome: TestOutcome) {
        if outcome == TestOutcome::Failed {
            if let Err(e) = self.setup.capture_failure_artifacts(test_object).await {
                test_object.log(MessageType::Warning, &format!("Failed to capture failure artifacts: {}", e));
            }
        }

        // Disposal failures are already logged by the manager store
        let _ = test_object.dispose().await;

        let logger = test_object.logger();
        logger.close();

        if self.general.logging == LoggingEnabled::OnFail && outcome == TestOutcome::Passed {
            if let Some(path) = logger.log_path() {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => log::debug!("Removed log of passing test {}", path.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => log::warn!("Failed to remove log {}: {}", path.display(), e),
                }
                test_object.remove_associated_file(&path);
            }
        }
    }

    /// Run one test body with a fresh test object
    ///
    /// The body's error, a panic in the body or any failed soft assert fails
    /// the test. Only setup errors are returned as `Err`; test failures are
    /// reported in the result and teardown always runs.
    pub async fn run<F, Fut>(&self, name: &str, body: F) -> Result<TestResult>
    where
        F: FnOnce(Arc<TestObject>) -> Fut + Send,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        let start_time = Instant::now();
        let test_object = self.create_test_object(name).await?;

        let body_result = AssertUnwindSafe(body(test_object.clone())).catch_unwind().await;
        let soft_result = test_object.soft_assert().fail_test_if_assert_failed();

        let error = match (body_result, soft_result) {
            (Err(payload), _) => Some(format!("Test panicked: {}", panic_message(payload.as_ref()))),
            (Ok(Err(e)), _) => Some(format!("{:#}", e)),
            (Ok(Ok(())), Err(e)) => Some(e.to_string()),
            (Ok(Ok(())), Ok(())) => None,
        };

        let outcome = if error.is_some() {
            TestOutcome::Failed
        } else {
            TestOutcome::Passed
        };

        match error {
            Some(ref message) => test_object.log(MessageType::Error, &format!("Test failed: {}", message)),
            None => test_object.log(MessageType::Success, "Test passed"),
        }

        self.teardown(&test_object, outcome).await;

        Ok(TestResult {
            name: name.to_string(),
            outcome,
            error,
            associated_files: test_object.associated_files(),
            duration: start_time.elapsed(),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Setup for tests that use the web service driver
#[derive(Debug, Default, Clone, Copy)]
pub struct WebServiceTest;

#[async_trait]
impl TestSetup for WebServiceTest {
    async fn register_managers(&self, test_object: &TestObject) -> Result<()> {
        let manager = WebServiceDriverManager::from_config(&test_object.driver_context());
        test_object.managers().add_default(Arc::new(manager))
    }
}

/// Setup for tests that use the database driver
#[derive(Clone)]
pub struct DatabaseTest {
    registry: Arc<ProviderRegistry>,
}

impl DatabaseTest {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(ProviderRegistry::with_defaults()))
    }

    pub fn with_registry(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }
}

impl Default for DatabaseTest {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestSetup for DatabaseTest {
    async fn register_managers(&self, test_object: &TestObject) -> Result<()> {
        let manager = DatabaseDriverManager::from_config(&test_object.driver_context(), self.registry.clone());
        test_object.managers().add_default(Arc::new(manager))
    }
}

/// Setup for browser tests
#[derive(Debug, Default, Clone, Copy)]
pub struct SeleniumTest;

#[async_trait]
impl TestSetup for SeleniumTest {
    async fn register_managers(&self, test_object: &TestObject) -> Result<()> {
        let manager = SeleniumDriverManager::from_config(&test_object.driver_context());
        test_object.managers().add_default(Arc::new(manager))
    }

    async fn capture_failure_artifacts(&self, test_object: &TestObject) -> Result<()> {
        let manager = test_object.selenium_manager()?;
        if !manager.is_initialized() {
            return Ok(());
        }

        let session = manager.get_web_driver().await?;
        if let Err(e) = capture_screenshot(&session, test_object, "").await {
            test_object.log(MessageType::Warning, &format!("Failed to capture screenshot: {}", e));
        }
        save_page_source(&session, test_object, "_PS").await?;
        Ok(())
    }
}
