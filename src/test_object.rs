use parking_lot::RwLock;
use sqlx::AnyPool;
use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ConfigProvider;
use crate::database::{Database, DatabaseDriverManager};
use crate::error::Result;
use crate::event::{EventBus, EventListener, LoggingListener};
use crate::logging::{Logger, LoggingEnabled, MessageType};
use crate::manager::ManagedDriverManager;
use crate::manager_store::ManagerStore;
use crate::selenium::{SeleniumDriverManager, WebDriverSession};
use crate::soft_assert::SoftAssert;
use crate::web_service::{WebService, WebServiceDriver, WebServiceDriverManager};

/// What a driver manager needs from the test that owns it
#[derive(Clone)]
pub struct DriverContext {
    pub logger: Arc<dyn Logger>,
    pub events: Arc<EventBus>,
    pub logging: LoggingEnabled,
    pub config: Arc<dyn ConfigProvider>,
    pub log_dir: PathBuf,
}

/// Per-test execution context
///
/// All driver access for one test goes through its test object. The object owns
/// the test's manager store, logger, soft asserts and event bus, and is disposed
/// once when the test ends.
pub struct TestObject {
    name: String,
    logger: Arc<dyn Logger>,
    soft_assert: SoftAssert,
    config: Arc<dyn ConfigProvider>,
    logging: LoggingEnabled,
    log_dir: PathBuf,
    events: Arc<EventBus>,
    logging_listener: Option<Arc<dyn EventListener>>,
    values: RwLock<HashMap<String, String>>,
    objects: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    associated_files: RwLock<BTreeSet<PathBuf>>,
    managers: ManagerStore,
}

impl TestObject {
    /// Create a test object with logging disabled
    pub fn new(name: impl Into<String>, logger: Arc<dyn Logger>, config: Arc<dyn ConfigProvider>) -> Self {
        let log_dir = logger
            .log_path()
            .and_then(|path| path.parent().map(Path::to_path_buf))
            .unwrap_or_else(std::env::temp_dir);

        Self {
            name: name.into(),
            soft_assert: SoftAssert::new(logger.clone()),
            managers: ManagerStore::new().with_logger(logger.clone()),
            logger,
            config,
            logging: LoggingEnabled::No,
            log_dir,
            events: Arc::new(EventBus::default()),
            logging_listener: None,
            values: RwLock::new(HashMap::new()),
            objects: RwLock::new(HashMap::new()),
            associated_files: RwLock::new(BTreeSet::new()),
        }
    }

    /// Set the logging mode; driver events reach the logger only while it is enabled
    pub fn with_logging(mut self, logging: LoggingEnabled) -> Self {
        match (logging.is_enabled(), self.logging_listener.take()) {
            (true, None) => {
                let listener: Arc<dyn EventListener> = Arc::new(LoggingListener::new(self.logger.clone()));
                self.events.add_listener(listener.clone());
                self.logging_listener = Some(listener);
            }
            (true, Some(listener)) => self.logging_listener = Some(listener),
            (false, Some(listener)) => {
                self.events.remove_listener(&listener);
            }
            (false, None) => {}
        }
        self.logging = logging;
        self
    }

    /// Directory for artifacts written on behalf of this test
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logger(&self) -> &Arc<dyn Logger> {
        &self.logger
    }

    pub fn soft_assert(&self) -> &SoftAssert {
        &self.soft_assert
    }

    pub fn config(&self) -> &Arc<dyn ConfigProvider> {
        &self.config
    }

    pub fn logging(&self) -> LoggingEnabled {
        self.logging
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn managers(&self) -> &ManagerStore {
        &self.managers
    }

    /// Snapshot handed to driver managers at construction
    pub fn driver_context(&self) -> DriverContext {
        DriverContext {
            logger: self.logger.clone(),
            events: self.events.clone(),
            logging: self.logging,
            config: self.config.clone(),
            log_dir: self.log_dir.clone(),
        }
    }

    /// Write to the test logger; logging failures are reported through `log`
    pub fn log(&self, message_type: MessageType, message: &str) {
        if let Err(e) = self.logger.log_message(message_type, message) {
            log::warn!("Failed to write to log for {}: {}", self.name, e);
        }
    }

    pub fn set_value(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values.write().insert(key.into(), value.into());
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    pub fn set_object<T: Any + Send + Sync>(&self, key: impl Into<String>, object: Arc<T>) {
        self.objects.write().insert(key.into(), object);
    }

    /// Stored object as `T`; `None` when absent or of another type
    pub fn get_object<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        let object = self.objects.read().get(key).cloned()?;
        object.downcast::<T>().ok()
    }

    /// Associate an existing file with the test result
    ///
    /// Returns false if the file does not exist or is already associated.
    pub fn add_associated_file(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        if !path.exists() {
            return false;
        }
        self.associated_files.write().insert(path.to_path_buf())
    }

    pub fn remove_associated_file(&self, path: impl AsRef<Path>) -> bool {
        self.associated_files.write().remove(path.as_ref())
    }

    pub fn contains_associated_file(&self, path: impl AsRef<Path>) -> bool {
        self.associated_files.read().contains(path.as_ref())
    }

    pub fn associated_files(&self) -> Vec<PathBuf> {
        self.associated_files.read().iter().cloned().collect()
    }

    /// Register a driver manager under `key`
    pub fn add_driver_manager(&self, key: impl Into<String>, manager: Arc<dyn ManagedDriverManager>) -> Result<()> {
        self.managers.add(key, manager)
    }

    /// Dispose the manager under `key` and install a replacement
    pub async fn override_driver_manager(
        &self,
        key: impl Into<String>,
        manager: Arc<dyn ManagedDriverManager>,
    ) -> Result<()> {
        self.managers.override_manager(key, manager).await
    }

    pub fn web_service_manager(&self) -> Result<Arc<WebServiceDriverManager>> {
        self.managers.get_default::<WebServiceDriverManager>()
    }

    /// The test's web service driver, created on first use
    pub async fn web_service_driver(&self) -> Result<Arc<dyn WebService>> {
        self.web_service_manager()?.get_web_service_driver().await
    }

    pub async fn override_web_service_driver(&self, driver: WebServiceDriver) -> Result<()> {
        self.web_service_manager()?.override_driver(driver).await
    }

    pub fn database_manager(&self) -> Result<Arc<DatabaseDriverManager>> {
        self.managers.get_default::<DatabaseDriverManager>()
    }

    /// The test's database driver, connected on first use
    pub async fn database_driver(&self) -> Result<Arc<dyn Database>> {
        self.database_manager()?.get_database_driver().await
    }

    pub async fn override_database_connection(&self, pool: AnyPool, provider: &str) -> Result<()> {
        self.database_manager()?.override_connection(pool, provider).await
    }

    pub fn selenium_manager(&self) -> Result<Arc<SeleniumDriverManager>> {
        self.managers.get_default::<SeleniumDriverManager>()
    }

    /// The test's browser session, started on first use
    pub async fn web_driver(&self) -> Result<Arc<WebDriverSession>> {
        self.selenium_manager()?.get_web_driver().await
    }

    pub async fn override_web_driver(&self, session: WebDriverSession) -> Result<()> {
        self.selenium_manager()?.override_session(session).await
    }

    /// Dispose every driver manager of this test
    ///
    /// Each failing manager is logged by the store.
    pub async fn dispose(&self) -> Result<()> {
        log::debug!("Disposing test object for {}", self.name);
        self.managers.dispose().await
    }
}
