//! Lazy driver lifecycle
//!
//! A [`DriverManager`] owns one driver for one test. The driver is built on the
//! first [`DriverManager::get_driver`] call and cached until it is overridden or
//! the manager is disposed. Overrides always close the cached driver before
//! installing the replacement, the same policy the manager store applies when a
//! whole manager is replaced.

use async_trait::async_trait;
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::driver::{DriverFactory, ManagedDriver};
use crate::error::{DriverError, Result};
use crate::logging::{Logger, MessageType};

/// Type-erased manager interface stored in the manager store
#[async_trait]
pub trait ManagedDriverManager: Send + Sync + 'static {
    /// Resource-kind label
    fn kind(&self) -> &str;

    /// Whether the driver has been built, without building it
    fn is_initialized(&self) -> bool;

    /// Close the driver if it was built; later calls are no-ops
    async fn dispose(&self) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

enum Slot<D: ?Sized> {
    Uninitialized,
    Initialized(Arc<D>),
    Disposed,
}

struct ManagerState<D: ?Sized> {
    factory: DriverFactory<D>,
    slot: Slot<D>,
}

/// Lazily constructs, caches, overrides and disposes one driver
pub struct DriverManager<D: ManagedDriver + ?Sized> {
    kind: String,
    state: Mutex<ManagerState<D>>,
    initialized: AtomicBool,
    logger: Option<Arc<dyn Logger>>,
}

impl<D: ManagedDriver + ?Sized> DriverManager<D> {
    /// Create a manager; the factory is not invoked until the driver is requested
    pub fn new(kind: impl Into<String>, factory: DriverFactory<D>) -> Self {
        Self {
            kind: kind.into(),
            state: Mutex::new(ManagerState {
                factory,
                slot: Slot::Uninitialized,
            }),
            initialized: AtomicBool::new(false),
            logger: None,
        }
    }

    /// Attach the owning test's logger for lifecycle messages
    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Get the cached driver, building it on first use
    ///
    /// Construction errors are returned unchanged and are not retried; the next
    /// call invokes the factory again.
    pub async fn get_driver(&self) -> Result<Arc<D>> {
        let mut state = self.state.lock().await;

        match state.slot {
            Slot::Initialized(ref driver) => return Ok(driver.clone()),
            Slot::Disposed => return Err(DriverError::Disposed(self.kind.clone()).into()),
            Slot::Uninitialized => {}
        }

        log::debug!("Creating {} driver", self.kind);
        let driver = (state.factory)().await?;
        state.slot = Slot::Initialized(driver.clone());
        self.initialized.store(true, Ordering::SeqCst);
        self.log(MessageType::Verbose, &format!("Created {} driver", self.kind));

        Ok(driver)
    }

    /// Whether the driver has been built
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Replace the cached driver with an already built one
    pub async fn override_driver(&self, driver: Arc<D>) -> Result<()> {
        let mut state = self.state.lock().await;
        if matches!(state.slot, Slot::Disposed) {
            return Err(DriverError::Disposed(self.kind.clone()).into());
        }

        let previous = std::mem::replace(&mut state.slot, Slot::Initialized(driver.clone()));
        self.initialized.store(true, Ordering::SeqCst);
        if let Slot::Initialized(old) = previous {
            if !std::ptr::addr_eq(Arc::as_ptr(&old), Arc::as_ptr(&driver)) {
                self.close_replaced(old).await;
            }
        }

        self.log(MessageType::Information, &format!("Overrode {} driver", self.kind));
        Ok(())
    }

    /// Replace the factory; the next request builds a fresh driver from it
    pub async fn override_factory(&self, factory: DriverFactory<D>) -> Result<()> {
        let mut state = self.state.lock().await;
        if matches!(state.slot, Slot::Disposed) {
            return Err(DriverError::Disposed(self.kind.clone()).into());
        }

        state.factory = factory;
        let previous = std::mem::replace(&mut state.slot, Slot::Uninitialized);
        self.initialized.store(false, Ordering::SeqCst);
        if let Slot::Initialized(old) = previous {
            self.close_replaced(old).await;
        }

        self.log(MessageType::Information, &format!("Overrode {} driver factory", self.kind));
        Ok(())
    }

    /// Close the driver if it was built and mark the manager disposed
    ///
    /// A close failure is returned to the caller, which reports it.
    pub async fn dispose(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        let previous = std::mem::replace(&mut state.slot, Slot::Disposed);
        self.initialized.store(false, Ordering::SeqCst);

        match previous {
            Slot::Initialized(driver) => {
                log::debug!("Disposing {} driver", self.kind);
                driver.close().await
            }
            Slot::Uninitialized | Slot::Disposed => Ok(()),
        }
    }

    pub async fn is_disposed(&self) -> bool {
        matches!(self.state.lock().await.slot, Slot::Disposed)
    }

    async fn close_replaced(&self, old: Arc<D>) {
        if let Err(e) = old.close().await {
            self.log(
                MessageType::Warning,
                &format!("Failed to close replaced {} driver: {}", self.kind, e),
            );
        }
    }

    fn log(&self, message_type: MessageType, message: &str) {
        match self.logger {
            Some(ref logger) => {
                if let Err(e) = logger.log_message(message_type, message) {
                    log::warn!("{} (logger unavailable: {})", message, e);
                }
            }
            None => log::debug!("{}", message),
        }
    }
}

#[async_trait]
impl<D: ManagedDriver + ?Sized> ManagedDriverManager for DriverManager<D> {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn is_initialized(&self) -> bool {
        DriverManager::is_initialized(self)
    }

    async fn dispose(&self) -> Result<()> {
        DriverManager::dispose(self).await
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
