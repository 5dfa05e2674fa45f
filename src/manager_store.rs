use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{DriverError, MaqsError, Result, StoreError};
use crate::logging::{Logger, MessageType};
use crate::manager::ManagedDriverManager;

struct StoreEntry {
    sequence: u64,
    manager: Arc<dyn ManagedDriverManager>,
}

#[derive(Default)]
struct StoreState {
    next_sequence: u64,
    entries: HashMap<String, StoreEntry>,
}

impl StoreState {
    fn insert(&mut self, key: String, manager: Arc<dyn ManagedDriverManager>) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(key, StoreEntry { sequence, manager });
    }
}

/// Per-test registry of driver managers keyed by resource kind
///
/// Managers are disposed in registration order.
pub struct ManagerStore {
    state: RwLock<StoreState>,
    logger: Option<Arc<dyn Logger>>,
}

/// Default key for a manager type
pub fn manager_key<M: 'static>() -> String {
    std::any::type_name::<M>().to_string()
}

impl ManagerStore {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Register a manager; fails if the key is already taken
    pub fn add(&self, key: impl Into<String>, manager: Arc<dyn ManagedDriverManager>) -> Result<()> {
        let key = key.into();
        let mut state = self.state.write();

        if state.entries.contains_key(&key) {
            return Err(StoreError::AlreadyExists(key).into());
        }

        log::debug!("Registering {} driver manager under {}", manager.kind(), key);
        state.insert(key, manager);
        Ok(())
    }

    /// Register a manager under its type name
    pub fn add_default<M: ManagedDriverManager>(&self, manager: Arc<M>) -> Result<()> {
        self.add(manager_key::<M>(), manager)
    }

    /// Dispose the manager currently registered under `key`, then install `manager`
    ///
    /// A failing disposal is logged and does not prevent the replacement. A
    /// manager added under `key` while the previous one was being disposed is
    /// replaced and disposed as well.
    pub async fn override_manager(&self, key: impl Into<String>, manager: Arc<dyn ManagedDriverManager>) -> Result<()> {
        let key = key.into();
        let previous = self.state.write().entries.remove(&key);
        if let Some(previous) = previous {
            self.dispose_replaced(&key, previous.manager, &manager).await;
        }

        log::debug!("Overriding driver manager under {}", key);
        let occupant = {
            let mut state = self.state.write();
            let occupant = state.entries.remove(&key);
            state.insert(key.clone(), manager.clone());
            occupant
        };
        if let Some(occupant) = occupant {
            self.dispose_replaced(&key, occupant.manager, &manager).await;
        }
        Ok(())
    }

    async fn dispose_replaced(
        &self,
        key: &str,
        replaced: Arc<dyn ManagedDriverManager>,
        replacement: &Arc<dyn ManagedDriverManager>,
    ) {
        if Arc::ptr_eq(&replaced, replacement) {
            return;
        }
        if let Err(e) = replaced.dispose().await {
            self.log(
                MessageType::Error,
                &format!("Failed to dispose replaced driver manager {}: {}", key, e),
            );
        }
    }

    /// Override the manager registered under the type name of `M`
    pub async fn override_default<M: ManagedDriverManager>(&self, manager: Arc<M>) -> Result<()> {
        self.override_manager(manager_key::<M>(), manager).await
    }

    /// Get a manager as its concrete type
    pub fn get<M: ManagedDriverManager>(&self, key: &str) -> Result<Arc<M>> {
        let manager = self.get_dyn(key)?;

        manager.into_any().downcast::<M>().map_err(|_| {
            StoreError::TypeMismatch {
                key: key.to_string(),
                expected: std::any::type_name::<M>().to_string(),
            }
            .into()
        })
    }

    /// Get a manager registered under the type name of `M`
    pub fn get_default<M: ManagedDriverManager>(&self) -> Result<Arc<M>> {
        self.get::<M>(&manager_key::<M>())
    }

    /// Get a manager without knowing its concrete type
    pub fn get_dyn(&self, key: &str) -> Result<Arc<dyn ManagedDriverManager>> {
        self.state
            .read()
            .entries
            .get(key)
            .map(|entry| entry.manager.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()).into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.read().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    /// Registered keys in registration order
    pub fn keys(&self) -> Vec<String> {
        let state = self.state.read();
        let mut keys: Vec<(u64, String)> = state
            .entries
            .iter()
            .map(|(key, entry)| (entry.sequence, key.clone()))
            .collect();
        keys.sort_unstable_by_key(|(sequence, _)| *sequence);
        keys.into_iter().map(|(_, key)| key).collect()
    }

    /// Remove and dispose a manager
    pub async fn remove(&self, key: &str) -> Result<bool> {
        match self.remove_without_dispose(key) {
            Some(manager) => {
                manager.dispose().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove a manager and hand it back undisposed
    pub fn remove_without_dispose(&self, key: &str) -> Option<Arc<dyn ManagedDriverManager>> {
        self.state.write().entries.remove(key).map(|entry| entry.manager)
    }

    /// Dispose every manager, continuing past failures, and clear the store
    ///
    /// Returns a disposal error naming every key whose manager failed.
    pub async fn dispose(&self) -> Result<()> {
        let mut drained: Vec<(String, StoreEntry)> = self.state.write().entries.drain().collect();
        drained.sort_unstable_by_key(|(_, entry)| entry.sequence);

        let mut failed = Vec::new();
        for (key, entry) in drained {
            if let Err(e) = entry.manager.dispose().await {
                self.log(
                    MessageType::Error,
                    &format!("Failed to dispose driver manager {}: {}", key, e),
                );
                failed.push(key);
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(MaqsError::Driver(DriverError::Disposal(format!(
                "driver managers failed to dispose: {}",
                failed.join(", ")
            ))))
        }
    }

    fn log(&self, message_type: MessageType, message: &str) {
        match self.logger {
            Some(ref logger) => {
                if let Err(e) = logger.log_message(message_type, message) {
                    log::error!("{} (logger unavailable: {})", message, e);
                }
            }
            None => log::error!("{}", message),
        }
    }
}

impl Default for ManagerStore {
    fn default() -> Self {
        Self::new()
    }
}
