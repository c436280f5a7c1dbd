use std::{cell::RefCell, collections::HashMap, rc::Rc};

use thiserror::Error;
use web_sys::{Storage, Window};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("storage access denied: {0}")]
    AccessDenied(String),
}

/// String key/value store with the semantics of the Web Storage API.
pub trait KeyValueStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

pub fn window() -> Result<Window, String> {
    web_sys::window().ok_or_else(|| "No window object".to_string())
}

pub fn local_storage() -> Result<Storage, String> {
    window()?
        .local_storage()
        .map_err(|_| "No localStorage".to_string())?
        .ok_or_else(|| "No localStorage".to_string())
}

pub fn session_storage() -> Result<Storage, String> {
    window()?
        .session_storage()
        .map_err(|_| "No sessionStorage".to_string())?
        .ok_or_else(|| "No sessionStorage".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScope {
    /// `localStorage`: shared by every tab of the origin.
    Persistent,
    /// `sessionStorage`: private to the current tab.
    Tab,
}

/// Browser storage resolved on every access, so a storage that becomes
/// unavailable mid-session degrades instead of holding a stale handle.
#[derive(Debug, Clone, Copy)]
pub struct BrowserStorage {
    scope: StorageScope,
}

impl BrowserStorage {
    pub fn persistent() -> Self {
        Self {
            scope: StorageScope::Persistent,
        }
    }

    pub fn tab() -> Self {
        Self {
            scope: StorageScope::Tab,
        }
    }

    fn storage(&self) -> Result<Storage, StorageError> {
        let storage = match self.scope {
            StorageScope::Persistent => local_storage(),
            StorageScope::Tab => session_storage(),
        };
        storage.map_err(StorageError::Unavailable)
    }
}

impl KeyValueStorage for BrowserStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage()?
            .get_item(key)
            .map_err(|_| StorageError::AccessDenied(format!("read {}", key)))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?
            .set_item(key, value)
            .map_err(|_| StorageError::AccessDenied(format!("write {}", key)))
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.storage()?
            .remove_item(key)
            .map_err(|_| StorageError::AccessDenied(format!("remove {}", key)))
    }
}

/// In-memory storage. Clones share the same entries, which lets tests model
/// one storage area surviving across several page loads.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_clones_share_entries() {
        let storage = MemoryStorage::new();
        let other = storage.clone();
        storage.set("token", "abc").unwrap();
        assert_eq!(other.get("token").unwrap().as_deref(), Some("abc"));
        other.remove("token").unwrap();
        assert!(storage.is_empty());
    }

    #[test]
    fn memory_storage_overwrites_values() {
        let storage = MemoryStorage::new();
        storage.set("k", "1").unwrap();
        storage.set("k", "2").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("2"));
        assert_eq!(storage.len(), 1);
    }
}
