//! Injectable read-mostly registries keyed by id.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

/// Thread-safe map of shared, immutable entries.
///
/// Registering an existing id replaces the entry; holders of the previous
/// `Arc` keep the version they captured.
pub struct Registry<T: ?Sized> {
    items: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> Default for Registry<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: ?Sized> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, returning the previous entry.
    pub fn register(
        &self,
        id: &str,
        item: Arc<T>,
    ) -> Option<Arc<T>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner).insert(id.to_string(), item)
    }

    pub fn get(
        &self,
        id: &str,
    ) -> Option<Arc<T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner).get(id).cloned()
    }

    pub fn contains(
        &self,
        id: &str,
    ) -> bool {
        self.items.read().unwrap_or_else(PoisonError::into_inner).contains_key(id)
    }

    pub fn remove(
        &self,
        id: &str,
    ) -> Option<Arc<T>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner).remove(id)
    }

    pub fn list(&self) -> Vec<Arc<T>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }

    pub fn keys(&self) -> Vec<String> {
        self.items.read().unwrap_or_else(PoisonError::into_inner).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
