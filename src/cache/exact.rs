//! Exact-key configuration cache.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{ConfigStore, cache_key};
use crate::types::RepoId;

/// Caches one value per normalized `(owner, repo, path)` key.
///
/// `get` never performs I/O; `save` overwrites unconditionally.
#[derive(Debug)]
pub struct ExactCache<T> {
    entries: RwLock<HashMap<String, T>>,
}

impl<T> Default for ExactCache<T> {
    fn default() -> Self {
        ExactCache {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<T> ExactCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Clone + Send + Sync> ConfigStore<T> for ExactCache<T> {
    fn get(&self, repo: &RepoId, path: &str) -> Option<T> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&cache_key(repo, path))
            .cloned()
    }

    fn save(&self, repo: &RepoId, path: &str, value: T) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_key(repo, path), value);
    }
}
