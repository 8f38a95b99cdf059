//! Nearest-ancestor configuration cache.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::trie::NearestTrie;
use super::{ConfigStore, cache_key};
use crate::types::RepoId;

#[derive(Debug)]
struct NearestState<T> {
    trie: NearestTrie,
    values: HashMap<String, T>,
}

/// Resolves a path to the value saved at its closest enclosing directory.
///
/// Keys are prefixed with `owner/repo`, so one repository's tree never
/// answers lookups for another. A single lock guards the trie and the value
/// map together.
#[derive(Debug)]
pub struct NearestCache<T> {
    state: RwLock<NearestState<T>>,
}

impl<T> Default for NearestCache<T> {
    fn default() -> Self {
        NearestCache {
            state: RwLock::new(NearestState {
                trie: NearestTrie::new(),
                values: HashMap::new(),
            }),
        }
    }
}

impl<T> NearestCache<T> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<T: Clone + Send + Sync> ConfigStore<T> for NearestCache<T> {
    fn get(&self, repo: &RepoId, path: &str) -> Option<T> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let nearest = state.trie.search(&cache_key(repo, path))?;
        state.values.get(&nearest).cloned()
    }

    fn save(&self, repo: &RepoId, path: &str, value: T) {
        let key = cache_key(repo, path);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.trie.insert(&key);
        state.values.insert(key, value);
    }
}
