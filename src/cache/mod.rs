//! In-process configuration caches.
//!
//! - [`ExactCache`] stores one value per `(owner, repo, path)`.
//! - [`NearestCache`] resolves a path to the value saved at its closest
//!   enclosing directory (backed by [`NearestTrie`]).
//! - [`CacheSyncer`] keeps either kind fresh from one background loop.
//!
//! Neither cache performs I/O. Fetching on a miss is the caller's job (see
//! `clients::cached`).

pub mod exact;
pub mod nearest;
pub mod path;
pub mod syncer;
pub mod trie;

pub use exact::ExactCache;
pub use nearest::NearestCache;
pub use syncer::{CacheSyncer, RefreshConfig, SyncKey, SyncReport, SyncTask};
pub use trie::NearestTrie;

use crate::types::RepoId;

/// Get/save contract shared by both caches.
pub trait ConfigStore<T>: Send + Sync {
    /// Looks up a value. Never performs I/O.
    fn get(&self, repo: &RepoId, path: &str) -> Option<T>;

    /// Stores a value, replacing whatever was there.
    fn save(&self, repo: &RepoId, path: &str, value: T);
}

/// Normalized key embedding the repository as a leading path prefix.
///
/// `path` is normalized on its own first and cannot climb out of the
/// repository.
pub fn cache_key(repo: &RepoId, path: &str) -> String {
    let mut key = format!("{}/{}", repo.owner, repo.repo);
    for seg in path::rooted_segments(path) {
        key.push('/');
        key.push_str(&seg);
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_prefixes_repo() {
        let repo = RepoId::new("foo", "bar");
        assert_eq!(cache_key(&repo, ""), "foo/bar");
        assert_eq!(cache_key(&repo, "."), "foo/bar");
        assert_eq!(cache_key(&repo, "/pkg/./a"), "foo/bar/pkg/a");
        assert_eq!(cache_key(&repo, "pkg/../a"), "foo/bar/a");
    }

    #[test]
    fn cache_key_stays_inside_repo() {
        let repo = RepoId::new("foo", "bar");
        assert_eq!(cache_key(&repo, ".."), "foo/bar");
        assert_eq!(cache_key(&repo, "../bar2/src/lib.rs"), "foo/bar/bar2/src/lib.rs");
        assert_eq!(cache_key(&repo, "../../x"), "foo/bar/x");
    }
}
