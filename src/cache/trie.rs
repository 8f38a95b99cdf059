//! Nearest-ancestor path trie.

use std::collections::HashMap;

use super::path::segments;

#[derive(Debug, Default)]
struct TrieNode {
    children: HashMap<String, TrieNode>,
    terminal: bool,
}

/// A trie of directory paths answering "which inserted path is the closest
/// enclosing directory of this one?".
///
/// Paths are normalized with [`segments`] on both insert and search. The
/// root (empty path) can itself be inserted, in which case it is the
/// fallback answer for every query.
///
/// Not synchronized; owners wrap it in a lock.
#[derive(Debug, Default)]
pub struct NearestTrie {
    root: TrieNode,
}

impl NearestTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `path` as present. Inserting the same path again is a no-op.
    pub fn insert(&mut self, path: &str) {
        let mut node = &mut self.root;
        for seg in segments(path) {
            node = node.children.entry(seg).or_default();
        }
        node.terminal = true;
    }

    /// Returns the longest inserted path that is `path` itself or one of its
    /// ancestors, joined with `/`. The root is returned as `""`.
    pub fn search(&self, path: &str) -> Option<String> {
        let mut node = &self.root;
        let mut walked: Vec<String> = Vec::new();
        let mut nearest = None;

        for seg in segments(path) {
            if node.terminal {
                nearest = Some(walked.join("/"));
            }
            match node.children.get(&seg) {
                Some(child) => {
                    walked.push(seg);
                    node = child;
                }
                None => return nearest,
            }
        }

        if node.terminal {
            nearest = Some(walked.join("/"));
        }
        nearest
    }

    /// True if `path` itself was inserted.
    pub fn contains(&self, path: &str) -> bool {
        let mut node = &self.root;
        for seg in segments(path) {
            match node.children.get(&seg) {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.terminal
    }
}
