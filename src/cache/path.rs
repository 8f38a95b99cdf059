//! Lexical path normalization shared by the caches.
//!
//! Inserts and lookups must normalize identically, so every cache key goes
//! through [`clean`] (or [`segments`]) before it touches a map or trie.

/// Normalizes a slash-separated path lexically.
///
/// Leading separators are stripped, empty and `.` segments are dropped, and
/// `..` removes the preceding segment. A `..` with nothing left to remove is
/// kept. The empty path normalizes to `.`.
pub fn clean(path: &str) -> String {
    let parts = segments(path);
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

/// Splits a path into normalized segments. The root yields no segments.
pub fn segments(path: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in path.trim_start_matches('/').split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|last| last != "..") {
                    out.pop();
                } else {
                    out.push("..".to_string());
                }
            }
            other => out.push(other.to_string()),
        }
    }
    out
}

/// Like [`segments`], but a `..` never climbs above the root.
///
/// Used for paths inside a repository, where the root is the repository
/// itself.
pub fn rooted_segments(path: &str) -> Vec<String> {
    segments(path)
        .into_iter()
        .filter(|seg| seg != "..")
        .collect()
}

/// Returns the directory portion of a file path (`.` for top-level files).
pub fn parent_dir(path: &str) -> String {
    let mut parts = segments(path);
    parts.pop();
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}
