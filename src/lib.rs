//! Tidebot - a GitHub bot that runs comment-command plugins and merges
//! pull requests once they carry the required labels and pass every check.
//!
//! This library provides the plugin registry and dispatcher, the repository
//! configuration caches and the merge controller. The binary wires them to
//! GitHub and an HTTP webhook endpoint.

pub mod backoff;
pub mod cache;
pub mod clients;
pub mod github;
pub mod plugins;
pub mod server;
pub mod settings;
pub mod tide;
pub mod types;
pub mod webhooks;

#[cfg(test)]
pub mod test_utils;
