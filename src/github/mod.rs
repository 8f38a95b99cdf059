//! GitHub adapters for the capability traits.
//!
//! Key features:
//! - Exponential backoff retry for transient failures
//! - Distinguishes transient, not-found and permanent errors
//! - GraphQL snapshots that carry the head commit's statuses and checks

mod api;
mod client;
mod error;
mod graphql;
mod retry;

pub use client::{DEFAULT_CONFIG_PATH, DEFAULT_OWNERS_FILE, GitHubClient};
pub use error::{GitHubApiError, GitHubErrorKind, classify};
pub use retry::{RetryConfig, retry_with_backoff};
