//! Core domain types for the bot.
//!
//! Identifiers, pull request snapshots, canonical events and the
//! repository-level configuration documents.

pub mod config;
pub mod event;
pub mod ids;
pub mod pr;

pub use config::{Configuration, OwnersConfiguration, PluginConfiguration};
pub use event::{CommentAction, CommentEvent, Event, PullRequestEvent};
pub use ids::{IssueNumber, RepoId, Sha};
pub use pr::{
    Branch, CheckConclusion, CheckStatus, Commit, CommitCheck, CommitStatus, MergeMethod,
    MergeableState, PrState, PullRequestSnapshot, StatusState, UnknownMergeMethod,
};
