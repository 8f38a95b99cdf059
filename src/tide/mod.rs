//! Merge-queue controller.
//!
//! - [`status`]: pure desired-state computation
//! - [`queue`]: deduplicating work queue with backoff
//! - [`controller`]: workers, re-list loop and the reconcile pass

pub mod controller;
pub mod queue;
pub mod status;

pub use controller::{
    ReconcileContext, ReconcileKey, ReconcileOutcome, TideClients, TideConfig, TideController,
};
pub use crate::backoff::Backoff;
pub use queue::WorkQueue;
pub use status::{
    DEFAULT_FORBIDDEN_LABELS, DEFAULT_REQUIRED_LABELS, DesiredStatus, STATUS_CONTEXT,
    wants_state_and_description,
};
