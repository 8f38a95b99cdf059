//! Command plugins and the machinery that runs them.
//!
//! A plugin is built per event from a [`Capabilities`] bundle by a builder
//! registered in the [`PluginRegistry`], has its flag-style arguments bound
//! from the repository configuration, and then handles one [`Event`].
//!
//! # Module Structure
//!
//! - [`registry`]: name → builder table, resolve and run
//! - [`dispatch`]: per-event fan-out over a repository's configured plugins
//! - [`args`]: flag binding for plugin parameters
//! - [`command`]: line-anchored command matching
//! - [`format`]: reply formatting
//! - [`label`], [`approval`], [`help`], [`tide`]: the built-in plugins

pub mod approval;
pub mod args;
pub mod command;
pub mod dispatch;
pub mod format;
pub mod help;
pub mod label;
pub mod registry;
pub mod tide;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use dispatch::{DispatchReport, Dispatcher};
pub use registry::{PluginBuilder, PluginRegistry, WeakPluginRegistry};

use crate::clients::{Capabilities, ClientError};
use crate::tide::TideController;
use crate::types::Event;

/// Failure while resolving or running a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PluginError {
    #[error("plugin {0:?} is not registered")]
    NotFound(String),

    #[error("invalid arguments for plugin {plugin}: {message}")]
    InvalidArgs { plugin: String, message: String },

    #[error(transparent)]
    Client(#[from] ClientError),

    /// The registry a plugin was built from has been dropped.
    #[error("plugin registry is no longer available")]
    RegistryGone,
}

/// Name, description and usage shown by `/help`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginHelp {
    pub name: String,
    pub description: String,
    pub usage: String,
}

/// A command handler.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn usage(&self) -> &'static str;

    /// Applies flag-style arguments. Absent flags take their defaults.
    fn bind_args(&mut self, args: &[String]) -> Result<(), PluginError>;

    async fn handle(&self, event: &Event) -> Result<(), PluginError>;
}

/// Registers `label`, `lgtm`, `approve`, `help` and `tide`.
pub fn register_builtins(registry: &PluginRegistry, controller: Arc<TideController>) {
    registry.register(label::NAME, |caps: &Capabilities| {
        Box::new(label::LabelPlugin::new(caps)) as Box<dyn Plugin>
    });
    registry.register(approval::LGTM.name, |caps: &Capabilities| {
        Box::new(approval::ApprovalPlugin::new(&approval::LGTM, caps)) as Box<dyn Plugin>
    });
    registry.register(approval::APPROVE.name, |caps: &Capabilities| {
        Box::new(approval::ApprovalPlugin::new(&approval::APPROVE, caps)) as Box<dyn Plugin>
    });

    let weak = registry.downgrade();
    registry.register(help::NAME, move |caps: &Capabilities| {
        Box::new(help::HelpPlugin::new(weak.clone(), caps)) as Box<dyn Plugin>
    });

    registry.register(tide::NAME, move |caps: &Capabilities| {
        Box::new(tide::TidePlugin::new(Arc::clone(&controller), caps)) as Box<dyn Plugin>
    });
}
