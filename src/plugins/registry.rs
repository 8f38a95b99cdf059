//! Name → builder table for plugins.
//!
//! Registration is last-write-wins so higher layers and tests can override a
//! built-in. The table is shared behind an `Arc`; plugins that need to see
//! the registry (help) hold a [`WeakPluginRegistry`] to avoid a cycle.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use tracing::{debug, warn};

use super::{Plugin, PluginError, PluginHelp};
use crate::clients::Capabilities;
use crate::types::Event;

/// Builds a fresh plugin instance from a capability bundle.
pub type PluginBuilder = Arc<dyn Fn(&Capabilities) -> Box<dyn Plugin> + Send + Sync>;

type Builders = RwLock<HashMap<String, PluginBuilder>>;

#[derive(Clone, Default)]
pub struct PluginRegistry {
    builders: Arc<Builders>,
}

/// Non-owning handle to a [`PluginRegistry`].
#[derive(Clone)]
pub struct WeakPluginRegistry {
    builders: Weak<Builders>,
}

impl WeakPluginRegistry {
    pub fn upgrade(&self) -> Option<PluginRegistry> {
        self.builders
            .upgrade()
            .map(|builders| PluginRegistry { builders })
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `builder` under `name`, replacing any earlier registration.
    pub fn register<F>(&self, name: impl Into<String>, builder: F)
    where
        F: Fn(&Capabilities) -> Box<dyn Plugin> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(plugin = %name, "Registered plugin");
        self.builders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, Arc::new(builder));
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .builders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn builder(&self, name: &str) -> Option<PluginBuilder> {
        self.builders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Builds the plugin registered as `name` and binds `args` to it.
    pub fn resolve(
        &self,
        name: &str,
        caps: &Capabilities,
        args: &[String],
    ) -> Result<Box<dyn Plugin>, PluginError> {
        let builder = self
            .builder(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        let mut plugin = builder(caps);
        plugin.bind_args(args)?;
        Ok(plugin)
    }

    /// Resolves `name` and runs it against `event`.
    pub async fn resolve_and_run(
        &self,
        name: &str,
        caps: &Capabilities,
        args: &[String],
        event: &Event,
    ) -> Result<(), PluginError> {
        let plugin = self.resolve(name, caps, args).inspect_err(|e| {
            warn!(plugin = %name, error = %e, "Could not resolve plugin");
        })?;
        plugin.handle(event).await
    }

    /// Help entries for every registered plugin, sorted by registered name.
    pub fn catalog(&self, caps: &Capabilities) -> Vec<PluginHelp> {
        let mut builders: Vec<(String, PluginBuilder)> = self
            .builders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(n, b)| (n.clone(), Arc::clone(b)))
            .collect();
        builders.sort_by(|a, b| a.0.cmp(&b.0));

        builders
            .into_iter()
            .map(|(name, builder)| {
                let plugin = builder(caps);
                PluginHelp {
                    name,
                    description: plugin.description().to_string(),
                    usage: plugin.usage().to_string(),
                }
            })
            .collect()
    }

    pub fn downgrade(&self) -> WeakPluginRegistry {
        WeakPluginRegistry {
            builders: Arc::downgrade(&self.builders),
        }
    }
}
