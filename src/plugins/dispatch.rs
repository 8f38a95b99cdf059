//! Fans one event out to every plugin a repository has configured.
//!
//! Dispatch is best-effort: every configured plugin is attempted, in
//! configuration order, and a failure in one never stops the others.

use tracing::{Instrument, info_span, instrument, warn};

use super::PluginRegistry;
use crate::clients::{Capabilities, ClientError};
use crate::types::{Configuration, Event};

/// What happened while dispatching one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub attempted: usize,
    /// Names of plugins that failed to resolve or returned an error.
    pub failed: Vec<String>,
}

impl DispatchReport {
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failed.len()
    }
}

pub struct Dispatcher {
    registry: PluginRegistry,
    caps: Capabilities,
}

impl Dispatcher {
    pub fn new(registry: PluginRegistry, caps: Capabilities) -> Self {
        Dispatcher { registry, caps }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Runs every plugin listed in `config` against `event`.
    #[instrument(
        skip_all,
        fields(repo = %event.repo(), number = %event.number(), kind = event.kind())
    )]
    pub async fn dispatch(&self, event: &Event, config: &Configuration) -> DispatchReport {
        let mut report = DispatchReport::default();
        for entry in &config.plugins {
            report.attempted += 1;
            let span = info_span!(
                parent: &self.caps.logger.logger(),
                "plugin",
                name = %entry.name,
                repo = %event.repo(),
                number = %event.number(),
            );
            let result = self
                .registry
                .resolve_and_run(&entry.name, &self.caps, &entry.args, event)
                .instrument(span)
                .await;
            if let Err(e) = result {
                warn!(plugin = %entry.name, error = %e, "Plugin failed");
                report.failed.push(entry.name.clone());
            }
        }
        report
    }

    /// Fetches the repository's configuration and dispatches `event` with it.
    pub async fn handle(&self, event: &Event) -> Result<DispatchReport, ClientError> {
        let config = self.caps.config.get_config(event.repo()).await?;
        Ok(self.dispatch(event, &config).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{Plugin, PluginError};
    use crate::test_utils::{FakeGitHub, pr_comment};
    use crate::types::{PluginConfiguration, RepoId};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// Always fails.
    struct Broken;

    #[async_trait]
    impl Plugin for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn description(&self) -> &'static str {
            "Always fails."
        }
        fn usage(&self) -> &'static str {
            "/broken"
        }
        fn bind_args(&mut self, _args: &[String]) -> Result<(), PluginError> {
            Ok(())
        }
        async fn handle(&self, _event: &Event) -> Result<(), PluginError> {
            Err(PluginError::Client(ClientError::Transient("down".into())))
        }
    }

    /// Records the repositories it was run for.
    struct Recorder(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl Plugin for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }
        fn description(&self) -> &'static str {
            "Records events."
        }
        fn usage(&self) -> &'static str {
            "/recorder"
        }
        fn bind_args(&mut self, _args: &[String]) -> Result<(), PluginError> {
            Ok(())
        }
        async fn handle(&self, event: &Event) -> Result<(), PluginError> {
            self.0.lock().unwrap().push(event.repo().to_string());
            Ok(())
        }
    }

    fn setup() -> (Dispatcher, Arc<FakeGitHub>, Arc<Mutex<Vec<String>>>) {
        let fake = FakeGitHub::new();
        let registry = PluginRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        registry.register("broken", |_caps: &Capabilities| Box::new(Broken) as Box<dyn Plugin>);
        let captured = Arc::clone(&seen);
        registry.register("recorder", move |_caps: &Capabilities| {
            Box::new(Recorder(Arc::clone(&captured))) as Box<dyn Plugin>
        });
        (Dispatcher::new(registry, fake.capabilities()), fake, seen)
    }

    fn config(names: &[&str]) -> Configuration {
        Configuration {
            plugins: names.iter().map(|n| PluginConfiguration::new(*n)).collect(),
            ..Configuration::default()
        }
    }

    fn event() -> Event {
        Event::Comment(pr_comment(&RepoId::new("foo", "bar"), 1, "alice", "/lgtm"))
    }

    #[tokio::test]
    async fn failing_plugin_does_not_stop_the_next() {
        let (dispatcher, _fake, seen) = setup();
        let report = dispatcher
            .dispatch(&event(), &config(&["broken", "recorder"]))
            .await;

        assert_eq!(report.attempted, 2);
        assert_eq!(report.failed, vec!["broken"]);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(*seen.lock().unwrap(), vec!["foo/bar"]);
    }

    #[tokio::test]
    async fn unknown_plugin_is_skipped() {
        let (dispatcher, _fake, seen) = setup();
        let report = dispatcher
            .dispatch(&event(), &config(&["missing", "recorder"]))
            .await;

        assert_eq!(report.failed, vec!["missing"]);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_configuration_runs_nothing() {
        let (dispatcher, _fake, seen) = setup();
        let report = dispatcher.dispatch(&event(), &Configuration::default()).await;
        assert_eq!(report, DispatchReport::default());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn handle_uses_repository_configuration() {
        let (dispatcher, fake, seen) = setup();
        fake.set_config(&RepoId::new("foo", "bar"), config(&["recorder", "recorder"]));

        let report = dispatcher.handle(&event()).await.unwrap();
        assert_eq!(report.attempted, 2);
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn handle_surfaces_config_failures() {
        let (dispatcher, fake, seen) = setup();
        fake.fail_next("get_config", 1);

        assert!(dispatcher.handle(&event()).await.is_err());
        assert!(seen.lock().unwrap().is_empty());
    }
}
