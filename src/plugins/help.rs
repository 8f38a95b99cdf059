//! `/help [command]`.

use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use super::command::{command_pattern, invocations, strip_html_comments};
use super::{Plugin, PluginError, PluginHelp, WeakPluginRegistry};
use crate::clients::{Capabilities, IssueClient};
use crate::types::{CommentAction, Event};

pub const NAME: &str = "help";

static HELP: LazyLock<Regex> = LazyLock::new(|| command_pattern("help"));

pub struct HelpPlugin {
    registry: WeakPluginRegistry,
    caps: Capabilities,
    issues: Arc<dyn IssueClient>,
}

impl HelpPlugin {
    pub fn new(registry: WeakPluginRegistry, caps: &Capabilities) -> Self {
        HelpPlugin {
            registry,
            caps: caps.clone(),
            issues: Arc::clone(&caps.issues),
        }
    }
}

/// Commands asked about in `body`. A bare `/help` asks about `help`.
fn requested(body: &str) -> BTreeSet<String> {
    invocations(&HELP, body)
        .into_iter()
        .map(|parts| match parts.as_slice() {
            [_, command] if !command.is_empty() => command.to_string(),
            _ => NAME.to_string(),
        })
        .collect()
}

fn describe(entry: &PluginHelp) -> String {
    format!(
        "Command: **{}**\n> {}\n>\n> Usage:\n>>{}\n>\n",
        entry.name, entry.description, entry.usage
    )
}

fn command_table(catalog: &[PluginHelp]) -> String {
    let rows = catalog
        .iter()
        .map(|h| format!(">> | {} | {} | {} |", h.name, h.description, h.usage))
        .collect::<Vec<_>>()
        .join("\r\n");
    format!(">Available Commands:\n>> | Name | Description | Usage |\n>> | ---- | ---- | ---- |\n{rows}")
}

/// Reply body for `commands` given the sorted `catalog`.
pub fn render(catalog: &[PluginHelp], commands: &BTreeSet<String>) -> String {
    let mut out = String::new();
    for command in commands {
        match catalog.iter().find(|h| &h.name == command) {
            Some(entry) => {
                out.push_str(&describe(entry));
                if command == NAME {
                    out.push_str(&command_table(catalog));
                }
            }
            None => out.push_str(&format!(
                "Unknown command {command}. Use \"/help\" for all commands usage.\r\n"
            )),
        }
    }
    out
}

#[async_trait]
impl Plugin for HelpPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Help provides help for any command."
    }

    fn usage(&self) -> &'static str {
        "/help [command]"
    }

    fn bind_args(&mut self, _args: &[String]) -> Result<(), PluginError> {
        Ok(())
    }

    async fn handle(&self, event: &Event) -> Result<(), PluginError> {
        let Event::Comment(e) = event else {
            return Ok(());
        };
        if e.action != CommentAction::Created {
            return Ok(());
        }

        let commands = requested(&strip_html_comments(&e.body));
        if commands.is_empty() {
            return Ok(());
        }

        let registry = self.registry.upgrade().ok_or(PluginError::RegistryGone)?;
        let body = render(&registry.catalog(&self.caps), &commands);
        self.issues.create_comment(&e.repo, e.number, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::{PluginRegistry, register_builtins};
    use crate::test_utils::{FakeGitHub, pr_comment};
    use crate::tide::{TideConfig, TideController};
    use crate::types::RepoId;

    fn setup() -> (PluginRegistry, Arc<FakeGitHub>) {
        let registry = PluginRegistry::new();
        register_builtins(&registry, Arc::new(TideController::new(TideConfig::default())));
        (registry, FakeGitHub::new())
    }

    async fn ask(registry: &PluginRegistry, fake: &Arc<FakeGitHub>, body: &str) -> Vec<String> {
        let caps = fake.capabilities();
        let event = Event::Comment(pr_comment(&RepoId::new("foo", "bar"), 1, "alice", body));
        registry
            .resolve_and_run(NAME, &caps, &[], &event)
            .await
            .unwrap();
        fake.comments().into_iter().map(|(_, _, b)| b).collect()
    }

    #[test]
    fn bare_help_means_help() {
        assert_eq!(requested("/help"), BTreeSet::from(["help".to_string()]));
        assert_eq!(
            requested("/help lgtm\n/help label\n/help lgtm"),
            BTreeSet::from(["label".to_string(), "lgtm".to_string()])
        );
        assert_eq!(requested("/help a b"), BTreeSet::from(["help".to_string()]));
        assert!(requested("no commands").is_empty());
    }

    #[tokio::test]
    async fn help_lists_every_command() {
        let (registry, fake) = setup();
        let replies = ask(&registry, &fake, "/help").await;
        assert_eq!(replies.len(), 1);
        let body = &replies[0];

        assert!(body.starts_with(
            "Command: **help**\n> Help provides help for any command.\n>\n> Usage:\n>>/help [command]\n>\n"
        ));
        assert!(body.contains(">> | Name | Description | Usage |\n>> | ---- | ---- | ---- |\n"));
        let approve = body.find(">> | approve |").unwrap();
        let lgtm = body.find(">> | lgtm |").unwrap();
        let tide = body.find(">> | tide |").unwrap();
        assert!(approve < lgtm && lgtm < tide);
        assert!(body.contains("\r\n>> | label | "));
    }

    #[tokio::test]
    async fn specific_command_has_no_table() {
        let (registry, fake) = setup();
        let replies = ask(&registry, &fake, "/help lgtm").await;
        assert_eq!(
            replies,
            vec![
                "Command: **lgtm**\n> Adds or removes the 'lgtm' label which is typically used to gate merging.\n>\n> Usage:\n>>/lgtm [cancel]\n>\n"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn unknown_command_is_reported() {
        let (registry, fake) = setup();
        let replies = ask(&registry, &fake, "/help frobnicate").await;
        assert_eq!(
            replies,
            vec!["Unknown command frobnicate. Use \"/help\" for all commands usage.\r\n".to_string()]
        );
    }

    #[tokio::test]
    async fn no_command_no_reply() {
        let (registry, fake) = setup();
        let replies = ask(&registry, &fake, "thanks!").await;
        assert!(replies.is_empty());
    }

    #[tokio::test]
    async fn dropped_registry_is_an_error() {
        let (registry, fake) = setup();
        let plugin = HelpPlugin::new(registry.downgrade(), &fake.capabilities());
        drop(registry);

        let event = Event::Comment(pr_comment(&RepoId::new("foo", "bar"), 1, "alice", "/help"));
        assert_eq!(
            plugin.handle(&event).await,
            Err(PluginError::RegistryGone)
        );
    }
}
