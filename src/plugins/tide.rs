//! Enrolls pull requests into the merge controller.
//!
//! This plugin performs no side effects itself. It hands the controller a
//! fresh [`ReconcileContext`] built from the current capabilities and the
//! repository's arguments, so configuration edits apply on the next pass.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tracing::debug;

use super::args::bind;
use super::{Plugin, PluginError};
use crate::clients::Capabilities;
use crate::tide::{
    DEFAULT_FORBIDDEN_LABELS, DEFAULT_REQUIRED_LABELS, ReconcileContext, ReconcileKey,
    TideClients, TideController,
};
use crate::types::{Event, MergeMethod};

pub const NAME: &str = "tide";

#[derive(Debug, Clone, Parser)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct TideArgs {
    /// Labels a PR must carry before it can merge.
    #[arg(long, value_delimiter = ',', default_values = DEFAULT_REQUIRED_LABELS)]
    required_labels: Vec<String>,

    /// Labels a PR must not carry.
    #[arg(long, value_delimiter = ',', default_values = DEFAULT_FORBIDDEN_LABELS)]
    missing_labels: Vec<String>,

    #[arg(long, default_value_t = MergeMethod::Merge)]
    merge_method: MergeMethod,
}

impl Default for TideArgs {
    fn default() -> Self {
        TideArgs {
            required_labels: DEFAULT_REQUIRED_LABELS.iter().map(|s| s.to_string()).collect(),
            missing_labels: DEFAULT_FORBIDDEN_LABELS.iter().map(|s| s.to_string()).collect(),
            merge_method: MergeMethod::default(),
        }
    }
}

pub struct TidePlugin {
    controller: Arc<TideController>,
    clients: TideClients,
    args: TideArgs,
}

impl TidePlugin {
    pub fn new(controller: Arc<TideController>, caps: &Capabilities) -> Self {
        TidePlugin {
            controller,
            clients: TideClients::from(caps),
            args: TideArgs::default(),
        }
    }

    fn context(&self) -> ReconcileContext {
        ReconcileContext {
            clients: self.clients.clone(),
            required_labels: self.args.required_labels.clone(),
            forbidden_labels: self.args.missing_labels.clone(),
            merge_method: self.args.merge_method,
        }
    }
}

#[async_trait]
impl Plugin for TidePlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Merges pull requests automatically once they carry the required labels and pass every check."
    }

    fn usage(&self) -> &'static str {
        "(automatic)"
    }

    fn bind_args(&mut self, args: &[String]) -> Result<(), PluginError> {
        self.args = bind(NAME, args)?;
        Ok(())
    }

    async fn handle(&self, event: &Event) -> Result<(), PluginError> {
        match event {
            Event::Comment(e) if !e.is_pr => {
                self.controller.enroll(e.repo.clone(), self.context()).await;
            }
            Event::Comment(_) | Event::PullRequest(_) => {
                let key = ReconcileKey::new(event.repo().clone(), event.number());
                debug!(key = %key, kind = event.kind(), "Enqueueing for merge");
                self.controller.enqueue(key, self.context()).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeGitHub, pr_comment};
    use crate::tide::TideConfig;
    use crate::types::{IssueNumber, PullRequestEvent, RepoId, Sha};

    fn repo() -> RepoId {
        RepoId::new("foo", "bar")
    }

    fn setup(args: &[&str]) -> (Arc<TideController>, TidePlugin) {
        let controller = Arc::new(TideController::new(TideConfig::default()));
        let mut plugin = TidePlugin::new(Arc::clone(&controller), &FakeGitHub::new().capabilities());
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        plugin.bind_args(&args).unwrap();
        (controller, plugin)
    }

    #[tokio::test]
    async fn pr_comment_enqueues_with_defaults() {
        let (controller, plugin) = setup(&[]);
        plugin
            .handle(&Event::Comment(pr_comment(&repo(), 4, "alice", "hi")))
            .await
            .unwrap();

        let key = ReconcileKey::new(repo(), IssueNumber(4));
        let context = controller.context(&key).await.unwrap();
        assert_eq!(context.required_labels, vec!["lgtm", "approved"]);
        assert_eq!(context.forbidden_labels.len(), 4);
        assert_eq!(context.merge_method, MergeMethod::Merge);
        assert_eq!(controller.queue().len(), 1);
    }

    #[tokio::test]
    async fn arguments_shape_the_context() {
        let (controller, plugin) = setup(&[
            "--required-labels=ship-it",
            "--missing-labels=hold,wip",
            "--merge-method=squash",
        ]);
        let event = Event::PullRequest(PullRequestEvent {
            repo: repo(),
            number: IssueNumber(9),
            action: "synchronize".into(),
            head_sha: Sha::new("abc"),
            author: "alice".into(),
        });
        plugin.handle(&event).await.unwrap();

        let context = controller
            .context(&ReconcileKey::new(repo(), IssueNumber(9)))
            .await
            .unwrap();
        assert_eq!(context.required_labels, vec!["ship-it"]);
        assert_eq!(context.forbidden_labels, vec!["hold", "wip"]);
        assert_eq!(context.merge_method, MergeMethod::Squash);
    }

    #[tokio::test]
    async fn issue_comment_only_enrolls_the_repo() {
        let (controller, plugin) = setup(&[]);
        let mut comment = pr_comment(&repo(), 5, "alice", "hi");
        comment.is_pr = false;
        plugin.handle(&Event::Comment(comment)).await.unwrap();

        assert!(controller.queue().is_empty());
        assert_eq!(controller.enrolled().await, vec![repo()]);
    }

    #[test]
    fn bad_merge_method_is_rejected() {
        let controller = Arc::new(TideController::new(TideConfig::default()));
        let mut plugin = TidePlugin::new(controller, &FakeGitHub::new().capabilities());
        let err = plugin
            .bind_args(&["--merge-method=octopus".to_string()])
            .unwrap_err();
        assert!(matches!(err, PluginError::InvalidArgs { .. }));
    }
}
