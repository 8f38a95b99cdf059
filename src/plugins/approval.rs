//! `/lgtm [cancel]` and `/approve [cancel]`.
//!
//! Both gate a label on the commenter being a reviewer or approver in the
//! OWNERS file nearest to every file the PR changes. The PR author cannot
//! apply their own gate unless `--allow-author` is set. Denials are answered
//! with a reply quoting the command, never with an error.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use clap::{ArgAction, Parser};
use regex::Regex;
use tracing::{debug, info};

use super::args::bind;
use super::command::{argument_pattern, command_pattern, strip_html_comments};
use super::format::format_response_raw;
use super::{Plugin, PluginError};
use crate::cache::path::parent_dir;
use crate::clients::{Capabilities, IssueClient, OwnersClient, PrClient};
use crate::types::{CommentAction, CommentEvent, Event};

/// The static parts of one label gate.
pub struct Gate {
    pub name: &'static str,
    pub label: &'static str,
    /// How the gate is spelled in replies.
    pub shout: &'static str,
    pub description: &'static str,
    pub usage: &'static str,
    command: &'static LazyLock<Regex>,
    cancel: &'static LazyLock<Regex>,
}

static LGTM_COMMAND: LazyLock<Regex> = LazyLock::new(|| command_pattern("lgtm"));
static LGTM_CANCEL: LazyLock<Regex> = LazyLock::new(|| argument_pattern("lgtm", "cancel"));
static APPROVE_COMMAND: LazyLock<Regex> = LazyLock::new(|| command_pattern("approve"));
static APPROVE_CANCEL: LazyLock<Regex> = LazyLock::new(|| argument_pattern("approve", "cancel"));

pub static LGTM: Gate = Gate {
    name: "lgtm",
    label: "lgtm",
    shout: "LGTM",
    description: "Adds or removes the 'lgtm' label which is typically used to gate merging.",
    usage: "/lgtm [cancel]",
    command: &LGTM_COMMAND,
    cancel: &LGTM_CANCEL,
};

pub static APPROVE: Gate = Gate {
    name: "approve",
    label: "approved",
    shout: "APPROVE",
    description: "Adds or removes the 'approved' label which is typically used to gate merging.",
    usage: "/approve [cancel]",
    command: &APPROVE_COMMAND,
    cancel: &APPROVE_CANCEL,
};

#[derive(Debug, Clone, Default, Parser)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct ApprovalArgs {
    /// Let the PR author apply the gate to their own PR.
    #[arg(
        long,
        action = ArgAction::Set,
        default_value_t = false,
        default_missing_value = "true",
        num_args = 0..=1,
        require_equals = true
    )]
    allow_author: bool,
}

pub struct ApprovalPlugin {
    gate: &'static Gate,
    issues: Arc<dyn IssueClient>,
    pulls: Arc<dyn PrClient>,
    owners: Arc<dyn OwnersClient>,
    args: ApprovalArgs,
}

impl ApprovalPlugin {
    pub fn new(gate: &'static Gate, caps: &Capabilities) -> Self {
        ApprovalPlugin {
            gate,
            issues: Arc::clone(&caps.issues),
            pulls: Arc::clone(&caps.pulls),
            owners: Arc::clone(&caps.owners),
            args: ApprovalArgs::default(),
        }
    }

    async fn reply(&self, e: &CommentEvent, message: &str) -> Result<(), PluginError> {
        let body = format_response_raw(&e.body, &e.html_url, &e.author, message);
        self.issues.create_comment(&e.repo, e.number, &body).await?;
        Ok(())
    }

    /// Lowercased reviewers and approvers over every changed file.
    async fn members(&self, e: &CommentEvent) -> Result<HashSet<String>, PluginError> {
        let files = self.pulls.list_changed_files(&e.repo, e.number).await?;
        let mut members = HashSet::new();
        let mut dirs_seen = HashSet::new();
        for file in files {
            let dir = parent_dir(&file);
            if !dirs_seen.insert(dir) {
                continue;
            }
            let owners = self.owners.get_owners(&e.repo, &file).await?;
            members.extend(owners.members());
        }
        Ok(members)
    }
}

#[async_trait]
impl Plugin for ApprovalPlugin {
    fn name(&self) -> &'static str {
        self.gate.name
    }

    fn description(&self) -> &'static str {
        self.gate.description
    }

    fn usage(&self) -> &'static str {
        self.gate.usage
    }

    fn bind_args(&mut self, args: &[String]) -> Result<(), PluginError> {
        self.args = bind(self.gate.name, args)?;
        Ok(())
    }

    async fn handle(&self, event: &Event) -> Result<(), PluginError> {
        let Event::Comment(e) = event else {
            return Ok(());
        };
        if !e.is_pr || e.action != CommentAction::Created {
            return Ok(());
        }

        let body = strip_html_comments(&e.body);
        let cancel = self.gate.cancel.is_match(&body);
        if !cancel && !self.gate.command.is_match(&body) {
            return Ok(());
        }

        if !self.args.allow_author {
            let pr = self.pulls.get_pr(&e.repo, e.number).await?;
            if pr.author.eq_ignore_ascii_case(&e.author) {
                info!(
                    repo = %e.repo,
                    number = %e.number,
                    user = %e.author,
                    gate = self.gate.name,
                    "Author tried to gate own PR"
                );
                let message = format!("you cannot {} your own PR.", self.gate.shout);
                return self.reply(e, &message).await;
            }
        }

        let members = self.members(e).await?;
        if !members.contains(&e.author.to_lowercase()) {
            info!(
                repo = %e.repo,
                number = %e.number,
                user = %e.author,
                gate = self.gate.name,
                "Commenter is not a reviewer or approver"
            );
            let message = format!(
                "adding {} is restricted to approvers and reviewers in OWNERS files.",
                self.gate.shout
            );
            return self.reply(e, &message).await;
        }

        if cancel {
            debug!(repo = %e.repo, number = %e.number, label = self.gate.label, "Removing label");
            self.issues
                .remove_label(&e.repo, e.number, self.gate.label)
                .await?;
        } else {
            debug!(repo = %e.repo, number = %e.number, label = self.gate.label, "Adding label");
            self.issues
                .add_labels(&e.repo, e.number, &[self.gate.label.to_string()])
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeGitHub, open_pr, pr_comment};
    use crate::types::{IssueNumber, OwnersConfiguration, RepoId};

    fn repo() -> RepoId {
        RepoId::new("foo", "bar")
    }

    fn owners(reviewers: &[&str], approvers: &[&str]) -> OwnersConfiguration {
        OwnersConfiguration {
            reviewers: reviewers.iter().map(|s| s.to_string()).collect(),
            approvers: approvers.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// PR #1 by alice touching `pkg/a.rs` and `README.md`.
    fn fixture() -> Arc<FakeGitHub> {
        let fake = FakeGitHub::new();
        fake.insert_pr(&repo(), open_pr(1, "alice", "abc", &[]));
        fake.set_changed_files(&repo(), IssueNumber(1), &["pkg/a.rs", "README.md"]);
        fake.set_owners(&repo(), ".", owners(&["Bob"], &["carol"]));
        fake.set_owners(&repo(), "pkg", owners(&["dave"], &[]));
        fake
    }

    async fn run(
        fake: &Arc<FakeGitHub>,
        gate: &'static Gate,
        args: &[&str],
        author: &str,
        body: &str,
    ) {
        let mut plugin = ApprovalPlugin::new(gate, &fake.capabilities());
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        plugin.bind_args(&args).unwrap();
        let event = Event::Comment(pr_comment(&repo(), 1, author, body));
        plugin.handle(&event).await.unwrap();
    }

    #[tokio::test]
    async fn reviewer_adds_lgtm() {
        let fake = fixture();
        run(&fake, &LGTM, &[], "bob", "/lgtm").await;

        assert_eq!(
            fake.labels_added(),
            vec![(repo(), IssueNumber(1), vec!["lgtm".to_string()])]
        );
        assert!(fake.comments().is_empty());
    }

    #[tokio::test]
    async fn approver_cancels_approval() {
        let fake = fixture();
        run(&fake, &APPROVE, &[], "carol", "/approve cancel").await;

        assert_eq!(
            fake.labels_removed(),
            vec![(repo(), IssueNumber(1), "approved".to_string())]
        );
        assert!(fake.labels_added().is_empty());
    }

    #[tokio::test]
    async fn self_approval_is_rejected_with_one_reply() {
        let fake = fixture();
        fake.set_owners(&repo(), ".", owners(&["alice"], &["alice"]));
        run(&fake, &APPROVE, &[], "alice", "/approve").await;

        assert!(fake.labels_added().is_empty());
        assert!(fake.labels_removed().is_empty());
        let comments = fake.comments();
        assert_eq!(comments.len(), 1);
        let body = &comments[0].2;
        assert!(body.starts_with("@alice: you cannot APPROVE your own PR."));
        assert!(body.contains(">/approve"));
    }

    #[tokio::test]
    async fn allow_author_lets_the_author_through() {
        let fake = fixture();
        fake.set_owners(&repo(), ".", owners(&["alice"], &[]));
        run(&fake, &LGTM, &["--allow-author"], "alice", "/lgtm").await;

        assert_eq!(fake.labels_added().len(), 1);
        assert!(fake.comments().is_empty());
    }

    #[tokio::test]
    async fn non_member_is_rejected() {
        let fake = fixture();
        run(&fake, &LGTM, &[], "mallory", "/lgtm").await;

        assert!(fake.labels_added().is_empty());
        let comments = fake.comments();
        assert_eq!(comments.len(), 1);
        assert!(comments[0].2.starts_with(
            "@mallory: adding LGTM is restricted to approvers and reviewers in OWNERS files."
        ));
    }

    #[tokio::test]
    async fn nested_owners_members_count() {
        let fake = fixture();
        run(&fake, &LGTM, &[], "Dave", "/lgtm").await;
        assert_eq!(fake.labels_added().len(), 1);
    }

    #[tokio::test]
    async fn ignores_non_commands_and_non_prs() {
        let fake = fixture();
        run(&fake, &LGTM, &[], "bob", "looks good /lgtm").await;
        run(&fake, &LGTM, &[], "bob", "<!-- /lgtm -->").await;
        run(&fake, &LGTM, &[], "bob", "/lgtmx").await;

        let plugin = ApprovalPlugin::new(&LGTM, &fake.capabilities());
        let mut issue_comment = pr_comment(&repo(), 1, "bob", "/lgtm");
        issue_comment.is_pr = false;
        plugin.handle(&Event::Comment(issue_comment)).await.unwrap();

        assert!(fake.labels_added().is_empty());
        assert!(fake.comments().is_empty());
        assert_eq!(fake.calls("get_pr"), 0);
    }
}
