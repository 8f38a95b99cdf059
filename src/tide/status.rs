//! Desired status computation for the merge controller.
//!
//! [`wants_state_and_description`] is a pure function of a PR snapshot and
//! the label policy. The controller compares its result against the
//! currently published `tide` status and only writes on a difference.

use std::collections::BTreeSet;

use crate::types::{CommitStatus, MergeableState, PullRequestSnapshot, StatusState};

/// Context under which the controller publishes its own status.
pub const STATUS_CONTEXT: &str = "tide";

/// Description used once a PR meets every criterion.
pub const STATUS_IN_POOL: &str = "In merge pool.";

const STATUS_NOT_IN_POOL: &str = "Not mergeable";

/// Description used when the PR has conflicts with its base.
pub const STATUS_CONFLICT: &str = "PR has a merge conflict.";

pub const DEFAULT_REQUIRED_LABELS: [&str; 2] = ["lgtm", "approved"];

pub const DEFAULT_FORBIDDEN_LABELS: [&str; 4] = [
    "needs-rebase",
    "do-not-merge/hold",
    "do-not-merge/work-in-progress",
    "do-not-merge/invalid-owners-file",
];

/// What the `tide` status should read, and whether to merge now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredStatus {
    pub state: StatusState,
    pub description: String,
    pub mergeable: bool,
}

impl DesiredStatus {
    fn blocked(state: StatusState, description: String) -> Self {
        DesiredStatus {
            state,
            description,
            mergeable: false,
        }
    }

    /// True if `observed` already publishes this state and description.
    pub fn is_published(&self, observed: Option<&CommitStatus>) -> bool {
        observed.is_some_and(|s| s.state == self.state && s.description == self.description)
    }

    /// The status to write for this desired state.
    pub fn to_status(&self) -> CommitStatus {
        CommitStatus {
            context: STATUS_CONTEXT.to_string(),
            state: self.state,
            description: self.description.clone(),
            target_url: None,
        }
    }
}

/// Returns the controller's own status on the PR head commit, if any.
pub fn tide_status(pr: &PullRequestSnapshot) -> Option<&CommitStatus> {
    pr.head_commit()?
        .statuses
        .iter()
        .find(|s| s.context == STATUS_CONTEXT)
}

fn joined<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    names
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>()
        .join(", ")
}

/// Computes the desired `tide` status for a PR.
///
/// Checks run in order: missing required labels, present forbidden labels,
/// unsuccessful checks/statuses on the head commit, merge conflicts. The
/// first failing check decides the description. Names in descriptions are
/// sorted.
///
/// When everything passes the state is `SUCCESS`, but `mergeable` is only
/// true if the previously published `tide` status already reads `SUCCESS`.
/// Merging therefore waits one pass after the gate first turns green.
pub fn wants_state_and_description(
    pr: &PullRequestSnapshot,
    required: &[String],
    forbidden: &[String],
) -> DesiredStatus {
    let missing: Vec<&str> = required
        .iter()
        .map(String::as_str)
        .filter(|l| !l.is_empty() && !pr.has_label(l))
        .collect();
    if !missing.is_empty() {
        return DesiredStatus::blocked(
            StatusState::Pending,
            format!("{STATUS_NOT_IN_POOL}. Needs {} label.", joined(missing)),
        );
    }

    let present: Vec<&str> = forbidden
        .iter()
        .map(String::as_str)
        .filter(|l| !l.is_empty() && pr.has_label(l))
        .collect();
    if !present.is_empty() {
        return DesiredStatus::blocked(
            StatusState::Pending,
            format!("{STATUS_NOT_IN_POOL}. Should not have {} label.", joined(present)),
        );
    }

    let mut tide_success = false;
    let mut unsuccessful: Vec<&str> = Vec::new();
    if let Some(commit) = pr.head_commit() {
        for check in &commit.checks {
            if check.name.is_empty() {
                continue;
            }
            if !check.succeeded() {
                unsuccessful.push(&check.name);
            }
        }
        for status in &commit.statuses {
            if status.context.is_empty() {
                continue;
            }
            if status.context == STATUS_CONTEXT {
                tide_success = status.state == StatusState::Success;
                continue;
            }
            if status.state != StatusState::Success {
                unsuccessful.push(&status.context);
            }
        }
    }
    if !unsuccessful.is_empty() {
        return DesiredStatus::blocked(
            StatusState::Pending,
            format!("{STATUS_NOT_IN_POOL}. Job {} has not succeeded.", joined(unsuccessful)),
        );
    }

    if pr.mergeable == MergeableState::Conflicting {
        return DesiredStatus::blocked(StatusState::Error, STATUS_CONFLICT.to_string());
    }

    DesiredStatus {
        state: StatusState::Success,
        description: STATUS_IN_POOL.to_string(),
        mergeable: tide_success,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Branch, CheckConclusion, CheckStatus, Commit, CommitCheck, IssueNumber, PrState, Sha,
    };
    use proptest::prelude::*;

    fn defaults() -> (Vec<String>, Vec<String>) {
        (
            DEFAULT_REQUIRED_LABELS.iter().map(|s| s.to_string()).collect(),
            DEFAULT_FORBIDDEN_LABELS.iter().map(|s| s.to_string()).collect(),
        )
    }

    fn pr(labels: &[&str]) -> PullRequestSnapshot {
        PullRequestSnapshot {
            number: IssueNumber(1),
            state: PrState::Open,
            title: "t".into(),
            author: "alice".into(),
            head: Branch {
                ref_name: "feature".into(),
                sha: Sha::new("foo"),
            },
            labels: labels.iter().map(|s| s.to_string()).collect(),
            mergeable: MergeableState::Mergeable,
            commits: vec![Commit {
                sha: Sha::new("foo"),
                statuses: Vec::new(),
                checks: Vec::new(),
            }],
        }
    }

    fn status(context: &str, state: StatusState) -> CommitStatus {
        CommitStatus {
            context: context.into(),
            state,
            description: String::new(),
            target_url: None,
        }
    }

    fn check(name: &str, status: CheckStatus, conclusion: Option<CheckConclusion>) -> CommitCheck {
        CommitCheck {
            name: name.into(),
            status,
            conclusion,
        }
    }

    fn want(state: StatusState, description: &str, mergeable: bool) -> DesiredStatus {
        DesiredStatus {
            state,
            description: description.into(),
            mergeable,
        }
    }

    #[test]
    fn no_labels_needs_both() {
        let (required, forbidden) = defaults();
        assert_eq!(
            wants_state_and_description(&pr(&[]), &required, &forbidden),
            want(
                StatusState::Pending,
                "Not mergeable. Needs approved, lgtm label.",
                false
            )
        );
    }

    #[test]
    fn lgtm_only_needs_approved() {
        let (required, forbidden) = defaults();
        assert_eq!(
            wants_state_and_description(&pr(&["lgtm"]), &required, &forbidden),
            want(StatusState::Pending, "Not mergeable. Needs approved label.", false)
        );
    }

    #[test]
    fn forbidden_labels_block() {
        let (required, forbidden) = defaults();
        let snapshot = pr(&["lgtm", "approved", "do-not-merge/hold", "needs-rebase"]);
        assert_eq!(
            wants_state_and_description(&snapshot, &required, &forbidden),
            want(
                StatusState::Pending,
                "Not mergeable. Should not have do-not-merge/hold, needs-rebase label.",
                false
            )
        );
    }

    #[test]
    fn first_green_pass_is_not_mergeable_yet() {
        let (required, forbidden) = defaults();
        assert_eq!(
            wants_state_and_description(&pr(&["lgtm", "approved"]), &required, &forbidden),
            want(StatusState::Success, STATUS_IN_POOL, false)
        );
    }

    #[test]
    fn published_success_makes_it_mergeable() {
        let (required, forbidden) = defaults();
        let mut snapshot = pr(&["lgtm", "approved"]);
        snapshot.commits[0]
            .statuses
            .push(status(STATUS_CONTEXT, StatusState::Success));
        assert_eq!(
            wants_state_and_description(&snapshot, &required, &forbidden),
            want(StatusState::Success, STATUS_IN_POOL, true)
        );
    }

    #[test]
    fn failing_jobs_are_listed_sorted() {
        let (required, forbidden) = defaults();
        let mut snapshot = pr(&["lgtm", "approved"]);
        let commit = &mut snapshot.commits[0];
        commit.checks.push(check(
            "unit",
            CheckStatus::Completed,
            Some(CheckConclusion::Failure),
        ));
        commit.checks.push(check("lint", CheckStatus::InProgress, None));
        commit.checks.push(check(
            "docs",
            CheckStatus::Completed,
            Some(CheckConclusion::Neutral),
        ));
        commit.checks.push(check("", CheckStatus::Queued, None));
        commit.statuses.push(status("ci/e2e", StatusState::Pending));
        commit.statuses.push(status("ci/build", StatusState::Success));
        commit.statuses.push(status("", StatusState::Failure));
        commit
            .statuses
            .push(status(STATUS_CONTEXT, StatusState::Success));

        assert_eq!(
            wants_state_and_description(&snapshot, &required, &forbidden),
            want(
                StatusState::Pending,
                "Not mergeable. Job ci/e2e, lint, unit has not succeeded.",
                false
            )
        );
    }

    #[test]
    fn statuses_on_other_commits_are_ignored() {
        let (required, forbidden) = defaults();
        let mut snapshot = pr(&["lgtm", "approved"]);
        snapshot.commits.insert(
            0,
            Commit {
                sha: Sha::new("old"),
                statuses: vec![status("ci", StatusState::Failure)],
                checks: Vec::new(),
            },
        );
        let desired = wants_state_and_description(&snapshot, &required, &forbidden);
        assert_eq!(desired.state, StatusState::Success);
    }

    #[test]
    fn conflicts_are_errors() {
        let (required, forbidden) = defaults();
        let mut snapshot = pr(&["lgtm", "approved"]);
        snapshot.mergeable = MergeableState::Conflicting;
        assert_eq!(
            wants_state_and_description(&snapshot, &required, &forbidden),
            want(StatusState::Error, STATUS_CONFLICT, false)
        );
    }

    #[test]
    fn published_check() {
        let desired = want(StatusState::Pending, "x", false);
        assert!(!desired.is_published(None));

        let mut observed = desired.to_status();
        assert!(desired.is_published(Some(&observed)));

        observed.description = "y".into();
        assert!(!desired.is_published(Some(&observed)));
    }

    #[test]
    fn tide_status_reads_head_commit() {
        let mut snapshot = pr(&[]);
        assert!(tide_status(&snapshot).is_none());
        snapshot.commits[0]
            .statuses
            .push(status(STATUS_CONTEXT, StatusState::Pending));
        assert_eq!(
            tide_status(&snapshot).map(|s| s.state),
            Some(StatusState::Pending)
        );
    }

    proptest! {
        #[test]
        fn label_order_does_not_matter(
            labels in prop::collection::vec(
                prop::sample::select(vec![
                    "lgtm", "approved", "needs-rebase", "do-not-merge/hold", "bug",
                ]),
                0..6,
            ),
        ) {
            let (required, forbidden) = defaults();
            let forward = pr(&labels);
            let mut reversed_labels = labels.clone();
            reversed_labels.reverse();
            let backward = pr(&reversed_labels);

            prop_assert_eq!(
                wants_state_and_description(&forward, &required, &forbidden),
                wants_state_and_description(&backward, &required, &forbidden)
            );
        }

        #[test]
        fn never_mergeable_without_published_success(
            labels in prop::collection::vec(
                prop::sample::select(vec!["lgtm", "approved", "needs-rebase", "bug"]),
                0..5,
            ),
        ) {
            let (required, forbidden) = defaults();
            let desired = wants_state_and_description(&pr(&labels), &required, &forbidden);
            prop_assert!(!desired.mergeable);
        }
    }
}
