//! `/label <name>` and `/remove-label <name>`.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use clap::Parser;
use regex::Regex;
use tracing::{debug, warn};

use super::args::bind;
use super::command::{command_pattern, invocations, strip_html_comments};
use super::{Plugin, PluginError};
use crate::clients::{Capabilities, IssueClient};
use crate::types::{CommentAction, Event};

pub const NAME: &str = "label";

static LABEL: LazyLock<Regex> = LazyLock::new(|| command_pattern("label"));
static REMOVE_LABEL: LazyLock<Regex> = LazyLock::new(|| command_pattern("remove-label"));

#[derive(Debug, Clone, Default, Parser)]
#[command(no_binary_name = true, disable_help_flag = true)]
struct LabelArgs {
    /// Labels that may never be added or removed through comments.
    #[arg(long, value_delimiter = ',')]
    forbidden: Vec<String>,
}

pub struct LabelPlugin {
    issues: Arc<dyn IssueClient>,
    args: LabelArgs,
}

impl LabelPlugin {
    pub fn new(caps: &Capabilities) -> Self {
        LabelPlugin {
            issues: Arc::clone(&caps.issues),
            args: LabelArgs::default(),
        }
    }
}

/// Lowercased single-argument names for `pattern`, in order, without
/// duplicates or forbidden entries.
fn requested(
    pattern: &Regex,
    command: &str,
    body: &str,
    forbidden: &HashSet<String>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    invocations(pattern, body)
        .into_iter()
        .filter(|parts| parts.len() == 2 && parts[0] == command && !parts[1].is_empty())
        .map(|parts| parts[1].to_lowercase())
        .filter(|name| !forbidden.contains(name))
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

#[async_trait]
impl Plugin for LabelPlugin {
    fn name(&self) -> &'static str {
        NAME
    }

    fn description(&self) -> &'static str {
        "Applies or removes a label from one of the recognized types of labels."
    }

    fn usage(&self) -> &'static str {
        "/[remove-]label [name]"
    }

    fn bind_args(&mut self, args: &[String]) -> Result<(), PluginError> {
        self.args = bind(NAME, args)?;
        Ok(())
    }

    async fn handle(&self, event: &Event) -> Result<(), PluginError> {
        let Event::Comment(e) = event else {
            return Ok(());
        };
        if e.action != CommentAction::Created {
            return Ok(());
        }

        let body = strip_html_comments(&e.body);
        let forbidden: HashSet<String> =
            self.args.forbidden.iter().map(|l| l.to_lowercase()).collect();
        let adds = requested(&LABEL, "/label", &body, &forbidden);
        let removes = requested(&REMOVE_LABEL, "/remove-label", &body, &forbidden);

        for label in &removes {
            if let Err(err) = self.issues.remove_label(&e.repo, e.number, label).await {
                warn!(
                    repo = %e.repo,
                    number = %e.number,
                    label = %label,
                    error = %err,
                    "Failed to remove label"
                );
            }
        }

        if !adds.is_empty() {
            debug!(repo = %e.repo, number = %e.number, labels = ?adds, "Adding labels");
            self.issues.add_labels(&e.repo, e.number, &adds).await?;
        }
        Ok(())
    }
}
