//! Repository-level configuration documents.
//!
//! Both documents live in the repository itself and are parsed from YAML:
//!
//! ```yaml
//! # .github/tidebot.yml
//! plugins:
//!   - name: label
//!     args: ["--forbidden=lgtm,approved"]
//!   - name: lgtm
//!   - name: tide
//!     args: ["--merge-method=squash"]
//! ```
//!
//! ```yaml
//! # OWNERS
//! reviewers: [alice]
//! approvers: [bob]
//! ```

use serde::{Deserialize, Serialize};

/// Declares which plugins run for a repository, in order, and their args.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub plugins: Vec<PluginConfiguration>,
}

impl Configuration {
    /// Parses a configuration document. An empty document is an empty config.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Configuration::default());
        }
        serde_yaml::from_str(text)
    }
}

/// One plugin entry of a [`Configuration`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfiguration {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl PluginConfiguration {
    pub fn new(name: impl Into<String>) -> Self {
        PluginConfiguration {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }
}

/// Reviewers and approvers governing a directory subtree.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OwnersConfiguration {
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub approvers: Vec<String>,
}

impl OwnersConfiguration {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(OwnersConfiguration::default());
        }
        serde_yaml::from_str(text)
    }

    /// Reviewers and approvers, lowercased.
    pub fn members(&self) -> impl Iterator<Item = String> + '_ {
        self.reviewers
            .iter()
            .chain(self.approvers.iter())
            .map(|name| name.to_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plugin_list() {
        let yaml = r#"
plugins:
  - name: label
    args: ["--forbidden=lgtm"]
  - name: help
"#;
        let config = Configuration::from_yaml(yaml).unwrap();
        assert_eq!(
            config.plugins,
            vec![
                PluginConfiguration::new("label").with_args(["--forbidden=lgtm"]),
                PluginConfiguration::new("help"),
            ]
        );
        assert!(config.owner.is_empty());
    }

    #[test]
    fn empty_document_is_empty_config() {
        assert_eq!(Configuration::from_yaml("\n").unwrap(), Configuration::default());
        assert_eq!(
            OwnersConfiguration::from_yaml("").unwrap(),
            OwnersConfiguration::default()
        );
    }

    #[test]
    fn owners_members_are_lowercased() {
        let owners = OwnersConfiguration::from_yaml("reviewers: [Alice]\napprovers: [BOB]\n").unwrap();
        let members: Vec<String> = owners.members().collect();
        assert_eq!(members, vec!["alice", "bob"]);
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(OwnersConfiguration::from_yaml("reviewers: {nope").is_err());
    }
}
