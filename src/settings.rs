//! Process settings, from flags or the environment.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::cache::RefreshConfig;
use crate::github::{DEFAULT_CONFIG_PATH, DEFAULT_OWNERS_FILE};
use crate::tide::TideConfig;

#[derive(Parser, Clone)]
#[command(name = "tidebot")]
#[command(version, about, long_about = None)]
pub struct Settings {
    /// Address the webhook server listens on.
    #[arg(long, env = "TIDEBOT_LISTEN", default_value = "0.0.0.0:3000")]
    pub listen: SocketAddr,

    /// Token used for every GitHub API call.
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: String,

    /// Shared secret GitHub signs deliveries with.
    #[arg(long, env = "TIDEBOT_WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: String,

    /// Path of the plugin configuration file inside each repository.
    #[arg(long, env = "TIDEBOT_CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    pub config_path: String,

    /// File name of governance files.
    #[arg(long, env = "TIDEBOT_OWNERS_FILE", default_value = DEFAULT_OWNERS_FILE)]
    pub owners_file: String,

    /// Seconds between refreshes of cached configuration and owners files.
    #[arg(
        long,
        env = "TIDEBOT_REFRESH_INTERVAL_SECS",
        default_value_t = 300,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub refresh_interval_secs: u64,

    /// Seconds between re-lists of open PRs in enrolled repositories.
    #[arg(
        long,
        env = "TIDEBOT_RELIST_INTERVAL_SECS",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub relist_interval_secs: u64,

    /// Concurrent merge reconcile workers.
    #[arg(long, env = "TIDEBOT_TIDE_WORKERS", default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub tide_workers: u16,
}

impl Settings {
    pub fn refresh_config(&self) -> RefreshConfig {
        RefreshConfig {
            interval: Duration::from_secs(self.refresh_interval_secs),
            ..RefreshConfig::default()
        }
    }

    pub fn tide_config(&self) -> TideConfig {
        TideConfig {
            relist_interval: Duration::from_secs(self.relist_interval_secs),
            workers: usize::from(self.tide_workers),
            ..TideConfig::default()
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("listen", &self.listen)
            .field("config_path", &self.config_path)
            .field("owners_file", &self.owners_file)
            .field("refresh_interval_secs", &self.refresh_interval_secs)
            .field("relist_interval_secs", &self.relist_interval_secs)
            .field("tide_workers", &self.tide_workers)
            .finish_non_exhaustive()
    }
}
