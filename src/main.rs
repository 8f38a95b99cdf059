use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tidebot::cache::{CacheSyncer, ExactCache, NearestCache};
use tidebot::clients::{Capabilities, CachedConfigClient, CachedOwnersClient, SpanLogger};
use tidebot::github::GitHubClient;
use tidebot::plugins::{Dispatcher, PluginRegistry, register_builtins};
use tidebot::server::{AppState, build_router};
use tidebot::settings::Settings;
use tidebot::tide::TideController;
use tidebot::types::{Configuration, OwnersConfiguration};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tidebot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::parse();
    info!(?settings, "Starting");

    let github = Arc::new(
        GitHubClient::from_token(settings.github_token.clone())
            .context("building GitHub client")?
            .with_config_path(settings.config_path.clone())
            .with_owners_file(settings.owners_file.clone()),
    );

    let syncer = Arc::new(CacheSyncer::new(settings.refresh_config()));
    let config = CachedConfigClient::new(
        github.clone(),
        Arc::new(ExactCache::<Configuration>::new()),
        syncer.clone(),
        settings.config_path.clone(),
    );
    let owners = CachedOwnersClient::new(
        github.clone(),
        Arc::new(NearestCache::<OwnersConfiguration>::new()),
        syncer.clone(),
    );

    let caps = Capabilities {
        issues: github.clone(),
        pulls: github.clone(),
        repos: github.clone(),
        search: github.clone(),
        config: Arc::new(config),
        owners: Arc::new(owners),
        logger: Arc::new(SpanLogger::default()),
    };

    let controller = Arc::new(TideController::new(settings.tide_config()));
    let registry = PluginRegistry::new();
    register_builtins(&registry, controller.clone());
    info!(plugins = ?registry.names(), "Registered plugins");

    let dispatcher = Arc::new(Dispatcher::new(registry, caps));
    let app = build_router(AppState::new(dispatcher, settings.webhook_secret.clone()));

    let shutdown = CancellationToken::new();
    let mut tasks = vec![syncer.spawn(shutdown.clone())];
    tasks.extend(controller.spawn(shutdown.clone()));

    let listener = tokio::net::TcpListener::bind(settings.listen)
        .await
        .with_context(|| format!("binding {}", settings.listen))?;
    info!("listening on {}", settings.listen);

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Shutting down");
            signal.cancel();
        })
        .await
        .context("serving")?;

    shutdown.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Background task ended abnormally");
        }
    }
    Ok(())
}
