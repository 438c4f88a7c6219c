use std::sync::Arc;

use anyhow::Context;
use neutron_client::GitLabClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod cluster;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;
pub mod state;

#[cfg(test)]
mod testing;

use cluster::KubeClient;
use config::Config;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neutron_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Neutron Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let cluster = KubeClient::from_settings(&config.kube).context("Failed to configure cluster client")?;
    tracing::info!(
        "Cluster API {} (namespace {})",
        config.kube.api_url,
        cluster.namespace()
    );

    let gitlab = Arc::new(
        GitLabClient::new(&config.gitlab.url, &config.gitlab.token)
            .with_manifest_path(&config.gitlab.manifest_path),
    );

    let addr = config.bind_addr.clone();
    let state = AppState::new(config, pool, Arc::new(cluster), gitlab.clone(), gitlab);

    // Build router with all API endpoints
    let app = api::create_router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
