//! Shared application state
//!
//! Built once in `main` and cloned into every handler.

use std::sync::Arc;

use neutron_client::{ManifestFetcher, StatusPublisher};
use sqlx::PgPool;

use crate::cluster::ClusterApi;
use crate::config::Config;
use crate::service::harvester::Harvester;
use crate::service::launcher::Launcher;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub cluster: Arc<dyn ClusterApi>,
    pub fetcher: Arc<dyn ManifestFetcher>,
    pub publisher: Arc<dyn StatusPublisher>,
    pub launcher: Arc<Launcher>,
    pub harvester: Arc<Harvester>,
}

impl AppState {
    /// Wire the services together around the given collaborators
    pub fn new(
        config: Config,
        pool: PgPool,
        cluster: Arc<dyn ClusterApi>,
        fetcher: Arc<dyn ManifestFetcher>,
        publisher: Arc<dyn StatusPublisher>,
    ) -> Self {
        let launcher = Arc::new(Launcher::new(&config, cluster.clone()));
        let harvester = Arc::new(Harvester::new(
            cluster.clone(),
            Arc::new(pool.clone()),
            config.harvest.workers,
            config.harvest.include_failed,
        ));

        Self {
            config: Arc::new(config),
            pool,
            cluster,
            fetcher,
            publisher,
            launcher,
            harvester,
        }
    }
}
