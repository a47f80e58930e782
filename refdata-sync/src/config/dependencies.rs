//! Dependency initialization and wiring for the sync commands.

use std::sync::Arc;

use tracing::info;

use super::SyncConfig;
use crate::SyncError;
use refdata_cache::{CacheCoordinator, RedisCacheStore, SearchIndexSource};
use refdata_pipeline::sources::{
    CoordinateResolver, FintoSource, LocalFileSource, MediaTypeSource, OrganizationCsvSource,
    OrganizationReconciler,
};
use refdata_pipeline::{DataTypeCatalog, IndexPublisher, Orchestrator, SourceAdapters};
use refdata_repository::{OpenSearchClient, SearchIndexProvider};

/// Builds the components each command needs from one configuration.
///
/// Connections are opened lazily so that a command only reaches the
/// services it actually uses.
pub struct Dependencies {
    config: SyncConfig,
    http: reqwest::Client,
}

impl Dependencies {
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Connect to OpenSearch and verify the cluster is healthy.
    pub async fn search_provider(&self) -> Result<Arc<dyn SearchIndexProvider>, SyncError> {
        let url = &self.config.opensearch_url;
        info!(opensearch_url = %url, "Connecting to search index");

        let client = OpenSearchClient::new(url).await.map_err(|e| {
            SyncError::config(format!("Failed to create OpenSearch client: {}", e))
        })?;

        let healthy = client
            .health_check()
            .await
            .map_err(|e| SyncError::config(format!("OpenSearch health check failed: {}", e)))?;
        if !healthy {
            return Err(SyncError::config("OpenSearch cluster is unhealthy"));
        }

        info!("OpenSearch connection verified");
        Ok(Arc::new(client))
    }

    /// One adapter per source kind, all sharing the HTTP client.
    pub fn source_adapters(&self) -> SourceAdapters {
        let coordinates = CoordinateResolver::new(
            self.config.coordinate_mode,
            self.config.coordinates_file.clone(),
            self.http.clone(),
        );

        SourceAdapters {
            graph: Arc::new(FintoSource::new(
                self.http.clone(),
                self.config.finto_url.clone(),
                coordinates,
            )),
            local_file: Arc::new(LocalFileSource::new(self.config.local_dir.clone())),
            organization: Arc::new(OrganizationCsvSource::new(
                self.config.organization_csv.clone(),
            )),
            media_type: Arc::new(MediaTypeSource::new(
                self.http.clone(),
                self.config.media_types_url.clone(),
            )),
        }
    }

    /// The pipeline, restricted to `data_types` when any are named.
    pub async fn orchestrator(&self, data_types: &[String]) -> Result<Orchestrator, SyncError> {
        let catalog = DataTypeCatalog::builtin().select(data_types)?;
        info!(data_types = catalog.len(), "Selected data types");

        let publisher = IndexPublisher::new(self.search_provider().await?);
        Ok(Orchestrator::new(catalog, self.source_adapters(), publisher))
    }

    /// The cache coordinator over Redis and the search index.
    pub async fn coordinator(&self) -> Result<CacheCoordinator, SyncError> {
        let store = RedisCacheStore::connect(&self.config.redis_url).await?;
        let source = SearchIndexSource::new(self.search_provider().await?);

        Ok(CacheCoordinator::with_config(
            Arc::new(store),
            Arc::new(source),
            self.config.coordinator.clone(),
        ))
    }

    /// The organization reconciliation tool.
    pub fn reconciler(&self) -> Result<OrganizationReconciler, SyncError> {
        let api_url = self.config.organization_api_url.clone().ok_or_else(|| {
            SyncError::config("REFDATA_ORGANIZATION_API_URL is required to reconcile organizations")
        })?;

        Ok(OrganizationReconciler::new(
            self.http.clone(),
            api_url,
            self.config.organization_csv.clone(),
        ))
    }
}
