//! Distributed cache coordinator.
//!
//! Many worker processes share one cached [`CacheBlob`]. Two procedures
//! keep it populated without every process reloading it at once:
//!
//! - [`CacheCoordinator::on_app_start`] runs on boot. A startup lock elects
//!   one process to check the blob and reload it if needed.
//! - [`CacheCoordinator::get_reference_data`] runs on every read. A missing
//!   blob triggers a reload; when another process is already reloading the
//!   caller polls the blob for a bounded number of attempts.
//!
//! Both paths end up in [`CacheCoordinator::reload`], which elects a single
//! populator with its own short-lived flag.

use std::sync::Arc;
use std::time::Duration;

use refdata_shared::CacheBlob;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::CacheError;
use crate::source::ReferenceDataSource;
use crate::store::CacheStore;

/// Key of the cached blob.
pub const REFERENCE_DATA_KEY: &str = "reference_data";

/// Key of the startup lock.
pub const STARTUP_LOCK_KEY: &str = "on_app_start_executing";

/// Key of the flag held while a reload runs.
pub const RELOAD_FLAG_KEY: &str = "reference_data_load_executing";

const FLAG_VALUE: &str = "1";

/// Timing and policy of the coordination protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Lifetime of the startup lock if its holder never deletes it.
    pub startup_lock_ttl: Duration,
    /// Lifetime of the reload flag if its holder never deletes it.
    pub reload_flag_ttl: Duration,
    /// Wait before the startup winner releases the lock.
    ///
    /// Lets processes racing on the lock observe it before it goes away.
    /// This narrows the window for a second startup reload but does not
    /// close it.
    pub startup_grace: Duration,
    /// Reload on startup even when a blob is cached.
    pub force_reload: bool,
    /// Blob reads attempted while another process reloads.
    pub read_max_retries: u32,
    /// Sleep before each of those reads.
    pub read_retry_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            startup_lock_ttl: Duration::from_secs(120),
            reload_flag_ttl: Duration::from_secs(120),
            startup_grace: Duration::from_secs(2),
            force_reload: false,
            read_max_retries: 5,
            read_retry_interval: Duration::from_secs(2),
        }
    }
}

/// Result of one reload attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// This caller reloaded and stored the blob.
    Ready(CacheBlob),
    /// Another caller holds the reload flag.
    InProgress,
    /// This caller tried and failed; nothing was stored.
    Failed(String),
}

/// Result of the startup procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupOutcome {
    /// Another process holds the startup lock.
    LockHeld,
    /// A non-empty blob was already cached.
    AlreadyCached,
    /// This process attempted a reload.
    Reloaded(ReloadOutcome),
}

/// Coordinates access to the shared reference data cache.
#[derive(Clone)]
pub struct CacheCoordinator {
    store: Arc<dyn CacheStore>,
    source: Arc<dyn ReferenceDataSource>,
    config: CoordinatorConfig,
}

impl CacheCoordinator {
    pub fn new(store: Arc<dyn CacheStore>, source: Arc<dyn ReferenceDataSource>) -> Self {
        Self::with_config(store, source, CoordinatorConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn CacheStore>,
        source: Arc<dyn ReferenceDataSource>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            source,
            config,
        }
    }

    /// Read and decode the cached blob.
    ///
    /// Store and decoding errors count as a missing blob.
    async fn read_blob(&self) -> Option<CacheBlob> {
        let raw = match self.store.get(REFERENCE_DATA_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read cached reference data");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(blob) => Some(blob),
            Err(e) => {
                warn!(error = %e, "Cached reference data is not a valid blob");
                None
            }
        }
    }

    async fn load_and_store(&self) -> Result<CacheBlob, CacheError> {
        let blob = self.source.fetch_all().await?;
        if blob.is_empty() {
            return Err(CacheError::source("search index holds no reference data"));
        }

        let raw = serde_json::to_string(&blob)?;
        self.store.set(REFERENCE_DATA_KEY, &raw, None).await?;
        Ok(blob)
    }

    /// Reload the blob from the source unless another caller already is.
    ///
    /// The reload flag is always released by the caller that took it.
    #[instrument(skip(self))]
    pub async fn reload(&self) -> ReloadOutcome {
        let flag = match self
            .store
            .get_or_set(RELOAD_FLAG_KEY, FLAG_VALUE, self.config.reload_flag_ttl)
            .await
        {
            Ok(flag) => flag,
            Err(e) => {
                error!(error = %e, "Could not take the reload flag");
                return ReloadOutcome::Failed(e.to_string());
            }
        };

        if flag.was_present {
            debug!("Reload already running elsewhere");
            return ReloadOutcome::InProgress;
        }

        let outcome = match self.load_and_store().await {
            Ok(blob) => {
                info!(counts = ?blob.counts(), "Reloaded reference data cache");
                ReloadOutcome::Ready(blob)
            }
            Err(e) => {
                error!(error = %e, "Reloading reference data cache failed");
                ReloadOutcome::Failed(e.to_string())
            }
        };

        if let Err(e) = self.store.delete(RELOAD_FLAG_KEY).await {
            warn!(error = %e, "Failed to release the reload flag, it will expire");
        }

        outcome
    }

    /// Populate the cache on process start, once across all processes.
    ///
    /// The winner of the startup lock keeps it for the grace period after
    /// its work, whether that work succeeded or not, and then deletes it.
    #[instrument(skip(self))]
    pub async fn on_app_start(&self) -> Result<StartupOutcome, CacheError> {
        let lock = self
            .store
            .get_or_set(STARTUP_LOCK_KEY, FLAG_VALUE, self.config.startup_lock_ttl)
            .await?;
        if lock.was_present {
            debug!("Startup population handled by another process");
            return Ok(StartupOutcome::LockHeld);
        }

        let outcome = if self.config.force_reload {
            info!("Forced reload of reference data cache");
            StartupOutcome::Reloaded(self.reload().await)
        } else {
            match self.read_blob().await {
                Some(blob) if !blob.is_empty() => StartupOutcome::AlreadyCached,
                _ => StartupOutcome::Reloaded(self.reload().await),
            }
        };

        tokio::time::sleep(self.config.startup_grace).await;
        if let Err(e) = self.store.delete(STARTUP_LOCK_KEY).await {
            warn!(error = %e, "Failed to release the startup lock, it will expire");
        }

        Ok(outcome)
    }

    /// Return the cached blob, reloading or waiting for a reload as needed.
    ///
    /// Fails with an unavailability error when this caller's reload fails
    /// or when another process's reload outlasts the retry budget.
    #[instrument(skip(self))]
    pub async fn get_reference_data(&self) -> Result<CacheBlob, CacheError> {
        if let Some(blob) = self.read_blob().await {
            return Ok(blob);
        }

        match self.reload().await {
            ReloadOutcome::Ready(blob) => Ok(blob),
            ReloadOutcome::Failed(cause) => Err(CacheError::reload_failed(cause)),
            ReloadOutcome::InProgress => {
                for attempt in 1..=self.config.read_max_retries {
                    tokio::time::sleep(self.config.read_retry_interval).await;
                    if let Some(blob) = self.read_blob().await {
                        debug!(attempt = attempt, "Reference data appeared");
                        return Ok(blob);
                    }
                }
                warn!(
                    retries = self.config.read_max_retries,
                    "Reference data still missing after waiting for reload"
                );
                Err(CacheError::RetryBudgetExhausted)
            }
        }
    }
}
