//! Sync orchestrator
//!
//! `SyncEngine` is the one entry point hosts use. It owns the local replica,
//! the remote client and the push worker, sequences the startup pull, and
//! turns every failure into a notification rather than an error.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use super::context::{SharedReplica, SyncContext};
use super::scheduler::{PushScheduler, PushState, DEFAULT_DEBOUNCE};
use super::{SyncError, SyncEvent};
use crate::config::Config;
use crate::models::{ItemMetadata, MetaDocument};
use crate::remote::{GistClient, RemoteStore};
use crate::retention::RetentionPolicy;
use crate::storage::{ReplicaStore, StorageResult};

/// Notices buffered per subscriber before the oldest are dropped
const EVENT_CAPACITY: usize = 32;

/// Tunables for an engine instance
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub retention: RetentionPolicy,
    pub debounce: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Replica synchronization engine
pub struct SyncEngine {
    replica: SharedReplica,
    /// Present only when remote credentials are configured
    sync: Option<(SyncContext, PushScheduler)>,
    /// Notices are only queued for live subscribers
    event_tx: broadcast::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create an engine
    ///
    /// Without a remote every sync operation is a silent no-op and the
    /// engine works purely on the local replica. With one, a push worker is
    /// spawned, so this must be called from within a Tokio runtime.
    pub fn new(
        replica: ReplicaStore,
        remote: Option<Box<dyn RemoteStore>>,
        options: EngineOptions,
    ) -> Self {
        let replica = Arc::new(Mutex::new(replica));
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let sync = remote.map(|remote| {
            let context = SyncContext {
                replica: Arc::clone(&replica),
                remote: Arc::new(Mutex::new(remote)),
                policy: options.retention,
            };
            let scheduler = PushScheduler::spawn(context.clone(), options.debounce, event_tx.clone());
            (context, scheduler)
        });

        Self {
            replica,
            sync,
            event_tx,
        }
    }

    /// Build an engine from configuration
    ///
    /// Opens the replica database under the data directory and, when a gist
    /// id and token are configured, a gist client.
    pub fn from_config(config: &Config) -> Result<Self> {
        let replica = ReplicaStore::open(&config.sqlite_path())
            .with_context(|| format!("Failed to open replica at {:?}", config.sqlite_path()))?;

        let remote: Option<Box<dyn RemoteStore>> = match config.gist_credentials() {
            Some(credentials) => {
                let client = GistClient::new(credentials, &config.api_base, config.request_timeout())
                    .context("Failed to create gist client")?;
                Some(Box::new(client))
            }
            None => {
                debug!("No gist credentials configured, sync disabled");
                None
            }
        };

        let options = EngineOptions {
            retention: config.retention(),
            debounce: config.debounce(),
        };
        Ok(Self::new(replica, remote, options))
    }

    /// Whether remote sync is configured
    pub fn is_configured(&self) -> bool {
        self.sync.is_some()
    }

    /// Subscribe to sync notices emitted from now on
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.event_tx.subscribe()
    }

    /// Current push state; `Idle` when sync is not configured
    pub fn push_state(&self) -> PushState {
        self.sync
            .as_ref()
            .map_or(PushState::Idle, |(_, scheduler)| scheduler.state())
    }

    /// Subscribe to push state changes
    pub fn subscribe_state(&self) -> Option<watch::Receiver<PushState>> {
        self.sync
            .as_ref()
            .map(|(_, scheduler)| scheduler.subscribe_state())
    }

    // ==================== Local State ====================

    /// The current local document
    pub async fn document(&self) -> StorageResult<MetaDocument> {
        self.replica.lock().await.get()
    }

    /// Starred ids from the lightweight projection
    pub async fn starred_ids(&self) -> StorageResult<Vec<String>> {
        self.replica.lock().await.starred_ids()
    }

    /// Record that an item was displayed
    pub async fn mark_seen(&self, id: &str, metadata: &ItemMetadata) -> StorageResult<()> {
        self.mutate(|doc| doc.mark_seen(id, metadata, Utc::now())).await
    }

    /// Record that a page of items was displayed, as one mutation
    pub async fn mark_seen_many<'a, I>(&self, items: I) -> StorageResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a ItemMetadata)>,
    {
        self.mutate(|doc| doc.mark_seen_many(items, Utc::now())).await
    }

    /// Star or unstar an item
    pub async fn set_starred(
        &self,
        id: &str,
        starred: bool,
        metadata: &ItemMetadata,
    ) -> StorageResult<()> {
        self.mutate(|doc| {
            doc.set_starred(id, starred, metadata, Utc::now());
        })
        .await
    }

    /// Flip the star on an item, returning the new value
    pub async fn toggle_star(&self, id: &str, metadata: &ItemMetadata) -> StorageResult<bool> {
        self.mutate(|doc| doc.toggle_star(id, metadata, Utc::now())).await
    }

    /// Clear the local replica
    ///
    /// The remote is untouched; the next pull repopulates from it.
    pub async fn reset(&self) -> StorageResult<()> {
        self.replica.lock().await.reset()?;
        if let Some((context, _)) = &self.sync {
            context.remote.lock().await.forget_version();
        }
        info!("Local replica reset");
        Ok(())
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut MetaDocument) -> T) -> StorageResult<T> {
        let result = self.replica.lock().await.update(f)?;
        self.push_soon();
        Ok(result)
    }

    // ==================== Sync ====================

    /// Pull once at startup and merge into the local replica
    ///
    /// Emits a success notice if the remote changed, an error notice if it
    /// could not be read, and nothing if it was unchanged.
    pub async fn sync_on_startup(&self) {
        let Some((context, _)) = &self.sync else {
            return;
        };

        match context.pull().await {
            Ok(true) => {
                info!("Startup sync merged remote changes");
                self.emit(SyncEvent::success("Synced"));
            }
            Ok(false) => debug!("Startup sync: remote unchanged"),
            Err(e) => {
                warn!("Sync on startup failed: {}", e);
                self.emit(SyncEvent::error("Sync failed"));
            }
        }
    }

    /// Pull and merge; true if a changed remote was merged
    pub async fn pull(&self) -> bool {
        match self.try_pull().await {
            Ok(merged) => merged,
            Err(SyncError::NotConfigured) => false,
            Err(e) => {
                warn!("Pull failed: {}", e);
                false
            }
        }
    }

    /// Pull and merge, reporting why it failed
    pub async fn try_pull(&self) -> Result<bool, SyncError> {
        let (context, _) = self.sync.as_ref().ok_or(SyncError::NotConfigured)?;
        context.pull().await
    }

    /// Schedule a debounced push
    pub fn push_soon(&self) {
        if let Some((_, scheduler)) = &self.sync {
            scheduler.push_soon();
        }
    }

    /// Push immediately, cancelling any pending debounce
    ///
    /// Call before anything that would drop unflushed mutations, such as a
    /// reload or process exit. Returns true if the push succeeded.
    pub async fn upload(&self) -> bool {
        match &self.sync {
            Some((_, scheduler)) => scheduler.upload().await,
            None => false,
        }
    }

    /// Host regained network connectivity
    pub fn connectivity_restored(&self) {
        if let Some((_, scheduler)) = &self.sync {
            scheduler.connectivity_restored();
        }
    }

    /// Host view became visible again
    pub fn became_visible(&self) {
        if let Some((_, scheduler)) = &self.sync {
            scheduler.became_visible();
        }
    }

    /// Stop the push worker
    ///
    /// Pending debounced pushes are dropped; call `upload()` first to flush.
    pub async fn shutdown(self) {
        if let Some((_, scheduler)) = self.sync {
            scheduler.shutdown().await;
        }
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_tx.send(event);
    }
}
