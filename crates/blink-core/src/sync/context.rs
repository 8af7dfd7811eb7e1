//! Shared pieces of a sync round
//!
//! Both the engine (pulls) and the push worker (pushes) go through here, so
//! a pull and a push share one merge path and one lock order: remote first,
//! then replica.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::SyncError;
use crate::merge::merge;
use crate::models::MetaDocument;
use crate::remote::{FetchOutcome, RemoteError, RemoteStore};
use crate::retention::RetentionPolicy;
use crate::storage::ReplicaStore;

pub(crate) type SharedReplica = Arc<Mutex<ReplicaStore>>;
pub(crate) type SharedRemote = Arc<Mutex<Box<dyn RemoteStore>>>;

#[derive(Clone)]
pub(crate) struct SyncContext {
    pub replica: SharedReplica,
    pub remote: SharedRemote,
    pub policy: RetentionPolicy,
}

impl SyncContext {
    /// Fetch the remote document if it changed
    ///
    /// A remote without a document yet reads as unchanged: there is nothing
    /// to merge, and the next push creates it.
    async fn fetch_changed(remote: &mut dyn RemoteStore) -> Result<Option<MetaDocument>, SyncError> {
        match remote.fetch().await {
            FetchOutcome::Changed(doc) => Ok(Some(doc)),
            FetchOutcome::Unchanged => Ok(None),
            FetchOutcome::Unavailable(RemoteError::MissingFile(file)) => {
                debug!("Remote has no {} yet", file);
                Ok(None)
            }
            FetchOutcome::Unavailable(e) => Err(e.into()),
        }
    }

    /// Merge a fetched document into the replica and persist the result
    async fn reconcile(&self, remote_doc: &MetaDocument) -> Result<MetaDocument, SyncError> {
        let replica = self.replica.lock().await;
        let local = replica.get()?;
        let merged = merge(&local, remote_doc, &self.policy, Utc::now());
        replica.set(&merged)?;
        debug!(
            "Merged remote ({} items) into local ({} items) -> {} items",
            remote_doc.len(),
            local.len(),
            merged.len()
        );
        Ok(merged)
    }

    /// Pull the remote and merge it; true if a changed remote was merged
    pub async fn pull(&self) -> Result<bool, SyncError> {
        let mut remote = self.remote.lock().await;
        let Some(remote_doc) = Self::fetch_changed(&mut **remote).await? else {
            return Ok(false);
        };
        drop(remote);

        self.reconcile(&remote_doc).await?;
        Ok(true)
    }

    /// Publish the local document
    ///
    /// Re-bases on the remote first if it changed since we last saw it, so a
    /// write never discards another device's edits that we could have seen.
    pub async fn push(&self) -> Result<(), SyncError> {
        let mut remote = self.remote.lock().await;

        let local = match Self::fetch_changed(&mut **remote).await? {
            Some(remote_doc) => {
                info!("Remote changed since last sync, merging before push");
                self.reconcile(&remote_doc).await?
            }
            None => self.replica.lock().await.get()?,
        };

        let published = self.policy.prune(&local, Utc::now());
        remote.write(&published).await?;
        info!(
            "Pushed {} of {} items to remote",
            published.len(),
            local.len()
        );
        Ok(())
    }
}
