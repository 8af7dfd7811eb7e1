//! Replica synchronization
//!
//! Keeps the local replica and the shared remote document converging.
//!
//! ## Flow
//!
//! 1. A local mutation is written to the replica immediately
//! 2. The push scheduler arms a debounce timer
//! 3. When it fires: conditional fetch, merge if the remote changed, persist,
//!    prune, write
//!
//! On startup the engine pulls once and merges. Failures never escape as
//! errors; they are reported as [`SyncEvent`]s and retried when the host
//! signals that connectivity or visibility came back.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = SyncEngine::from_config(&config)?;
//! engine.sync_on_startup().await;
//! engine.toggle_star("item-id", &ItemMetadata::default()).await?;
//! engine.upload().await;
//! ```

mod context;
mod engine;
mod scheduler;

use thiserror::Error;

use crate::remote::RemoteError;
use crate::storage::StorageError;

pub use engine::{EngineOptions, SyncEngine};
pub use scheduler::{PushScheduler, PushState, DEFAULT_DEBOUNCE};

/// Kind of sync notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEventKind {
    Success,
    Error,
}

/// Notification emitted when a push or pull completes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub kind: SyncEventKind,
    pub message: String,
}

impl SyncEvent {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: SyncEventKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: SyncEventKind::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == SyncEventKind::Success
    }
}

/// Why a sync round failed
#[derive(Error, Debug)]
pub enum SyncError {
    /// No remote credentials; sync is disabled
    #[error("Sync is not configured")]
    NotConfigured,

    /// The remote could not be read or written
    #[error("Remote unavailable: {0}")]
    Remote(#[from] RemoteError),

    /// The local replica could not be read or written
    #[error("Local replica error: {0}")]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// Whether retrying later could succeed without user action
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Remote(e) => e.is_transient(),
            _ => false,
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            SyncError::NotConfigured => {
                Some("Set gist_id and github_token with `blink config set`.")
            }
            SyncError::Remote(e) if e.is_transient() => {
                Some("Local changes are kept; they will sync once the remote is reachable.")
            }
            SyncError::Remote(_) => {
                Some("Check gist_id and github_token with `blink config show`.")
            }
            SyncError::Storage(e) => e.recovery_suggestion(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_event_constructors() {
        let ok = SyncEvent::success("Synced");
        assert!(ok.is_success());
        assert_eq!(ok.message, "Synced");

        let err = SyncEvent::error("Sync failed");
        assert_eq!(err.kind, SyncEventKind::Error);
        assert!(!err.is_success());
    }

    #[test]
    fn test_sync_error_display() {
        let err = SyncError::from(RemoteError::NotFound);
        assert!(err.to_string().contains("not found"));
        assert_eq!(SyncError::NotConfigured.to_string(), "Sync is not configured");
    }

    #[test]
    fn test_sync_error_classification() {
        let offline = SyncError::from(RemoteError::Offline);
        assert!(offline.is_transient());
        assert!(offline.recovery_suggestion().is_some_and(|s| s.contains("will sync")));

        let rejected = SyncError::from(RemoteError::from_status(401));
        assert!(!rejected.is_transient());
        assert!(rejected.recovery_suggestion().is_some_and(|s| s.contains("github_token")));

        let storage = SyncError::from(StorageError::UnsupportedSchema {
            found: 2,
            supported: 1,
        });
        assert!(!storage.is_transient());
        assert_eq!(
            storage.recovery_suggestion(),
            StorageError::UnsupportedSchema {
                found: 2,
                supported: 1
            }
            .recovery_suggestion()
        );
    }
}
