//! In-process remote store
//!
//! Behaves like the gist: a version counter stands in for the ETag, writes
//! stamp `updated_at`, and a missing document reads as a missing file.
//! Cloned handles share one document, so tests can run several devices
//! against the same remote. Each handle keeps its own version token.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{decode_payload, encode_payload, FetchOutcome, RemoteError, RemoteStore, DOCUMENT_FILE};
use crate::models::MetaDocument;

#[derive(Debug, Default)]
struct Shared {
    content: Option<String>,
    version: u64,
    updated_at: Option<DateTime<Utc>>,
    writes: usize,
    offline: bool,
}

/// Remote store held in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    shared: Arc<Mutex<Shared>>,
    seen_version: Option<u64>,
}

impl MemoryRemote {
    /// Create an empty remote
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a remote already holding `doc`
    pub fn with_document(doc: &MetaDocument) -> Result<Self, RemoteError> {
        let remote = Self::new();
        remote.store(doc)?;
        Ok(remote)
    }

    /// Another handle on the same document with no version token
    pub fn device(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            seen_version: None,
        }
    }

    /// Simulate losing or regaining connectivity
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Number of successful writes
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// The stored document as another device would read it
    pub fn document(&self) -> Option<MetaDocument> {
        let shared = self.lock();
        let mut doc = decode_payload(shared.content.as_deref()?).ok()?;
        doc.updated_at = shared.updated_at;
        Some(doc)
    }

    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, doc: &MetaDocument) -> Result<u64, RemoteError> {
        let content = encode_payload(doc)?;
        let mut shared = self.lock();
        if shared.offline {
            return Err(RemoteError::Offline);
        }

        // Keep write times strictly increasing even within one clock tick
        let now = Utc::now();
        let stamp = match shared.updated_at {
            Some(prev) if prev >= now => prev + Duration::milliseconds(1),
            _ => now,
        };

        shared.content = Some(content);
        shared.version += 1;
        shared.updated_at = Some(stamp);
        Ok(shared.version)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch(&mut self) -> FetchOutcome {
        let (content, version, updated_at) = {
            let shared = self.lock();
            if shared.offline {
                return FetchOutcome::Unavailable(RemoteError::Offline);
            }
            let Some(content) = shared.content.clone() else {
                return FetchOutcome::Unavailable(RemoteError::MissingFile(
                    DOCUMENT_FILE.to_string(),
                ));
            };
            (content, shared.version, shared.updated_at)
        };

        if self.seen_version == Some(version) {
            return FetchOutcome::Unchanged;
        }

        match decode_payload(&content) {
            Ok(mut doc) => {
                doc.updated_at = updated_at;
                self.seen_version = Some(version);
                FetchOutcome::Changed(doc)
            }
            Err(e) => FetchOutcome::Unavailable(e),
        }
    }

    async fn write(&mut self, doc: &MetaDocument) -> Result<(), RemoteError> {
        let version = self.store(doc)?;
        self.lock().writes += 1;
        self.seen_version = Some(version);
        Ok(())
    }

    fn forget_version(&mut self) {
        self.seen_version = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemMetadata;

    fn sample() -> MetaDocument {
        let mut doc = MetaDocument::new();
        doc.set_starred("a", true, &ItemMetadata::default(), Utc::now());
        doc
    }

    #[tokio::test]
    async fn test_empty_remote_is_missing_file() {
        let mut remote = MemoryRemote::new();
        assert!(matches!(
            remote.fetch().await,
            FetchOutcome::Unavailable(RemoteError::MissingFile(_))
        ));
    }

    #[tokio::test]
    async fn test_conditional_fetch() {
        let mut remote = MemoryRemote::with_document(&sample()).unwrap();

        match remote.fetch().await {
            FetchOutcome::Changed(doc) => {
                assert_eq!(doc.starred_ids(), vec!["a".to_string()]);
                assert!(doc.updated_at.is_some());
            }
            other => panic!("expected Changed, got {:?}", other),
        }
        assert!(matches!(remote.fetch().await, FetchOutcome::Unchanged));

        remote.forget_version();
        assert!(matches!(remote.fetch().await, FetchOutcome::Changed(_)));
    }

    #[tokio::test]
    async fn test_own_write_is_not_a_change() {
        let mut remote = MemoryRemote::new();
        remote.write(&sample()).await.unwrap();
        assert!(matches!(remote.fetch().await, FetchOutcome::Unchanged));
        assert_eq!(remote.write_count(), 1);
    }

    #[tokio::test]
    async fn test_other_device_write_is_a_change() {
        let mut phone = MemoryRemote::new();
        let mut laptop = phone.device();

        phone.write(&sample()).await.unwrap();
        assert!(matches!(laptop.fetch().await, FetchOutcome::Changed(_)));
        assert!(matches!(laptop.fetch().await, FetchOutcome::Unchanged));

        laptop.write(&MetaDocument::new()).await.unwrap();
        assert!(matches!(phone.fetch().await, FetchOutcome::Changed(_)));
    }

    #[tokio::test]
    async fn test_offline() {
        let mut remote = MemoryRemote::with_document(&sample()).unwrap();
        remote.set_offline(true);

        assert!(remote.fetch().await.is_unavailable());
        assert!(matches!(
            remote.write(&sample()).await,
            Err(RemoteError::Offline)
        ));
        assert_eq!(remote.write_count(), 0);

        remote.set_offline(false);
        assert!(matches!(remote.fetch().await, FetchOutcome::Changed(_)));
    }

    #[test]
    fn test_write_times_increase() {
        let remote = MemoryRemote::new();
        remote.store(&sample()).unwrap();
        let first = remote.document().unwrap().updated_at.unwrap();
        remote.store(&sample()).unwrap();
        let second = remote.document().unwrap().updated_at.unwrap();
        assert!(second > first);
    }
}
