//! Retention policy for the published document
//!
//! Only the copy sent to the remote store is pruned; the local replica keeps
//! every record. Pruning bounds the size of the shared document while still
//! giving other devices time to learn about recent unstars and seen history.

use chrono::{DateTime, Duration, Utc};

use crate::models::{ItemMetadata, ItemRecord, MetaDocument};

/// Retention window applied before publishing remotely
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    window: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_days(2)
    }
}

impl RetentionPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn from_days(days: u32) -> Self {
        Self::new(Duration::days(i64::from(days)))
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// How long a local-only record survives a merge before it is treated as
    /// pruned by the remote: 1.5x the retention window
    pub fn grace_period(&self) -> Duration {
        self.window + self.window / 2
    }

    fn within_window(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - at <= self.window
    }

    /// Whether a record is worth publishing
    pub fn should_publish(&self, item: &ItemRecord, now: DateTime<Utc>) -> bool {
        if item.starred {
            return true;
        }
        if item
            .starred_changed_at
            .is_some_and(|changed| self.within_window(changed, now))
        {
            return true;
        }
        self.within_window(item.date, now)
    }

    /// Build the document to publish remotely
    ///
    /// Kept records are reduced to their wire fields and `updated_at` is
    /// cleared, since the remote store supplies it on write.
    pub fn prune(&self, doc: &MetaDocument, now: DateTime<Utc>) -> MetaDocument {
        let items = doc
            .items
            .iter()
            .filter(|item| self.should_publish(item, now))
            .map(sanitize_for_wire)
            .collect();

        MetaDocument {
            items,
            updated_at: None,
        }
    }
}

/// Keep only the fields other devices need
///
/// Thumbnails, video ids and feed titles stay local.
fn sanitize_for_wire(item: &ItemRecord) -> ItemRecord {
    ItemRecord {
        id: item.id.clone(),
        date: item.date,
        starred: item.starred,
        seen: item.seen,
        starred_changed_at: item.starred_changed_at,
        metadata: ItemMetadata {
            title: item.metadata.title.clone(),
            url: item.metadata.url.clone(),
            published: item.metadata.published.clone(),
            ..ItemMetadata::default()
        },
    }
}
