//! Data models for Blink
//!
//! Defines the replicated annotation state: `ItemRecord` and `MetaDocument`.
//! Both serialize to the JSON shape stored locally and in the remote gist.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read/starred annotation for one feed item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemRecord {
    /// Stable identifier of the feed item
    pub id: String,
    /// First time this item was seen
    #[serde(default = "Utc::now")]
    pub date: DateTime<Utc>,
    /// User-toggled star
    #[serde(default)]
    pub starred: bool,
    /// Has been displayed at least once. Never reverts to false.
    #[serde(default = "default_seen")]
    pub seen: bool,
    /// Last time `starred` was toggled
    #[serde(
        default,
        alias = "starredChangedAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub starred_changed_at: Option<DateTime<Utc>>,
    /// Display metadata cached so a starred item stays presentable
    #[serde(flatten)]
    pub metadata: ItemMetadata,
}

fn default_seen() -> bool {
    true
}

/// Denormalized display fields for an item
///
/// Fill-in-once data: the merge keeps the first non-empty value per field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, alias = "link", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_title: Option<String>,
}

impl ItemMetadata {
    /// Metadata carrying only a title and URL
    pub fn titled(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Fill every empty field from `other`, keeping values already present
    pub fn fill_from(&mut self, other: &ItemMetadata) {
        fill(&mut self.title, &other.title);
        fill(&mut self.url, &other.url);
        fill(&mut self.published, &other.published);
        fill(&mut self.thumbnail, &other.thumbnail);
        fill(&mut self.video_id, &other.video_id);
        fill(&mut self.feed_title, &other.feed_title);
    }
}

fn fill(slot: &mut Option<String>, candidate: &Option<String>) {
    let empty = slot.as_deref().map_or(true, str::is_empty);
    if empty {
        if let Some(value) = candidate.as_deref().filter(|v| !v.is_empty()) {
            *slot = Some(value.to_string());
        }
    }
}

impl ItemRecord {
    /// Create a record first seen at `date`
    pub fn new(id: impl Into<String>, date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            date,
            starred: false,
            seen: false,
            starred_changed_at: None,
            metadata: ItemMetadata::default(),
        }
    }

    /// Set the star flag, recording the change time if the value changed
    ///
    /// Returns true if the flag actually changed.
    pub fn set_starred(&mut self, starred: bool, at: DateTime<Utc>) -> bool {
        if self.starred == starred {
            return false;
        }
        self.starred = starred;
        self.starred_changed_at = Some(at);
        true
    }

    /// Most recent activity on this record: the later of the last star toggle
    /// and first-seen
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.starred_changed_at
            .map_or(self.date, |changed| changed.max(self.date))
    }
}

/// The unit of replication: every item annotation on one replica
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetaDocument {
    #[serde(default)]
    pub items: Vec<ItemRecord>,
    /// Last time the document as a whole was written
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl MetaDocument {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Get a record by item ID
    ///
    /// Lookups scan `items`; batch updates go through an id index instead.
    pub fn get(&self, id: &str) -> Option<&ItemRecord> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Get a mutable record by item ID
    pub fn get_mut(&mut self, id: &str) -> Option<&mut ItemRecord> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Get the record for `id`, creating it first-seen at `now` if missing
    pub fn entry(&mut self, id: &str, now: DateTime<Utc>) -> &mut ItemRecord {
        let index = match self.items.iter().position(|item| item.id == id) {
            Some(index) => index,
            None => {
                self.items.push(ItemRecord::new(id, now));
                self.items.len() - 1
            }
        };
        &mut self.items[index]
    }

    /// IDs of every starred record, in document order
    pub fn starred_ids(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|item| item.starred)
            .map(|item| item.id.clone())
            .collect()
    }

    /// Record that an item has been displayed
    pub fn mark_seen(&mut self, id: &str, metadata: &ItemMetadata, now: DateTime<Utc>) {
        let record = self.entry(id, now);
        record.seen = true;
        record.metadata.fill_from(metadata);
    }

    /// Record that a batch of items has been displayed
    ///
    /// Indexes the document once so a page of ids costs one pass.
    pub fn mark_seen_many<'a, I>(&mut self, items: I, now: DateTime<Utc>)
    where
        I: IntoIterator<Item = (&'a str, &'a ItemMetadata)>,
    {
        let mut index: HashMap<String, usize> = self
            .items
            .iter()
            .enumerate()
            .map(|(position, item)| (item.id.clone(), position))
            .collect();

        for (id, metadata) in items {
            let position = match index.get(id) {
                Some(&position) => position,
                None => {
                    self.items.push(ItemRecord::new(id, now));
                    index.insert(id.to_string(), self.items.len() - 1);
                    self.items.len() - 1
                }
            };
            let record = &mut self.items[position];
            record.seen = true;
            record.metadata.fill_from(metadata);
        }
    }

    /// Star or unstar an item
    ///
    /// A record created by starring counts as seen. Returns true if the flag
    /// changed.
    pub fn set_starred(
        &mut self,
        id: &str,
        starred: bool,
        metadata: &ItemMetadata,
        now: DateTime<Utc>,
    ) -> bool {
        let created = self.get(id).is_none();
        let record = self.entry(id, now);
        if created {
            record.seen = true;
        }
        record.metadata.fill_from(metadata);
        record.set_starred(starred, now)
    }

    /// Flip the star on an item and return the new value
    pub fn toggle_star(&mut self, id: &str, metadata: &ItemMetadata, now: DateTime<Utc>) -> bool {
        let starred = !self.get(id).is_some_and(|item| item.starred);
        self.set_starred(id, starred, metadata, now);
        starred
    }
}
