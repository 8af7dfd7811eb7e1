//! Replica merge
//!
//! Reconciles the local document with a copy fetched from the remote store.
//! The merge is pure: the current time and retention policy are inputs, and
//! neither document is modified.
//!
//! ## Rules
//!
//! For ids present on both sides:
//! - `seen` is the OR of both sides
//! - `starred` follows the later `starred_changed_at`; local wins ties
//! - display metadata keeps the first non-empty value per field
//! - `date` keeps the earlier first-seen time
//!
//! Records present on one side are kept, except a local-only unstarred record
//! whose last activity is older than the grace period. The remote no longer
//! having it means the remote pruned it, and keeping it would resurrect it on
//! every push.
//!
//! ## Asymmetry
//!
//! `merge(a, b)` and `merge(b, a)` agree except where the star resolution
//! ties (equal change times, or no change times and equal document times),
//! which favor the local side. A stale remote must not re-star something the
//! user just unstarred.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::{ItemRecord, MetaDocument};
use crate::retention::RetentionPolicy;

/// Merge `remote` into `local`
pub fn merge(
    local: &MetaDocument,
    remote: &MetaDocument,
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
) -> MetaDocument {
    if remote.is_empty() {
        return local.clone();
    }
    if local.is_empty() {
        return remote.clone();
    }

    let mut items: Vec<ItemRecord> = Vec::with_capacity(remote.len().max(local.len()));
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(remote.len());

    for item in &remote.items {
        match index.get(item.id.as_str()) {
            Some(&pos) => items[pos] = item.clone(),
            None => {
                index.insert(item.id.as_str(), items.len());
                items.push(item.clone());
            }
        }
    }

    let grace = policy.grace_period();
    let mut dropped = 0usize;

    for item in dedupe(&local.items) {
        match index.get(item.id.as_str()) {
            Some(&pos) => {
                merge_record(&mut items[pos], item, local.updated_at, remote.updated_at);
            }
            None if item.starred || now - item.last_activity() <= grace => {
                items.push(item.clone());
            }
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!("Merge dropped {} aged-out local-only records", dropped);
    }

    MetaDocument {
        items,
        updated_at: local.updated_at.max(remote.updated_at),
    }
}

/// Collapse duplicate ids, keeping the first position and the last value
fn dedupe(items: &[ItemRecord]) -> Vec<&ItemRecord> {
    let mut out: Vec<&ItemRecord> = Vec::with_capacity(items.len());
    let mut seen: HashMap<&str, usize> = HashMap::with_capacity(items.len());
    for item in items {
        match seen.get(item.id.as_str()) {
            Some(&pos) => out[pos] = item,
            None => {
                seen.insert(item.id.as_str(), out.len());
                out.push(item);
            }
        }
    }
    out
}

/// Fold a local record into the remote record with the same id
fn merge_record(
    merged: &mut ItemRecord,
    local: &ItemRecord,
    local_updated: Option<DateTime<Utc>>,
    remote_updated: Option<DateTime<Utc>>,
) {
    merged.seen = merged.seen || local.seen;

    let (starred, changed_at) = match (local.starred_changed_at, merged.starred_changed_at) {
        // Never toggled on either side and nothing to resolve
        (None, None) if local.starred == merged.starred => (local.starred, None),
        (None, None) => {
            // No toggle history on either side: fall back to document times
            if local_updated >= remote_updated {
                (local.starred, Some(local_updated.unwrap_or(local.date)))
            } else {
                (merged.starred, Some(remote_updated.unwrap_or(merged.date)))
            }
        }
        (local_changed, remote_changed) => {
            let starred = if local_changed >= remote_changed {
                local.starred
            } else {
                merged.starred
            };
            (starred, local_changed.max(remote_changed))
        }
    };
    merged.starred = starred;
    merged.starred_changed_at = changed_at;
    merged.metadata.fill_from(&local.metadata);
    merged.date = merged.date.min(local.date);
}
