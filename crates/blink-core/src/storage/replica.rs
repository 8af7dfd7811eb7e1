//! Local replica store
//!
//! Persists the local `MetaDocument` in SQLite and keeps a flattened list of
//! starred ids next to it for cheap lookups. Reads go through the versioned
//! decode in [`super::legacy`], so callers always see the current schema.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::legacy::{self, StoredShape};
use super::schema::init_schema;
use crate::models::MetaDocument;

/// Key holding the full document
pub const DOCUMENT_KEY: &str = "blink_meta";

/// Key holding the JSON list of starred ids
pub const STARRED_KEY: &str = "starred_items";

/// SQLite-backed store for the local replica
pub struct ReplicaStore {
    conn: Connection,
}

impl ReplicaStore {
    /// Open (or create) the replica database at `path`
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
            }
        }

        let conn = Connection::open(path).map_err(|source| StorageError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_connection(conn)
    }

    /// Open an in-memory replica (for tests)
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get the current document
    pub fn get(&self) -> StorageResult<MetaDocument> {
        self.get_at(Utc::now())
    }

    /// Get the current document, using `now` for any synthesized timestamps
    pub fn get_at(&self, now: DateTime<Utc>) -> StorageResult<MetaDocument> {
        let document = self.read(DOCUMENT_KEY)?;
        let starred = self.read(STARRED_KEY)?;

        let decoded = legacy::decode(document.as_deref(), starred.as_deref(), now);
        if decoded.shape == StoredShape::Current {
            self.write_starred(&decoded.document)?;
        }
        Ok(decoded.document)
    }

    /// Persist the document and its starred-id projection
    pub fn set(&self, doc: &MetaDocument) -> StorageResult<()> {
        let json = serde_json::to_string(doc)?;
        self.write(DOCUMENT_KEY, &json)?;
        self.write_starred(doc)?;
        debug!("Saved local replica ({} items)", doc.len());
        Ok(())
    }

    /// Read/modify/write the document in one step
    ///
    /// Returns whatever the closure returns.
    pub fn update<T>(&self, f: impl FnOnce(&mut MetaDocument) -> T) -> StorageResult<T> {
        let mut doc = self.get()?;
        let result = f(&mut doc);
        self.set(&doc)?;
        Ok(result)
    }

    /// Starred ids from the projection
    pub fn starred_ids(&self) -> StorageResult<Vec<String>> {
        Ok(self
            .read(STARRED_KEY)?
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default())
    }

    /// Remove all replica state
    pub fn reset(&self) -> StorageResult<()> {
        self.conn.execute(
            "DELETE FROM kv WHERE key IN (?1, ?2)",
            params![DOCUMENT_KEY, STARRED_KEY],
        )?;
        debug!("Local replica reset");
        Ok(())
    }

    fn write_starred(&self, doc: &MetaDocument) -> StorageResult<()> {
        let json = serde_json::to_string(&doc.starred_ids())?;
        self.write(STARRED_KEY, &json)
    }

    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Write a raw value under a key, bypassing encoding
    #[cfg(test)]
    pub(crate) fn write_raw(&self, key: &str, value: &str) -> StorageResult<()> {
        self.write(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ItemMetadata;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_first_run_is_empty() {
        let store = ReplicaStore::in_memory().unwrap();
        let doc = store.get().unwrap();
        assert!(doc.is_empty());
        assert!(doc.updated_at.is_none());
        assert!(store.starred_ids().unwrap().is_empty());
    }

    #[test]
    fn test_set_and_get() {
        let store = ReplicaStore::in_memory().unwrap();
        let mut doc = MetaDocument::new();
        doc.set_starred("a", true, &ItemMetadata::titled("A", "https://a"), at(1));
        doc.mark_seen("b", &ItemMetadata::default(), at(2));
        doc.updated_at = Some(at(3));

        store.set(&doc).unwrap();
        let loaded = store.get().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.updated_at, Some(at(3)));
        assert_eq!(store.starred_ids().unwrap(), vec!["a".to_string()]);
    }

    #[test]
    fn test_update_persists_changes() {
        let store = ReplicaStore::in_memory().unwrap();
        let starred = store
            .update(|doc| doc.toggle_star("x", &ItemMetadata::default(), at(4)))
            .unwrap();
        assert!(starred);
        assert!(store.get().unwrap().get("x").unwrap().starred);
        assert_eq!(store.starred_ids().unwrap(), vec!["x".to_string()]);
    }

    #[test]
    fn test_migrates_legacy_starred_list() {
        let store = ReplicaStore::in_memory().unwrap();
        store.write_raw(STARRED_KEY, r#"["old-1", "old-2"]"#).unwrap();

        let doc = store.get_at(at(5)).unwrap();
        assert_eq!(doc.len(), 2);
        assert!(doc.items.iter().all(|i| i.starred && i.seen));
        assert_eq!(doc.get("old-1").unwrap().starred_changed_at, Some(at(5)));
    }

    #[test]
    fn test_corrupt_document_recovers() {
        let store = ReplicaStore::in_memory().unwrap();
        store.write_raw(DOCUMENT_KEY, "{\"items\": [").unwrap();
        store.write_raw(STARRED_KEY, r#"["kept"]"#).unwrap();

        let doc = store.get().unwrap();
        assert_eq!(doc.starred_ids(), vec!["kept".to_string()]);
    }

    #[test]
    fn test_get_rederives_starred_projection() {
        let store = ReplicaStore::in_memory().unwrap();
        store
            .write_raw(
                DOCUMENT_KEY,
                r#"{"items": [{"id": "s", "date": "2024-04-01T00:00:00Z", "starred": true}]}"#,
            )
            .unwrap();
        store.write_raw(STARRED_KEY, "[]").unwrap();

        store.get().unwrap();
        assert_eq!(store.starred_ids().unwrap(), vec!["s".to_string()]);
    }

    #[test]
    fn test_reset() {
        let store = ReplicaStore::in_memory().unwrap();
        store
            .update(|doc| doc.set_starred("a", true, &ItemMetadata::default(), at(1)))
            .unwrap();

        store.reset().unwrap();
        assert!(store.get().unwrap().is_empty());
        assert!(store.starred_ids().unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("blink.db");

        {
            let store = ReplicaStore::open(&path).unwrap();
            store
                .update(|doc| doc.mark_seen("a", &ItemMetadata::default(), at(1)))
                .unwrap();
        }

        let store = ReplicaStore::open(&path).unwrap();
        let doc = store.get().unwrap();
        assert!(doc.get("a").unwrap().seen);
    }
}
