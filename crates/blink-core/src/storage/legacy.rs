//! Versioned decode of stored replica values
//!
//! All backward compatibility lives here. Older clients stored only a list of
//! starred ids; later ones stored the full document, sometimes without the
//! `seen` flag or star change times. Everything is upgraded to the current
//! schema on read so the merge never has to branch on shape.

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::models::{ItemRecord, MetaDocument};

/// Which stored shape a document was decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredShape {
    /// Full document under the document key
    Current,
    /// Bare list of starred ids (or nothing at all)
    StarredList,
}

/// Result of decoding the stored values
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub document: MetaDocument,
    pub shape: StoredShape,
}

/// Decode the stored document, falling back to the starred-id list
///
/// A document that fails to parse is treated as absent. Never fails.
pub fn decode(document: Option<&str>, starred_ids: Option<&str>, now: DateTime<Utc>) -> Decoded {
    if let Some(raw) = document {
        match serde_json::from_str::<MetaDocument>(raw) {
            Ok(doc) => {
                return Decoded {
                    document: upgrade(doc),
                    shape: StoredShape::Current,
                }
            }
            Err(e) => warn!("Stored document is malformed, recovering from starred list: {}", e),
        }
    }

    Decoded {
        document: from_starred_list(starred_ids, now),
        shape: StoredShape::StarredList,
    }
}

/// Fill star change times missing from older starred records
///
/// Uses the document write time, else the record's first-seen date, and
/// never a time before the record was first seen. Unstarred records that
/// were never toggled keep no change time.
fn upgrade(mut doc: MetaDocument) -> MetaDocument {
    let fallback = doc.updated_at;
    for item in doc.items.iter_mut().filter(|item| item.starred) {
        if item.starred_changed_at.is_none() {
            let date = item.date;
            item.starred_changed_at = Some(fallback.map_or(date, |at| at.max(date)));
        }
    }
    doc
}

/// Synthesize a document from a bare list of starred ids
fn from_starred_list(raw: Option<&str>, now: DateTime<Utc>) -> MetaDocument {
    let ids = match raw.map(serde_json::from_str::<Vec<String>>) {
        None => Vec::new(),
        Some(Ok(ids)) => ids,
        Some(Err(e)) => {
            warn!("Stored starred list is malformed, starting empty: {}", e);
            Vec::new()
        }
    };

    let items = ids
        .into_iter()
        .map(|id| {
            let mut item = ItemRecord::new(id, now);
            item.seen = true;
            item.starred = true;
            item.starred_changed_at = Some(now);
            item
        })
        .collect();

    MetaDocument {
        items,
        updated_at: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 10, 8, 30, 0).unwrap()
    }

    #[test]
    fn test_nothing_stored_is_empty() {
        let decoded = decode(None, None, now());
        assert!(decoded.document.is_empty());
        assert!(decoded.document.updated_at.is_none());
        assert_eq!(decoded.shape, StoredShape::StarredList);
    }

    #[test]
    fn test_starred_list_is_migrated() {
        let decoded = decode(None, Some(r#"["a", "b"]"#), now());
        let doc = decoded.document;

        assert_eq!(doc.len(), 2);
        for item in &doc.items {
            assert!(item.starred);
            assert!(item.seen);
            assert_eq!(item.date, now());
            assert_eq!(item.starred_changed_at, Some(now()));
        }
    }

    #[test]
    fn test_corrupt_document_falls_back_to_starred_list() {
        let decoded = decode(Some("{not json"), Some(r#"["x"]"#), now());
        assert_eq!(decoded.shape, StoredShape::StarredList);
        assert_eq!(decoded.document.starred_ids(), vec!["x".to_string()]);
    }

    #[test]
    fn test_corrupt_everything_is_empty() {
        let decoded = decode(Some("[1, 2"), Some("nope"), now());
        assert!(decoded.document.is_empty());
    }

    #[test]
    fn test_current_document_fills_missing_fields() {
        let raw = r#"{
            "items": [
                {"id": "a", "date": "2024-02-01T00:00:00Z", "starred": true},
                {"id": "b", "date": "2024-02-02T00:00:00Z", "starred": false, "seen": false,
                 "starred_changed_at": "2024-02-03T00:00:00Z"}
            ],
            "updated_at": "2024-02-05T00:00:00Z"
        }"#;
        let decoded = decode(Some(raw), None, now());
        assert_eq!(decoded.shape, StoredShape::Current);

        let a = decoded.document.get("a").unwrap();
        assert!(a.seen);
        assert_eq!(
            a.starred_changed_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 5, 0, 0, 0).unwrap())
        );

        let b = decoded.document.get("b").unwrap();
        assert!(!b.seen);
        assert_eq!(
            b.starred_changed_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 3, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_change_time_falls_back_to_item_date() {
        let raw = r#"{"items": [{"id": "a", "date": "2024-02-01T00:00:00Z", "starred": true}]}"#;
        let doc = decode(Some(raw), None, now()).document;
        assert_eq!(
            doc.get("a").unwrap().starred_changed_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_unstarred_record_keeps_no_change_time() {
        let raw = r#"{
            "items": [{"id": "fresh", "date": "2024-02-09T00:00:00Z", "starred": false}],
            "updated_at": "2024-01-20T00:00:00Z"
        }"#;
        let doc = decode(Some(raw), None, now()).document;
        assert!(doc.get("fresh").unwrap().starred_changed_at.is_none());
    }

    #[test]
    fn test_change_time_never_precedes_first_seen() {
        let raw = r#"{
            "items": [{"id": "a", "date": "2024-02-09T00:00:00Z", "starred": true}],
            "updated_at": "2024-01-20T00:00:00Z"
        }"#;
        let doc = decode(Some(raw), None, now()).document;
        assert_eq!(
            doc.get("a").unwrap().starred_changed_at,
            Some(Utc.with_ymd_and_hms(2024, 2, 9, 0, 0, 0).unwrap())
        );
    }
}
