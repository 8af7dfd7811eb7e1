//! Remote store client
//!
//! The remote is a single JSON document in a third-party blob store. It
//! offers two operations: a conditional fetch that can answer "unchanged"
//! without a body, and a plain overwrite. There is no compare-and-swap, so
//! concurrent writers can race; the merge heals that on the next round trip.
//!
//! ## Implementations
//!
//! - [`GistClient`]: GitHub Gist over HTTPS
//! - [`MemoryRemote`]: in-process store for tests and offline runs

mod error;
mod gist;
mod memory;

use async_trait::async_trait;
use serde::Serialize;

use crate::models::{ItemRecord, MetaDocument};

pub use error::RemoteError;
pub use gist::{GistClient, GistCredentials, DOCUMENT_FILE};
pub use memory::MemoryRemote;

/// Result of a conditional fetch
#[derive(Debug)]
pub enum FetchOutcome {
    /// The remote changed since the last fetch or write
    Changed(MetaDocument),
    /// Same version as last time; no body transferred
    Unchanged,
    /// The remote could not be read
    Unavailable(RemoteError),
}

impl FetchOutcome {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, FetchOutcome::Unavailable(_))
    }
}

/// A shared remote document
///
/// Implementations remember the version token of the last fetch or write and
/// present it on the next fetch. Errors never escape as panics; `fetch`
/// reports them as `Unavailable` and `write` as `Err`.
#[async_trait]
pub trait RemoteStore: Send {
    /// Fetch the document if it changed since the last known version
    async fn fetch(&mut self) -> FetchOutcome;

    /// Overwrite the remote document
    async fn write(&mut self, doc: &MetaDocument) -> Result<(), RemoteError>;

    /// Forget the version token so the next fetch transfers the body
    fn forget_version(&mut self);
}

/// Wire form of a document: items only
///
/// `updated_at` is supplied by the store's own write metadata.
#[derive(Serialize)]
struct Payload<'a> {
    items: &'a [ItemRecord],
}

/// Encode the document body written to the remote
pub fn encode_payload(doc: &MetaDocument) -> Result<String, RemoteError> {
    Ok(serde_json::to_string_pretty(&Payload { items: &doc.items })?)
}

/// Decode a document body read from the remote
pub fn decode_payload(content: &str) -> Result<MetaDocument, RemoteError> {
    let mut doc: MetaDocument = serde_json::from_str(content)?;
    doc.updated_at = None;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_payload_omits_updated_at() {
        let doc = MetaDocument {
            items: vec![ItemRecord::new(
                "a",
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            )],
            updated_at: Some(Utc::now()),
        };
        let json: serde_json::Value = serde_json::from_str(&encode_payload(&doc).unwrap()).unwrap();
        assert!(json.get("updated_at").is_none());
        assert_eq!(json["items"][0]["id"], "a");
    }

    #[test]
    fn test_decode_ignores_embedded_updated_at() {
        let doc = decode_payload(r#"{"items": [], "updated_at": "2020-01-01T00:00:00Z"}"#).unwrap();
        assert!(doc.updated_at.is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_payload("<html>"),
            Err(RemoteError::Payload(_))
        ));
    }
}
