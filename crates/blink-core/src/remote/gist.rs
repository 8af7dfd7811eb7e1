//! GitHub Gist transport
//!
//! The document lives in one file of a gist. Fetches send the last ETag in
//! `If-None-Match`, so an unchanged gist costs a 304 and no rate-limit quota.
//! Writes PATCH the file content; the ETag from the write response becomes
//! the version token so our own write does not come back as a change.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, ETAG, IF_NONE_MATCH};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{decode_payload, encode_payload, FetchOutcome, RemoteError, RemoteStore};
use crate::models::MetaDocument;

/// Name of the gist file holding the document
pub const DOCUMENT_FILE: &str = "starred.json";

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Gist identifier and access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GistCredentials {
    pub gist_id: String,
    pub token: String,
}

/// Remote store backed by a GitHub Gist
pub struct GistClient {
    http: reqwest::Client,
    api_base: String,
    credentials: GistCredentials,
    etag: Option<String>,
}

#[derive(Deserialize)]
struct GistResponse {
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    files: HashMap<String, GistFile>,
}

#[derive(Deserialize)]
struct GistFile {
    #[serde(default)]
    content: Option<String>,
}

impl GistClient {
    /// Create a client for the given gist
    pub fn new(
        credentials: GistCredentials,
        api_base: &str,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("blink/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            credentials,
            etag: None,
        })
    }

    /// URL of the gist resource
    pub fn gist_url(&self) -> String {
        format!("{}/gists/{}", self.api_base, self.credentials.gist_id)
    }

    /// Current version token, if any
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(AUTHORIZATION, format!("token {}", self.credentials.token))
            .header(ACCEPT, GITHUB_ACCEPT)
    }

    fn remember_etag(&mut self, response: &Response) {
        if let Some(etag) = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
        {
            self.etag = Some(etag.to_string());
        }
    }

    async fn try_fetch(&mut self) -> Result<Option<MetaDocument>, RemoteError> {
        let mut request = self.authorized(self.http.get(self.gist_url()));
        if let Some(ref etag) = self.etag {
            request = request.header(IF_NONE_MATCH, etag.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RemoteError::from_status(status.as_u16()));
        }

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await?;
        let doc = parse_gist(&body)?;

        // Only advance the version once the body is known good
        if etag.is_some() {
            self.etag = etag;
        }
        Ok(Some(doc))
    }
}

/// Extract the document from a gist API response body
fn parse_gist(body: &str) -> Result<MetaDocument, RemoteError> {
    let gist: GistResponse = serde_json::from_str(body)?;
    let content = gist
        .files
        .get(DOCUMENT_FILE)
        .and_then(|file| file.content.as_deref())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| RemoteError::MissingFile(DOCUMENT_FILE.to_string()))?;

    let mut doc = decode_payload(content)?;
    doc.updated_at = gist.updated_at;
    Ok(doc)
}

#[async_trait]
impl RemoteStore for GistClient {
    async fn fetch(&mut self) -> FetchOutcome {
        match self.try_fetch().await {
            Ok(Some(doc)) => {
                debug!("Fetched remote document ({} items)", doc.len());
                FetchOutcome::Changed(doc)
            }
            Ok(None) => {
                debug!("Remote document unchanged");
                FetchOutcome::Unchanged
            }
            Err(e) => {
                warn!("Failed to fetch gist: {}", e);
                FetchOutcome::Unavailable(e)
            }
        }
    }

    async fn write(&mut self, doc: &MetaDocument) -> Result<(), RemoteError> {
        let content = encode_payload(doc)?;
        let body = serde_json::json!({
            "files": { DOCUMENT_FILE: { "content": content } }
        });

        let response = self
            .authorized(self.http.patch(self.gist_url()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!("Gist push failed: HTTP {}", status.as_u16());
            return Err(RemoteError::from_status(status.as_u16()));
        }

        self.remember_etag(&response);
        debug!("Pushed {} items to gist", doc.len());
        Ok(())
    }

    fn forget_version(&mut self) {
        self.etag = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn client() -> GistClient {
        GistClient::new(
            GistCredentials {
                gist_id: "abc123".into(),
                token: "secret".into(),
            },
            "https://api.github.com/",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_gist_url() {
        assert_eq!(client().gist_url(), "https://api.github.com/gists/abc123");
        assert!(client().etag().is_none());
    }

    #[test]
    fn test_parse_gist_uses_gist_updated_at() {
        let content = r#"{"items": [{"id": "a", "date": "2024-01-01T00:00:00Z", "starred": true, "seen": true}]}"#;
        let body = serde_json::json!({
            "updated_at": "2024-01-02T03:04:05Z",
            "files": { DOCUMENT_FILE: { "content": content } }
        })
        .to_string();

        let doc = parse_gist(&body).unwrap();
        assert_eq!(doc.starred_ids(), vec!["a".to_string()]);
        assert_eq!(
            doc.updated_at,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
        );
    }

    #[test]
    fn test_parse_gist_missing_file() {
        let body = r#"{"updated_at": "2024-01-02T03:04:05Z", "files": {"other.json": {"content": "{}"}}}"#;
        assert!(matches!(
            parse_gist(body),
            Err(RemoteError::MissingFile(_))
        ));
    }

    #[test]
    fn test_parse_gist_bad_content() {
        let body = serde_json::json!({
            "files": { DOCUMENT_FILE: { "content": "not json" } }
        })
        .to_string();
        assert!(matches!(parse_gist(&body), Err(RemoteError::Payload(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        let mut client = GistClient::new(
            GistCredentials {
                gist_id: "abc".into(),
                token: "t".into(),
            },
            "http://127.0.0.1:9",
            Duration::from_millis(500),
        )
        .unwrap();

        assert!(client.fetch().await.is_unavailable());
        assert!(client.write(&MetaDocument::new()).await.is_err());
    }
}
