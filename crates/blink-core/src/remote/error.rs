//! Remote store errors
//!
//! Every variant is soft: callers turn these into `Unavailable` outcomes or
//! failed pushes and never propagate them further.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    /// Transport failure (DNS, connect, timeout, TLS)
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Credentials rejected
    #[error("Remote rejected credentials (HTTP {status})")]
    Unauthorized { status: u16 },

    /// Gist does not exist
    #[error("Remote document not found")]
    NotFound,

    /// Any other non-success status
    #[error("Remote returned HTTP {status}")]
    Status { status: u16 },

    /// Gist exists but has no document file
    #[error("Remote has no '{0}' file")]
    MissingFile(String),

    /// Document content could not be parsed or encoded
    #[error("Malformed remote document: {0}")]
    Payload(#[from] serde_json::Error),

    /// Simulated outage (in-memory store)
    #[error("Remote is offline")]
    Offline,
}

impl RemoteError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => RemoteError::Unauthorized { status },
            404 => RemoteError::NotFound,
            _ => RemoteError::Status { status },
        }
    }

    /// Whether retrying later could succeed without user action
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteError::Http(_) | RemoteError::Offline => true,
            RemoteError::Status { status } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            RemoteError::from_status(401),
            RemoteError::Unauthorized { status: 401 }
        ));
        assert!(matches!(
            RemoteError::from_status(403),
            RemoteError::Unauthorized { .. }
        ));
        assert!(matches!(RemoteError::from_status(404), RemoteError::NotFound));
        assert!(matches!(
            RemoteError::from_status(502),
            RemoteError::Status { status: 502 }
        ));
    }

    #[test]
    fn test_transient() {
        assert!(RemoteError::Offline.is_transient());
        assert!(RemoteError::from_status(503).is_transient());
        assert!(RemoteError::from_status(429).is_transient());
        assert!(!RemoteError::from_status(401).is_transient());
        assert!(!RemoteError::NotFound.is_transient());
    }
}
