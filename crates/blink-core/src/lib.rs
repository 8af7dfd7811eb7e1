//! Blink Core Library
//!
//! This crate keeps the read/starred annotations of a feed reader in sync
//! across devices. Each device holds a full local replica in SQLite; a
//! single JSON document in a GitHub Gist is the shared meeting point.
//!
//! # Architecture
//!
//! - **Replica**: local SQLite store, always authoritative for the UI
//! - **Remote**: conditional fetch and overwrite of one gist file
//! - **Merge**: deterministic, per-field resolution of two documents
//! - **Scheduler**: debounced pushes with retry on reconnect
//!
//! The application works fully offline; sync failures surface only as
//! [`SyncEvent`]s.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let engine = SyncEngine::from_config(&config)?;
//! engine.sync_on_startup().await;
//!
//! engine.toggle_star("item-id", &ItemMetadata::titled("Title", "https://...")).await?;
//! engine.upload().await;
//! ```
//!
//! # Modules
//!
//! - `sync`: engine and push scheduler (main entry point)
//! - `models`: item records and the replicated document
//! - `merge`: two-document merge
//! - `retention`: pruning before publish
//! - `storage`: SQLite replica and legacy decode
//! - `remote`: gist and in-memory remote stores
//! - `config`: application configuration

pub mod config;
pub mod merge;
pub mod models;
pub mod remote;
pub mod retention;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use merge::merge;
pub use models::{ItemMetadata, ItemRecord, MetaDocument};
pub use remote::{FetchOutcome, GistClient, GistCredentials, MemoryRemote, RemoteError, RemoteStore};
pub use retention::RetentionPolicy;
pub use storage::{ReplicaStore, StorageError, StorageResult};
pub use sync::{EngineOptions, PushState, SyncEngine, SyncError, SyncEvent, SyncEventKind};
