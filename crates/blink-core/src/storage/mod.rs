//! Storage layer
//!
//! Handles persistence of the local replica.
//!
//! ## Architecture
//!
//! - **SQLite**: key/value table holding the document and a starred-id list
//! - **Legacy decode**: one translation step that upgrades older shapes
//!
//! Storage is synchronous and local; nothing here touches the network.

pub mod error;
pub mod legacy;
pub mod replica;
pub mod schema;

pub use error::{StorageError, StorageResult};
pub use replica::ReplicaStore;
pub use schema::{init_schema, SCHEMA_VERSION};
