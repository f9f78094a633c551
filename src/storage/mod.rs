//! Storage backends for adjacency records
//!
//! Records are persisted through the `RecordStore` trait. Two
//! implementations: `FileStore` (one JSON file per token plus an index) and
//! `SqliteStore` (a single database file).

mod file;
mod sqlite;
mod traits;

pub use file::{slugify, FileStore};
pub use sqlite::SqliteStore;
pub use traits::{OpenStore, RecordStore, StorageError, StorageResult};
