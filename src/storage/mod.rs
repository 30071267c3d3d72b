//! Persistence backends for the mirrored entities.

pub mod backend;
pub mod memory_backend;
pub mod sqlite_backend;

pub use backend::{Document, DocumentKey, EntityKind, PersistenceBackend, StoreFuture};
pub use memory_backend::MemoryBackend;
pub use sqlite_backend::SqliteBackend;
