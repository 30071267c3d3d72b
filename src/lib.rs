//! Event-sourced mirror of a messaging account's conversational state.
//!
//! A [`store::ConversationStore`] consumes [`events::StoreEvent`]s, keeps
//! chats, contacts, per-chat message ledgers, group metadata, presence and
//! labels in memory, and writes through to a pluggable
//! [`storage::PersistenceBackend`].

// Strict baseline
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(unused_must_use)]
#![deny(nonstandard_style)]
#![forbid(unsafe_op_in_unsafe_fn)]
// Clippy discipline
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::redundant_clone)]
#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)
)]

/// Error types, configuration, identifiers and tracing setup.
pub mod core;
/// Credential persistence.
pub mod auth;
/// Typed events and the broadcast emitter.
pub mod events;
/// Label repository and association index.
pub mod labels;
/// Per-chat ordered message ledger.
pub mod ledger;
/// Periodic maintenance.
pub mod maintenance;
/// Mirrored entity types.
pub mod model;
/// Persistence backends.
pub mod storage;
/// Conversation store orchestration.
pub mod store;
/// Remote lookup collaborator.
pub mod transport;

pub use crate::core::config::{CleanupConfig, CleanupConfigBuilder, StorageConfig, StoreConfig};
pub use crate::core::errors::{StoreError, StoreResult};
pub use events::{EventEmitter, StoreEvent, WeakEventEmitter};
pub use storage::{MemoryBackend, PersistenceBackend, SqliteBackend};
pub use store::{ConversationStore, StoreSnapshot};
pub use transport::Transport;
