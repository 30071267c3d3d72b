//! Core configuration, errors, identifiers and logging setup.

pub mod config;
pub mod errors;
pub mod jid;
pub mod logging;

pub use config::{CleanupConfig, CleanupConfigBuilder, StorageConfig, StoreConfig};
pub use errors::{StoreError, StoreResult};
pub use jid::{STATUS_BROADCAST_JID, is_group_jid, is_status_broadcast, normalize_jid};
pub use logging::init_tracing;
