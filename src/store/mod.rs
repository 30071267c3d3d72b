//! The conversation store: event dispatch, queries and snapshots.

pub mod core;
mod dispatch;
pub mod query;
pub mod snapshot;

pub use self::core::{ConversationStore, StoreBinding};
pub use snapshot::{HydrateStats, StoreSnapshot};

#[cfg(test)]
mod fixtures;
