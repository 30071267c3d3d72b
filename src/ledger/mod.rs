//! Ordered per-conversation message ledger.

pub mod ordered;

pub use ordered::{MessageCursor, MessageLedger, UpsertMode};
