//! Typed domain events and the broadcast emitter that carries them.

pub mod emitter;
pub mod kinds;

pub use emitter::{EventEmitter, WeakEventEmitter};
pub use kinds::{
    AssociationAction, EventKind, HistorySet, MessageDeletion, MessageUpdateEvent, ReactionEvent,
    ReceiptEvent, StoreEvent, UpsertKind,
};
