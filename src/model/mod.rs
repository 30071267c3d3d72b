//! Entity types mirrored by the store.
//!
//! Partial updates are modelled as structs of optional fields; applying one
//! overwrites only the fields it carries (a shallow merge).

pub mod chat;
pub mod connection;
pub mod contact;
pub mod group;
pub mod label;
pub mod message;
pub mod presence;

pub use chat::{Chat, ChatUpdate, chat_key, compare_chats};
pub use connection::{ConnectionHandle, ConnectionPhase, ConnectionState, LastDisconnect};
pub use contact::{AvatarRef, Contact, ContactUpdate};
pub use group::{GroupMetadata, GroupParticipant, GroupUpdate, ParticipantAction};
pub use label::{Label, LabelAssociation};
pub use message::{Message, MessageKey, MessageStatus, MessageUpdate, Reaction, UserReceipt};
pub use presence::{PresenceData, PresenceKind};
