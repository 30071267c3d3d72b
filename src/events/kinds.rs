//! Closed set of events the store understands.
//!
//! Events are decoded from their wire names (`"messages.upsert"`, ...) at
//! the boundary; anything unknown fails to decode instead of reaching a
//! handler.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::errors::StoreResult;
use crate::model::chat::{Chat, ChatUpdate};
use crate::model::connection::ConnectionState;
use crate::model::contact::{Contact, ContactUpdate};
use crate::model::group::{GroupUpdate, ParticipantAction};
use crate::model::label::{Label, LabelAssociation};
use crate::model::message::{Message, MessageKey, MessageUpdate, Reaction, UserReceipt};
use crate::model::presence::PresenceData;

/// How a batch of messages arrived.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertKind {
    /// Appended without notification (own sends, catch-up).
    Append,
    /// New live message; may create the chat.
    Notify,
}

/// Whether a label association is being added or removed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationAction {
    /// Attach the label.
    Add,
    /// Detach the label.
    Remove,
}

/// A history sync batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySet {
    /// Chats in the batch.
    #[serde(default)]
    pub chats: Vec<Chat>,
    /// Contacts in the batch.
    #[serde(default)]
    pub contacts: Vec<Contact>,
    /// Messages in the batch, newest first per chat.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Authoritative snapshot: purge before inserting.
    #[serde(default)]
    pub is_latest: bool,
}

/// Partial update addressed to one message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageUpdateEvent {
    /// Target message.
    pub key: MessageKey,
    /// Fields to merge.
    pub update: MessageUpdate,
}

/// Message deletion request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageDeletion {
    /// Every message of a chat.
    All {
        /// Chat to clear.
        jid: String,
    },
    /// Only the listed messages.
    Keys(Vec<MessageKey>),
}

/// Receipt addressed to one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptEvent {
    /// Target message.
    pub key: MessageKey,
    /// Receipt to merge.
    pub receipt: UserReceipt,
}

/// Reaction addressed to one message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    /// Message reacted to.
    pub key: MessageKey,
    /// The reaction.
    pub reaction: Reaction,
}

/// An event on the account's event stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum StoreEvent {
    /// Transport connection state changed.
    #[serde(rename = "connection.update")]
    ConnectionUpdate(ConnectionState),
    /// Credentials changed; handled by the credential subsystem.
    #[serde(rename = "creds.update")]
    CredsUpdate(serde_json::Value),
    /// History sync batch.
    #[serde(rename = "messaging-history.set")]
    HistorySet(HistorySet),
    /// New messages.
    #[serde(rename = "messages.upsert")]
    MessagesUpsert {
        /// Messages in arrival order.
        messages: Vec<Message>,
        /// Append or notify.
        #[serde(rename = "type")]
        kind: UpsertKind,
    },
    /// Partial message updates.
    #[serde(rename = "messages.update")]
    MessagesUpdate(Vec<MessageUpdateEvent>),
    /// Message deletions.
    #[serde(rename = "messages.delete")]
    MessagesDelete(MessageDeletion),
    /// Whole chat records.
    #[serde(rename = "chats.upsert")]
    ChatsUpsert(Vec<Chat>),
    /// Partial chat updates.
    #[serde(rename = "chats.update")]
    ChatsUpdate(Vec<ChatUpdate>),
    /// Deleted chat ids.
    #[serde(rename = "chats.delete")]
    ChatsDelete(Vec<String>),
    /// Whole contact records.
    #[serde(rename = "contacts.upsert")]
    ContactsUpsert(Vec<Contact>),
    /// Partial contact updates.
    #[serde(rename = "contacts.update")]
    ContactsUpdate(Vec<ContactUpdate>),
    /// Partial group metadata updates.
    #[serde(rename = "groups.update")]
    GroupsUpdate(Vec<GroupUpdate>),
    /// Group membership change.
    #[serde(rename = "group-participants.update")]
    GroupParticipantsUpdate {
        /// Group id.
        id: String,
        /// Members affected.
        participants: Vec<String>,
        /// What happened to them.
        action: ParticipantAction,
    },
    /// Presence change inside a chat.
    #[serde(rename = "presence.update")]
    PresenceUpdate {
        /// Chat id.
        id: String,
        /// Participant id to presence.
        presences: HashMap<String, PresenceData>,
    },
    /// Label created, edited or deleted.
    #[serde(rename = "labels.edit")]
    LabelsEdit(Label),
    /// Label attached or detached.
    #[serde(rename = "labels.association")]
    LabelsAssociation {
        /// Add or remove.
        #[serde(rename = "type")]
        action: AssociationAction,
        /// The relation.
        association: LabelAssociation,
    },
    /// Read/delivery receipts.
    #[serde(rename = "message-receipt.update")]
    ReceiptUpdate(Vec<ReceiptEvent>),
    /// Reactions.
    #[serde(rename = "messages.reaction")]
    Reactions(Vec<ReactionEvent>),
}

impl StoreEvent {
    /// Decode an event from its wire representation.
    ///
    /// # Errors
    /// Returns an error for unknown event names or malformed payloads.
    pub fn from_json(value: serde_json::Value) -> StoreResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::ConnectionUpdate(_) => EventKind::ConnectionUpdate,
            Self::CredsUpdate(_) => EventKind::CredsUpdate,
            Self::HistorySet(_) => EventKind::HistorySet,
            Self::MessagesUpsert { .. } => EventKind::MessagesUpsert,
            Self::MessagesUpdate(_) => EventKind::MessagesUpdate,
            Self::MessagesDelete(_) => EventKind::MessagesDelete,
            Self::ChatsUpsert(_) => EventKind::ChatsUpsert,
            Self::ChatsUpdate(_) => EventKind::ChatsUpdate,
            Self::ChatsDelete(_) => EventKind::ChatsDelete,
            Self::ContactsUpsert(_) => EventKind::ContactsUpsert,
            Self::ContactsUpdate(_) => EventKind::ContactsUpdate,
            Self::GroupsUpdate(_) => EventKind::GroupsUpdate,
            Self::GroupParticipantsUpdate { .. } => EventKind::GroupParticipantsUpdate,
            Self::PresenceUpdate { .. } => EventKind::PresenceUpdate,
            Self::LabelsEdit(_) => EventKind::LabelsEdit,
            Self::LabelsAssociation { .. } => EventKind::LabelsAssociation,
            Self::ReceiptUpdate(_) => EventKind::ReceiptUpdate,
            Self::Reactions(_) => EventKind::Reactions,
        }
    }
}

/// Payload-free discriminant of [`StoreEvent`], for logging and filtering.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    /// `connection.update`
    ConnectionUpdate,
    /// `creds.update`
    CredsUpdate,
    /// `messaging-history.set`
    HistorySet,
    /// `messages.upsert`
    MessagesUpsert,
    /// `messages.update`
    MessagesUpdate,
    /// `messages.delete`
    MessagesDelete,
    /// `chats.upsert`
    ChatsUpsert,
    /// `chats.update`
    ChatsUpdate,
    /// `chats.delete`
    ChatsDelete,
    /// `contacts.upsert`
    ContactsUpsert,
    /// `contacts.update`
    ContactsUpdate,
    /// `groups.update`
    GroupsUpdate,
    /// `group-participants.update`
    GroupParticipantsUpdate,
    /// `presence.update`
    PresenceUpdate,
    /// `labels.edit`
    LabelsEdit,
    /// `labels.association`
    LabelsAssociation,
    /// `message-receipt.update`
    ReceiptUpdate,
    /// `messages.reaction`
    Reactions,
}

impl EventKind {
    /// Wire name of the event.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionUpdate => "connection.update",
            Self::CredsUpdate => "creds.update",
            Self::HistorySet => "messaging-history.set",
            Self::MessagesUpsert => "messages.upsert",
            Self::MessagesUpdate => "messages.update",
            Self::MessagesDelete => "messages.delete",
            Self::ChatsUpsert => "chats.upsert",
            Self::ChatsUpdate => "chats.update",
            Self::ChatsDelete => "chats.delete",
            Self::ContactsUpsert => "contacts.upsert",
            Self::ContactsUpdate => "contacts.update",
            Self::GroupsUpdate => "groups.update",
            Self::GroupParticipantsUpdate => "group-participants.update",
            Self::PresenceUpdate => "presence.update",
            Self::LabelsEdit => "labels.edit",
            Self::LabelsAssociation => "labels.association",
            Self::ReceiptUpdate => "message-receipt.update",
            Self::Reactions => "messages.reaction",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
