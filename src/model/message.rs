//! Messages, receipts and reactions.

use serde::{Deserialize, Serialize};

/// Delivery/read status of a message.
///
/// Higher values are strictly later states; a stored status never goes
/// back down.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageStatus(pub u8);

impl MessageStatus {
    /// Sending failed.
    pub const ERROR: Self = Self(0);
    /// Queued locally.
    pub const PENDING: Self = Self(1);
    /// Accepted by the server.
    pub const SERVER_ACK: Self = Self(2);
    /// Delivered to the recipient.
    pub const DELIVERY_ACK: Self = Self(3);
    /// Read by the recipient.
    pub const READ: Self = Self(4);
    /// Media played by the recipient.
    pub const PLAYED: Self = Self(5);
}

/// Addressing information for a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageKey {
    /// Chat the message belongs to.
    pub remote_jid: String,
    /// Sent by this account.
    #[serde(default)]
    pub from_me: bool,
    /// Message identifier, unique within the chat.
    pub id: String,
    /// Sender inside a group chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

impl MessageKey {
    /// Key for a message received in `remote_jid`.
    #[must_use]
    pub fn new(remote_jid: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            remote_jid: remote_jid.into(),
            from_me: false,
            id: id.into(),
            participant: None,
        }
    }

    /// Who authored the message this key points at.
    #[must_use]
    pub fn author(&self) -> &str {
        if self.from_me {
            "me"
        } else {
            self.participant.as_deref().unwrap_or(&self.remote_jid)
        }
    }
}

/// Per-participant acknowledgement state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserReceipt {
    /// Participant the receipt belongs to.
    pub user_jid: String,
    /// When the message reached the participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_timestamp: Option<i64>,
    /// When the participant read the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timestamp: Option<i64>,
    /// When the participant played the media.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub played_timestamp: Option<i64>,
    /// Devices still waiting for delivery.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_device_jid: Vec<String>,
    /// Devices the message was delivered to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delivered_device_jid: Vec<String>,
}

impl UserReceipt {
    fn merge(&mut self, update: &Self) {
        if update.receipt_timestamp.is_some() {
            self.receipt_timestamp = update.receipt_timestamp;
        }
        if update.read_timestamp.is_some() {
            self.read_timestamp = update.read_timestamp;
        }
        if update.played_timestamp.is_some() {
            self.played_timestamp = update.played_timestamp;
        }
        if !update.pending_device_jid.is_empty() {
            self.pending_device_jid.clone_from(&update.pending_device_jid);
        }
        if !update.delivered_device_jid.is_empty() {
            self.delivered_device_jid
                .clone_from(&update.delivered_device_jid);
        }
    }
}

/// An emoji reaction to a message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    /// Key of the reaction itself; identifies the author.
    pub key: MessageKey,
    /// Emoji; empty or absent means the reaction was withdrawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Sender clock in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_timestamp_ms: Option<i64>,
}

/// A message held in a conversation ledger.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Addressing key.
    pub key: MessageKey,
    /// Send time, seconds since the Unix epoch.
    #[serde(default)]
    pub message_timestamp: i64,
    /// Sender display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    /// Delivery/read status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    /// Decoded message body, opaque to the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<serde_json::Value>,
    /// Protocol stub type for system events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stub_type: Option<u32>,
    /// Starred by the user.
    #[serde(default)]
    pub starred: bool,
    /// Per-participant receipts.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_receipt: Vec<UserReceipt>,
    /// Reactions, one per author.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reactions: Vec<Reaction>,
}

impl Message {
    /// Message identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.key.id
    }

    /// Whether the message is a protocol stub with nothing to display.
    #[must_use]
    pub const fn is_stub_only(&self) -> bool {
        self.content.is_none() && self.stub_type.is_some()
    }

    /// Fold a re-delivered copy of this message into the stored one.
    ///
    /// Fields the incoming copy carries win, except the status, which never
    /// goes down. Receipts and reactions are only replaced by a non-empty
    /// list.
    pub fn merge(&mut self, incoming: Self) {
        let Self {
            key,
            message_timestamp,
            push_name,
            status,
            content,
            stub_type,
            starred,
            user_receipt,
            reactions,
        } = incoming;

        if key.participant.is_some() {
            self.key.participant = key.participant;
        }
        self.key.from_me |= key.from_me;
        if message_timestamp != 0 {
            self.message_timestamp = message_timestamp;
        }
        if push_name.is_some() {
            self.push_name = push_name;
        }
        self.status = self.status.max(status);
        if content.is_some() {
            self.content = content;
        }
        if stub_type.is_some() {
            self.stub_type = stub_type;
        }
        self.starred |= starred;
        if !user_receipt.is_empty() {
            self.user_receipt = user_receipt;
        }
        if !reactions.is_empty() {
            self.reactions = reactions;
        }
    }

    /// Merge a receipt for one participant.
    pub fn apply_receipt(&mut self, receipt: &UserReceipt) {
        match self
            .user_receipt
            .iter_mut()
            .find(|r| r.user_jid == receipt.user_jid)
        {
            Some(existing) => existing.merge(receipt),
            None => self.user_receipt.push(receipt.clone()),
        }
    }

    /// Replace the author's previous reaction with `reaction`.
    pub fn apply_reaction(&mut self, reaction: &Reaction) {
        let author = reaction.key.author().to_string();
        self.reactions.retain(|r| r.key.author() != author);
        if reaction.text.as_deref().is_some_and(|text| !text.is_empty()) {
            self.reactions.push(reaction.clone());
        }
    }
}

/// Partial update for a message.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageUpdate {
    /// New status.
    #[serde(default)]
    pub status: Option<MessageStatus>,
    /// Replacement body (edits, revokes).
    #[serde(default)]
    pub content: Option<serde_json::Value>,
    /// New starred flag.
    #[serde(default)]
    pub starred: Option<bool>,
    /// New sender display name.
    #[serde(default)]
    pub push_name: Option<String>,
}

impl MessageUpdate {
    /// Whether the update carries no field.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.content.is_none()
            && self.starred.is_none()
            && self.push_name.is_none()
    }

    /// Drop the status if it would not advance `stored`.
    ///
    /// Returns `true` when a status was dropped.
    pub fn drop_stale_status(&mut self, stored: Option<MessageStatus>) -> bool {
        match (self.status, stored) {
            (Some(incoming), Some(current)) if incoming <= current => {
                self.status = None;
                true
            }
            _ => false,
        }
    }

    /// Overwrite the fields this update carries.
    ///
    /// The status guard is applied again here, so a regression is never
    /// written even if the caller skipped [`Self::drop_stale_status`].
    pub fn apply_to(mut self, message: &mut Message) {
        self.drop_stale_status(message.status);
        if let Some(status) = self.status {
            message.status = Some(status);
        }
        if let Some(content) = self.content {
            message.content = Some(content);
        }
        if let Some(starred) = self.starred {
            message.starred = starred;
        }
        if let Some(push_name) = self.push_name {
            message.push_name = Some(push_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, status: u8) -> Message {
        Message {
            key: MessageKey::new("1@s.whatsapp.net", id),
            status: Some(MessageStatus(status)),
            ..Message::default()
        }
    }

    #[test]
    fn test_status_never_regresses() {
        let mut msg = message("a", 1);
        MessageUpdate {
            status: Some(MessageStatus(0)),
            ..MessageUpdate::default()
        }
        .apply_to(&mut msg);
        assert_eq!(msg.status, Some(MessageStatus(1)));

        MessageUpdate {
            status: Some(MessageStatus(2)),
            ..MessageUpdate::default()
        }
        .apply_to(&mut msg);
        assert_eq!(msg.status, Some(MessageStatus(2)));
    }

    #[test]
    fn test_drop_stale_status_keeps_other_fields() {
        let mut update = MessageUpdate {
            status: Some(MessageStatus::SERVER_ACK),
            starred: Some(true),
            ..MessageUpdate::default()
        };
        assert!(update.drop_stale_status(Some(MessageStatus::READ)));
        assert_eq!(update.status, None);
        assert_eq!(update.starred, Some(true));
        assert!(!update.is_empty());
    }

    #[test]
    fn test_receipt_merges_per_user() {
        let mut msg = message("a", 2);
        msg.apply_receipt(&UserReceipt {
            user_jid: "u1".to_string(),
            receipt_timestamp: Some(10),
            ..UserReceipt::default()
        });
        msg.apply_receipt(&UserReceipt {
            user_jid: "u1".to_string(),
            read_timestamp: Some(20),
            ..UserReceipt::default()
        });
        msg.apply_receipt(&UserReceipt {
            user_jid: "u2".to_string(),
            receipt_timestamp: Some(11),
            ..UserReceipt::default()
        });

        assert_eq!(msg.user_receipt.len(), 2);
        assert_eq!(msg.user_receipt[0].receipt_timestamp, Some(10));
        assert_eq!(msg.user_receipt[0].read_timestamp, Some(20));
    }

    #[test]
    fn test_reaction_replaced_and_withdrawn() {
        let mut msg = message("a", 2);
        let mut key = MessageKey::new("g@g.us", "r1");
        key.participant = Some("p1".to_string());

        msg.apply_reaction(&Reaction {
            key: key.clone(),
            text: Some("👍".to_string()),
            sender_timestamp_ms: Some(1),
        });
        msg.apply_reaction(&Reaction {
            key: key.clone(),
            text: Some("🎉".to_string()),
            sender_timestamp_ms: Some(2),
        });
        assert_eq!(msg.reactions.len(), 1);
        assert_eq!(msg.reactions[0].text.as_deref(), Some("🎉"));

        msg.apply_reaction(&Reaction {
            key,
            text: Some(String::new()),
            sender_timestamp_ms: Some(3),
        });
        assert!(msg.reactions.is_empty());
    }

    #[test]
    fn test_merge_keeps_what_the_copy_lacks() {
        let mut stored = message("a", 4);
        stored.push_name = Some("Alice".to_string());
        stored.content = Some(serde_json::json!({"conversation": "hi"}));
        stored.apply_receipt(&UserReceipt {
            user_jid: "u1".to_string(),
            read_timestamp: Some(5),
            ..UserReceipt::default()
        });
        stored.apply_reaction(&Reaction {
            key: MessageKey::new("1@s.whatsapp.net", "r1"),
            text: Some("👍".to_string()),
            sender_timestamp_ms: Some(1),
        });

        let mut copy = message("a", 2);
        copy.message_timestamp = 77;
        stored.merge(copy);

        assert_eq!(stored.status, Some(MessageStatus::READ));
        assert_eq!(stored.message_timestamp, 77);
        assert_eq!(stored.push_name.as_deref(), Some("Alice"));
        assert!(stored.content.is_some());
        assert_eq!(stored.user_receipt.len(), 1);
        assert_eq!(stored.reactions.len(), 1);
    }

    #[test]
    fn test_merge_takes_present_fields() {
        let mut stored = message("a", 1);
        let mut copy = message("a", 3);
        copy.content = Some(serde_json::json!({"conversation": "edited"}));
        copy.user_receipt.push(UserReceipt {
            user_jid: "u2".to_string(),
            ..UserReceipt::default()
        });
        stored.merge(copy);

        assert_eq!(stored.status, Some(MessageStatus::DELIVERY_ACK));
        assert_eq!(
            stored.content,
            Some(serde_json::json!({"conversation": "edited"}))
        );
        assert_eq!(stored.user_receipt[0].user_jid, "u2");
    }

    #[test]
    fn test_stub_detection() {
        let mut msg = message("a", 1);
        msg.stub_type = Some(20);
        assert!(msg.is_stub_only());
        msg.content = Some(serde_json::json!({"conversation": "hi"}));
        assert!(!msg.is_stub_only());
    }
}
