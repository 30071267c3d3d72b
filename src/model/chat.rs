//! Conversation records and their default ordering.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A conversation as mirrored from the account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Stable chat identifier.
    pub id: String,
    /// Display name, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Pinned to the top of the list.
    #[serde(default)]
    pub pinned: bool,
    /// Archived by the user.
    #[serde(default)]
    pub archived: bool,
    /// Last activity, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_timestamp: Option<i64>,
    /// Unread message counter.
    #[serde(default)]
    pub unread_count: i64,
    /// Muted until this timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute_end_time: Option<i64>,
    /// Disappearing-message timer in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_expiration: Option<u32>,
}

impl Chat {
    /// Create an empty chat record.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Chat record synthesized from a first incoming message.
    #[must_use]
    pub fn from_first_message(id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            conversation_timestamp: Some(timestamp),
            unread_count: 1,
            ..Self::default()
        }
    }

    /// Overwrite with a whole incoming record; optional fields it lacks are kept.
    pub fn merge(&mut self, other: Self) {
        ChatUpdate::from(other).apply_to(self);
    }
}

/// Partial update for a chat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUpdate {
    /// Chat being updated.
    pub id: String,
    /// New display name.
    #[serde(default)]
    pub name: Option<String>,
    /// New pin flag.
    #[serde(default)]
    pub pinned: Option<bool>,
    /// New archive flag.
    #[serde(default)]
    pub archived: Option<bool>,
    /// New last-activity timestamp.
    #[serde(default)]
    pub conversation_timestamp: Option<i64>,
    /// New unread counter.
    #[serde(default)]
    pub unread_count: Option<i64>,
    /// New mute deadline.
    #[serde(default)]
    pub mute_end_time: Option<i64>,
    /// New disappearing-message timer.
    #[serde(default)]
    pub ephemeral_expiration: Option<u32>,
}

impl ChatUpdate {
    /// Overwrite the fields this update carries.
    pub fn apply_to(&self, chat: &mut Chat) {
        if let Some(name) = &self.name {
            chat.name = Some(name.clone());
        }
        if let Some(pinned) = self.pinned {
            chat.pinned = pinned;
        }
        if let Some(archived) = self.archived {
            chat.archived = archived;
        }
        if let Some(ts) = self.conversation_timestamp {
            chat.conversation_timestamp = Some(ts);
        }
        if let Some(unread) = self.unread_count {
            chat.unread_count = unread;
        }
        if let Some(mute) = self.mute_end_time {
            chat.mute_end_time = Some(mute);
        }
        if let Some(expiration) = self.ephemeral_expiration {
            chat.ephemeral_expiration = Some(expiration);
        }
    }
}

impl From<Chat> for ChatUpdate {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.id,
            name: chat.name,
            pinned: Some(chat.pinned),
            archived: Some(chat.archived),
            conversation_timestamp: chat.conversation_timestamp,
            unread_count: Some(chat.unread_count),
            mute_end_time: chat.mute_end_time,
            ephemeral_expiration: chat.ephemeral_expiration,
        }
    }
}

/// Sort key for a chat; larger keys sort first.
///
/// Layout: optional pin digit, inverted archive digit, zero-padded hex
/// timestamp, then the id as tie-breaker.
#[must_use]
pub fn chat_key(chat: &Chat, pin: bool) -> String {
    let mut key = String::with_capacity(chat.id.len() + 10);
    if pin {
        key.push(if chat.pinned { '1' } else { '0' });
    }
    key.push(if chat.archived { '0' } else { '1' });
    if let Some(ts) = chat.conversation_timestamp {
        let ts = u64::try_from(ts).unwrap_or(0);
        key.push_str(&format!("{ts:08x}"));
    }
    key.push_str(&chat.id);
    key
}

/// Default chat ordering: descending by [`chat_key`].
#[must_use]
pub fn compare_chats(a: &Chat, b: &Chat, pin: bool) -> Ordering {
    chat_key(b, pin).cmp(&chat_key(a, pin))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(id: &str, pinned: bool, archived: bool, ts: i64) -> Chat {
        Chat {
            pinned,
            archived,
            conversation_timestamp: Some(ts),
            ..Chat::new(id)
        }
    }

    #[test]
    fn test_pinned_and_archived_ordering() {
        let mut chats = vec![
            chat("a@s.whatsapp.net", false, true, 900),
            chat("b@s.whatsapp.net", false, false, 100),
            chat("c@s.whatsapp.net", true, false, 50),
            chat("d@s.whatsapp.net", false, false, 500),
        ];
        chats.sort_by(|a, b| compare_chats(a, b, true));
        let order: Vec<&str> = chats.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            order,
            vec![
                "c@s.whatsapp.net",
                "d@s.whatsapp.net",
                "b@s.whatsapp.net",
                "a@s.whatsapp.net"
            ]
        );
    }

    #[test]
    fn test_ties_break_on_id_descending() {
        let mut chats = vec![chat("a", false, false, 7), chat("b", false, false, 7)];
        chats.sort_by(|a, b| compare_chats(a, b, true));
        assert_eq!(chats[0].id, "b");
    }

    #[test]
    fn test_key_without_pin() {
        let key = chat_key(&chat("x", true, false, 255), false);
        assert_eq!(key, "1000000ffx");
    }

    #[test]
    fn test_update_is_shallow() {
        let mut target = chat("x", false, false, 1);
        target.name = Some("old".to_string());
        let update = ChatUpdate {
            id: "x".to_string(),
            archived: Some(true),
            ..ChatUpdate::default()
        };
        update.apply_to(&mut target);
        assert!(target.archived);
        assert_eq!(target.name.as_deref(), Some("old"));
        assert_eq!(target.conversation_timestamp, Some(1));
    }
}
