//! Labels and their associations with chats and messages.

use serde::{Deserialize, Serialize};

/// A chat label (business accounts).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    /// Label identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Palette index.
    #[serde(default)]
    pub color: i32,
    /// Identifier of the built-in label this one stands for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predefined_id: Option<String>,
    /// Set when the label was deleted.
    #[serde(default)]
    pub deleted: bool,
}

impl Label {
    /// Whether this is one of the built-in labels.
    #[must_use]
    pub const fn is_predefined(&self) -> bool {
        self.predefined_id.is_some()
    }
}

/// A label attached to a chat or to a single message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LabelAssociation {
    /// Label on a whole chat.
    Chat {
        /// Labelled chat.
        chat_id: String,
        /// Attached label.
        label_id: String,
    },
    /// Label on one message.
    Message {
        /// Chat holding the message.
        chat_id: String,
        /// Labelled message.
        message_id: String,
        /// Attached label.
        label_id: String,
    },
}

impl LabelAssociation {
    // Ids never contain this separator, so joined keys cannot collide.
    const KEY_SEPARATOR: char = '|';

    /// Composite key of the relation.
    #[must_use]
    pub fn key(&self) -> String {
        let sep = Self::KEY_SEPARATOR;
        match self {
            Self::Chat { chat_id, label_id } => format!("{chat_id}{sep}{label_id}"),
            Self::Message {
                chat_id,
                message_id,
                label_id,
            } => format!("{chat_id}{sep}{message_id}{sep}{label_id}"),
        }
    }

    /// Chat that owns the relation.
    #[must_use]
    pub fn chat_id(&self) -> &str {
        match self {
            Self::Chat { chat_id, .. } | Self::Message { chat_id, .. } => chat_id,
        }
    }

    /// Attached label.
    #[must_use]
    pub fn label_id(&self) -> &str {
        match self {
            Self::Chat { label_id, .. } | Self::Message { label_id, .. } => label_id,
        }
    }

    /// Labelled message, for message associations.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Self::Chat { .. } => None,
            Self::Message { message_id, .. } => Some(message_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_do_not_collide() {
        let a = LabelAssociation::Chat {
            chat_id: "ab".to_string(),
            label_id: "c".to_string(),
        };
        let b = LabelAssociation::Chat {
            chat_id: "a".to_string(),
            label_id: "bc".to_string(),
        };
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_tagged_serde() {
        let assoc = LabelAssociation::Message {
            chat_id: "c".to_string(),
            message_id: "m".to_string(),
            label_id: "1".to_string(),
        };
        let value = serde_json::to_value(&assoc).unwrap();
        assert_eq!(value["type"], "message");
        let back: LabelAssociation = serde_json::from_value(value).unwrap();
        assert_eq!(back.message_id(), Some("m"));
        assert_eq!(back.key(), "c|m|1");
    }
}
