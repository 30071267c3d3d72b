//! Insertion-ordered message ledger keyed by message id.
//!
//! History backfill is prepended, live traffic appended. Identifiers are
//! unique: re-inserting a known id keeps its position and merges into the
//! stored copy, never letting the stored status regress.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::model::message::{Message, MessageUpdate};

/// Where a new message lands in the ledger.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UpsertMode {
    /// Insert at the head (history backfill).
    Prepend,
    /// Insert at the tail (live traffic).
    Append,
}

/// Pagination cursor over a ledger.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCursor {
    /// Messages strictly older than the given id.
    Before(String),
    /// Messages strictly newer than the given id.
    After(String),
}

/// Ordered message store for one conversation.
#[derive(Clone, Debug, Default)]
pub struct MessageLedger {
    order: VecDeque<String>,
    entries: HashMap<String, Message>,
}

impl MessageLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert a message, or merge it into the stored copy of the same id.
    ///
    /// Returns `true` when the id was not present before.
    pub fn upsert(&mut self, message: Message, mode: UpsertMode) -> bool {
        let id = message.id().to_string();
        if let Some(existing) = self.entries.get_mut(&id) {
            existing.merge(message);
            return false;
        }

        match mode {
            UpsertMode::Prepend => self.order.push_front(id.clone()),
            UpsertMode::Append => self.order.push_back(id.clone()),
        }
        self.entries.insert(id, message);
        true
    }

    /// Look up a message by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Message> {
        self.entries.get(id)
    }

    /// Mutable lookup, for receipts and reactions.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.entries.get_mut(id)
    }

    /// Merge a partial update into a stored message.
    ///
    /// Returns `false` if the id is unknown.
    pub fn update_assign(&mut self, id: &str, update: MessageUpdate) -> bool {
        match self.entries.get_mut(id) {
            Some(message) => {
                update.apply_to(message);
                true
            }
            None => false,
        }
    }

    /// Keep only messages matching `keep`; returns how many were removed.
    pub fn filter<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&Message) -> bool,
    {
        let before = self.order.len();
        let entries = &mut self.entries;
        self.order.retain(|id| {
            let retain = entries.get(id).is_some_and(&mut keep);
            if !retain {
                entries.remove(id);
            }
            retain
        });
        before - self.order.len()
    }

    /// Remove every message.
    pub fn clear(&mut self) {
        self.order.clear();
        self.entries.clear();
    }

    /// Messages in ledger order.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Most recent message.
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.order.back().and_then(|id| self.entries.get(id))
    }

    /// Position of a message in ledger order.
    #[must_use]
    pub fn position(&self, id: &str) -> Option<usize> {
        if !self.entries.contains_key(id) {
            return None;
        }
        self.order.iter().position(|candidate| candidate == id)
    }

    /// A page of at most `count` messages, in ledger order.
    ///
    /// Without a cursor the newest `count` are returned. `Before` keeps the
    /// messages nearest to (and older than) the cursor; `After` keeps those
    /// nearest to (and newer than) it. An unknown cursor yields nothing.
    #[must_use]
    pub fn page(&self, count: usize, cursor: Option<&MessageCursor>) -> Vec<Message> {
        let (start, end) = match cursor {
            None => (self.len().saturating_sub(count), self.len()),
            Some(MessageCursor::Before(id)) => match self.position(id) {
                Some(idx) => (idx.saturating_sub(count), idx),
                None => return Vec::new(),
            },
            Some(MessageCursor::After(id)) => match self.position(id) {
                Some(idx) => {
                    let start = idx + 1;
                    (start, start.saturating_add(count).min(self.len()))
                }
                None => return Vec::new(),
            },
        };

        self.order
            .range(start..end)
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    /// Owned copy of every message, in ledger order.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Message> {
        self.iter().cloned().collect()
    }
}

impl FromIterator<Message> for MessageLedger {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        let mut ledger = Self::new();
        for message in iter {
            ledger.upsert(message, UpsertMode::Append);
        }
        ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::{MessageKey, MessageStatus, Reaction, UserReceipt};

    fn msg(id: &str) -> Message {
        Message {
            key: MessageKey::new("1@s.whatsapp.net", id),
            ..Message::default()
        }
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(Message::id).collect()
    }

    fn ledger(ids: &[&str]) -> MessageLedger {
        ids.iter().map(|id| msg(id)).collect()
    }

    #[test]
    fn test_prepend_and_append_order() {
        let mut ledger = MessageLedger::new();
        ledger.upsert(msg("b"), UpsertMode::Append);
        ledger.upsert(msg("c"), UpsertMode::Append);
        ledger.upsert(msg("a"), UpsertMode::Prepend);
        assert_eq!(ids(&ledger.to_vec()), vec!["a", "b", "c"]);
        assert_eq!(ledger.last().map(Message::id), Some("c"));
    }

    #[test]
    fn test_duplicate_keeps_position() {
        let mut ledger = ledger(&["a", "b", "c"]);
        let mut replacement = msg("a");
        replacement.push_name = Some("Ada".to_string());
        assert!(!ledger.upsert(replacement, UpsertMode::Append));

        assert_eq!(ledger.len(), 3);
        assert_eq!(ids(&ledger.to_vec()), vec!["a", "b", "c"]);
        assert_eq!(
            ledger.get("a").and_then(|m| m.push_name.as_deref()),
            Some("Ada")
        );
    }

    #[test]
    fn test_replacement_keeps_higher_status() {
        let mut ledger = MessageLedger::new();
        let mut read = msg("a");
        read.status = Some(MessageStatus::READ);
        ledger.upsert(read, UpsertMode::Append);

        let mut older = msg("a");
        older.status = Some(MessageStatus::SERVER_ACK);
        ledger.upsert(older, UpsertMode::Prepend);
        assert_eq!(
            ledger.get("a").and_then(|m| m.status),
            Some(MessageStatus::READ)
        );
    }

    #[test]
    fn test_redelivery_keeps_receipts_and_reactions() {
        let mut ledger = MessageLedger::new();
        let mut original = msg("a");
        original.push_name = Some("Ada".to_string());
        original.stub_type = Some(7);
        ledger.upsert(original, UpsertMode::Append);

        let stored = ledger.get_mut("a").unwrap();
        stored.apply_receipt(&UserReceipt {
            user_jid: "2@s.whatsapp.net".to_string(),
            read_timestamp: Some(9),
            ..UserReceipt::default()
        });
        stored.apply_reaction(&Reaction {
            key: MessageKey::new("1@s.whatsapp.net", "r"),
            text: Some("🔥".to_string()),
            sender_timestamp_ms: None,
        });

        assert!(!ledger.upsert(msg("a"), UpsertMode::Prepend));
        let stored = ledger.get("a").unwrap();
        assert_eq!(stored.user_receipt.len(), 1);
        assert_eq!(stored.reactions.len(), 1);
        assert_eq!(stored.push_name.as_deref(), Some("Ada"));
        assert_eq!(stored.stub_type, Some(7));
    }

    #[test]
    fn test_update_assign_is_monotonic() {
        let mut ledger = MessageLedger::new();
        let mut first = msg("a");
        first.status = Some(MessageStatus(1));
        ledger.upsert(first, UpsertMode::Append);

        let mut max_seen = 1;
        for status in [0u8, 3, 2, 5, 4, 1] {
            max_seen = max_seen.max(status);
            let applied = ledger.update_assign(
                "a",
                MessageUpdate {
                    status: Some(MessageStatus(status)),
                    ..MessageUpdate::default()
                },
            );
            assert!(applied);
            assert_eq!(
                ledger.get("a").and_then(|m| m.status),
                Some(MessageStatus(max_seen))
            );
        }
    }

    #[test]
    fn test_update_assign_unknown_id() {
        let mut ledger = ledger(&["a"]);
        assert!(!ledger.update_assign("zzz", MessageUpdate::default()));
    }

    #[test]
    fn test_filter_and_clear() {
        let mut ledger = ledger(&["a", "b", "c", "d"]);
        let removed = ledger.filter(|m| m.id() != "b" && m.id() != "d");
        assert_eq!(removed, 2);
        assert_eq!(ids(&ledger.to_vec()), vec!["a", "c"]);
        assert!(ledger.get("b").is_none());

        ledger.clear();
        assert!(ledger.is_empty());
        assert!(ledger.last().is_none());
    }

    #[test]
    fn test_page_without_cursor() {
        let ledger = ledger(&["a", "b", "c", "d", "e"]);
        assert_eq!(ids(&ledger.page(2, None)), vec!["d", "e"]);
        assert_eq!(ids(&ledger.page(50, None)).len(), 5);
        assert!(ledger.page(0, None).is_empty());
    }

    #[test]
    fn test_page_before_keeps_nearest() {
        let ledger = ledger(&["a", "b", "c", "d", "e"]);
        let before = MessageCursor::Before("d".to_string());
        assert_eq!(ids(&ledger.page(2, Some(&before))), vec!["b", "c"]);
        assert_eq!(ids(&ledger.page(10, Some(&before))), vec!["a", "b", "c"]);

        let first = MessageCursor::Before("a".to_string());
        assert!(ledger.page(3, Some(&first)).is_empty());
    }

    #[test]
    fn test_page_after() {
        let ledger = ledger(&["a", "b", "c", "d", "e"]);
        let after = MessageCursor::After("b".to_string());
        assert_eq!(ids(&ledger.page(2, Some(&after))), vec!["c", "d"]);
        assert_eq!(ids(&ledger.page(10, Some(&after))), vec!["c", "d", "e"]);
    }

    #[test]
    fn test_page_unknown_cursor_is_empty() {
        let ledger = ledger(&["a", "b"]);
        let missing = MessageCursor::Before("nope".to_string());
        assert!(ledger.page(5, Some(&missing)).is_empty());
        let missing = MessageCursor::After("nope".to_string());
        assert!(ledger.page(5, Some(&missing)).is_empty());
    }
}
