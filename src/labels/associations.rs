//! Index of label relations, queryable by chat or message.

use dashmap::DashMap;

use crate::model::label::LabelAssociation;

/// Keyed set of label associations.
#[derive(Debug, Default)]
pub struct LabelAssociationIndex {
    entries: DashMap<String, LabelAssociation>,
}

impl LabelAssociationIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an association; returns `true` if it was new.
    pub fn upsert(&self, association: LabelAssociation) -> bool {
        self.entries
            .insert(association.key(), association)
            .is_none()
    }

    /// Remove an association; returns `true` if it existed.
    pub fn remove(&self, association: &LabelAssociation) -> bool {
        self.entries.remove(&association.key()).is_some()
    }

    /// Number of associations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Label ids attached to a chat as a whole.
    #[must_use]
    pub fn labels_for_chat(&self, chat_id: &str) -> Vec<String> {
        let mut labels: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| {
                matches!(entry.value(), LabelAssociation::Chat { chat_id: c, .. } if c == chat_id)
            })
            .map(|entry| entry.value().label_id().to_string())
            .collect();
        labels.sort();
        labels
    }

    /// Label ids attached to a message.
    #[must_use]
    pub fn labels_for_message(&self, message_id: &str) -> Vec<String> {
        let mut labels: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| entry.value().message_id() == Some(message_id))
            .map(|entry| entry.value().label_id().to_string())
            .collect();
        labels.sort();
        labels
    }

    /// Copy of every association, ordered by key.
    #[must_use]
    pub fn all(&self) -> Vec<LabelAssociation> {
        let mut all: Vec<(String, LabelAssociation)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all.into_iter().map(|(_, association)| association).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat_label(chat: &str, label: &str) -> LabelAssociation {
        LabelAssociation::Chat {
            chat_id: chat.to_string(),
            label_id: label.to_string(),
        }
    }

    #[test]
    fn test_upsert_is_keyed() {
        let index = LabelAssociationIndex::new();
        assert!(index.upsert(chat_label("c1", "1")));
        assert!(!index.upsert(chat_label("c1", "1")));
        assert!(index.upsert(chat_label("c1", "2")));
        assert_eq!(index.len(), 2);
        assert_eq!(index.labels_for_chat("c1"), vec!["1", "2"]);
    }

    #[test]
    fn test_message_queries() {
        let index = LabelAssociationIndex::new();
        index.upsert(chat_label("c1", "1"));
        index.upsert(LabelAssociation::Message {
            chat_id: "c1".to_string(),
            message_id: "m1".to_string(),
            label_id: "3".to_string(),
        });

        assert_eq!(index.labels_for_message("m1"), vec!["3"]);
        assert_eq!(index.labels_for_chat("c1"), vec!["1"]);
        assert!(index.labels_for_message("m2").is_empty());
    }

    #[test]
    fn test_remove() {
        let index = LabelAssociationIndex::new();
        let assoc = chat_label("c1", "1");
        index.upsert(assoc.clone());
        assert!(index.remove(&assoc));
        assert!(!index.remove(&assoc));
        assert!(index.is_empty());
    }
}
