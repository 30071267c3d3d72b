//! Process-local backend.

use dashmap::DashMap;

use crate::core::errors::StoreResult;
use crate::storage::backend::{Document, DocumentKey, EntityKind, PersistenceBackend, StoreFuture};

/// Backend keeping every document in a concurrent map.
///
/// Nothing survives the process; useful for tests and for deployments that
/// rely on snapshots alone.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: DashMap<DocumentKey, Document>,
}

impl MemoryBackend {
    /// Create an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl PersistenceBackend for MemoryBackend {
    fn get(&self, key: &DocumentKey) -> StoreFuture<'_, StoreResult<Option<Document>>> {
        let found = self.documents.get(key).map(|entry| entry.value().clone());
        Box::pin(async move { Ok(found) })
    }

    fn set(&self, key: DocumentKey, document: Document) -> StoreFuture<'_, StoreResult<()>> {
        self.documents.insert(key, document);
        Box::pin(async { Ok(()) })
    }

    fn set_if_absent(
        &self,
        key: DocumentKey,
        document: Document,
    ) -> StoreFuture<'_, StoreResult<bool>> {
        let inserted = match self.documents.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(document);
                true
            }
        };
        Box::pin(async move { Ok(inserted) })
    }

    fn delete(&self, key: &DocumentKey) -> StoreFuture<'_, StoreResult<bool>> {
        let removed = self.documents.remove(key).is_some();
        Box::pin(async move { Ok(removed) })
    }

    fn delete_many(&self, keys: Vec<DocumentKey>) -> StoreFuture<'_, StoreResult<usize>> {
        let removed = keys
            .iter()
            .filter(|key| self.documents.remove(*key).is_some())
            .count();
        Box::pin(async move { Ok(removed) })
    }

    fn set_many(
        &self,
        documents: Vec<(DocumentKey, Document)>,
    ) -> StoreFuture<'_, StoreResult<()>> {
        for (key, document) in documents {
            self.documents.insert(key, document);
        }
        Box::pin(async { Ok(()) })
    }

    fn insert_many_if_absent(
        &self,
        documents: Vec<(DocumentKey, Document)>,
    ) -> StoreFuture<'_, StoreResult<usize>> {
        let mut inserted = 0;
        for (key, document) in documents {
            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.documents.entry(key) {
                slot.insert(document);
                inserted += 1;
            }
        }
        Box::pin(async move { Ok(inserted) })
    }

    fn list(&self, kind: EntityKind) -> StoreFuture<'_, StoreResult<Vec<(String, Document)>>> {
        let mut found: Vec<(String, Document)> = self
            .documents
            .iter()
            .filter(|entry| entry.key().kind == kind)
            .map(|entry| (entry.key().id.clone(), entry.value().clone()))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        Box::pin(async move { Ok(found) })
    }

    fn purge(&self, kind: EntityKind) -> StoreFuture<'_, StoreResult<usize>> {
        let before = self.documents.len();
        self.documents.retain(|key, _| key.kind != kind);
        let removed = before.saturating_sub(self.documents.len());
        Box::pin(async move { Ok(removed) })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn test_set_if_absent_keeps_first() {
        let backend = MemoryBackend::new();
        let key = DocumentKey::new(EntityKind::Chat, "a");
        assert!(backend.set_if_absent(key.clone(), json!({"n": 1})).await.unwrap());
        assert!(!backend.set_if_absent(key.clone(), json!({"n": 2})).await.unwrap());
        assert_eq!(backend.get(&key).await.unwrap(), Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_list_and_purge_scoped_to_kind() {
        let backend = MemoryBackend::new();
        backend
            .set_many(vec![
                (DocumentKey::new(EntityKind::Chat, "b"), json!(2)),
                (DocumentKey::new(EntityKind::Chat, "a"), json!(1)),
                (DocumentKey::new(EntityKind::Contact, "a"), json!(3)),
            ])
            .await
            .unwrap();

        let chats = backend.list(EntityKind::Chat).await.unwrap();
        assert_eq!(chats, vec![("a".to_string(), json!(1)), ("b".to_string(), json!(2))]);

        assert_eq!(backend.purge(EntityKind::Chat).await.unwrap(), 2);
        assert_eq!(backend.len(), 1);
        assert!(backend.list(EntityKind::Chat).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_many_counts_new_only() {
        let backend = MemoryBackend::new();
        backend
            .set(DocumentKey::new(EntityKind::Contact, "a"), json!("old"))
            .await
            .unwrap();
        let inserted = backend
            .insert_many_if_absent(vec![
                (DocumentKey::new(EntityKind::Contact, "a"), json!("new")),
                (DocumentKey::new(EntityKind::Contact, "b"), json!("new")),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(
            backend
                .get(&DocumentKey::new(EntityKind::Contact, "a"))
                .await
                .unwrap(),
            Some(json!("old"))
        );
    }
}
