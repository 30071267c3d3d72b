//! Builders shared by the store tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;

use crate::core::config::StoreConfig;
use crate::core::errors::{StoreError, StoreResult};
use crate::events::{StoreEvent, UpsertKind};
use crate::model::{Message, MessageKey, MessageStatus};
use crate::storage::{
    Document, DocumentKey, EntityKind, MemoryBackend, PersistenceBackend, StoreFuture,
};
use crate::store::ConversationStore;

pub(super) const ALICE: &str = "111@s.whatsapp.net";
pub(super) const BOB: &str = "222@s.whatsapp.net";
pub(super) const GROUP: &str = "333-444@g.us";

pub(super) fn store() -> ConversationStore {
    store_with(StoreConfig::default()).0
}

pub(super) fn store_with(config: StoreConfig) -> (ConversationStore, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let store = ConversationStore::new(config, backend.clone()).unwrap();
    (store, backend)
}

pub(super) fn text(jid: &str, id: &str, ts: i64) -> Message {
    Message {
        key: MessageKey::new(jid, id),
        message_timestamp: ts,
        status: Some(MessageStatus::SERVER_ACK),
        content: Some(json!({"conversation": format!("message {id}")})),
        ..Message::default()
    }
}

pub(super) fn upsert(messages: Vec<Message>, kind: UpsertKind) -> StoreEvent {
    StoreEvent::MessagesUpsert { messages, kind }
}

/// Memory backend whose writes can be switched to fail.
///
/// Reads always succeed. `purge` fails with `fail_purge` or `fail_writes`.
#[derive(Default)]
pub(super) struct FlakyBackend {
    inner: MemoryBackend,
    fail_writes: AtomicBool,
    fail_purge: AtomicBool,
}

impl FlakyBackend {
    pub(super) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(super) fn fail_purge(&self, fail: bool) {
        self.fail_purge.store(fail, Ordering::SeqCst);
    }

    pub(super) fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    fn check(&self, purge: bool) -> StoreResult<()> {
        let failing = self.fail_writes.load(Ordering::SeqCst)
            || (purge && self.fail_purge.load(Ordering::SeqCst));
        if failing {
            Err(StoreError::Backend("down".to_string()))
        } else {
            Ok(())
        }
    }
}

impl PersistenceBackend for FlakyBackend {
    fn get(&self, key: &DocumentKey) -> StoreFuture<'_, StoreResult<Option<Document>>> {
        self.inner.get(key)
    }

    fn set(&self, key: DocumentKey, document: Document) -> StoreFuture<'_, StoreResult<()>> {
        match self.check(false) {
            Ok(()) => self.inner.set(key, document),
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }

    fn set_if_absent(
        &self,
        key: DocumentKey,
        document: Document,
    ) -> StoreFuture<'_, StoreResult<bool>> {
        match self.check(false) {
            Ok(()) => self.inner.set_if_absent(key, document),
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }

    fn delete(&self, key: &DocumentKey) -> StoreFuture<'_, StoreResult<bool>> {
        match self.check(false) {
            Ok(()) => self.inner.delete(key),
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }

    fn delete_many(&self, keys: Vec<DocumentKey>) -> StoreFuture<'_, StoreResult<usize>> {
        match self.check(false) {
            Ok(()) => self.inner.delete_many(keys),
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }

    fn set_many(
        &self,
        documents: Vec<(DocumentKey, Document)>,
    ) -> StoreFuture<'_, StoreResult<()>> {
        match self.check(false) {
            Ok(()) => self.inner.set_many(documents),
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }

    fn insert_many_if_absent(
        &self,
        documents: Vec<(DocumentKey, Document)>,
    ) -> StoreFuture<'_, StoreResult<usize>> {
        match self.check(false) {
            Ok(()) => self.inner.insert_many_if_absent(documents),
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }

    fn list(&self, kind: EntityKind) -> StoreFuture<'_, StoreResult<Vec<(String, Document)>>> {
        self.inner.list(kind)
    }

    fn purge(&self, kind: EntityKind) -> StoreFuture<'_, StoreResult<usize>> {
        match self.check(true) {
            Ok(()) => self.inner.purge(kind),
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }
}

pub(super) fn flaky_store() -> (ConversationStore, Arc<FlakyBackend>) {
    let backend = Arc::new(FlakyBackend::default());
    let store = ConversationStore::new(StoreConfig::default(), backend.clone()).unwrap();
    (store, backend)
}
