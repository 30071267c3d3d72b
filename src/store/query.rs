//! Read side of the store.
//!
//! Lookups return `None` rather than failing when nothing is cached. The
//! `fetch_*` helpers fall through to a [`Transport`] on a miss and write the
//! result back into the mirror.

use std::collections::HashMap;

use tracing::debug;
use url::Url;

use crate::core::errors::StoreResult;
use crate::core::jid::{is_group_jid, normalize_jid};
use crate::ledger::MessageCursor;
use crate::model::{
    AvatarRef, Chat, ConnectionState, Contact, GroupMetadata, Label, Message, MessageKey,
    PresenceData, UserReceipt, compare_chats,
};
use crate::storage::{DocumentKey, EntityKind};
use crate::store::core::{ConversationStore, encode};
use crate::transport::Transport;

impl ConversationStore {
    /// Page through a chat's messages.
    ///
    /// Without a cursor the most recent `count` are returned. A cursor that
    /// names a message not in the ledger yields an empty page.
    #[must_use]
    pub fn load_messages(
        &self,
        jid: &str,
        count: usize,
        cursor: Option<&MessageCursor>,
    ) -> Vec<Message> {
        self.messages
            .get(&normalize_jid(jid))
            .map(|ledger| ledger.page(count, cursor))
            .unwrap_or_default()
    }

    /// One message by chat and id.
    #[must_use]
    pub fn load_message(&self, jid: &str, id: &str) -> Option<Message> {
        self.messages
            .get(&normalize_jid(jid))
            .and_then(|ledger| ledger.get(id).cloned())
    }

    /// Latest message of a chat.
    #[must_use]
    pub fn most_recent_message(&self, jid: &str) -> Option<Message> {
        self.messages
            .get(&normalize_jid(jid))
            .and_then(|ledger| ledger.last().cloned())
    }

    /// Receipts recorded for a message.
    #[must_use]
    pub fn fetch_message_receipts(&self, key: &MessageKey) -> Option<Vec<UserReceipt>> {
        self.load_message(&key.remote_jid, &key.id)
            .map(|message| message.user_receipt)
    }

    /// Number of messages held for a chat.
    #[must_use]
    pub fn message_count(&self, jid: &str) -> usize {
        self.messages
            .get(&normalize_jid(jid))
            .map_or(0, |ledger| ledger.len())
    }

    /// One chat record.
    #[must_use]
    pub fn chat(&self, id: &str) -> Option<Chat> {
        self.chats.get(id).map(|chat| chat.value().clone())
    }

    /// Every chat in default display order.
    #[must_use]
    pub fn sorted_chats(&self) -> Vec<Chat> {
        let pin = self.config.pin_chats_first;
        let mut chats: Vec<Chat> = self.chats.iter().map(|c| c.value().clone()).collect();
        chats.sort_by(|a, b| compare_chats(a, b, pin));
        chats
    }

    /// One contact record.
    #[must_use]
    pub fn contact(&self, id: &str) -> Option<Contact> {
        self.contacts.get(id).map(|contact| contact.value().clone())
    }

    /// Number of cached contacts.
    #[must_use]
    pub fn contact_count(&self) -> usize {
        self.contacts.len()
    }

    /// Cached group metadata, without remote fallback.
    #[must_use]
    pub fn group(&self, id: &str) -> Option<GroupMetadata> {
        self.group_metadata.get(id).map(|m| m.value().clone())
    }

    /// Known presences in a chat, keyed by participant.
    #[must_use]
    pub fn presence(&self, id: &str) -> Option<HashMap<String, PresenceData>> {
        self.presences.get(id).map(|p| p.value().clone())
    }

    /// Last known connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        self.connection.current().await
    }

    /// Every live label, predefined ones included.
    pub async fn get_labels(&self) -> Vec<Label> {
        self.labels.lock().await.all()
    }

    /// Label ids attached to a chat.
    #[must_use]
    pub fn get_chat_labels(&self, chat_id: &str) -> Vec<String> {
        self.label_associations.labels_for_chat(chat_id)
    }

    /// Label ids attached to a message.
    #[must_use]
    pub fn get_message_labels(&self, message_id: &str) -> Vec<String> {
        self.label_associations.labels_for_message(message_id)
    }

    /// Profile picture of a chat or contact.
    ///
    /// A resolved URL is served from the cache. An unknown or stale
    /// reference is resolved through `transport` and written back into an
    /// existing contact.
    ///
    /// # Errors
    /// Returns an error if the transport or the write-back fails.
    pub async fn fetch_image_url(
        &self,
        jid: &str,
        transport: Option<&dyn Transport>,
    ) -> StoreResult<Option<Url>> {
        let cached = self.contacts.get(jid).map(|c| c.img_url.clone());
        if let Some(Some(avatar)) = &cached
            && !avatar.is_stale()
            && let AvatarRef::Url(url) = avatar
        {
            return Ok(Some(url.clone()));
        }

        let Some(transport) = transport else {
            return Ok(None);
        };
        let resolved = transport.profile_picture_url(jid).await?;

        if cached.is_none() {
            return Ok(resolved);
        }

        let document = match self.contacts.get_mut(jid) {
            Some(mut contact) => {
                contact.img_url = resolved.clone().map(AvatarRef::Url);
                Some(encode(&*contact)?)
            }
            None => None,
        };
        if let Some(document) = document {
            debug!(contact_id = %jid, "profile picture refreshed");
            self.backend
                .set(DocumentKey::new(EntityKind::Contact, jid), document)
                .await?;
        }
        Ok(resolved)
    }

    /// Contact record, fetched through `transport` when not cached.
    ///
    /// # Errors
    /// Returns an error if the transport or the write-back fails.
    pub async fn get_contact_info(
        &self,
        jid: &str,
        transport: Option<&dyn Transport>,
    ) -> StoreResult<Option<Contact>> {
        if let Some(contact) = self.contact(jid) {
            return Ok(Some(contact));
        }
        let Some(transport) = transport else {
            return Ok(None);
        };
        let Some(fetched) = transport.contact_info(jid).await? else {
            return Ok(None);
        };

        let merged = self
            .contacts
            .entry(jid.to_string())
            .or_insert(fetched)
            .value()
            .clone();
        self.backend
            .set(DocumentKey::new(EntityKind::Contact, jid), encode(&merged)?)
            .await?;
        Ok(Some(merged))
    }

    /// Group metadata, fetched through `transport` when not cached.
    ///
    /// # Errors
    /// Returns an error if the transport or the write-back fails.
    pub async fn fetch_group_metadata(
        &self,
        jid: &str,
        transport: Option<&dyn Transport>,
    ) -> StoreResult<Option<GroupMetadata>> {
        if let Some(metadata) = self.group(jid) {
            return Ok(Some(metadata));
        }
        if !is_group_jid(jid) {
            debug!(jid = %jid, "metadata requested for a non-group chat");
            return Ok(None);
        }
        let Some(transport) = transport else {
            return Ok(None);
        };
        let Some(fetched) = transport.group_metadata(jid).await? else {
            return Ok(None);
        };

        let metadata = self
            .group_metadata
            .entry(jid.to_string())
            .or_insert(fetched)
            .value()
            .clone();
        debug!(group_id = %jid, participants = metadata.participants.len(), "group metadata cached");
        self.backend
            .set(DocumentKey::new(EntityKind::GroupMetadata, jid), encode(&metadata)?)
            .await?;
        Ok(Some(metadata))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::events::{StoreEvent, UpsertKind};
    use crate::model::GroupParticipant;
    use crate::store::fixtures::{ALICE, BOB, GROUP, store, text, upsert};
    use crate::transport::TransportFuture;

    #[derive(Default)]
    struct FakeTransport {
        calls: AtomicUsize,
    }

    impl FakeTransport {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for FakeTransport {
        fn profile_picture_url(&self, jid: &str) -> TransportFuture<'_, StoreResult<Option<Url>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let url = Url::parse(&format!("https://pps.example.net/{jid}.jpg")).ok();
            Box::pin(async move { Ok(url) })
        }

        fn group_metadata(
            &self,
            jid: &str,
        ) -> TransportFuture<'_, StoreResult<Option<GroupMetadata>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let metadata = GroupMetadata {
                id: jid.to_string(),
                subject: "fetched".to_string(),
                participants: vec![GroupParticipant::member(ALICE)],
                ..GroupMetadata::default()
            };
            Box::pin(async move { Ok(Some(metadata)) })
        }

        fn contact_info(&self, jid: &str) -> TransportFuture<'_, StoreResult<Option<Contact>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut contact = Contact::new(jid);
            contact.notify = Some("remote".to_string());
            Box::pin(async move { Ok(Some(contact)) })
        }
    }

    async fn seeded(count: i64) -> ConversationStore {
        let store = store();
        let messages = (1..=count)
            .map(|n| text(ALICE, &format!("m{n}"), n))
            .collect();
        store
            .apply(upsert(messages, UpsertKind::Append))
            .await
            .unwrap();
        store
    }

    fn ids(messages: &[Message]) -> Vec<&str> {
        messages.iter().map(Message::id).collect()
    }

    #[tokio::test]
    async fn test_load_messages_pages() {
        let store = seeded(5).await;

        assert_eq!(ids(&store.load_messages(ALICE, 2, None)), vec!["m4", "m5"]);
        assert_eq!(store.load_messages(ALICE, 50, None).len(), 5);

        let before = MessageCursor::Before("m4".to_string());
        assert_eq!(
            ids(&store.load_messages(ALICE, 2, Some(&before))),
            vec!["m2", "m3"]
        );

        let after = MessageCursor::After("m2".to_string());
        assert_eq!(
            ids(&store.load_messages(ALICE, 2, Some(&after))),
            vec!["m3", "m4"]
        );

        let unknown = MessageCursor::Before("nope".to_string());
        assert!(store.load_messages(ALICE, 2, Some(&unknown)).is_empty());
        assert!(store.load_messages(BOB, 2, None).is_empty());
    }

    #[tokio::test]
    async fn test_point_lookups() {
        let store = seeded(3).await;
        assert_eq!(store.most_recent_message(ALICE).unwrap().id(), "m3");
        assert_eq!(store.load_message(ALICE, "m2").unwrap().message_timestamp, 2);
        assert!(store.load_message(ALICE, "m9").is_none());
        assert!(store.most_recent_message(BOB).is_none());
        assert!(
            store
                .fetch_message_receipts(&MessageKey::new(BOB, "m1"))
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_sorted_chats_order() {
        let store = store();
        let chat = |id: &str, pinned: bool, archived: bool, ts: i64| Chat {
            pinned,
            archived,
            conversation_timestamp: Some(ts),
            ..Chat::new(id)
        };
        store
            .apply(StoreEvent::ChatsUpsert(vec![
                chat("recent", false, false, 300),
                chat("pinned", true, false, 100),
                chat("archived", false, true, 900),
                chat("old", false, false, 200),
            ]))
            .await
            .unwrap();

        let order: Vec<String> = store.sorted_chats().into_iter().map(|c| c.id).collect();
        assert_eq!(order, vec!["pinned", "recent", "old", "archived"]);
    }

    #[tokio::test]
    async fn test_fetch_image_url_cache_and_refresh() {
        let store = store();
        let transport = FakeTransport::default();

        let unknown = store
            .fetch_image_url(BOB, Some(&transport))
            .await
            .unwrap();
        assert!(unknown.is_some());
        assert!(store.contact(BOB).is_none());

        let mut contact = Contact::new(ALICE);
        contact.img_url = Some(AvatarRef::Changed);
        store
            .apply(StoreEvent::ContactsUpsert(vec![contact]))
            .await
            .unwrap();

        let refreshed = store
            .fetch_image_url(ALICE, Some(&transport))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            store.contact(ALICE).unwrap().img_url,
            Some(AvatarRef::Url(refreshed.clone()))
        );
        assert_eq!(transport.calls(), 2);

        let cached = store.fetch_image_url(ALICE, None).await.unwrap();
        assert_eq!(cached, Some(refreshed));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_group_metadata_caches() {
        let store = store();
        let transport = FakeTransport::default();

        assert!(store.fetch_group_metadata(GROUP, None).await.unwrap().is_none());
        let first = store
            .fetch_group_metadata(GROUP, Some(&transport))
            .await
            .unwrap()
            .unwrap();
        let second = store
            .fetch_group_metadata(GROUP, Some(&transport))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(first.subject, "fetched");
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_group_metadata_skips_non_group_chats() {
        let store = store();
        let transport = FakeTransport::default();

        let metadata = store
            .fetch_group_metadata(ALICE, Some(&transport))
            .await
            .unwrap();
        assert!(metadata.is_none());
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_contact_info_falls_through() {
        let store = store();
        let transport = FakeTransport::default();

        let contact = store
            .get_contact_info(BOB, Some(&transport))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(contact.notify.as_deref(), Some("remote"));
        assert_eq!(store.contact(BOB), Some(contact));

        store.get_contact_info(BOB, Some(&transport)).await.unwrap();
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_predefined_labels_listed() {
        let store = store();
        let labels = store.get_labels().await;
        assert_eq!(labels.len(), 5);
        assert_eq!(labels[0].name, "New customer");
    }
}
