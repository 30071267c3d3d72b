//! Whole-store snapshots, backend hydration and status expiry.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::errors::StoreResult;
use crate::core::jid::STATUS_BROADCAST_JID;
use crate::ledger::UpsertMode;
use crate::model::{Chat, Contact, GroupMetadata, Label, LabelAssociation, Message};
use crate::storage::{Document, DocumentKey, EntityKind};
use crate::store::core::{ConversationStore, encode};

/// Serializable copy of the mirrored state.
///
/// Presence and connection state are transient and not included.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSnapshot {
    /// Chats in display order.
    pub chats: Vec<Chat>,
    /// Contacts by id.
    pub contacts: BTreeMap<String, Contact>,
    /// Ledgers by chat id, oldest message first.
    pub messages: BTreeMap<String, Vec<Message>>,
    /// Labels by id.
    pub labels: BTreeMap<String, Label>,
    /// Label relations.
    pub label_associations: Vec<LabelAssociation>,
    /// Group metadata by group id.
    pub group_metadata: BTreeMap<String, GroupMetadata>,
}

/// Counts from a [`ConversationStore::hydrate`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HydrateStats {
    /// Documents restored.
    pub restored: usize,
    /// Documents that could not be decoded.
    pub skipped: usize,
}

impl ConversationStore {
    /// Copy the current state into a snapshot.
    pub async fn snapshot(&self) -> StoreSnapshot {
        let labels = self
            .labels
            .lock()
            .await
            .all()
            .into_iter()
            .map(|label| (label.id.clone(), label))
            .collect();

        StoreSnapshot {
            chats: self.sorted_chats(),
            contacts: self
                .contacts
                .iter()
                .map(|c| (c.key().clone(), c.value().clone()))
                .collect(),
            messages: self
                .messages
                .iter()
                .map(|ledger| (ledger.key().clone(), ledger.value().to_vec()))
                .collect(),
            labels,
            label_associations: self.label_associations.all(),
            group_metadata: self
                .group_metadata
                .iter()
                .map(|m| (m.key().clone(), m.value().clone()))
                .collect(),
        }
    }

    /// Serialize the current state.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub async fn to_json(&self) -> StoreResult<serde_json::Value> {
        encode(&self.snapshot().await)
    }

    /// Merge a serialized snapshot into the store.
    ///
    /// A document that does not decode as a snapshot is logged and treated
    /// as empty. Returns whether anything was restored.
    ///
    /// # Errors
    /// Returns an error if writing the restored state to the backend fails.
    pub async fn from_json(&self, value: serde_json::Value) -> StoreResult<bool> {
        match serde_json::from_value::<StoreSnapshot>(value) {
            Ok(snapshot) => {
                self.restore(snapshot).await?;
                Ok(true)
            }
            Err(err) => {
                warn!(error = %err, "malformed snapshot ignored");
                Ok(false)
            }
        }
    }

    /// Merge a snapshot into the store.
    ///
    /// Restoring only upserts: nothing already held is removed.
    ///
    /// # Errors
    /// Returns an error if writing the restored state to the backend fails.
    pub async fn restore(&self, snapshot: StoreSnapshot) -> StoreResult<()> {
        let StoreSnapshot {
            chats,
            contacts,
            messages,
            labels,
            label_associations,
            group_metadata,
        } = snapshot;
        let mut documents = Vec::new();

        for chat in chats {
            let mut entry = self
                .chats
                .entry(chat.id.clone())
                .or_insert_with(|| Chat::new(&chat.id));
            entry.merge(chat);
            documents.push((DocumentKey::new(EntityKind::Chat, &entry.id), encode(&*entry)?));
        }

        for (id, contact) in contacts {
            let mut entry = self.contacts.entry(id.clone()).or_insert_with(|| Contact::new(&id));
            entry.merge(contact);
            documents.push((DocumentKey::new(EntityKind::Contact, &id), encode(&*entry)?));
        }

        let mut message_count = 0;
        for (jid, ledger) in messages {
            for message in ledger {
                if let Some(stored) = self.upsert_message(&jid, message, UpsertMode::Append) {
                    documents.push((DocumentKey::message(&jid, stored.id()), encode(&stored)?));
                    message_count += 1;
                }
            }
        }

        {
            let mut repository = self.labels.lock().await;
            for (id, label) in labels {
                let document = encode(&label)?;
                match repository.upsert_by_id(label) {
                    Ok(()) => documents.push((DocumentKey::new(EntityKind::Label, &id), document)),
                    Err(err) => warn!(label_id = %id, error = %err, "label skipped on restore"),
                }
            }
        }

        for association in label_associations {
            documents.push((
                DocumentKey::new(EntityKind::LabelAssociation, association.key()),
                encode(&association)?,
            ));
            self.label_associations.upsert(association);
        }

        for (id, metadata) in group_metadata {
            documents.push((DocumentKey::new(EntityKind::GroupMetadata, &id), encode(&metadata)?));
            self.group_metadata.insert(id, metadata);
        }

        info!(
            documents = documents.len(),
            messages = message_count,
            "snapshot restored"
        );
        self.backend.set_many(documents).await
    }

    /// Store the current state through the backend under `name`.
    ///
    /// # Errors
    /// Returns an error if serialization or the backend write fails.
    pub async fn write_snapshot(&self, name: &str) -> StoreResult<()> {
        let document = self.to_json().await?;
        self.backend
            .set(DocumentKey::new(EntityKind::Snapshot, name), document)
            .await?;
        debug!(snapshot = %name, "snapshot written");
        Ok(())
    }

    /// Restore the snapshot stored under `name`, if any.
    ///
    /// # Errors
    /// Returns an error if the backend read or write fails.
    pub async fn read_snapshot(&self, name: &str) -> StoreResult<bool> {
        match self
            .backend
            .get(&DocumentKey::new(EntityKind::Snapshot, name))
            .await?
        {
            Some(document) => self.from_json(document).await,
            None => {
                debug!(snapshot = %name, "no stored snapshot");
                Ok(false)
            }
        }
    }

    /// Write the current state to a JSON file.
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub async fn write_to_file(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let raw = serde_json::to_vec(&self.snapshot().await)?;
        tokio::fs::write(path.as_ref(), raw).await?;
        debug!(path = %path.as_ref().display(), "snapshot written to file");
        Ok(())
    }

    /// Restore state from a JSON file; a missing file restores nothing.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the backend write fails.
    pub async fn read_from_file(&self, path: impl AsRef<Path>) -> StoreResult<bool> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            return Ok(false);
        }
        let raw = tokio::fs::read(path).await?;
        match serde_json::from_slice::<serde_json::Value>(&raw) {
            Ok(value) => self.from_json(value).await,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable snapshot file ignored");
                Ok(false)
            }
        }
    }

    /// Rebuild the in-memory view from every document the backend holds.
    ///
    /// Additive, like [`Self::restore`]. Messages are ordered by timestamp
    /// within each chat.
    ///
    /// # Errors
    /// Returns an error if listing the backend fails.
    pub async fn hydrate(&self) -> StoreResult<HydrateStats> {
        let (chats, contacts, messages, groups, labels, associations) = futures::try_join!(
            self.backend.list(EntityKind::Chat),
            self.backend.list(EntityKind::Contact),
            self.backend.list(EntityKind::Message),
            self.backend.list(EntityKind::GroupMetadata),
            self.backend.list(EntityKind::Label),
            self.backend.list(EntityKind::LabelAssociation),
        )?;
        let mut stats = HydrateStats::default();

        for chat in decode_all::<Chat>(chats, &mut stats) {
            self.chats
                .entry(chat.id.clone())
                .or_insert_with(|| Chat::new(&chat.id))
                .merge(chat);
        }
        for contact in decode_all::<Contact>(contacts, &mut stats) {
            self.contacts
                .entry(contact.id.clone())
                .or_insert_with(|| Contact::new(&contact.id))
                .merge(contact);
        }
        for metadata in decode_all::<GroupMetadata>(groups, &mut stats) {
            self.group_metadata.insert(metadata.id.clone(), metadata);
        }
        for association in decode_all::<LabelAssociation>(associations, &mut stats) {
            self.label_associations.upsert(association);
        }
        {
            let mut repository = self.labels.lock().await;
            for label in decode_all::<Label>(labels, &mut stats) {
                if let Err(err) = repository.upsert_by_id(label) {
                    warn!(error = %err, "label skipped on hydrate");
                }
            }
        }

        let mut by_chat: BTreeMap<String, Vec<Message>> = BTreeMap::new();
        for (id, document) in messages {
            let Some((jid, _)) = id.split_once('/') else {
                stats.skipped += 1;
                continue;
            };
            let jid = jid.to_string();
            if let Some(message) = decode_one::<Message>(&id, document, &mut stats) {
                by_chat.entry(jid).or_default().push(message);
            }
        }
        for (jid, mut messages) in by_chat {
            messages.sort_by_key(|m| m.message_timestamp);
            for message in messages {
                self.upsert_message(&jid, message, UpsertMode::Append);
            }
        }

        info!(restored = stats.restored, skipped = stats.skipped, "store hydrated");
        Ok(stats)
    }

    /// Drop status broadcasts older than `ttl_seconds` relative to `now`.
    ///
    /// Returns how many were removed.
    ///
    /// # Errors
    /// Returns an error if deleting them from the backend fails.
    pub async fn expire_status_messages(&self, now: i64, ttl_seconds: u64) -> StoreResult<usize> {
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(ttl);

        let expired: Vec<DocumentKey> = {
            let Some(mut ledger) = self.messages.get_mut(STATUS_BROADCAST_JID) else {
                return Ok(0);
            };
            let stale: Vec<DocumentKey> = ledger
                .iter()
                .filter(|m| m.message_timestamp < cutoff)
                .map(|m| DocumentKey::message(STATUS_BROADCAST_JID, m.id()))
                .collect();
            ledger.filter(|m| m.message_timestamp >= cutoff);
            stale
        };

        if expired.is_empty() {
            return Ok(0);
        }
        let count = expired.len();
        self.backend.delete_many(expired).await?;
        debug!(count, cutoff, "expired status broadcasts");
        Ok(count)
    }
}

fn decode_one<T: DeserializeOwned>(
    id: &str,
    document: Document,
    stats: &mut HydrateStats,
) -> Option<T> {
    match serde_json::from_value(document) {
        Ok(value) => {
            stats.restored += 1;
            Some(value)
        }
        Err(err) => {
            warn!(document = %id, error = %err, "undecodable document skipped");
            stats.skipped += 1;
            None
        }
    }
}

fn decode_all<T: DeserializeOwned>(
    documents: Vec<(String, Document)>,
    stats: &mut HydrateStats,
) -> Vec<T> {
    documents
        .into_iter()
        .filter_map(|(id, document)| decode_one(&id, document, stats))
        .collect()
}
