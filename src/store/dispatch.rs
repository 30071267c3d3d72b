//! Event handlers: one transition per [`StoreEvent`] variant.

use std::collections::{HashMap, HashSet};

use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use crate::core::errors::StoreResult;
use crate::core::jid::normalize_jid;
use crate::events::{
    AssociationAction, HistorySet, MessageDeletion, MessageUpdateEvent, ReactionEvent,
    ReceiptEvent, StoreEvent, UpsertKind,
};
use crate::labels::LabelEditOutcome;
use crate::ledger::UpsertMode;
use crate::model::{
    Chat, ChatUpdate, ConnectionState, Contact, ContactUpdate, GroupUpdate, Label,
    LabelAssociation, Message, MessageKey, ParticipantAction, PresenceData,
};
use crate::storage::{Document, DocumentKey, EntityKind};
use crate::store::core::{ConversationStore, encode};

type Batch = Vec<(DocumentKey, Document)>;

impl ConversationStore {
    pub(super) async fn apply_into(
        &self,
        event: StoreEvent,
        derived: &mut Vec<StoreEvent>,
    ) -> StoreResult<()> {
        match event {
            StoreEvent::ConnectionUpdate(state) => self.on_connection_update(state).await,
            StoreEvent::CredsUpdate(_) => {
                debug!("credential update left to the auth store");
                Ok(())
            }
            StoreEvent::HistorySet(set) => self.on_history_set(set).await,
            StoreEvent::MessagesUpsert { messages, kind } => {
                self.on_messages_upsert(messages, kind, derived).await
            }
            StoreEvent::MessagesUpdate(updates) => self.on_messages_update(updates).await,
            StoreEvent::MessagesDelete(deletion) => self.on_messages_delete(deletion).await,
            StoreEvent::ChatsUpsert(chats) => self.on_chats_upsert(chats).await,
            StoreEvent::ChatsUpdate(updates) => self.on_chats_update(updates).await,
            StoreEvent::ChatsDelete(ids) => self.on_chats_delete(ids).await,
            StoreEvent::ContactsUpsert(contacts) => self.on_contacts_upsert(contacts).await,
            StoreEvent::ContactsUpdate(updates) => self.on_contacts_update(updates).await,
            StoreEvent::GroupsUpdate(updates) => self.on_groups_update(updates).await,
            StoreEvent::GroupParticipantsUpdate {
                id,
                participants,
                action,
            } => {
                self.on_group_participants_update(&id, &participants, action)
                    .await
            }
            StoreEvent::PresenceUpdate { id, presences } => {
                self.on_presence_update(id, presences);
                Ok(())
            }
            StoreEvent::LabelsEdit(label) => self.on_labels_edit(label).await,
            StoreEvent::LabelsAssociation {
                action,
                association,
            } => self.on_labels_association(action, association).await,
            StoreEvent::ReceiptUpdate(receipts) => self.on_receipt_update(receipts).await,
            StoreEvent::Reactions(reactions) => self.on_reactions(reactions).await,
        }
    }

    async fn on_connection_update(&self, state: ConnectionState) -> StoreResult<()> {
        debug!(connection = ?state.connection, "connection state replaced");
        self.connection.replace(state).await;
        Ok(())
    }

    async fn on_history_set(&self, set: HistorySet) -> StoreResult<()> {
        let HistorySet {
            chats,
            contacts,
            messages,
            is_latest,
        } = set;

        // A failed purge is reported after the batch is in memory.
        let mut purge_error = None;
        if is_latest {
            let dropped_chats = self.chats.len();
            let dropped_ledgers = self.messages.len();
            self.chats.clear();
            self.messages.clear();
            match futures::try_join!(
                self.backend.purge(EntityKind::Chat),
                self.backend.purge(EntityKind::Message),
            ) {
                Ok((purged_chats, purged_messages)) => info!(
                    dropped_chats,
                    dropped_ledgers,
                    purged_chats,
                    purged_messages,
                    "purged state for latest history"
                ),
                Err(err) => {
                    warn!(
                        error = %err,
                        dropped_chats,
                        dropped_ledgers,
                        "backend purge failed for latest history"
                    );
                    purge_error = Some(err);
                }
            }
        }

        let excluded = if self.config.filter_chats {
            stub_only_chats(&messages)
        } else {
            HashSet::new()
        };

        let mut new_chats = Batch::new();
        for chat in chats {
            if excluded.contains(&chat.id) {
                continue;
            }
            if let Entry::Vacant(slot) = self.chats.entry(chat.id.clone()) {
                new_chats.push((DocumentKey::new(EntityKind::Chat, &chat.id), encode(&chat)?));
                slot.insert(chat);
            }
        }

        let mut new_contacts = Batch::new();
        for contact in contacts {
            if let Entry::Vacant(slot) = self.contacts.entry(contact.id.clone()) {
                new_contacts.push((
                    DocumentKey::new(EntityKind::Contact, &contact.id),
                    encode(&contact)?,
                ));
                slot.insert(contact);
            }
        }

        let message_count = messages.len();
        let mut stored_messages = Batch::new();
        for message in messages {
            let jid = normalize_jid(&message.key.remote_jid);
            if excluded.contains(&jid) {
                continue;
            }
            if let Some(stored) = self.upsert_message(&jid, message, UpsertMode::Prepend) {
                stored_messages.push((DocumentKey::message(&jid, stored.id()), encode(&stored)?));
            }
        }

        debug!(
            chats_added = new_chats.len(),
            contacts_added = new_contacts.len(),
            messages = message_count,
            excluded = excluded.len(),
            is_latest,
            "synced history"
        );

        let written = futures::try_join!(
            self.backend.insert_many_if_absent(new_chats),
            self.backend.insert_many_if_absent(new_contacts),
            self.backend.set_many(stored_messages),
        );
        if let Some(err) = purge_error {
            return Err(err);
        }
        written?;
        Ok(())
    }

    async fn on_messages_upsert(
        &self,
        messages: Vec<Message>,
        kind: UpsertKind,
        derived: &mut Vec<StoreEvent>,
    ) -> StoreResult<()> {
        let mut stored_messages = Batch::new();
        let mut created = Vec::new();

        for message in messages {
            let jid = normalize_jid(&message.key.remote_jid);
            let timestamp = message.message_timestamp;
            if let Some(stored) = self.upsert_message(&jid, message, UpsertMode::Append) {
                stored_messages.push((DocumentKey::message(&jid, stored.id()), encode(&stored)?));
            }

            if kind == UpsertKind::Notify
                && let Entry::Vacant(slot) = self.chats.entry(jid.clone())
            {
                let chat = Chat::from_first_message(jid, timestamp);
                debug!(chat_id = %chat.id, "synthesized chat for first message");
                created.push(chat.clone());
                slot.insert(chat);
            }
        }

        let mut new_chats = Batch::new();
        for chat in &created {
            new_chats.push((DocumentKey::new(EntityKind::Chat, &chat.id), encode(chat)?));
        }
        if !created.is_empty() {
            derived.push(StoreEvent::ChatsUpsert(created));
        }

        futures::try_join!(
            self.backend.set_many(stored_messages),
            self.backend.set_many(new_chats),
        )?;
        Ok(())
    }

    async fn on_messages_update(&self, updates: Vec<MessageUpdateEvent>) -> StoreResult<()> {
        let mut stored_messages = Batch::new();

        for MessageUpdateEvent { key, mut update } in updates {
            let jid = normalize_jid(&key.remote_jid);
            let stored = {
                let Some(mut ledger) = self.messages.get_mut(&jid) else {
                    debug!(chat_id = %jid, message_id = %key.id, "got update for non-existent message");
                    continue;
                };
                let Some(current) = ledger.get(&key.id).map(|m| m.status) else {
                    debug!(chat_id = %jid, message_id = %key.id, "got update for non-existent message");
                    continue;
                };
                if update.drop_stale_status(current) {
                    debug!(
                        message_id = %key.id,
                        stored = ?current,
                        "stored status newer than update"
                    );
                }
                if update.is_empty() {
                    continue;
                }
                ledger.update_assign(&key.id, update);
                ledger.get(&key.id).cloned()
            };

            if let Some(message) = stored {
                stored_messages.push((DocumentKey::message(&jid, message.id()), encode(&message)?));
            }
        }

        self.backend.set_many(stored_messages).await
    }

    async fn on_messages_delete(&self, deletion: MessageDeletion) -> StoreResult<()> {
        let mut removed_keys = Vec::new();

        match deletion {
            MessageDeletion::All { jid } => {
                let jid = normalize_jid(&jid);
                if let Some((_, ledger)) = self.messages.remove(&jid) {
                    removed_keys.extend(ledger.iter().map(|m| DocumentKey::message(&jid, m.id())));
                }
                debug!(chat_id = %jid, removed = removed_keys.len(), "cleared chat messages");
            }
            MessageDeletion::Keys(keys) => {
                let mut by_chat: HashMap<String, HashSet<String>> = HashMap::new();
                for key in keys {
                    by_chat
                        .entry(normalize_jid(&key.remote_jid))
                        .or_default()
                        .insert(key.id);
                }

                for (jid, ids) in by_chat {
                    let Some(mut ledger) = self.messages.get_mut(&jid) else {
                        continue;
                    };
                    let removed = ledger.filter(|m| !ids.contains(m.id()));
                    debug!(chat_id = %jid, removed, "deleted messages");
                    removed_keys.extend(ids.iter().map(|id| DocumentKey::message(&jid, id)));
                }
            }
        }

        self.backend.delete_many(removed_keys).await?;
        Ok(())
    }

    async fn on_chats_upsert(&self, chats: Vec<Chat>) -> StoreResult<()> {
        let mut stored = Batch::new();
        for chat in chats {
            let merged = match self.chats.entry(chat.id.clone()) {
                Entry::Occupied(mut slot) => {
                    slot.get_mut().merge(chat);
                    slot.get().clone()
                }
                Entry::Vacant(slot) => slot.insert(chat).value().clone(),
            };
            stored.push((DocumentKey::new(EntityKind::Chat, &merged.id), encode(&merged)?));
        }
        self.backend.set_many(stored).await
    }

    async fn on_chats_update(&self, updates: Vec<ChatUpdate>) -> StoreResult<()> {
        let mut stored = Batch::new();
        for update in updates {
            let Some(mut chat) = self.chats.get_mut(&update.id) else {
                debug!(chat_id = %update.id, "got update for non-existent chat");
                continue;
            };
            update.apply_to(&mut chat);
            stored.push((DocumentKey::new(EntityKind::Chat, &chat.id), encode(&*chat)?));
        }
        self.backend.set_many(stored).await
    }

    async fn on_chats_delete(&self, ids: Vec<String>) -> StoreResult<()> {
        let keys: Vec<DocumentKey> = ids
            .into_iter()
            .inspect(|id| {
                if self.chats.remove(id).is_none() {
                    debug!(chat_id = %id, "delete for unknown chat");
                }
            })
            .map(|id| DocumentKey::new(EntityKind::Chat, id))
            .collect();
        self.backend.delete_many(keys).await?;
        Ok(())
    }

    async fn on_contacts_upsert(&self, contacts: Vec<Contact>) -> StoreResult<()> {
        let mut stored = Batch::new();
        for contact in contacts {
            let merged = match self.contacts.entry(contact.id.clone()) {
                Entry::Occupied(mut slot) => {
                    slot.get_mut().merge(contact);
                    slot.get().clone()
                }
                Entry::Vacant(slot) => slot.insert(contact).value().clone(),
            };
            stored.push((DocumentKey::new(EntityKind::Contact, &merged.id), encode(&merged)?));
        }
        self.backend.set_many(stored).await
    }

    async fn on_contacts_update(&self, updates: Vec<ContactUpdate>) -> StoreResult<()> {
        let mut stored = Batch::new();
        for update in updates {
            let Some(mut contact) = self.contacts.get_mut(&update.id) else {
                debug!(contact_id = %update.id, "got update for non-existent contact");
                continue;
            };
            update.apply_to(&mut contact);
            stored.push((
                DocumentKey::new(EntityKind::Contact, &contact.id),
                encode(&*contact)?,
            ));
        }
        self.backend.set_many(stored).await
    }

    async fn on_groups_update(&self, updates: Vec<GroupUpdate>) -> StoreResult<()> {
        let mut stored = Batch::new();
        for update in updates {
            let Some(mut metadata) = self.group_metadata.get_mut(&update.id) else {
                debug!(group_id = %update.id, "got update for non-existent group metadata");
                continue;
            };
            update.apply_to(&mut metadata);
            stored.push((
                DocumentKey::new(EntityKind::GroupMetadata, &metadata.id),
                encode(&*metadata)?,
            ));
        }
        self.backend.set_many(stored).await
    }

    async fn on_group_participants_update(
        &self,
        id: &str,
        participants: &[String],
        action: ParticipantAction,
    ) -> StoreResult<()> {
        let document = {
            let Some(mut metadata) = self.group_metadata.get_mut(id) else {
                debug!(group_id = %id, "participant update for uncached group");
                return Ok(());
            };
            let touched = metadata.apply_participants(action, participants);
            debug!(group_id = %id, ?action, touched, "group participants updated");
            encode(&*metadata)?
        };
        self.backend
            .set(DocumentKey::new(EntityKind::GroupMetadata, id), document)
            .await
    }

    fn on_presence_update(&self, id: String, presences: HashMap<String, PresenceData>) {
        self.presences.entry(id).or_default().extend(presences);
    }

    async fn on_labels_edit(&self, label: Label) -> StoreResult<()> {
        let id = label.id.clone();
        let outcome = self.labels.lock().await.apply_edit(label.clone())?;
        let key = DocumentKey::new(EntityKind::Label, &id);

        match outcome {
            LabelEditOutcome::Upserted => self.backend.set(key, encode(&label)?).await,
            LabelEditOutcome::Deleted => {
                self.backend.delete(&key).await?;
                Ok(())
            }
            LabelEditOutcome::Ignored => {
                debug!(label_id = %id, "label edit ignored");
                Ok(())
            }
        }
    }

    async fn on_labels_association(
        &self,
        action: AssociationAction,
        association: LabelAssociation,
    ) -> StoreResult<()> {
        let key = DocumentKey::new(EntityKind::LabelAssociation, association.key());
        match action {
            AssociationAction::Add => {
                let document = encode(&association)?;
                self.label_associations.upsert(association);
                self.backend.set(key, document).await
            }
            AssociationAction::Remove => {
                if !self.label_associations.remove(&association) {
                    debug!(association = %key.id, "remove for unknown label association");
                }
                self.backend.delete(&key).await?;
                Ok(())
            }
        }
    }

    async fn on_receipt_update(&self, receipts: Vec<ReceiptEvent>) -> StoreResult<()> {
        let mut stored = Batch::new();
        for ReceiptEvent { key, receipt } in receipts {
            if let Some((jid, message)) = self.modify_message(&key, |m| m.apply_receipt(&receipt))
            {
                stored.push((DocumentKey::message(&jid, message.id()), encode(&message)?));
            }
        }
        self.backend.set_many(stored).await
    }

    async fn on_reactions(&self, reactions: Vec<ReactionEvent>) -> StoreResult<()> {
        let mut stored = Batch::new();
        for ReactionEvent { key, reaction } in reactions {
            if let Some((jid, message)) =
                self.modify_message(&key, |m| m.apply_reaction(&reaction))
            {
                stored.push((DocumentKey::message(&jid, message.id()), encode(&message)?));
            }
        }
        self.backend.set_many(stored).await
    }

    /// Upsert into a chat's ledger and return the stored copy.
    pub(super) fn upsert_message(
        &self,
        jid: &str,
        message: Message,
        mode: UpsertMode,
    ) -> Option<Message> {
        let id = message.id().to_string();
        let mut ledger = self.messages.entry(jid.to_string()).or_default();
        ledger.upsert(message, mode);
        ledger.get(&id).cloned()
    }

    // Cached messages only; anything else is a silent no-op.
    fn modify_message<F>(&self, key: &MessageKey, modify: F) -> Option<(String, Message)>
    where
        F: FnOnce(&mut Message),
    {
        let jid = normalize_jid(&key.remote_jid);
        let mut ledger = self.messages.get_mut(&jid)?;
        let message = ledger.get_mut(&key.id)?;
        modify(message);
        let message = message.clone();
        drop(ledger);
        Some((jid, message))
    }
}

/// Chats whose messages in the batch are all protocol stubs.
fn stub_only_chats(messages: &[Message]) -> HashSet<String> {
    let mut visible: HashMap<String, bool> = HashMap::new();
    for message in messages {
        let has_content = !message.is_stub_only();
        *visible
            .entry(normalize_jid(&message.key.remote_jid))
            .or_insert(false) |= has_content;
    }
    visible
        .into_iter()
        .filter_map(|(jid, has_content)| (!has_content).then_some(jid))
        .collect()
}
