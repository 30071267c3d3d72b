//! Conversation store orchestration.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::config::StoreConfig;
use crate::core::errors::StoreResult;
use crate::events::{EventEmitter, StoreEvent, WeakEventEmitter};
use crate::labels::{LabelAssociationIndex, LabelRepository};
use crate::ledger::MessageLedger;
use crate::model::{Chat, ConnectionHandle, Contact, GroupMetadata, PresenceData};
use crate::storage::{Document, MemoryBackend, PersistenceBackend, SqliteBackend};

/// Event-sourced mirror of an account's conversational state.
///
/// The in-memory view is authoritative; the backend holds an eventually
/// consistent copy written through on every handled event.
pub struct ConversationStore {
    pub(super) config: StoreConfig,
    pub(super) backend: Arc<dyn PersistenceBackend>,
    pub(super) connection: ConnectionHandle,
    pub(super) chats: DashMap<String, Chat>,
    pub(super) messages: DashMap<String, MessageLedger>,
    pub(super) contacts: DashMap<String, Contact>,
    pub(super) group_metadata: DashMap<String, GroupMetadata>,
    pub(super) presences: DashMap<String, HashMap<String, PresenceData>>,
    pub(super) labels: Mutex<LabelRepository>,
    pub(super) label_associations: LabelAssociationIndex,
}

impl ConversationStore {
    /// Create a store over an existing backend.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: StoreConfig, backend: Arc<dyn PersistenceBackend>) -> StoreResult<Self> {
        Self::with_connection(config, backend, ConnectionHandle::default())
    }

    /// Create a store that writes connection updates into `connection`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_connection(
        config: StoreConfig,
        backend: Arc<dyn PersistenceBackend>,
        connection: ConnectionHandle,
    ) -> StoreResult<Self> {
        config.validate()?;
        let labels = Mutex::new(LabelRepository::new(config.label_capacity));

        Ok(Self {
            config,
            backend,
            connection,
            chats: DashMap::new(),
            messages: DashMap::new(),
            contacts: DashMap::new(),
            group_metadata: DashMap::new(),
            presences: DashMap::new(),
            labels,
            label_associations: LabelAssociationIndex::new(),
        })
    }

    /// Create a store backed by a process-local map.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn in_memory(config: StoreConfig) -> StoreResult<Self> {
        Self::new(config, Arc::new(MemoryBackend::new()))
    }

    /// Create a store backed by the `SQLite` database named in the config.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the database
    /// cannot be opened.
    pub async fn sqlite(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let backend = Arc::new(SqliteBackend::new(&config.storage).await?);
        Self::new(config, backend)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Handle to the connection state this store writes.
    #[must_use]
    pub fn connection(&self) -> ConnectionHandle {
        self.connection.clone()
    }

    /// Backend the store writes through to.
    #[must_use]
    pub fn backend(&self) -> Arc<dyn PersistenceBackend> {
        Arc::clone(&self.backend)
    }

    /// Apply one event and return the events it derived.
    ///
    /// Derived events are not emitted; [`Self::bind`] does that.
    ///
    /// # Errors
    /// Returns an error if a label edit is refused or the backend write fails.
    /// The in-memory view keeps the change either way.
    pub async fn apply(&self, event: StoreEvent) -> StoreResult<Vec<StoreEvent>> {
        let mut derived = Vec::new();
        self.apply_into(event, &mut derived).await?;
        Ok(derived)
    }

    /// Subscribe to `emitter` and handle its events on one task.
    ///
    /// Events are handled strictly in arrival order. Derived events are
    /// emitted back on the same emitter, even when the handler that produced
    /// them failed to persist. The task ends once every emitter is dropped,
    /// on [`StoreBinding::unbind`], or when the binding itself is dropped.
    #[must_use]
    pub fn bind(self: &Arc<Self>, emitter: &EventEmitter) -> StoreBinding {
        let store = Arc::clone(self);
        let mut events = emitter.subscribe();
        let emitter = emitter.downgrade();
        let shutdown = Arc::new(Notify::new());
        let stop = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            info!("conversation store bound to event stream");
            loop {
                let received = tokio::select! {
                    () = stop.notified() => break,
                    received = events.recv() => received,
                };

                match received {
                    Ok(event) => {
                        let kind = event.kind();
                        let mut derived = Vec::new();
                        if let Err(err) = store.apply_into(event, &mut derived).await {
                            if err.is_capacity() {
                                info!(%kind, error = %err, "event rejected");
                            } else {
                                warn!(
                                    %kind,
                                    backend = err.is_backend(),
                                    error = %err,
                                    "event handler failed"
                                );
                            }
                        }
                        emit_derived(&emitter, derived);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "event subscriber lagged; events were lost");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            info!("conversation store unbound");
        });

        StoreBinding {
            handle: Some(handle),
            shutdown,
        }
    }
}

// The task only holds a weak handle so the channel can close under it.
fn emit_derived(emitter: &WeakEventEmitter, derived: Vec<StoreEvent>) {
    if derived.is_empty() {
        return;
    }
    let Some(emitter) = emitter.upgrade() else {
        debug!(dropped = derived.len(), "event stream closed; derived events dropped");
        return;
    };
    for event in derived {
        if let Err(err) = emitter.emit(event) {
            debug!(error = %err, "derived event dropped");
        }
    }
}

/// Running subscription created by [`ConversationStore::bind`].
///
/// Dropping the binding aborts the subscriber task.
pub struct StoreBinding {
    handle: Option<JoinHandle<()>>,
    shutdown: Arc<Notify>,
}

impl StoreBinding {
    /// Stop handling events and wait for the task to finish.
    pub async fn unbind(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take()
            && let Err(err) = handle.await
        {
            warn!(error = %err, "store subscriber task failed");
        }
    }

    /// Whether the subscriber task has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }
}

impl Drop for StoreBinding {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}

pub(super) fn encode<T: Serialize>(value: &T) -> StoreResult<Document> {
    Ok(serde_json::to_value(value)?)
}
