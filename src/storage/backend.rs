//! Backend-agnostic persistence contract.
//!
//! The store never branches on which backend it talks to: every variant
//! stores JSON documents under a `(kind, id)` key and implements the same
//! trait.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::errors::{StoreError, StoreResult};

/// Boxed future type for backend operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A stored document.
pub type Document = serde_json::Value;

/// Namespace of a stored document.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Chat record.
    Chat,
    /// Contact record.
    Contact,
    /// Message, keyed by chat and message id.
    Message,
    /// Group metadata.
    GroupMetadata,
    /// User or predefined label.
    Label,
    /// Label relation.
    LabelAssociation,
    /// Whole-store snapshot.
    Snapshot,
    /// Credential blob.
    AuthKey,
}

impl EntityKind {
    /// Stable string form for storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Contact => "contact",
            Self::Message => "message",
            Self::GroupMetadata => "group_metadata",
            Self::Label => "label",
            Self::LabelAssociation => "label_association",
            Self::Snapshot => "snapshot",
            Self::AuthKey => "auth_key",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = StoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "chat" => Ok(Self::Chat),
            "contact" => Ok(Self::Contact),
            "message" => Ok(Self::Message),
            "group_metadata" => Ok(Self::GroupMetadata),
            "label" => Ok(Self::Label),
            "label_association" => Ok(Self::LabelAssociation),
            "snapshot" => Ok(Self::Snapshot),
            "auth_key" => Ok(Self::AuthKey),
            other => Err(StoreError::InvalidDocument(format!(
                "unknown entity kind: {other}"
            ))),
        }
    }
}

/// Namespaced document key.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct DocumentKey {
    /// Entity namespace.
    pub kind: EntityKind,
    /// Identifier within the namespace.
    pub id: String,
}

impl DocumentKey {
    /// Build a key.
    #[must_use]
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Key of a message document.
    #[must_use]
    pub fn message(chat_id: &str, message_id: &str) -> Self {
        Self::new(EntityKind::Message, format!("{chat_id}/{message_id}"))
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Durable storage for entity documents.
///
/// Implementations decide how reads and writes execute; retries, if any,
/// belong to the implementation.
pub trait PersistenceBackend: Send + Sync {
    /// Fetch a document.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn get(&self, key: &DocumentKey) -> StoreFuture<'_, StoreResult<Option<Document>>>;

    /// Insert or replace a document.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn set(&self, key: DocumentKey, document: Document) -> StoreFuture<'_, StoreResult<()>>;

    /// Insert a document only if the key is free; returns `true` if inserted.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn set_if_absent(
        &self,
        key: DocumentKey,
        document: Document,
    ) -> StoreFuture<'_, StoreResult<bool>>;

    /// Remove a document; returns `true` if it existed.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn delete(&self, key: &DocumentKey) -> StoreFuture<'_, StoreResult<bool>>;

    /// Remove many documents; returns how many existed.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn delete_many(&self, keys: Vec<DocumentKey>) -> StoreFuture<'_, StoreResult<usize>>;

    /// Insert or replace many documents at once.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn set_many(&self, documents: Vec<(DocumentKey, Document)>)
    -> StoreFuture<'_, StoreResult<()>>;

    /// Insert documents whose keys are free; returns how many were inserted.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn insert_many_if_absent(
        &self,
        documents: Vec<(DocumentKey, Document)>,
    ) -> StoreFuture<'_, StoreResult<usize>>;

    /// Every document of one kind, ordered by id.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn list(&self, kind: EntityKind) -> StoreFuture<'_, StoreResult<Vec<(String, Document)>>>;

    /// Remove every document of one kind; returns how many were removed.
    ///
    /// # Errors
    /// Returns an error if storage access fails.
    fn purge(&self, kind: EntityKind) -> StoreFuture<'_, StoreResult<usize>>;
}
