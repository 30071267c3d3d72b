//! Credential and signal-key persistence.
//!
//! Blobs are stored as [`EntityKind::AuthKey`] documents keyed
//! `"<category>-<id>"`; the account credentials live under the reserved
//! [`CREDS_KEY`].

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::errors::{StoreError, StoreResult};
use crate::storage::{DocumentKey, EntityKind, PersistenceBackend};

/// Key under which the account credentials are stored.
pub const CREDS_KEY: &str = "creds";

/// Category to key id to value; `None` deletes the key.
pub type KeyData = HashMap<String, HashMap<String, Option<Value>>>;

/// Composite document id for a key.
#[must_use]
pub fn auth_key(category: &str, id: &str) -> String {
    format!("{category}-{id}")
}

/// Credentials held in memory plus keyed blobs read on demand.
pub struct AuthStateStore<C> {
    backend: Arc<dyn PersistenceBackend>,
    creds: C,
}

impl<C> AuthStateStore<C>
where
    C: Serialize + DeserializeOwned + Send + Sync,
{
    /// Load the stored credentials, or start from `init` when none decode.
    ///
    /// # Errors
    /// Returns an error if the backend read fails.
    pub async fn load<F>(backend: Arc<dyn PersistenceBackend>, init: F) -> StoreResult<Self>
    where
        F: FnOnce() -> C,
    {
        let stored = backend.get(&creds_document()).await?;
        let creds = match stored.map(serde_json::from_value::<C>) {
            Some(Ok(creds)) => {
                info!("loaded stored credentials");
                creds
            }
            Some(Err(err)) => {
                warn!(error = %err, "stored credentials unreadable; starting fresh");
                init()
            }
            None => {
                debug!("no stored credentials; starting fresh");
                init()
            }
        };
        Ok(Self { backend, creds })
    }

    /// Current credentials.
    #[must_use]
    pub const fn creds(&self) -> &C {
        &self.creds
    }

    /// Mutable credentials; call [`Self::save_creds`] to persist changes.
    pub fn creds_mut(&mut self) -> &mut C {
        &mut self.creds
    }

    /// Persist the current credentials.
    ///
    /// # Errors
    /// Returns an error if serialization or the backend write fails.
    pub async fn save_creds(&self) -> StoreResult<()> {
        let document = serde_json::to_value(&self.creds)?;
        self.backend.set(creds_document(), document).await
    }

    /// Delete the stored credentials; the in-memory copy is kept.
    ///
    /// # Errors
    /// Returns an error if the backend delete fails.
    pub async fn remove_creds(&self) -> StoreResult<bool> {
        self.backend.delete(&creds_document()).await
    }

    /// Read keys of one category; missing ids map to `None`.
    ///
    /// # Errors
    /// Returns an error if a backend read fails.
    pub async fn get(
        &self,
        category: &str,
        ids: &[String],
    ) -> StoreResult<HashMap<String, Option<Value>>> {
        let reads = ids.iter().map(|id| {
            let key = DocumentKey::new(EntityKind::AuthKey, auth_key(category, id));
            async move {
                let value = self.backend.get(&key).await?;
                Ok::<_, StoreError>((id.clone(), value))
            }
        });
        let found = futures::future::try_join_all(reads).await?;
        Ok(found.into_iter().collect())
    }

    /// Read keys of one category as `T`; undecodable values map to `None`.
    ///
    /// # Errors
    /// Returns an error if a backend read fails.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        category: &str,
        ids: &[String],
    ) -> StoreResult<HashMap<String, Option<T>>> {
        let raw = self.get(category, ids).await?;
        Ok(raw
            .into_iter()
            .map(|(id, value)| {
                let decoded = value.and_then(|value| match serde_json::from_value(value) {
                    Ok(decoded) => Some(decoded),
                    Err(err) => {
                        warn!(%category, key_id = %id, error = %err, "undecodable key ignored");
                        None
                    }
                });
                (id, decoded)
            })
            .collect())
    }

    /// Write and delete keys in one pass.
    ///
    /// # Errors
    /// Returns an error if a backend write fails.
    pub async fn set(&self, data: KeyData) -> StoreResult<()> {
        let mut writes = Vec::new();
        let mut deletes = Vec::new();
        for (category, entries) in data {
            for (id, value) in entries {
                let key = DocumentKey::new(EntityKind::AuthKey, auth_key(&category, &id));
                match value {
                    Some(value) => writes.push((key, value)),
                    None => deletes.push(key),
                }
            }
        }
        debug!(writes = writes.len(), deletes = deletes.len(), "auth keys updated");
        futures::try_join!(
            self.backend.set_many(writes),
            self.backend.delete_many(deletes),
        )?;
        Ok(())
    }
}

fn creds_document() -> DocumentKey {
    DocumentKey::new(EntityKind::AuthKey, CREDS_KEY)
}
