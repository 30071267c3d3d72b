//! `SQLite` backend storing JSON documents in a single table.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use crate::core::config::StorageConfig;
use crate::core::errors::StoreResult;
use crate::storage::backend::{Document, DocumentKey, EntityKind, PersistenceBackend, StoreFuture};

/// `SQLite` implementation of [`PersistenceBackend`].
pub struct SqliteBackend {
    conn: Connection,
    table: String,
}

impl SqliteBackend {
    /// Open the entity document table described by `config`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn new(config: &StorageConfig) -> StoreResult<Self> {
        Self::open(&config.sqlite_path, &config.documents_table).await
    }

    /// Open the credential table described by `config`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn new_auth(config: &StorageConfig) -> StoreResult<Self> {
        Self::open(&config.sqlite_path, &config.auth_table).await
    }

    /// Open `table` in the database at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>, table: &str) -> StoreResult<Self> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::from_connection(conn, table).await
    }

    /// Backend over a private in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub async fn open_in_memory(table: &str) -> StoreResult<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::from_connection(conn, table).await
    }

    /// Wrap an existing connection, creating the table if needed.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub async fn from_connection(conn: Connection, table: &str) -> StoreResult<Self> {
        let table = table.to_string();
        let table_name = table.clone();

        conn.call(move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table_name} (
                    kind TEXT NOT NULL,
                    id TEXT NOT NULL,
                    body TEXT NOT NULL,
                    updated_at INTEGER NOT NULL,
                    PRIMARY KEY (kind, id)
                )"
            ))?;
            Ok(())
        })
        .await?;

        Ok(Self { conn, table })
    }
}

fn encode_rows(documents: Vec<(DocumentKey, Document)>) -> StoreResult<Vec<(String, String, String)>> {
    documents
        .into_iter()
        .map(|(key, document)| {
            let body = serde_json::to_string(&document)?;
            Ok((key.kind.as_str().to_string(), key.id, body))
        })
        .collect()
}

impl PersistenceBackend for SqliteBackend {
    fn get(&self, key: &DocumentKey) -> StoreFuture<'_, StoreResult<Option<Document>>> {
        let kind = key.kind.as_str();
        let id = key.id.clone();
        Box::pin(async move {
            let table = self.table.clone();
            let body = self
                .conn
                .call(move |conn| {
                    let body = conn
                        .query_row(
                            &format!("SELECT body FROM {table} WHERE kind = ?1 AND id = ?2"),
                            rusqlite::params![kind, id],
                            |row| row.get::<_, String>(0),
                        )
                        .optional()?;
                    Ok(body)
                })
                .await?;

            match body {
                Some(body) => Ok(Some(serde_json::from_str(&body)?)),
                None => Ok(None),
            }
        })
    }

    fn set(&self, key: DocumentKey, document: Document) -> StoreFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            let table = self.table.clone();
            let body = serde_json::to_string(&document)?;
            let kind = key.kind.as_str();
            let updated_at = Utc::now().timestamp_millis();

            self.conn
                .call(move |conn| {
                    conn.execute(
                        &format!(
                            "INSERT OR REPLACE INTO {table} (kind, id, body, updated_at)
                             VALUES (?1, ?2, ?3, ?4)"
                        ),
                        rusqlite::params![kind, key.id, body, updated_at],
                    )?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn set_if_absent(
        &self,
        key: DocumentKey,
        document: Document,
    ) -> StoreFuture<'_, StoreResult<bool>> {
        Box::pin(async move {
            let table = self.table.clone();
            let body = serde_json::to_string(&document)?;
            let kind = key.kind.as_str();
            let updated_at = Utc::now().timestamp_millis();

            let changed = self
                .conn
                .call(move |conn| {
                    let changed = conn.execute(
                        &format!(
                            "INSERT OR IGNORE INTO {table} (kind, id, body, updated_at)
                             VALUES (?1, ?2, ?3, ?4)"
                        ),
                        rusqlite::params![kind, key.id, body, updated_at],
                    )?;
                    Ok(changed)
                })
                .await?;
            Ok(changed > 0)
        })
    }

    fn delete(&self, key: &DocumentKey) -> StoreFuture<'_, StoreResult<bool>> {
        let kind = key.kind.as_str();
        let id = key.id.clone();
        Box::pin(async move {
            let table = self.table.clone();
            let changed = self
                .conn
                .call(move |conn| {
                    let changed = conn.execute(
                        &format!("DELETE FROM {table} WHERE kind = ?1 AND id = ?2"),
                        rusqlite::params![kind, id],
                    )?;
                    Ok(changed)
                })
                .await?;
            Ok(changed > 0)
        })
    }

    fn delete_many(&self, keys: Vec<DocumentKey>) -> StoreFuture<'_, StoreResult<usize>> {
        Box::pin(async move {
            if keys.is_empty() {
                return Ok(0);
            }
            let table = self.table.clone();
            let removed = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let mut removed = 0;
                    {
                        let mut stmt =
                            tx.prepare(&format!("DELETE FROM {table} WHERE kind = ?1 AND id = ?2"))?;
                        for key in &keys {
                            removed += stmt.execute(rusqlite::params![key.kind.as_str(), key.id])?;
                        }
                    }
                    tx.commit()?;
                    Ok(removed)
                })
                .await?;
            Ok(removed)
        })
    }

    fn set_many(
        &self,
        documents: Vec<(DocumentKey, Document)>,
    ) -> StoreFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            if documents.is_empty() {
                return Ok(());
            }
            let table = self.table.clone();
            let rows = encode_rows(documents)?;
            let updated_at = Utc::now().timestamp_millis();

            self.conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    {
                        let mut stmt = tx.prepare(&format!(
                            "INSERT OR REPLACE INTO {table} (kind, id, body, updated_at)
                             VALUES (?1, ?2, ?3, ?4)"
                        ))?;
                        for (kind, id, body) in &rows {
                            stmt.execute(rusqlite::params![kind, id, body, updated_at])?;
                        }
                    }
                    tx.commit()?;
                    Ok(())
                })
                .await?;
            Ok(())
        })
    }

    fn insert_many_if_absent(
        &self,
        documents: Vec<(DocumentKey, Document)>,
    ) -> StoreFuture<'_, StoreResult<usize>> {
        Box::pin(async move {
            if documents.is_empty() {
                return Ok(0);
            }
            let table = self.table.clone();
            let rows = encode_rows(documents)?;
            let updated_at = Utc::now().timestamp_millis();

            let inserted = self
                .conn
                .call(move |conn| {
                    let tx = conn.transaction()?;
                    let mut inserted = 0;
                    {
                        let mut stmt = tx.prepare(&format!(
                            "INSERT OR IGNORE INTO {table} (kind, id, body, updated_at)
                             VALUES (?1, ?2, ?3, ?4)"
                        ))?;
                        for (kind, id, body) in &rows {
                            inserted += stmt.execute(rusqlite::params![kind, id, body, updated_at])?;
                        }
                    }
                    tx.commit()?;
                    Ok(inserted)
                })
                .await?;
            Ok(inserted)
        })
    }

    fn list(&self, kind: EntityKind) -> StoreFuture<'_, StoreResult<Vec<(String, Document)>>> {
        Box::pin(async move {
            let table = self.table.clone();
            let kind = kind.as_str();
            let rows = self
                .conn
                .call(move |conn| {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT id, body FROM {table} WHERE kind = ?1 ORDER BY id"
                    ))?;
                    let rows = stmt
                        .query_map(rusqlite::params![kind], |row| {
                            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                        })?
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(rows)
                })
                .await?;

            rows.into_iter()
                .map(|(id, body)| Ok((id, serde_json::from_str(&body)?)))
                .collect()
        })
    }

    fn purge(&self, kind: EntityKind) -> StoreFuture<'_, StoreResult<usize>> {
        Box::pin(async move {
            let table = self.table.clone();
            let kind = kind.as_str();
            let removed = self
                .conn
                .call(move |conn| {
                    let removed = conn.execute(
                        &format!("DELETE FROM {table} WHERE kind = ?1"),
                        rusqlite::params![kind],
                    )?;
                    Ok(removed)
                })
                .await?;
            Ok(removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn backend() -> SqliteBackend {
        SqliteBackend::open_in_memory("store_documents").await.unwrap()
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let backend = backend().await;
        let key = DocumentKey::new(EntityKind::Chat, "1@s.whatsapp.net");

        assert_eq!(backend.get(&key).await.unwrap(), None);
        backend.set(key.clone(), json!({"id": "1@s.whatsapp.net"})).await.unwrap();
        backend.set(key.clone(), json!({"id": "1@s.whatsapp.net", "unread_count": 2})).await.unwrap();
        assert_eq!(
            backend.get(&key).await.unwrap(),
            Some(json!({"id": "1@s.whatsapp.net", "unread_count": 2}))
        );

        assert!(backend.delete(&key).await.unwrap());
        assert!(!backend.delete(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_if_absent_does_not_overwrite() {
        let backend = backend().await;
        let key = DocumentKey::new(EntityKind::Contact, "a");
        assert!(backend.set_if_absent(key.clone(), json!(1)).await.unwrap());
        assert!(!backend.set_if_absent(key.clone(), json!(2)).await.unwrap());

        let inserted = backend
            .insert_many_if_absent(vec![
                (key.clone(), json!(3)),
                (DocumentKey::new(EntityKind::Contact, "b"), json!(4)),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(backend.get(&key).await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_bulk_list_and_purge() {
        let backend = backend().await;
        backend
            .set_many(vec![
                (DocumentKey::message("c", "2"), json!("two")),
                (DocumentKey::message("c", "1"), json!("one")),
                (DocumentKey::new(EntityKind::Label, "1"), json!("label")),
            ])
            .await
            .unwrap();

        let messages = backend.list(EntityKind::Message).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, "c/1");

        let removed = backend
            .delete_many(vec![
                DocumentKey::message("c", "1"),
                DocumentKey::message("c", "missing"),
            ])
            .await
            .unwrap();
        assert_eq!(removed, 1);

        assert_eq!(backend.purge(EntityKind::Message).await.unwrap(), 1);
        assert_eq!(backend.list(EntityKind::Label).await.unwrap().len(), 1);
    }
}
