//! Background cleanup worker.
//!
//! Expires old status broadcasts and, when configured, refreshes a named
//! snapshot on every tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::config::CleanupConfig;
use crate::core::errors::StoreResult;
use crate::store::ConversationStore;

/// Statistics from a cleanup run.
#[derive(Debug, Clone, Default)]
pub struct CleanupStats {
    /// Status broadcasts removed.
    pub expired_deleted: usize,
    /// Whether a snapshot was written.
    pub snapshot_written: bool,
    /// Total cleanup duration in milliseconds.
    pub duration_ms: u64,
}

/// Background cleanup worker for a conversation store.
pub struct BackgroundCleanup {
    store: Arc<ConversationStore>,
    config: CleanupConfig,
    shutdown: Arc<Notify>,
}

impl BackgroundCleanup {
    /// Create a worker using the store's own cleanup settings.
    #[must_use]
    pub fn new(store: Arc<ConversationStore>) -> Self {
        let config = store.config().cleanup.clone();
        Self::with_config(store, config)
    }

    /// Create a worker with explicit settings.
    #[must_use]
    pub fn with_config(store: Arc<ConversationStore>, config: CleanupConfig) -> Self {
        Self {
            store,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Get a shutdown notifier to stop the worker.
    #[must_use]
    pub fn shutdown_notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.shutdown)
    }

    /// Spawn the worker as a tokio task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled {
            info!("background cleanup is disabled");
            return;
        }

        let interval = Duration::from_secs(self.config.interval_seconds);
        info!(?interval, "starting background cleanup worker");

        loop {
            tokio::select! {
                () = tokio::time::sleep(interval) => {
                    match self.run_cleanup().await {
                        Ok(stats) if stats.expired_deleted > 0 || stats.snapshot_written => {
                            info!(
                                expired = stats.expired_deleted,
                                snapshot = stats.snapshot_written,
                                duration_ms = stats.duration_ms,
                                "cleanup completed"
                            );
                        }
                        Ok(_) => debug!("cleanup completed with nothing to do"),
                        Err(err) => warn!(error = %err, "cleanup failed"),
                    }
                }
                () = self.shutdown.notified() => {
                    info!("background cleanup worker shutting down");
                    break;
                }
            }
        }
    }

    /// Run a single cleanup cycle.
    ///
    /// # Errors
    /// Returns an error if a backend write fails.
    pub async fn run_cleanup(&self) -> StoreResult<CleanupStats> {
        let start = std::time::Instant::now();
        let mut stats = CleanupStats {
            expired_deleted: self
                .store
                .expire_status_messages(Utc::now().timestamp(), self.config.status_ttl_seconds)
                .await?,
            ..CleanupStats::default()
        };

        if let Some(name) = &self.config.snapshot_name {
            self.store.write_snapshot(name).await?;
            stats.snapshot_written = true;
        }

        stats.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{CleanupConfigBuilder, StoreConfig};
    use crate::core::jid::STATUS_BROADCAST_JID;
    use crate::events::{StoreEvent, UpsertKind};
    use crate::model::{Message, MessageKey};
    use crate::storage::{DocumentKey, EntityKind};

    fn status(id: &str, ts: i64) -> Message {
        Message {
            key: MessageKey::new(STATUS_BROADCAST_JID, id),
            message_timestamp: ts,
            ..Message::default()
        }
    }

    async fn store_with_status() -> Arc<ConversationStore> {
        let store = Arc::new(ConversationStore::in_memory(StoreConfig::default()).unwrap());
        let now = Utc::now().timestamp();
        store
            .apply(StoreEvent::MessagesUpsert {
                messages: vec![status("stale", now - 100_000), status("fresh", now)],
                kind: UpsertKind::Append,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_run_cleanup_expires_and_snapshots() {
        let store = store_with_status().await;
        let config = CleanupConfigBuilder::new().snapshot_name("periodic").build();
        let cleanup = BackgroundCleanup::with_config(Arc::clone(&store), config);

        let stats = cleanup.run_cleanup().await.unwrap();
        assert_eq!(stats.expired_deleted, 1);
        assert!(stats.snapshot_written);
        assert_eq!(store.message_count(STATUS_BROADCAST_JID), 1);
        assert!(
            store
                .backend()
                .get(&DocumentKey::new(EntityKind::Snapshot, "periodic"))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let store = store_with_status().await;
        let config = CleanupConfigBuilder::new().interval_seconds(3600).build();
        let cleanup = BackgroundCleanup::with_config(store, config);
        let shutdown = cleanup.shutdown_notifier();
        let handle = cleanup.spawn();

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_disabled_worker_returns_immediately() {
        let store = store_with_status().await;
        let config = CleanupConfigBuilder::new().enabled(false).build();
        let handle = BackgroundCleanup::with_config(store, config).spawn();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_stats_default() {
        let stats = CleanupStats::default();
        assert_eq!(stats.expired_deleted, 0);
        assert!(!stats.snapshot_written);
        assert_eq!(stats.duration_ms, 0);
    }
}
