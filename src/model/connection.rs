//! Transport connection state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// Connection phase of the transport.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    /// Connected and authenticated.
    Open,
    /// Handshake in progress.
    Connecting,
    /// Not connected.
    #[default]
    Close,
}

/// Why the last connection ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastDisconnect {
    /// Error description.
    pub error: String,
    /// When the disconnect happened.
    pub date: DateTime<Utc>,
}

/// Last known transport connection state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionState {
    /// Current phase.
    pub connection: ConnectionPhase,
    /// Details of the last disconnect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_disconnect: Option<LastDisconnect>,
    /// Set on the first connection after pairing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new_login: Option<bool>,
    /// Pairing QR payload, while pairing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    /// Offline notifications were drained.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_pending_notifications: Option<bool>,
    /// Presence is advertised as online.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_online: Option<bool>,
}

/// Shared, single-writer handle to the connection state.
///
/// The store owns the only writer; readers clone the handle.
#[derive(Clone, Debug, Default)]
pub struct ConnectionHandle {
    inner: Arc<RwLock<ConnectionState>>,
}

impl ConnectionHandle {
    /// Create a handle starting from `state`.
    #[must_use]
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Copy of the current state.
    pub async fn current(&self) -> ConnectionState {
        self.inner.read().await.clone()
    }

    /// Replace the state wholesale.
    pub(crate) async fn replace(&self, state: ConnectionState) {
        *self.inner.write().await = state;
    }
}
