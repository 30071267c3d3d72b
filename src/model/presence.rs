//! Presence state per chat participant.

use serde::{Deserialize, Serialize};

/// Last presence signal seen for a participant.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceKind {
    /// Offline.
    #[default]
    Unavailable,
    /// Online.
    Available,
    /// Typing.
    Composing,
    /// Recording audio.
    Recording,
    /// Stopped typing.
    Paused,
}

/// Presence record for one participant of a chat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceData {
    /// Last known presence.
    pub last_known_presence: PresenceKind,
    /// Last seen time, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<i64>,
}
