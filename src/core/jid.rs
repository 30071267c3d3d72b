//! Chat and user identifier helpers.
//!
//! Identifiers have the shape `user[:device]@server`. The store keys every
//! ledger by the normalized form so that messages from any of a user's
//! devices land in the same conversation.

/// Server suffix for individual users.
pub const USER_SERVER: &str = "s.whatsapp.net";
/// Legacy server suffix still seen on older payloads.
pub const LEGACY_USER_SERVER: &str = "c.us";
/// Server suffix for groups.
pub const GROUP_SERVER: &str = "g.us";
/// Pseudo-chat that carries status broadcasts.
pub const STATUS_BROADCAST_JID: &str = "status@broadcast";

/// Normalize a chat identifier.
///
/// Drops any device suffix and maps the legacy user server onto the
/// current one. Identifiers without a server part are returned unchanged.
#[must_use]
pub fn normalize_jid(jid: &str) -> String {
    let Some((user, server)) = jid.split_once('@') else {
        return jid.to_string();
    };
    let user = user.split_once(':').map_or(user, |(base, _device)| base);
    let server = if server == LEGACY_USER_SERVER {
        USER_SERVER
    } else {
        server
    };
    format!("{user}@{server}")
}

/// Whether the identifier names a group chat.
#[must_use]
pub fn is_group_jid(jid: &str) -> bool {
    jid.ends_with(&format!("@{GROUP_SERVER}"))
}

/// Whether the identifier is the status broadcast pseudo-chat.
#[must_use]
pub fn is_status_broadcast(jid: &str) -> bool {
    jid == STATUS_BROADCAST_JID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_device() {
        assert_eq!(
            normalize_jid("1234:7@s.whatsapp.net"),
            "1234@s.whatsapp.net"
        );
    }

    #[test]
    fn test_maps_legacy_server() {
        assert_eq!(normalize_jid("1234@c.us"), "1234@s.whatsapp.net");
    }

    #[test]
    fn test_keeps_groups_and_bare_ids() {
        assert_eq!(normalize_jid("999-111@g.us"), "999-111@g.us");
        assert_eq!(normalize_jid("plain"), "plain");
    }

    #[test]
    fn test_predicates() {
        assert!(is_group_jid("999-111@g.us"));
        assert!(!is_group_jid("1234@s.whatsapp.net"));
        assert!(is_status_broadcast("status@broadcast"));
    }
}
