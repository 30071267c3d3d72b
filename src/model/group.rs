//! Group metadata and participant changes.

use serde::{Deserialize, Serialize};

/// A group member.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupParticipant {
    /// Member identifier.
    pub id: String,
    /// Group admin.
    #[serde(default)]
    pub is_admin: bool,
    /// Group creator / super admin.
    #[serde(default)]
    pub is_super_admin: bool,
}

impl GroupParticipant {
    /// Plain member without admin rights.
    #[must_use]
    pub fn member(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_admin: false,
            is_super_admin: false,
        }
    }
}

/// Cached metadata for a group chat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMetadata {
    /// Group identifier.
    pub id: String,
    /// Group subject.
    #[serde(default)]
    pub subject: String,
    /// Creator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    /// Creation time, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<i64>,
    /// Only admins may send messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub announce: Option<bool>,
    /// Only admins may edit group info.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrict: Option<bool>,
    /// Members.
    #[serde(default)]
    pub participants: Vec<GroupParticipant>,
}

impl GroupMetadata {
    /// Apply a participant action to the named members only.
    ///
    /// Returns the number of members touched.
    pub fn apply_participants(&mut self, action: ParticipantAction, ids: &[String]) -> usize {
        match action {
            ParticipantAction::Add => {
                let mut added = 0;
                for id in ids {
                    if !self.participants.iter().any(|p| &p.id == id) {
                        self.participants.push(GroupParticipant::member(id.clone()));
                        added += 1;
                    }
                }
                added
            }
            ParticipantAction::Promote | ParticipantAction::Demote => {
                let is_admin = action == ParticipantAction::Promote;
                let mut changed = 0;
                for participant in &mut self.participants {
                    if ids.contains(&participant.id) {
                        participant.is_admin = is_admin;
                        changed += 1;
                    }
                }
                changed
            }
            ParticipantAction::Remove => {
                let before = self.participants.len();
                self.participants.retain(|p| !ids.contains(&p.id));
                before - self.participants.len()
            }
        }
    }
}

/// Partial update for group metadata.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupUpdate {
    /// Group being updated.
    pub id: String,
    /// New subject.
    #[serde(default)]
    pub subject: Option<String>,
    /// New owner.
    #[serde(default)]
    pub owner: Option<String>,
    /// New description.
    #[serde(default)]
    pub desc: Option<String>,
    /// New announce flag.
    #[serde(default)]
    pub announce: Option<bool>,
    /// New restrict flag.
    #[serde(default)]
    pub restrict: Option<bool>,
}

impl GroupUpdate {
    /// Overwrite the fields this update carries.
    pub fn apply_to(self, metadata: &mut GroupMetadata) {
        if let Some(subject) = self.subject {
            metadata.subject = subject;
        }
        if self.owner.is_some() {
            metadata.owner = self.owner;
        }
        if self.desc.is_some() {
            metadata.desc = self.desc;
        }
        if self.announce.is_some() {
            metadata.announce = self.announce;
        }
        if self.restrict.is_some() {
            metadata.restrict = self.restrict;
        }
    }
}

/// Membership change carried by a participant update.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantAction {
    /// Members joined.
    Add,
    /// Members left or were removed.
    Remove,
    /// Members became admins.
    Promote,
    /// Members lost admin rights.
    Demote,
}
