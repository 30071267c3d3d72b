//! Contacts and avatar references.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Known state of a contact's profile picture.
///
/// An absent reference (`None` on the contact) means nothing is known yet.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AvatarRef {
    /// The picture changed since it was last resolved.
    Changed,
    /// Resolved picture location.
    Url(Url),
}

impl AvatarRef {
    const CHANGED: &'static str = "changed";

    /// Whether the reference must be re-resolved before use.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Changed)
    }
}

impl TryFrom<String> for AvatarRef {
    type Error = url::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == Self::CHANGED {
            Ok(Self::Changed)
        } else {
            Ok(Self::Url(Url::parse(&value)?))
        }
    }
}

impl From<AvatarRef> for String {
    fn from(value: AvatarRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AvatarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Changed => f.write_str(Self::CHANGED),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

/// A contact known to the account.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Contact identifier.
    pub id: String,
    /// Name saved in the address book.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name the contact chose for themselves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<String>,
    /// Verified business name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_name: Option<String>,
    /// Profile picture reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<AvatarRef>,
    /// About text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl Contact {
    /// Create a contact with only its identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Overwrite fields that `other` carries; absent fields are kept.
    pub fn merge(&mut self, other: Self) {
        ContactUpdate::from(other).apply_to(self);
    }
}

/// Partial update for a contact.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUpdate {
    /// Contact being updated.
    pub id: String,
    /// New address-book name.
    #[serde(default)]
    pub name: Option<String>,
    /// New self-chosen name.
    #[serde(default)]
    pub notify: Option<String>,
    /// New verified name.
    #[serde(default)]
    pub verified_name: Option<String>,
    /// New profile picture reference.
    #[serde(default)]
    pub img_url: Option<AvatarRef>,
    /// New about text.
    #[serde(default)]
    pub status: Option<String>,
}

impl ContactUpdate {
    /// Overwrite the fields this update carries.
    pub fn apply_to(self, contact: &mut Contact) {
        if self.name.is_some() {
            contact.name = self.name;
        }
        if self.notify.is_some() {
            contact.notify = self.notify;
        }
        if self.verified_name.is_some() {
            contact.verified_name = self.verified_name;
        }
        if self.img_url.is_some() {
            contact.img_url = self.img_url;
        }
        if self.status.is_some() {
            contact.status = self.status;
        }
    }
}

impl From<Contact> for ContactUpdate {
    fn from(contact: Contact) -> Self {
        Self {
            id: contact.id,
            name: contact.name,
            notify: contact.notify,
            verified_name: contact.verified_name,
            img_url: contact.img_url,
            status: contact.status,
        }
    }
}
