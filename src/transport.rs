//! Remote lookups the store falls back to on a cache miss.

use std::future::Future;
use std::pin::Pin;

use url::Url;

use crate::core::errors::StoreResult;
use crate::model::contact::Contact;
use crate::model::group::GroupMetadata;

/// Boxed future type for transport lookups.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Trait abstraction over the live connection.
///
/// Lookups are invoked lazily, only when the mirror has nothing usable.
pub trait Transport: Send + Sync {
    /// Resolve the profile picture of a chat or contact.
    ///
    /// # Errors
    /// Returns an error if the remote request fails.
    fn profile_picture_url(&self, jid: &str) -> TransportFuture<'_, StoreResult<Option<Url>>>;

    /// Fetch metadata for a group.
    ///
    /// # Errors
    /// Returns an error if the remote request fails.
    fn group_metadata(&self, jid: &str) -> TransportFuture<'_, StoreResult<Option<GroupMetadata>>>;

    /// Fetch a contact's public profile.
    ///
    /// # Errors
    /// Returns an error if the remote request fails.
    fn contact_info(&self, jid: &str) -> TransportFuture<'_, StoreResult<Option<Contact>>>;
}
