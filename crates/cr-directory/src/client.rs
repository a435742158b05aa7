use async_trait::async_trait;

use crate::entry::DirectoryEntry;
use crate::error::DirectoryError;

/// Everything a reconciliation pass needs from one bind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    /// The entry of the account that bound.
    pub binder: DirectoryEntry,
    /// Every user entry under the search base.
    pub entries: Vec<DirectoryEntry>,
}

/// A directory the bridge can bind to and read users from.
///
/// Usernames are passed bare (`jdoe`); implementations qualify them with
/// their domain as needed.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Bind as `username` and return that user's own entry.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` for a rejected bind, `Unavailable` when the
    /// directory cannot be reached.
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<DirectoryEntry, DirectoryError>;

    /// Bind as `username` and list every user under the search base.
    ///
    /// # Errors
    ///
    /// Same as [`DirectoryClient::authenticate`].
    async fn snapshot(
        &self,
        username: &str,
        password: &str,
    ) -> Result<DirectorySnapshot, DirectoryError>;
}
