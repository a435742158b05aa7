//! Maps directory binds onto local accounts.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cr_config::DirectoryConfig;
use cr_core::entities::User;
use cr_db::service::ReviewService;

use crate::client::DirectoryClient;
use crate::error::DirectoryError;
use crate::fake::InMemoryDirectory;
use crate::ldap::LdapDirectory;

/// Authenticates users against a [`DirectoryClient`] and keeps local
/// accounts in step with it.
///
/// Directory round trips happen before any database write begins, so a slow
/// server never holds the write gate.
#[derive(Clone)]
pub struct DirectoryBridge {
    client: Arc<dyn DirectoryClient>,
    timeout: Duration,
}

impl DirectoryBridge {
    #[must_use]
    pub fn new(client: Arc<dyn DirectoryClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Build the bridge the configuration asks for: the in-memory directory
    /// when `use_fake` is set, otherwise a real server.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::NotConfigured` when a real server is needed
    /// but its settings are missing.
    pub fn from_config(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let client: Arc<dyn DirectoryClient> = if config.use_fake {
            tracing::warn!("using the in-memory directory; never do this in production");
            Arc::new(InMemoryDirectory::new(&config.domain, &config.base_context))
        } else {
            Arc::new(LdapDirectory::from_config(config)?)
        };
        Ok(Self::new(client, timeout))
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, DirectoryError>>,
    ) -> Result<T, DirectoryError> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                DirectoryError::Unavailable(format!("no response within {:?}", self.timeout))
            })?
    }

    /// Log a user in through the directory.
    ///
    /// Returns `Ok(None)` for empty input, rejected credentials, or an
    /// account that binds but lives outside the search base. On
    /// success the local account keyed by the entry's GUID is created or
    /// refreshed.
    ///
    /// # Errors
    ///
    /// `DirectoryError::Unavailable` when the directory cannot be reached
    /// (the login form shows [`crate::LOGIN_UNAVAILABLE_MESSAGE`]),
    /// `MalformedEntry` or `Database` when the local sync fails.
    pub async fn authenticate(
        &self,
        svc: &ReviewService,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, DirectoryError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Ok(None);
        }

        let entry = match self
            .bounded(self.client.authenticate(username, password))
            .await
        {
            Ok(entry) => entry,
            Err(DirectoryError::InvalidCredentials) => {
                tracing::info!(username = %username, "directory rejected credentials");
                return Ok(None);
            }
            Err(DirectoryError::OutsideSearchBase { .. }) => {
                tracing::info!(username = %username, "account is outside the search base");
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(username = %username, error = %e, "directory login failed");
                return Err(e);
            }
        };

        let identity = entry.to_identity()?;
        let (user, created) = svc.sync_directory_identity(&identity).await?;
        tracing::info!(user = %user.id, created, "directory login");
        Ok(Some(user))
    }

    /// Delete local directory-backed accounts that no longer exist in the
    /// directory. `admin_username` must be a directory administrator;
    /// instructors and password-backed accounts are never touched.
    ///
    /// Returns the number of accounts deleted.
    ///
    /// # Errors
    ///
    /// `MissingPassword` for an empty password, `InvalidCredentials`,
    /// `NotAdmin` when the account is not staff, `OutsideSearchBase` when it
    /// cannot be found under the search base, `Unavailable` when the
    /// directory cannot be reached. Nothing is deleted on error.
    pub async fn reconcile(
        &self,
        svc: &ReviewService,
        admin_username: &str,
        password: &str,
    ) -> Result<u64, DirectoryError> {
        if password.is_empty() {
            return Err(DirectoryError::MissingPassword);
        }
        let admin_username = crate::entry::strip_domain(admin_username.trim());

        let snapshot = self
            .bounded(self.client.snapshot(admin_username, password))
            .await?;
        let binder = snapshot.binder.to_identity()?;
        if !binder.is_admin {
            tracing::warn!(username = %admin_username, "reconcile refused for non-admin");
            return Err(DirectoryError::NotAdmin);
        }

        let present: HashSet<String> = snapshot
            .entries
            .iter()
            .map(|entry| entry.username().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        tracing::debug!(present = present.len(), "directory snapshot taken");

        Ok(svc.delete_stale_directory_users(&present).await?)
    }
}
