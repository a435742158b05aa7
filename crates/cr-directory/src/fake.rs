//! In-memory directory for tests and local development.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use cr_core::enums::Session;
use uuid::Uuid;

use crate::client::{DirectoryClient, DirectorySnapshot};
use crate::entry::DirectoryEntry;
use crate::error::DirectoryError;

/// One account in an [`InMemoryDirectory`].
#[derive(Debug, Clone)]
pub struct FakeUser {
    pub username: String,
    pub password: String,
    pub given_name: String,
    pub surname: String,
    /// `None` places the account under the staff unit.
    pub session: Option<Session>,
    pub guid: Uuid,
    /// `false` lets the account bind but hides it from searches.
    pub in_search_base: bool,
}

impl FakeUser {
    #[must_use]
    pub fn student(username: &str, password: &str, session: Session) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            given_name: "Test".to_string(),
            surname: username.to_string(),
            session: Some(session),
            guid: Uuid::new_v4(),
            in_search_base: true,
        }
    }

    #[must_use]
    pub fn admin(username: &str, password: &str) -> Self {
        Self {
            session: None,
            ..Self::student(username, password, Session::Am)
        }
    }

    /// Place the account outside the search base.
    #[must_use]
    pub fn outside_base(mut self) -> Self {
        self.in_search_base = false;
        self
    }

    #[must_use]
    pub fn with_names(mut self, given_name: &str, surname: &str) -> Self {
        self.given_name = given_name.to_string();
        self.surname = surname.to_string();
        self
    }
}

/// A directory held in memory. Accounts are keyed by lowercased username;
/// [`InMemoryDirectory::set_reachable`] simulates an outage.
pub struct InMemoryDirectory {
    domain: String,
    base_context: String,
    users: Mutex<HashMap<String, FakeUser>>,
    reachable: AtomicBool,
}

impl InMemoryDirectory {
    #[must_use]
    pub fn new(domain: &str, base_context: &str) -> Self {
        Self {
            domain: domain.to_string(),
            base_context: base_context.to_string(),
            users: Mutex::new(HashMap::new()),
            reachable: AtomicBool::new(true),
        }
    }

    pub fn add_user(&self, user: FakeUser) {
        if let Ok(mut users) = self.users.lock() {
            users.insert(user.username.to_lowercase(), user);
        }
    }

    pub fn remove_user(&self, username: &str) {
        if let Ok(mut users) = self.users.lock() {
            users.remove(&username.to_lowercase());
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    fn entry(&self, user: &FakeUser) -> DirectoryEntry {
        let unit = user.session.map_or("Staff", Session::as_str);
        DirectoryEntry {
            dn: format!("CN={},OU={unit},{}", user.username, self.base_context),
            principal_name: format!("{}\\{}", self.domain, user.username),
            given_name: user.given_name.clone(),
            surname: user.surname.clone(),
            mail: format!("{}@example.com", user.username),
            object_guid: user.guid.to_string(),
        }
    }

    /// Check the pair and return a copy of every account under the base.
    fn bind(
        &self,
        username: &str,
        password: &str,
    ) -> Result<(FakeUser, Vec<FakeUser>), DirectoryError> {
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable(
                "in-memory directory marked unreachable".to_string(),
            ));
        }
        let users = self
            .users
            .lock()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        let binder = users
            .get(&username.to_lowercase())
            .filter(|u| !password.is_empty() && u.password == password)
            .cloned()
            .ok_or(DirectoryError::InvalidCredentials)?;
        if !binder.in_search_base {
            return Err(DirectoryError::OutsideSearchBase {
                username: binder.username,
            });
        }
        let listed = users
            .values()
            .filter(|u| u.in_search_base)
            .cloned()
            .collect();
        Ok((binder, listed))
    }
}

#[async_trait]
impl DirectoryClient for InMemoryDirectory {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<DirectoryEntry, DirectoryError> {
        let (binder, _) = self.bind(username, password)?;
        Ok(self.entry(&binder))
    }

    async fn snapshot(
        &self,
        username: &str,
        password: &str,
    ) -> Result<DirectorySnapshot, DirectoryError> {
        let (binder, all) = self.bind(username, password)?;
        Ok(DirectorySnapshot {
            binder: self.entry(&binder),
            entries: all.iter().map(|u| self.entry(u)).collect(),
        })
    }
}
