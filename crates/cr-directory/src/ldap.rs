//! Active Directory over LDAP.
//!
//! Every call opens its own connection, binds as the caller with
//! `DOMAIN\user`, reads what it needs and unbinds.

use std::time::Duration;

use async_trait::async_trait;
use cr_config::DirectoryConfig;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry, ldap_escape};

use crate::client::{DirectoryClient, DirectorySnapshot};
use crate::entry::{DirectoryEntry, guid_from_bytes};
use crate::error::DirectoryError;

/// Result code for a rejected simple bind.
const INVALID_CREDENTIALS: u32 = 49;

const PAGE_SIZE: i32 = 500;

const USER_ATTRS: [&str; 7] = [
    "distinguishedName",
    "msDS-PrincipalName",
    "sAMAccountName",
    "givenName",
    "sn",
    "mail",
    "objectGUID",
];

/// A real directory server.
#[derive(Debug, Clone)]
pub struct LdapDirectory {
    url: String,
    domain: String,
    base_context: String,
    timeout: Duration,
}

impl LdapDirectory {
    #[must_use]
    pub fn new(url: &str, domain: &str, base_context: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            domain: domain.to_string(),
            base_context: base_context.to_string(),
            timeout,
        }
    }

    /// # Errors
    ///
    /// Returns `DirectoryError::NotConfigured` when the URL, domain or
    /// search base is missing.
    pub fn from_config(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        if !config.is_configured() {
            return Err(DirectoryError::NotConfigured(
                "directory.url, directory.domain and directory.base_context are required"
                    .to_string(),
            ));
        }
        Ok(Self::new(
            &config.url,
            &config.domain,
            &config.base_context,
            Duration::from_secs(config.timeout_secs),
        ))
    }

    fn qualified(&self, username: &str) -> String {
        format!("{}\\{username}", self.domain)
    }

    async fn connect(&self) -> Result<Ldap, DirectoryError> {
        let settings = LdapConnSettings::new().set_conn_timeout(self.timeout);
        let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.url)
            .await
            .map_err(unavailable)?;
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                tracing::warn!(error = %e, "directory connection closed with error");
            }
        });
        Ok(ldap)
    }

    async fn bind(&self, username: &str, password: &str) -> Result<Ldap, DirectoryError> {
        let mut ldap = self.connect().await?;
        ldap.with_timeout(self.timeout);
        let result = ldap
            .simple_bind(&self.qualified(username), password)
            .await
            .map_err(unavailable)?;
        match result.rc {
            0 => Ok(ldap),
            INVALID_CREDENTIALS => Err(DirectoryError::InvalidCredentials),
            rc => Err(DirectoryError::Unavailable(format!(
                "bind failed with code {rc}: {}",
                result.text
            ))),
        }
    }

    /// Look up the bound account's own entry.
    async fn own_entry(
        &self,
        ldap: &mut Ldap,
        username: &str,
    ) -> Result<DirectoryEntry, DirectoryError> {
        let filter = format!(
            "(&(objectClass=user)(sAMAccountName={}))",
            ldap_escape(username)
        );
        let (entries, _) = ldap
            .search(&self.base_context, Scope::Subtree, &filter, USER_ATTRS.to_vec())
            .await
            .and_then(ldap3::SearchResult::success)
            .map_err(unavailable)?;
        entries
            .into_iter()
            .next()
            .map(|raw| self.to_entry(SearchEntry::construct(raw)))
            .ok_or_else(|| DirectoryError::OutsideSearchBase {
                username: username.to_string(),
            })
    }

    async fn all_entries(&self, ldap: &mut Ldap) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
            Box::new(EntriesOnly::new()),
            Box::new(PagedResults::new(PAGE_SIZE)),
        ];
        let mut search = ldap
            .streaming_search_with(
                adapters,
                &self.base_context,
                Scope::Subtree,
                "(objectClass=user)",
                USER_ATTRS.to_vec(),
            )
            .await
            .map_err(unavailable)?;

        let mut entries = Vec::new();
        while let Some(raw) = search.next().await.map_err(unavailable)? {
            entries.push(self.to_entry(SearchEntry::construct(raw)));
        }
        search.finish().await.success().map_err(unavailable)?;
        tracing::debug!(count = entries.len(), "directory users listed");
        Ok(entries)
    }

    fn to_entry(&self, mut raw: SearchEntry) -> DirectoryEntry {
        let mut first = |name: &str| {
            raw.attrs
                .remove(name)
                .and_then(|values| values.into_iter().next())
                .unwrap_or_default()
        };
        let principal_name = match first("msDS-PrincipalName") {
            name if name.is_empty() => {
                let account = first("sAMAccountName");
                if account.is_empty() { account } else { self.qualified(&account) }
            }
            name => name,
        };
        let given_name = first("givenName");
        let surname = first("sn");
        let mail = first("mail");
        let text_guid = first("objectGUID");

        let object_guid = raw
            .bin_attrs
            .get("objectGUID")
            .and_then(|values| values.first())
            .and_then(|bytes| guid_from_bytes(bytes))
            .or_else(|| guid_from_bytes(text_guid.as_bytes()))
            .unwrap_or(text_guid);

        DirectoryEntry {
            dn: raw.dn,
            principal_name,
            given_name,
            surname,
            mail,
            object_guid,
        }
    }
}

fn unavailable(e: LdapError) -> DirectoryError {
    DirectoryError::Unavailable(e.to_string())
}

async fn unbind(mut ldap: Ldap) {
    if let Err(e) = ldap.unbind().await {
        tracing::debug!(error = %e, "directory unbind failed");
    }
}

#[async_trait]
impl DirectoryClient for LdapDirectory {
    async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<DirectoryEntry, DirectoryError> {
        let mut ldap = self.bind(username, password).await?;
        let entry = self.own_entry(&mut ldap, username).await;
        unbind(ldap).await;
        entry
    }

    async fn snapshot(
        &self,
        username: &str,
        password: &str,
    ) -> Result<DirectorySnapshot, DirectoryError> {
        let mut ldap = self.bind(username, password).await?;
        let snapshot: Result<_, DirectoryError> = async {
            let binder = self.own_entry(&mut ldap, username).await?;
            let entries = self.all_entries(&mut ldap).await?;
            Ok(DirectorySnapshot { binder, entries })
        }
        .await;
        unbind(ldap).await;
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;

    fn directory() -> LdapDirectory {
        LdapDirectory::new(
            "ldap://localhost:389",
            "SCHOOL",
            "DC=school,DC=local",
            Duration::from_secs(5),
        )
    }

    fn raw(attrs: &[(&str, &str)], bin: &[(&str, Vec<u8>)]) -> SearchEntry {
        SearchEntry {
            dn: "CN=jdoe,OU=AM,DC=school,DC=local".into(),
            attrs: attrs
                .iter()
                .map(|(k, v)| ((*k).to_string(), vec![(*v).to_string()]))
                .collect(),
            bin_attrs: bin
                .iter()
                .map(|(k, v)| ((*k).to_string(), vec![v.clone()]))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn bind_names_are_domain_qualified() {
        assert_eq!(directory().qualified("jdoe"), "SCHOOL\\jdoe");
    }

    #[test]
    fn binary_guid_is_decoded() {
        let bytes: Vec<u8> = (0u8..16).collect();
        let entry = directory().to_entry(raw(
            &[("msDS-PrincipalName", "SCHOOL\\jdoe"), ("givenName", "Jane")],
            &[("objectGUID", bytes)],
        ));
        assert_eq!(entry.object_guid, "03020100-0504-0706-0809-0a0b0c0d0e0f");
        assert_eq!(entry.username(), "jdoe");
        assert_eq!(entry.given_name, "Jane");
        assert_eq!(entry.surname, "");
    }

    #[test]
    fn account_name_backs_up_principal_name() {
        let entry = directory().to_entry(raw(&[("sAMAccountName", "jdoe")], &[]));
        assert_eq!(entry.principal_name, "SCHOOL\\jdoe");
    }

    #[test]
    fn missing_configuration_is_rejected() {
        let config = DirectoryConfig::default();
        assert!(matches!(
            LdapDirectory::from_config(&config),
            Err(DirectoryError::NotConfigured(_))
        ));
    }
}
