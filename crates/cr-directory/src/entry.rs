//! Directory entries and their mapping onto local identities.
//!
//! Students live under an organizational unit named for their session, e.g.
//! `CN=jdoe,OU=PM,OU=Students,DC=school,DC=local`. Entries with no session
//! unit anywhere in their path are staff and become instructors.

use cr_core::enums::Session;
use cr_core::identity::DirectoryIdentity;
use uuid::Uuid;

use crate::error::DirectoryError;

/// The attributes read from one directory user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// `distinguishedName`.
    pub dn: String,
    /// `msDS-PrincipalName`, e.g. `SCHOOL\jdoe`.
    pub principal_name: String,
    pub given_name: String,
    pub surname: String,
    pub mail: String,
    /// `objectGUID` in its hyphenated text form.
    pub object_guid: String,
}

/// Split a DN into its `attr=value` components, honoring `\,` escapes.
fn components(dn: &str) -> Vec<(String, String)> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in dn.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            current.push(ch);
            escaped = true;
        } else if ch == ',' {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .filter_map(|part| {
            let (attr, value) = part.split_once('=')?;
            Some((attr.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

/// The session named by the DN's parent unit, AM when it names neither.
#[must_use]
pub fn session_from_dn(dn: &str) -> Session {
    components(dn)
        .get(1)
        .and_then(|(_, value)| Session::from_code(value))
        .unwrap_or(Session::Am)
}

/// Staff accounts carry no session unit in their path.
#[must_use]
pub fn is_admin_dn(dn: &str) -> bool {
    !components(dn)
        .iter()
        .any(|(_, value)| Session::from_code(value).is_some())
}

/// `SCHOOL\jdoe` -> `jdoe`. Names without a domain pass through.
#[must_use]
pub fn strip_domain(principal: &str) -> &str {
    principal
        .rsplit_once('\\')
        .map_or(principal, |(_, name)| name)
}

/// Text form of a binary `objectGUID`. Active Directory stores the first
/// three fields little-endian. `None` unless the value is exactly 16 bytes.
#[must_use]
pub fn guid_from_bytes(bytes: &[u8]) -> Option<String> {
    Uuid::from_slice_le(bytes).ok().map(|guid| guid.to_string())
}

impl DirectoryEntry {
    /// Username without the domain prefix.
    #[must_use]
    pub fn username(&self) -> &str {
        strip_domain(&self.principal_name)
    }

    /// Build the identity a local account is synced from.
    ///
    /// # Errors
    ///
    /// Returns `DirectoryError::MalformedEntry` when the entry has no
    /// principal name or no parseable GUID.
    pub fn to_identity(&self) -> Result<DirectoryIdentity, DirectoryError> {
        let malformed = |reason: &str| DirectoryError::MalformedEntry {
            dn: self.dn.clone(),
            reason: reason.to_string(),
        };

        let username = self.username();
        if username.is_empty() {
            return Err(malformed("missing msDS-PrincipalName"));
        }
        let guid = Uuid::parse_str(&self.object_guid)
            .map_err(|_| malformed("missing or invalid objectGUID"))?;

        Ok(DirectoryIdentity {
            guid: guid.to_string(),
            username: username.to_string(),
            first_name: self.given_name.clone(),
            last_name: self.surname.clone(),
            email: self.mail.clone(),
            session: session_from_dn(&self.dn),
            is_admin: is_admin_dn(&self.dn),
        })
    }
}
