use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Session;

/// Identity asserted by the directory after a successful bind.
///
/// Produced by `cr-directory`, consumed by `cr-db` when syncing the local
/// user record. Contains only data fields, no directory calls.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct DirectoryIdentity {
    /// Directory object GUID in hyphenated form. Stable across renames.
    pub guid: String,
    /// Account name without the domain prefix.
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Session taken from the entry's organizational unit path.
    pub session: Session,
    /// Entries outside any session unit are instructors.
    pub is_admin: bool,
}
