//! Directory (LDAP / Active Directory) connection settings.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DirectoryConfig {
    /// Server URL, e.g. `ldap://dc01.school.local:389`.
    #[serde(default)]
    pub url: String,

    /// NetBIOS domain used to qualify bind names (`DOMAIN\user`).
    #[serde(default)]
    pub domain: String,

    /// Search base for user entries, e.g. `OU=Students,DC=school,DC=local`.
    #[serde(default)]
    pub base_context: String,

    /// Upper bound on any single directory round trip, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Use the in-memory directory instead of a server. Development only.
    #[serde(default)]
    pub use_fake: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            domain: String::new(),
            base_context: String::new(),
            timeout_secs: default_timeout_secs(),
            use_fake: false,
        }
    }
}

impl DirectoryConfig {
    /// Whether enough is set to reach a real server.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.url.is_empty() && !self.domain.is_empty() && !self.base_context.is_empty()
    }

    /// # Errors
    ///
    /// Returns `ConfigError::NotConfigured` when a real server is required
    /// but not configured, `InvalidValue` for a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "directory.timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.use_fake && !self.is_configured() {
            return Err(ConfigError::NotConfigured {
                section: "directory".to_string(),
            });
        }
        Ok(())
    }
}
