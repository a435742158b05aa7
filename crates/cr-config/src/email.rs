//! Addressing for generated student emails.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EmailConfig {
    /// Domain of generated student addresses, e.g. `students.school.org`.
    #[serde(default)]
    pub domain: String,

    /// Sender address for notifications.
    #[serde(default)]
    pub from_address: String,
}

impl EmailConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.domain.is_empty()
    }
}
