use cr_db::error::DatabaseError;
use thiserror::Error;

/// Shown on the login form when the directory cannot be reached.
pub const LOGIN_UNAVAILABLE_MESSAGE: &str =
    "There was an error contacting the auth server, please try again later.";

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory rejected the username/password pair.
    #[error("Invalid directory credentials")]
    InvalidCredentials,

    /// The directory could not be reached or failed mid-conversation.
    #[error("Directory unavailable: {0}")]
    Unavailable(String),

    /// The bind succeeded but the account is not under the configured
    /// search base, so it does not belong to this course.
    #[error("Directory account {username} is outside the search base")]
    OutsideSearchBase { username: String },

    /// The bound account is not a directory administrator.
    #[error("Directory account is not an administrator")]
    NotAdmin,

    #[error("A password is required")]
    MissingPassword,

    /// An entry lacks an attribute needed to build a local user.
    #[error("Malformed directory entry {dn}: {reason}")]
    MalformedEntry { dn: String, reason: String },

    #[error("Directory not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl DirectoryError {
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Message for an instructor running account reconciliation.
    #[must_use]
    pub fn reconcile_message(&self) -> String {
        match self {
            Self::MissingPassword => "Please provide a password".to_string(),
            Self::NotAdmin | Self::OutsideSearchBase { .. } => {
                "You lack permissions to perform this action.".to_string()
            }
            Self::InvalidCredentials => {
                "The password you provided was incorrect, please check it and try again."
                    .to_string()
            }
            Self::Unavailable(_) => {
                "Can't connect to ActiveDirectory, please try again later.".to_string()
            }
            Self::MalformedEntry { .. } | Self::NotConfigured(_) | Self::Database(_) => {
                "Something went wrong, please try again later".to_string()
            }
        }
    }
}
