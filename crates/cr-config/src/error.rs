//! Errors raised while layering `config.toml`, `.codereview/config.toml` and
//! `CODEREVIEW_*` variables into a [`crate::ReviewConfig`].

use thiserror::Error;

use crate::ENV_PREFIX;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer failed to parse or does not fit the config shape.
    #[error("Failed to load review configuration: {0}")]
    Figment(#[from] figment::Error),

    /// A section a command needs is missing required fields, e.g.
    /// `[directory]` without a server URL.
    #[error(
        "The [{section}] section is incomplete; fill it in config.toml or set {}__*",
        env_var_for(.section)
    )]
    NotConfigured { section: String },

    /// A field parsed but is out of range, e.g. a zero review limit.
    #[error("Invalid value for {field} ({}): {reason}", env_var_for(.field))]
    InvalidValue { field: String, reason: String },
}

/// The environment variable that overrides a dotted config key:
/// `reviews.max_claimed` becomes `CODEREVIEW_REVIEWS__MAX_CLAIMED`.
#[must_use]
pub fn env_var_for(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.replace('.', "__").to_uppercase())
}
