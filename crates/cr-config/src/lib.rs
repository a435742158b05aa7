//! # cr-config
//!
//! Layered configuration loading for CodeReview using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`CODEREVIEW_*` prefix, `__` as separator)
//! 2. Project-level `.codereview/config.toml`
//! 3. User-level `~/.config/codereview/config.toml`
//! 4. Built-in defaults
//!
//! Figment maps `CODEREVIEW_DIRECTORY__URL` -> `directory.url`,
//! `CODEREVIEW_REVIEWS__MAX_CLAIMED` -> `reviews.max_claimed`, etc.
//!
//! ```no_run
//! use cr_config::ReviewConfig;
//!
//! let config = ReviewConfig::load_with_dotenv().expect("config");
//! println!("database at {}", config.database.path);
//! ```

mod database;
mod directory;
mod email;
mod error;
mod reviews;

pub use database::DatabaseConfig;
pub use directory::DirectoryConfig;
pub use email::EmailConfig;
pub use error::ConfigError;
pub use reviews::ReviewsConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const ENV_PREFIX: &str = "CODEREVIEW_";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ReviewConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub reviews: ReviewsConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

impl ReviewConfig {
    /// Load configuration from TOML files and environment variables.
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Figment` when a source fails to parse or a value
    /// has the wrong type, `InvalidValue` when a limit is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.reviews.validate()?;
        Ok(config)
    }

    /// Load configuration after reading `.env` from the workspace root.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`].
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Build the figment provider chain.
    ///
    /// Public so tests can inspect the figment or layer providers on top.
    #[must_use]
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(global_path));
            }
        }

        let local_path = PathBuf::from(".codereview/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("codereview").join("config.toml"))
    }

    /// Walks up from `CARGO_MANIFEST_DIR` (at most 3 levels) looking for
    /// `.env`, then falls back to the current directory.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}
