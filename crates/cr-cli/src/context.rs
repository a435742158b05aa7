use std::sync::Arc;

use anyhow::{Context, bail};
use cr_config::ReviewConfig;
use cr_core::entities::User;
use cr_core::events::TracingNotifier;
use cr_db::service::ReviewService;
use cr_directory::DirectoryBridge;

use crate::cli::GlobalFlags;

/// Everything a command handler needs: configuration, the service over the
/// configured database, and the `--as` user when one was given.
pub struct AppContext {
    pub config: ReviewConfig,
    pub service: ReviewService,
    actor: Option<String>,
}

impl AppContext {
    pub async fn init(mut config: ReviewConfig, flags: &GlobalFlags) -> anyhow::Result<Self> {
        if let Some(path) = &flags.database {
            config.database.path.clone_from(path);
        }
        let notifier = Arc::new(TracingNotifier::new(config.email.from_address.as_str()));
        let service = ReviewService::from_config(&config, notifier)
            .await
            .with_context(|| format!("failed to open database at {}", config.database.path))?;
        tracing::debug!(path = %config.database.path, "database opened");

        Ok(Self {
            config,
            service,
            actor: flags.actor.clone(),
        })
    }

    /// The user named by `--as`.
    pub async fn actor(&self) -> anyhow::Result<User> {
        let Some(username) = self.actor.as_deref() else {
            bail!("this command needs --as <USERNAME>");
        };
        self.user(username).await
    }

    pub async fn user(&self, username: &str) -> anyhow::Result<User> {
        self.service
            .get_user_by_username(username)
            .await?
            .with_context(|| format!("no user named '{username}'"))
    }

    pub fn directory(&self) -> anyhow::Result<DirectoryBridge> {
        self.config
            .directory
            .validate()
            .context("directory is not configured")?;
        Ok(DirectoryBridge::from_config(&self.config.directory)?)
    }
}
