//! Service layer orchestrating the review workflow.
//!
//! `ReviewService` wraps `ReviewDb` (raw database access), the notifier that
//! receives transition events, and the settings that cap how many reviews a
//! user may hold. All repo methods are implemented as `impl ReviewService`.

use std::sync::Arc;

use cr_config::ReviewConfig;
use cr_core::events::{Notifier, ReviewEvent, TracingNotifier};
use cr_core::transition::ReviewLimits;

use crate::ReviewDb;
use crate::error::DatabaseError;

/// Knobs the workflow reads on every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub limits: ReviewLimits,
    /// Rows per page on the completed-review list.
    pub page_size: u32,
    /// Domain for generated school addresses; `None` leaves email untouched.
    pub email_domain: Option<String>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            limits: ReviewLimits::default(),
            page_size: 10,
            email_domain: None,
        }
    }
}

impl ServiceSettings {
    #[must_use]
    pub fn from_config(config: &ReviewConfig) -> Self {
        let email_domain = config
            .email
            .is_configured()
            .then(|| config.email.domain.clone());
        Self {
            limits: ReviewLimits {
                max_open_requests: config.reviews.max_open_requests as usize,
                max_claimed: config.reviews.max_claimed as usize,
            },
            page_size: config.reviews.page_size,
            email_domain,
        }
    }
}

/// Runs every review workflow operation.
///
/// Each mutation follows this protocol:
/// 1. Take the write gate and begin an immediate transaction
/// 2. Load the actor and target, check the transition rule
/// 3. Execute SQL
/// 4. Commit (or roll back on any error)
/// 5. Hand the resulting event, if any, to the notifier
pub struct ReviewService {
    db: ReviewDb,
    notifier: Arc<dyn Notifier>,
    settings: ServiceSettings,
}

impl ReviewService {
    /// Create a new service wrapping a local database, logging events
    /// through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new_local(db_path: &str) -> Result<Self, DatabaseError> {
        let db = ReviewDb::open_local(db_path).await?;
        Ok(Self::from_db(
            db,
            Arc::new(TracingNotifier::default()),
            ServiceSettings::default(),
        ))
    }

    /// Open the configured database with the configured limits.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn from_config(
        config: &ReviewConfig,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, DatabaseError> {
        let db = ReviewDb::open_local(&config.database.path).await?;
        Ok(Self::from_db(
            db,
            notifier,
            ServiceSettings::from_config(config),
        ))
    }

    /// Create from an existing `ReviewDb` (for testing).
    #[must_use]
    pub fn from_db(db: ReviewDb, notifier: Arc<dyn Notifier>, settings: ServiceSettings) -> Self {
        Self {
            db,
            notifier,
            settings,
        }
    }

    /// Access the underlying database handle.
    #[must_use]
    pub const fn db(&self) -> &ReviewDb {
        &self.db
    }

    #[must_use]
    pub const fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Dispatch an event after its transaction has committed. Events with no
    /// recipients are dropped.
    pub(crate) fn notify(&self, event: &ReviewEvent) {
        if event.recipients.is_empty() {
            tracing::debug!(kind = %event.kind, review = %event.review_id, "no recipients");
            return;
        }
        self.notifier.notify(event);
    }
}
