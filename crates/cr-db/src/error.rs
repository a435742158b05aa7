//! Database error types for cr-db.
//!
//! Besides storage failures, `DatabaseError` carries the rule violations the
//! service detects, so callers can map any failure onto a response class with
//! [`DatabaseError::status_code`] and show [`DatabaseError::user_messages`].

use cr_core::errors::CoreError;
use cr_core::grading::ScoreErrors;
use cr_core::rubric_format::RubricErrors;
use cr_core::transition::TransitionError;
use thiserror::Error;

/// Errors from database operations.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// A SQL query failed.
    #[error("Query failed: {0}")]
    Query(String),

    /// Schema migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// Expected a result row but none was returned.
    #[error("No result returned")]
    NoResult,

    /// Invalid state encountered (e.g., bad data in DB).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The actor may not use an instructor-only operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A single-field validation failure.
    #[error("{0}")]
    Validation(String),

    /// A review transition was rejected.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Rubric JSON failed validation.
    #[error(transparent)]
    Rubric(#[from] RubricErrors),

    /// A score vector failed validation.
    #[error(transparent)]
    Scores(#[from] ScoreErrors),

    /// Underlying libSQL error.
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<CoreError> for DatabaseError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound { entity_type, id } => Self::InvalidState(format!(
                "{entity_type} {id} missing from core lookup"
            )),
            CoreError::Transition(e) => Self::Transition(e),
            CoreError::Rubric(e) => Self::Rubric(e),
            CoreError::Scores(e) => Self::Scores(e),
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::Other(e) => Self::Other(e),
        }
    }
}

impl DatabaseError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub(crate) fn instructor_only(operation: &str) -> Self {
        Self::Forbidden(format!("{operation} is limited to instructors"))
    }

    /// HTTP-style response class.
    ///
    /// Validation problems re-render the form (200), hidden or missing
    /// reviews are 404, instructor-only operations are 403, and anything
    /// else is a 500.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Rubric(_) | Self::Scores(_) => 200,
            Self::Transition(e) => e.status_code(),
            Self::NotFound { .. } => 404,
            Self::Forbidden(_) => 403,
            Self::Query(_)
            | Self::Migration(_)
            | Self::NoResult
            | Self::InvalidState(_)
            | Self::LibSql(_)
            | Self::Other(_) => 500,
        }
    }

    /// Messages safe to show the user. Internal failures collapse to one
    /// generic line.
    #[must_use]
    pub fn user_messages(&self) -> Vec<String> {
        match self {
            Self::Validation(msg) => vec![msg.clone()],
            Self::Rubric(e) => e.messages(),
            Self::Scores(e) => e.messages().to_vec(),
            Self::Transition(TransitionError::CapacityExceeded { message }) => {
                vec![message.clone()]
            }
            Self::Transition(_) | Self::NotFound { .. } => vec!["Not found".to_string()],
            Self::Forbidden(_) => vec!["You don't have permission to do that".to_string()],
            _ => vec!["Something went wrong, please try again later".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cr_core::enums::ReviewAction;

    #[test]
    fn response_classes() {
        assert_eq!(DatabaseError::Validation("x".into()).status_code(), 200);
        assert_eq!(DatabaseError::not_found("review", "rev-1").status_code(), 404);
        assert_eq!(DatabaseError::instructor_only("Rubric editing").status_code(), 403);
        assert_eq!(DatabaseError::NoResult.status_code(), 500);
        assert_eq!(
            DatabaseError::from(TransitionError::Forbidden {
                action: ReviewAction::Delete
            })
            .status_code(),
            403
        );
        assert_eq!(
            DatabaseError::from(TransitionError::Forbidden {
                action: ReviewAction::Claim
            })
            .status_code(),
            404
        );
    }

    #[test]
    fn internal_details_are_not_shown() {
        let err = DatabaseError::Query("SELECT broke at column 3".into());
        assert_eq!(
            err.user_messages(),
            vec!["Something went wrong, please try again later".to_string()]
        );
    }

    #[test]
    fn core_validation_maps_to_form_error() {
        let err = DatabaseError::from(CoreError::Validation("bad id".into()));
        assert_eq!(err.status_code(), 200);
        assert_eq!(err.user_messages(), vec!["bad id".to_string()]);
    }
}
