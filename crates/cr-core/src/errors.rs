//! Cross-cutting error types for CodeReview.
//!
//! Domain-specific errors (e.g., `DatabaseError`, `DirectoryError`) are defined
//! in their respective crates. The errors here come from pure rule checks and
//! carry enough structure for callers to pick a response class.

use thiserror::Error;

use crate::grading::ScoreErrors;
use crate::rubric_format::RubricErrors;
use crate::transition::TransitionError;

/// Errors that can be raised by any CodeReview crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// A state machine transition was rejected.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Rubric JSON failed validation.
    #[error(transparent)]
    Rubric(#[from] RubricErrors),

    /// A score vector failed validation against its rubric.
    #[error(transparent)]
    Scores(#[from] ScoreErrors),

    /// Data failed validation (format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
