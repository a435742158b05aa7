//! Review state machine edges.
//!
//! One function per edge. Each takes the actor, the current review (where one
//! exists), and any counts the edge is capped on, and either returns the next
//! status or a [`TransitionError`] saying why the edge is closed. Nothing here
//! writes; `cr-db` runs these checks inside the write transaction that applies
//! the result, so counts are read under the same lock.

use thiserror::Error;

use crate::entities::{Review, User};
use crate::enums::{ReviewAction, ReviewStatus};
use crate::permissions;

/// How many active reviews a user may hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewLimits {
    /// Open or assigned reviews a student may have requested.
    pub max_open_requests: usize,
    /// Assigned reviews a reviewer may hold.
    pub max_claimed: usize,
}

impl Default for ReviewLimits {
    fn default() -> Self {
        Self {
            max_open_requests: 2,
            max_claimed: 2,
        }
    }
}

/// Why a transition was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The actor lacks the capability for this action on this review.
    #[error("Not permitted to {action} this review")]
    Forbidden { action: ReviewAction },

    /// The review's status does not allow this action.
    #[error("Cannot {action} a review that is {status}")]
    InvalidState {
        action: ReviewAction,
        status: ReviewStatus,
    },

    /// The actor already holds as many active reviews as allowed.
    #[error("{message}")]
    CapacityExceeded { message: String },
}

impl TransitionError {
    /// Response class: capacity is a form error (200), instructor-only actions
    /// are 403, everything else hides the review behind a 404.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::CapacityExceeded { .. } => 200,
            Self::Forbidden {
                action: ReviewAction::Delete,
            } => 403,
            Self::Forbidden { .. } | Self::InvalidState { .. } => 404,
        }
    }

    const fn forbidden(action: ReviewAction) -> Self {
        Self::Forbidden { action }
    }
}

fn require_status(
    review: &Review,
    action: ReviewAction,
    accepted: &[ReviewStatus],
) -> Result<(), TransitionError> {
    if accepted.contains(&review.status) {
        Ok(())
    } else {
        Err(TransitionError::InvalidState {
            action,
            status: review.status,
        })
    }
}

/// A student requests a new review. `active_requests` counts the student's
/// open and assigned reviews.
///
/// # Errors
///
/// `CapacityExceeded` when the student is at the request limit.
pub fn create(
    _actor: &User,
    active_requests: usize,
    limits: ReviewLimits,
) -> Result<ReviewStatus, TransitionError> {
    if active_requests >= limits.max_open_requests {
        return Err(TransitionError::CapacityExceeded {
            message: format!(
                "You can only have {} requested reviews at once.",
                limits.max_open_requests
            ),
        });
    }
    Ok(ReviewStatus::Open)
}

/// # Errors
///
/// `Forbidden` unless the owner or an instructor; `InvalidState` once closed.
pub fn edit(actor: &User, review: &Review) -> Result<(), TransitionError> {
    if !permissions::can_edit(actor, review) {
        return Err(TransitionError::forbidden(ReviewAction::Edit));
    }
    require_status(
        review,
        ReviewAction::Edit,
        &[ReviewStatus::Open, ReviewStatus::Assigned],
    )
}

/// # Errors
///
/// `Forbidden` unless the owning student; `InvalidState` once closed.
pub fn cancel(actor: &User, review: &Review) -> Result<(), TransitionError> {
    if !permissions::can_cancel(actor, review) {
        return Err(TransitionError::forbidden(ReviewAction::Cancel));
    }
    require_status(
        review,
        ReviewAction::Cancel,
        &[ReviewStatus::Open, ReviewStatus::Assigned],
    )
}

/// Instructors delete reviews in any status.
///
/// # Errors
///
/// `Forbidden` for everyone else.
pub const fn delete(actor: &User) -> Result<(), TransitionError> {
    if permissions::can_delete_reviews(actor) {
        Ok(())
    } else {
        Err(TransitionError::forbidden(ReviewAction::Delete))
    }
}

/// A reviewer takes an open review. `claimed` counts the reviewer's
/// assigned reviews.
///
/// # Errors
///
/// `Forbidden` for non-reviewers, other sessions and the review's own
/// student, `CapacityExceeded` at the claim limit, `InvalidState` unless the
/// review is open.
pub fn claim(
    actor: &User,
    review: &Review,
    claimed: usize,
    limits: ReviewLimits,
) -> Result<ReviewStatus, TransitionError> {
    if !permissions::can_claim(actor) {
        return Err(TransitionError::forbidden(ReviewAction::Claim));
    }
    if claimed >= limits.max_claimed {
        return Err(TransitionError::CapacityExceeded {
            message: format!(
                "You can only have {} claimed reviews at once",
                limits.max_claimed
            ),
        });
    }
    require_status(review, ReviewAction::Claim, &[ReviewStatus::Open])?;
    if !permissions::shares_session(actor, review) || review.student_id == actor.id {
        return Err(TransitionError::forbidden(ReviewAction::Claim));
    }
    Ok(ReviewStatus::Assigned)
}

/// The reviewer hands an assigned review back to the pool.
///
/// # Errors
///
/// `InvalidState` unless assigned; `Forbidden` unless the reviewer or an instructor.
pub fn abandon(actor: &User, review: &Review) -> Result<ReviewStatus, TransitionError> {
    require_status(review, ReviewAction::Abandon, &[ReviewStatus::Assigned])?;
    if !permissions::can_abandon(actor, review) {
        return Err(TransitionError::forbidden(ReviewAction::Abandon));
    }
    Ok(ReviewStatus::Open)
}

/// Draft scores keep the review assigned.
///
/// # Errors
///
/// Same as [`close`].
pub fn save_draft(actor: &User, review: &Review) -> Result<ReviewStatus, TransitionError> {
    require_status(review, ReviewAction::SaveDraft, &[ReviewStatus::Assigned])?;
    if !permissions::can_grade(actor, review) {
        return Err(TransitionError::forbidden(ReviewAction::SaveDraft));
    }
    Ok(ReviewStatus::Assigned)
}

/// Final grading closes the review.
///
/// # Errors
///
/// `InvalidState` unless assigned; `Forbidden` unless the assigned reviewer.
pub fn close(actor: &User, review: &Review) -> Result<ReviewStatus, TransitionError> {
    require_status(review, ReviewAction::Grade, &[ReviewStatus::Assigned])?;
    if !permissions::can_grade(actor, review) {
        return Err(TransitionError::forbidden(ReviewAction::Grade));
    }
    Ok(ReviewStatus::Closed)
}

/// # Errors
///
/// `Forbidden` unless affiliated or an instructor.
pub fn view(actor: &User, review: &Review) -> Result<(), TransitionError> {
    if permissions::can_view(actor, review) {
        Ok(())
    } else {
        Err(TransitionError::forbidden(ReviewAction::View))
    }
}
