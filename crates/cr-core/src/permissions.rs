//! Capability checks, one per question an operation asks about its actor.
//!
//! Each check is a plain predicate. Operations compose them at their entry
//! point and decide which error to surface.

use crate::entities::{Review, User};

/// Instructors see everything; everyone else only reviews they take part in.
#[must_use]
pub fn can_view(actor: &User, review: &Review) -> bool {
    actor.is_superuser || review.is_affiliated(&actor.id)
}

/// The owning student, or an instructor.
#[must_use]
pub fn can_edit(actor: &User, review: &Review) -> bool {
    actor.is_superuser || review.student_id == actor.id
}

/// Only the owning student cancels their own request.
#[must_use]
pub fn can_cancel(actor: &User, review: &Review) -> bool {
    review.student_id == actor.id
}

#[must_use]
pub const fn can_delete_reviews(actor: &User) -> bool {
    actor.is_superuser
}

#[must_use]
pub const fn can_claim(actor: &User) -> bool {
    actor.is_reviewer
}

/// Reviewers only work within their own session.
#[must_use]
pub fn shares_session(actor: &User, review: &Review) -> bool {
    actor.session == review.student_session
}

/// The assigned reviewer, or an instructor.
#[must_use]
pub fn can_abandon(actor: &User, review: &Review) -> bool {
    actor.is_superuser || review.is_reviewer(&actor.id)
}

/// Only the assigned reviewer grades, including draft saves.
#[must_use]
pub fn can_grade(actor: &User, review: &Review) -> bool {
    actor.is_reviewer && review.is_reviewer(&actor.id)
}

#[must_use]
pub const fn can_manage_rubrics(actor: &User) -> bool {
    actor.is_superuser
}

#[must_use]
pub const fn can_manage_roster(actor: &User) -> bool {
    actor.is_superuser
}
