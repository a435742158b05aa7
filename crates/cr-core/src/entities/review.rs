use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{ReviewStatus, Session};

/// A student's request for a code review, graded against one rubric.
///
/// `reviewer_id` is set exactly while the review is assigned or closed.
/// `student_session` is the owning student's session at load time and drives
/// claim affinity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Review {
    pub id: String,
    pub student_id: String,
    pub student_session: Session,
    pub reviewer_id: Option<String>,
    pub schoology_id: String,
    pub status: ReviewStatus,
    pub rubric_id: String,
    pub additional_comments: String,
    pub date_created: DateTime<Utc>,
    pub date_completed: Option<DateTime<Utc>>,
}

impl Review {
    /// Whether `user_id` is the student or the reviewer of this review.
    #[must_use]
    pub fn is_affiliated(&self, user_id: &str) -> bool {
        self.student_id == user_id || self.reviewer_id.as_deref() == Some(user_id)
    }

    #[must_use]
    pub fn is_reviewer(&self, user_id: &str) -> bool {
        self.reviewer_id.as_deref() == Some(user_id)
    }
}

/// The score a review received on one rubric row.
///
/// `score` is one of the row's cell scores or `-1.0` for "not applicable".
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ScoredRow {
    pub id: String,
    pub review_id: String,
    pub row_id: String,
    pub row_index: u32,
    pub score: f64,
}
