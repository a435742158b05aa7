//! Aggregate views returned by `cr-db` queries and printed as JSON by `crev`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{Review, Rubric, RubricSummary, ScoredRow, User};
use crate::enums::Session;

/// A review with everything needed to show it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ReviewDetail {
    pub review: Review,
    pub rubric: Rubric,
    pub scored_rows: Vec<ScoredRow>,
    /// `"achieved/possible"`, only once closed.
    pub score_fraction: Option<String>,
}

/// Home page lists for a non-instructor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct HomeDashboard {
    /// The user's own open and assigned requests.
    pub active: Vec<Review>,
    /// Closed reviews the user took part in, as student or reviewer.
    pub completed: Vec<Review>,
    /// Open reviews in the reviewer's session, excluding their own. Empty for non-reviewers.
    pub claimable: Vec<Review>,
    /// Reviews the reviewer currently holds. Empty for non-reviewers.
    pub assigned: Vec<Review>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SessionReviews {
    pub active: Vec<Review>,
    pub completed: Vec<Review>,
}

/// Instructor overview, partitioned by the student's session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct InstructorDashboard {
    pub am: SessionReviews,
    pub pm: SessionReviews,
}

impl InstructorDashboard {
    #[must_use]
    pub const fn session(&self, session: Session) -> &SessionReviews {
        match session {
            Session::Am => &self.am,
            Session::Pm => &self.pm,
        }
    }
}

/// One page of a paginated listing. Pages are numbered from 1.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size as u64)
    }

    #[must_use]
    pub const fn has_next(&self) -> bool {
        (self.page as u64) < self.total_pages()
    }
}

/// Non-instructors ranked by completed reviews.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Leaderboard {
    /// Ordered by `reviews_done_as_reviewee`, highest first.
    pub reviewees: Vec<User>,
    /// Ordered by `reviews_done_as_reviewer`, highest first.
    pub reviewers: Vec<User>,
}

/// Non-instructor roster split by session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Roster {
    pub am: Vec<User>,
    pub pm: Vec<User>,
}

/// Result of duplicating a rubric.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DuplicateResponse {
    pub rubric: RubricSummary,
    /// Set when the copy fell back to the generic name.
    pub warning: Option<String>,
}
