//! Status enums, sessions, and review actions for CodeReview.
//!
//! All enums use `snake_case` serialization except [`Session`], whose wire and
//! storage form is the upper-case cohort code (`"AM"` / `"PM"`).
//! [`ReviewStatus`] provides `allowed_next_states()` to enforce valid
//! transitions at the application layer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ReviewStatus
// ---------------------------------------------------------------------------

/// Status of a review through its lifecycle.
///
/// ```text
/// open → assigned → closed
///          ↓
///        open (abandoned)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Open,
    Assigned,
    Closed,
}

impl ReviewStatus {
    /// Valid next states from the current state.
    #[must_use]
    pub const fn allowed_next_states(self) -> &'static [Self] {
        match self {
            Self::Open => &[Self::Assigned],
            Self::Assigned => &[Self::Open, Self::Closed],
            Self::Closed => &[],
        }
    }

    /// Check whether transitioning to `next` is allowed.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next_states().contains(&next)
    }

    /// Whether the review still counts against request/claim capacity.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::Assigned)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Assigned => "assigned",
            Self::Closed => "closed",
        }
    }

    /// Human-facing label shown in review tables.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Open => "Open",
            Self::Assigned => "Taken",
            Self::Closed => "Completed",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Cohort partition. Reviewers may only claim reviews from their own session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Session {
    #[default]
    Am,
    Pm,
}

impl Session {
    pub const ALL: [Self; 2] = [Self::Am, Self::Pm];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Am => "AM",
            Self::Pm => "PM",
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Am => "AM Session",
            Self::Pm => "PM Session",
        }
    }

    /// Parse a session code exactly as stored (`"AM"` / `"PM"`).
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "AM" => Some(Self::Am),
            "PM" => Some(Self::Pm),
            _ => None,
        }
    }

    /// The other session, used by instructor views to toggle between cohorts.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Am => Self::Pm,
            Self::Pm => Self::Am,
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ReviewAction
// ---------------------------------------------------------------------------

/// Operations an actor can request against a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    Create,
    Edit,
    Cancel,
    Delete,
    Claim,
    Abandon,
    SaveDraft,
    Grade,
    View,
}

impl ReviewAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Cancel => "cancel",
            Self::Delete => "delete",
            Self::Claim => "claim",
            Self::Abandon => "abandon",
            Self::SaveDraft => "save_draft",
            Self::Grade => "grade",
            Self::View => "view",
        }
    }
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ReviewEventKind
// ---------------------------------------------------------------------------

/// Transitions that produce a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReviewEventKind {
    /// A student requested a review. Audience: reviewers in the same session.
    Created,
    /// A reviewer claimed a review. Audience: instructors.
    Claimed,
    /// A reviewer graded and closed a review. Audience: instructors.
    Completed,
}

impl ReviewEventKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Claimed => "claimed",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for ReviewEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
