//! Review update builder.

use serde::Serialize;

/// Fields a student (or instructor) may change on an active review.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schoology_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rubric_id: Option<String>,
}

impl ReviewUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.schoology_id.is_none() && self.rubric_id.is_none()
    }
}

pub struct ReviewUpdateBuilder(ReviewUpdate);

impl ReviewUpdateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self(ReviewUpdate::default())
    }

    #[must_use]
    pub fn schoology_id(mut self, schoology_id: impl Into<String>) -> Self {
        self.0.schoology_id = Some(schoology_id.into());
        self
    }

    #[must_use]
    pub fn rubric_id(mut self, rubric_id: impl Into<String>) -> Self {
        self.0.rubric_id = Some(rubric_id.into());
        self
    }

    #[must_use]
    pub fn build(self) -> ReviewUpdate {
        self.0
    }
}

impl Default for ReviewUpdateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
