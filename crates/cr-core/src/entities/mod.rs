//! Entity structs for all CodeReview domain objects.
//!
//! Each entity maps to a table in the libSQL database (see
//! `cr-db/migrations/001_initial.sql`). Rubrics are loaded as a whole tree;
//! rows and cells are never edited on their own.

mod review;
mod rubric;
mod user;

pub use review::{Review, ScoredRow};
pub use rubric::{Rubric, RubricCell, RubricRow, RubricSummary};
pub use user::User;
