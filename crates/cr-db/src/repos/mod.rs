//! Repository modules implementing the review workflow operations.
//!
//! Each module adds methods to `ReviewService` via `impl ReviewService` blocks.
//! Row-level helpers take a `&libsql::Connection` so they run the same way on
//! the shared connection and inside a write transaction.

pub mod grading;
pub mod review;
pub mod rubric;
pub mod user;
