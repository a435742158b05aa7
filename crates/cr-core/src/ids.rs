//! ID prefix constants.
//!
//! Every generated ID is `<prefix>-<8 hex chars>`, e.g. `rev-a3f8b2c1`.
//! Users authenticated through the directory keep the directory's object GUID
//! as their ID instead, so the key survives renames.

pub const PREFIX_USER: &str = "usr";
pub const PREFIX_RUBRIC: &str = "rub";
pub const PREFIX_ROW: &str = "row";
pub const PREFIX_CELL: &str = "cel";
pub const PREFIX_REVIEW: &str = "rev";
pub const PREFIX_SCORED_ROW: &str = "scr";

pub const ALL_PREFIXES: &[&str] = &[
    PREFIX_USER,
    PREFIX_RUBRIC,
    PREFIX_ROW,
    PREFIX_CELL,
    PREFIX_REVIEW,
    PREFIX_SCORED_ROW,
];
