//! # cr-core
//!
//! Core types and pure domain rules for CodeReview.
//!
//! This crate provides the foundational types shared across all CodeReview crates:
//! - Entity structs (users, rubrics, reviews, scored rows)
//! - Status enums with state machine transitions
//! - The rubric JSON wire format and its positional validation
//! - Score vector parsing, validation, and score fractions
//! - Capability checks composed at each operation's entry point
//! - Transition events handed to notification dispatch
//!
//! Nothing here touches the database or the network. `cr-db` applies these
//! rules inside transactions; `cr-directory` produces [`identity::DirectoryIdentity`].

pub mod entities;
pub mod enums;
pub mod errors;
pub mod events;
pub mod grading;
pub mod identity;
pub mod ids;
pub mod permissions;
pub mod responses;
pub mod rubric_format;
pub mod transition;
pub mod validation;
