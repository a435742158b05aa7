//! Field limits and single-field validators shared by forms and the CLI.

use std::sync::LazyLock;

use regex::Regex;

use crate::errors::CoreError;

pub const RUBRIC_NAME_MAX_LEN: usize = 50;
pub const ROW_NAME_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 1000;
pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 100.0;

pub const SCHOOLOGY_ID_MESSAGE: &str =
    "Schoology ID should be in format: XX.XX.XX where X'es are numbers";

static SCHOOLOGY_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{2}\.\d{2}\.\d{2}$").expect("Valid schoology id regex")
});

static STUDENT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{3,10}$").expect("Valid student id regex"));

/// Whether `id` is a full `DD.DD.DD` assignment id.
#[must_use]
pub fn is_valid_schoology_id(id: &str) -> bool {
    SCHOOLOGY_ID.is_match(id)
}

/// # Errors
///
/// Returns `CoreError::Validation` when the id is not `DD.DD.DD`.
pub fn validate_schoology_id(id: &str) -> Result<(), CoreError> {
    if is_valid_schoology_id(id) {
        Ok(())
    } else {
        Err(CoreError::Validation(SCHOOLOGY_ID_MESSAGE.to_string()))
    }
}

/// # Errors
///
/// Returns `CoreError::Validation` for an empty or overlong rubric name.
pub fn validate_rubric_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation(
            "Please enter a name for the rubric".to_string(),
        ));
    }
    if name.chars().count() > RUBRIC_NAME_MAX_LEN {
        return Err(CoreError::Validation(format!(
            "The rubric name must be at most {RUBRIC_NAME_MAX_LEN} characters"
        )));
    }
    Ok(())
}

/// # Errors
///
/// Returns `CoreError::Validation` unless the id is all digits (3 to 10 of them).
pub fn validate_student_id(id: &str) -> Result<(), CoreError> {
    if STUDENT_ID.is_match(id) {
        Ok(())
    } else {
        Err(CoreError::Validation(
            "Student ID must be a number with at least 3 digits".to_string(),
        ))
    }
}

/// Build the school email address for a student:
/// first three letters of each name plus the last three digits of the id.
#[must_use]
pub fn school_email(first_name: &str, last_name: &str, student_id: &str, domain: &str) -> String {
    let first: String = first_name.chars().take(3).collect();
    let last: String = last_name.chars().take(3).collect();
    let digits: Vec<char> = student_id.chars().collect();
    let tail: String = digits[digits.len().saturating_sub(3)..].iter().collect();
    format!("{first}{last}{tail}@{domain}").to_lowercase()
}

/// Name for a duplicated rubric. Returns the name and whether it had to fall
/// back to the generic one because the copy prefix made it too long.
#[must_use]
pub fn copy_name(original: &str) -> (String, bool) {
    let candidate = format!("Copy of {original}");
    if candidate.chars().count() > RUBRIC_NAME_MAX_LEN {
        ("New Rubric".to_string(), true)
    } else {
        (candidate, false)
    }
}
