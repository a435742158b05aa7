use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::Session;

/// A local account. Directory-backed users have `has_usable_password` unset
/// and use the directory object GUID as `id`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_id: Option<String>,
    pub session: Session,
    pub is_reviewer: bool,
    /// Instructor flag.
    pub is_superuser: bool,
    pub has_usable_password: bool,
    pub receive_notifications: bool,
    pub reviews_done_as_reviewer: i64,
    pub reviews_done_as_reviewee: i64,
}

impl User {
    /// "First Last", or the username unless both names are on file.
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.first_name.is_empty() || self.last_name.is_empty() {
            self.username.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }

    /// Whether the user still has to enter a student id before using the app.
    #[must_use]
    pub const fn needs_setup(&self) -> bool {
        self.student_id.is_none() && !self.is_superuser
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(first: &str, last: &str) -> User {
        User {
            id: "usr-1".into(),
            username: "jdoe".into(),
            first_name: first.into(),
            last_name: last.into(),
            email: String::new(),
            student_id: None,
            session: Session::Am,
            is_reviewer: false,
            is_superuser: false,
            has_usable_password: false,
            receive_notifications: true,
            reviews_done_as_reviewer: 0,
            reviews_done_as_reviewee: 0,
        }
    }

    #[test]
    fn display_name_prefers_full_name() {
        assert_eq!(user("Jane", "Doe").display_name(), "Jane Doe");
        assert_eq!(user("Jane", "").display_name(), "jdoe");
        assert_eq!(user("", "").display_name(), "jdoe");
    }

    #[test]
    fn students_without_id_need_setup() {
        let mut u = user("Jane", "Doe");
        assert!(u.needs_setup());
        u.student_id = Some("123456".into());
        assert!(!u.needs_setup());
        u.student_id = None;
        u.is_superuser = true;
        assert!(!u.needs_setup());
    }
}
