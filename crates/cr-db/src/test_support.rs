//! Shared test utilities for cr-db tests.

#[cfg(test)]
pub(crate) mod helpers {
    use std::sync::Arc;

    use cr_core::entities::{Review, Rubric, User};
    use cr_core::enums::Session;
    use cr_core::events::RecordingNotifier;

    use crate::ReviewDb;
    use crate::repos::user::NewUser;
    use crate::service::{ReviewService, ServiceSettings};

    /// Two rows: cells [10, 5] and [2, 1]. Max score 12.
    pub const TEST_RUBRIC_JSON: &str = r#"[
        {"name": "row 1", "description": "row desc 1", "cells": [
            {"score": 10, "description": "cell 1"},
            {"score": 5, "description": "cell 2"}
        ]},
        {"name": "row 2", "description": "row desc 2", "cells": [
            {"score": 2, "description": "cell 1"},
            {"score": 1, "description": "cell 2"}
        ]}
    ]"#;

    /// Create an in-memory ReviewService with default settings.
    pub async fn test_service() -> ReviewService {
        test_service_with_notifier().await.0
    }

    /// Create an in-memory ReviewService that records every event it dispatches.
    pub async fn test_service_with_notifier() -> (ReviewService, Arc<RecordingNotifier>) {
        test_service_with_settings(ServiceSettings::default()).await
    }

    pub async fn test_service_with_settings(
        settings: ServiceSettings,
    ) -> (ReviewService, Arc<RecordingNotifier>) {
        let db = ReviewDb::open_local(":memory:").await.unwrap();
        let notifier = Arc::new(RecordingNotifier::new());
        let svc = ReviewService::from_db(db, notifier.clone(), settings);
        (svc, notifier)
    }

    async fn user(svc: &ReviewService, username: &str, session: Session, reviewer: bool, superuser: bool) -> User {
        let mut new = NewUser::local(username, session);
        new.first_name = "Test".into();
        new.last_name = username.into();
        new.email = format!("{username}@example.org");
        new.is_reviewer = reviewer;
        new.is_superuser = superuser;
        svc.create_user(&new).await.unwrap()
    }

    pub async fn student(svc: &ReviewService, username: &str, session: Session) -> User {
        user(svc, username, session, false, false).await
    }

    pub async fn reviewer(svc: &ReviewService, username: &str, session: Session) -> User {
        user(svc, username, session, true, false).await
    }

    pub async fn instructor(svc: &ReviewService, username: &str) -> User {
        user(svc, username, Session::Am, false, true).await
    }

    /// The standard two-row rubric, created by a fresh instructor.
    pub async fn test_rubric(svc: &ReviewService) -> (User, Rubric) {
        let staff = instructor(svc, "rubric-admin").await;
        let rubric = svc
            .create_rubric(&staff.id, "Test Rubric", TEST_RUBRIC_JSON)
            .await
            .unwrap();
        (staff, rubric)
    }

    /// An open review requested by `student`.
    pub async fn open_review(svc: &ReviewService, student: &User, rubric: &Rubric) -> Review {
        svc.create_review(&student.id, "12.34.56", &rubric.id)
            .await
            .unwrap()
    }

    /// A review requested by `student` and claimed by `reviewer`.
    pub async fn assigned_review(
        svc: &ReviewService,
        student: &User,
        reviewer: &User,
        rubric: &Rubric,
    ) -> Review {
        let review = open_review(svc, student, rubric).await;
        svc.claim_review(&reviewer.id, &review.id).await.unwrap()
    }
}
