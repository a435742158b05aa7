//! Review repository: the state machine's writes and the review listings.
//!
//! Each transition loads the actor and the review inside the write
//! transaction, asks `cr_core::transition` whether the edge is open, and
//! applies it. Events are dispatched only after commit.

use chrono::Utc;

use cr_core::entities::{Review, User};
use cr_core::enums::{ReviewEventKind, Session};
use cr_core::events::{ReviewEvent, recipients_for};
use cr_core::grading::ScoreFraction;
use cr_core::ids::PREFIX_REVIEW;
use cr_core::responses::{HomeDashboard, InstructorDashboard, Page, ReviewDetail, SessionReviews};
use cr_core::transition;
use cr_core::validation::validate_schoology_id;

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, parse_datetime, parse_enum, parse_optional_datetime, query_count};
use crate::repos::grading::{fetch_scored_rows, sync_review_scores};
use crate::repos::rubric::load_rubric;
use crate::repos::user::{instructors, load_user, reviewers_in_session};
use crate::service::ReviewService;
use crate::updates::review::ReviewUpdate;

const SELECT_COLS: &str = "rv.id, rv.student_id, u.session, rv.reviewer_id, rv.schoology_id, \
     rv.status, rv.rubric_id, rv.additional_comments, rv.date_created, rv.date_completed";

const FROM_JOINED: &str = "FROM reviews rv JOIN users u ON u.id = rv.student_id";

/// Most recently completed first, then most recently requested.
const ORDER_BY: &str = "ORDER BY rv.date_completed DESC, rv.date_created DESC, rv.rowid DESC";

const INVALID_RUBRIC_MESSAGE: &str = "Select a valid rubric";

fn row_to_review(row: &libsql::Row) -> Result<Review, DatabaseError> {
    Ok(Review {
        id: row.get(0)?,
        student_id: row.get(1)?,
        student_session: parse_enum(&row.get::<String>(2)?)?,
        reviewer_id: get_opt_string(row, 3)?,
        schoology_id: row.get(4)?,
        status: parse_enum(&row.get::<String>(5)?)?,
        rubric_id: row.get(6)?,
        additional_comments: row.get(7)?,
        date_created: parse_datetime(&row.get::<String>(8)?)?,
        date_completed: parse_optional_datetime(get_opt_string(row, 9)?.as_deref())?,
    })
}

/// Run `SELECT ... WHERE {filter} ORDER BY ... {tail}`.
async fn select_reviews(
    conn: &libsql::Connection,
    filter: &str,
    tail: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<Review>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {SELECT_COLS} {FROM_JOINED} WHERE {filter} {ORDER_BY} {tail}"),
            params,
        )
        .await?;
    let mut reviews = Vec::new();
    while let Some(row) = rows.next().await? {
        reviews.push(row_to_review(&row)?);
    }
    Ok(reviews)
}

async fn query_reviews(
    conn: &libsql::Connection,
    filter: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<Review>, DatabaseError> {
    select_reviews(conn, filter, "", params).await
}

pub(crate) async fn load_review(conn: &libsql::Connection, id: &str) -> Result<Review, DatabaseError> {
    query_reviews(conn, "rv.id = ?1", [id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| DatabaseError::not_found("review", id))
}

/// Open and assigned reviews a student has requested.
async fn count_active_requests(
    conn: &libsql::Connection,
    student_id: &str,
) -> Result<usize, DatabaseError> {
    let count = query_count(
        conn,
        "SELECT COUNT(*) FROM reviews WHERE student_id = ?1 AND status IN ('open', 'assigned')",
        [student_id],
    )
    .await?;
    Ok(usize::try_from(count).unwrap_or(usize::MAX))
}

/// Reviews a reviewer currently holds.
async fn count_claimed(conn: &libsql::Connection, reviewer_id: &str) -> Result<usize, DatabaseError> {
    let count = query_count(
        conn,
        "SELECT COUNT(*) FROM reviews WHERE reviewer_id = ?1 AND status = 'assigned'",
        [reviewer_id],
    )
    .await?;
    Ok(usize::try_from(count).unwrap_or(usize::MAX))
}

async fn rubric_exists(conn: &libsql::Connection, rubric_id: &str) -> Result<bool, DatabaseError> {
    Ok(query_count(conn, "SELECT COUNT(*) FROM rubrics WHERE id = ?1", [rubric_id]).await? > 0)
}

/// Assemble the event for a transition that just happened.
pub(crate) async fn build_event(
    conn: &libsql::Connection,
    kind: ReviewEventKind,
    review: &Review,
    recipients: &[User],
) -> Result<ReviewEvent, DatabaseError> {
    let student = load_user(conn, &review.student_id).await?;
    let reviewer = match review.reviewer_id.as_deref() {
        Some(id) => Some(load_user(conn, id).await?.display_name()),
        None => None,
    };
    Ok(ReviewEvent {
        kind,
        review_id: review.id.clone(),
        schoology_id: review.schoology_id.clone(),
        session: review.student_session,
        student: student.display_name(),
        reviewer,
        recipients: recipients_for(recipients),
    })
}

pub(crate) async fn review_detail(
    conn: &libsql::Connection,
    review: Review,
) -> Result<ReviewDetail, DatabaseError> {
    let rubric = load_rubric(conn, &review.rubric_id).await?;
    let scored_rows = fetch_scored_rows(conn, &review.id).await?;
    let score_fraction =
        ScoreFraction::for_review(&review, &rubric, &scored_rows).map(|f| f.to_string());
    Ok(ReviewDetail {
        review,
        rubric,
        scored_rows,
        score_fraction,
    })
}

/// Log a rejected transition on its way out.
fn rejected(err: DatabaseError, actor_id: &str, review_id: &str) -> DatabaseError {
    if let DatabaseError::Transition(e) = &err {
        tracing::warn!(actor = actor_id, review = review_id, reason = %e, "transition rejected");
    }
    err
}

impl ReviewService {
    /// A student requests a review.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Validation` for a malformed assignment id or
    /// unknown rubric, `Transition(CapacityExceeded)` at the request limit.
    pub async fn create_review(
        &self,
        actor_id: &str,
        schoology_id: &str,
        rubric_id: &str,
    ) -> Result<Review, DatabaseError> {
        validate_schoology_id(schoology_id)?;

        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let actor = load_user(conn, actor_id).await?;
            if !rubric_exists(conn, rubric_id).await? {
                return Err(DatabaseError::Validation(INVALID_RUBRIC_MESSAGE.to_string()));
            }
            let active = count_active_requests(conn, &actor.id).await?;
            let status = transition::create(&actor, active, self.settings().limits)?;

            let id = crate::generate_id(conn, PREFIX_REVIEW).await?;
            conn.execute(
                "INSERT INTO reviews (id, student_id, schoology_id, status, rubric_id, date_created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                libsql::params![
                    id.as_str(),
                    actor.id.as_str(),
                    schoology_id,
                    status.as_str(),
                    rubric_id,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;
            let review = load_review(conn, &id).await?;

            let recipients = reviewers_in_session(conn, actor.session, Some(&actor.id)).await?;
            let event = build_event(conn, ReviewEventKind::Created, &review, &recipients).await?;
            Ok((review, event))
        }
        .await;
        let (review, event) = tx
            .finish(result)
            .await
            .map_err(|e| rejected(e, actor_id, "new"))?;

        tracing::info!(review = %review.id, student = actor_id, "review created");
        self.notify(&event);
        Ok(review)
    }

    /// Change the assignment id or rubric of an active review. Switching
    /// rubric on a review that already has scores re-aligns them.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Transition` when the actor may not edit or the
    /// review is closed, `Validation` for bad field values.
    pub async fn update_review(
        &self,
        actor_id: &str,
        review_id: &str,
        update: ReviewUpdate,
    ) -> Result<Review, DatabaseError> {
        if let Some(schoology_id) = update.schoology_id.as_deref() {
            validate_schoology_id(schoology_id)?;
        }

        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let actor = load_user(conn, actor_id).await?;
            let review = load_review(conn, review_id).await?;
            transition::edit(&actor, &review)?;

            if let Some(schoology_id) = update.schoology_id.as_deref() {
                conn.execute(
                    "UPDATE reviews SET schoology_id = ?1 WHERE id = ?2",
                    libsql::params![schoology_id, review_id],
                )
                .await?;
            }
            if let Some(rubric_id) = update.rubric_id.as_deref()
                && rubric_id != review.rubric_id
            {
                if !rubric_exists(conn, rubric_id).await? {
                    return Err(DatabaseError::Validation(INVALID_RUBRIC_MESSAGE.to_string()));
                }
                conn.execute(
                    "UPDATE reviews SET rubric_id = ?1 WHERE id = ?2",
                    libsql::params![rubric_id, review_id],
                )
                .await?;
                if !fetch_scored_rows(conn, review_id).await?.is_empty() {
                    let rubric = load_rubric(conn, rubric_id).await?;
                    sync_review_scores(conn, review_id, &rubric).await?;
                }
            }
            load_review(conn, review_id).await
        }
        .await;
        let review = tx
            .finish(result)
            .await
            .map_err(|e| rejected(e, actor_id, review_id))?;

        tracing::info!(review = review_id, actor = actor_id, "review updated");
        Ok(review)
    }

    /// The owning student withdraws an active request.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Transition` unless the owner of an active review.
    pub async fn cancel_review(&self, actor_id: &str, review_id: &str) -> Result<(), DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let actor = load_user(conn, actor_id).await?;
            let review = load_review(conn, review_id).await?;
            transition::cancel(&actor, &review)?;
            conn.execute("DELETE FROM reviews WHERE id = ?1", [review_id])
                .await?;
            Ok(())
        }
        .await;
        tx.finish(result)
            .await
            .map_err(|e| rejected(e, actor_id, review_id))?;
        tracing::info!(review = review_id, actor = actor_id, "review cancelled");
        Ok(())
    }

    /// An instructor deletes a review in any status.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Transition(Forbidden)` (403) for non-instructors,
    /// `NotFound` for an unknown review.
    pub async fn delete_review(&self, actor_id: &str, review_id: &str) -> Result<(), DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let actor = load_user(conn, actor_id).await?;
            transition::delete(&actor)?;
            let deleted = conn
                .execute("DELETE FROM reviews WHERE id = ?1", [review_id])
                .await?;
            if deleted == 0 {
                return Err(DatabaseError::not_found("review", review_id));
            }
            Ok(())
        }
        .await;
        tx.finish(result)
            .await
            .map_err(|e| rejected(e, actor_id, review_id))?;
        tracing::info!(review = review_id, actor = actor_id, "review deleted");
        Ok(())
    }

    /// A reviewer takes an open review from their session.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Transition`: `CapacityExceeded` at the claim
    /// limit, otherwise a 404-class rejection.
    pub async fn claim_review(&self, actor_id: &str, review_id: &str) -> Result<Review, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let actor = load_user(conn, actor_id).await?;
            let review = load_review(conn, review_id).await?;
            let claimed = count_claimed(conn, &actor.id).await?;
            let status = transition::claim(&actor, &review, claimed, self.settings().limits)?;

            conn.execute(
                "UPDATE reviews SET status = ?1, reviewer_id = ?2 WHERE id = ?3",
                libsql::params![status.as_str(), actor.id.as_str(), review_id],
            )
            .await?;
            let review = load_review(conn, review_id).await?;

            let recipients = instructors(conn).await?;
            let event = build_event(conn, ReviewEventKind::Claimed, &review, &recipients).await?;
            Ok((review, event))
        }
        .await;
        let (review, event) = tx
            .finish(result)
            .await
            .map_err(|e| rejected(e, actor_id, review_id))?;

        tracing::info!(review = review_id, reviewer = actor_id, "review claimed");
        self.notify(&event);
        Ok(review)
    }

    /// Hand an assigned review back to the pool. Draft scores are discarded.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Transition` unless the review is assigned and
    /// the actor is its reviewer or an instructor.
    pub async fn abandon_review(&self, actor_id: &str, review_id: &str) -> Result<Review, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let actor = load_user(conn, actor_id).await?;
            let review = load_review(conn, review_id).await?;
            let status = transition::abandon(&actor, &review)?;

            conn.execute("DELETE FROM scored_rows WHERE review_id = ?1", [review_id])
                .await?;
            conn.execute(
                "UPDATE reviews SET status = ?1, reviewer_id = NULL WHERE id = ?2",
                libsql::params![status.as_str(), review_id],
            )
            .await?;
            load_review(conn, review_id).await
        }
        .await;
        let review = tx
            .finish(result)
            .await
            .map_err(|e| rejected(e, actor_id, review_id))?;

        tracing::info!(review = review_id, actor = actor_id, "review abandoned");
        Ok(review)
    }

    /// A review with its rubric and scores, if the actor may see it.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` for an unknown review and
    /// `Transition(Forbidden)` (also 404) for one the actor may not see.
    pub async fn get_review(&self, actor_id: &str, review_id: &str) -> Result<ReviewDetail, DatabaseError> {
        let read = self.db().read().await;
        let conn = read.conn();
        let actor = load_user(conn, actor_id).await?;
        let review = load_review(conn, review_id).await?;
        transition::view(&actor, &review)?;
        review_detail(conn, review).await
    }

    /// The lists shown on a user's home page.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a query fails.
    pub async fn home_dashboard(&self, actor_id: &str) -> Result<HomeDashboard, DatabaseError> {
        let read = self.db().read().await;
        let conn = read.conn();
        let actor = load_user(conn, actor_id).await?;

        let active = query_reviews(
            conn,
            "rv.student_id = ?1 AND rv.status IN ('open', 'assigned')",
            [actor_id],
        )
        .await?;
        let completed = query_reviews(
            conn,
            "(rv.student_id = ?1 OR rv.reviewer_id = ?1) AND rv.status = 'closed'",
            [actor_id],
        )
        .await?;

        let (claimable, assigned) = if actor.is_reviewer {
            let claimable = query_reviews(
                conn,
                "rv.status = 'open' AND u.session = ?1 AND rv.student_id != ?2",
                libsql::params![actor.session.as_str(), actor_id],
            )
            .await?;
            let assigned = query_reviews(
                conn,
                "rv.status = 'assigned' AND rv.reviewer_id = ?1",
                [actor_id],
            )
            .await?;
            (claimable, assigned)
        } else {
            (Vec::new(), Vec::new())
        };

        Ok(HomeDashboard {
            active,
            completed,
            claimable,
            assigned,
        })
    }

    /// Every review, active and completed, split by the student's session.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Forbidden` for non-instructors.
    pub async fn instructor_dashboard(&self, actor_id: &str) -> Result<InstructorDashboard, DatabaseError> {
        let read = self.db().read().await;
        let conn = read.conn();
        let actor = load_user(conn, actor_id).await?;
        if !actor.is_superuser {
            return Err(DatabaseError::instructor_only("The instructor overview"));
        }

        let mut dashboard = InstructorDashboard::default();
        for session in Session::ALL {
            let reviews = SessionReviews {
                active: query_reviews(
                    conn,
                    "u.session = ?1 AND rv.status IN ('open', 'assigned')",
                    [session.as_str()],
                )
                .await?,
                completed: query_reviews(
                    conn,
                    "u.session = ?1 AND rv.status = 'closed'",
                    [session.as_str()],
                )
                .await?,
            };
            match session {
                Session::Am => dashboard.am = reviews,
                Session::Pm => dashboard.pm = reviews,
            }
        }
        Ok(dashboard)
    }

    /// Completed reviews, one page at a time. Instructors browse a whole
    /// session (AM unless given); everyone else sees the reviews they took
    /// part in.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` for an unknown session code or a page
    /// past the end.
    pub async fn completed_reviews(
        &self,
        actor_id: &str,
        session: Option<&str>,
        page: u32,
    ) -> Result<Page<Review>, DatabaseError> {
        let read = self.db().read().await;
        let conn = read.conn();
        let actor = load_user(conn, actor_id).await?;
        let page_size = self.settings().page_size;

        let (filter, key) = if actor.is_superuser {
            let session = match session {
                None => Session::Am,
                Some(code) => {
                    Session::from_code(code).ok_or_else(|| DatabaseError::not_found("session", code))?
                }
            };
            ("u.session = ?1", session.as_str().to_string())
        } else {
            ("(rv.student_id = ?1 OR rv.reviewer_id = ?1)", actor.id.clone())
        };
        let filter = format!("rv.status = 'closed' AND {filter}");

        let total = query_count(
            conn,
            &format!("SELECT COUNT(*) {FROM_JOINED} WHERE {filter}"),
            [key.as_str()],
        )
        .await?;
        let last_page = total.div_ceil(u64::from(page_size.max(1))).max(1);
        if page == 0 || u64::from(page) > last_page {
            return Err(DatabaseError::not_found("page", page.to_string()));
        }

        let offset = i64::from(page - 1) * i64::from(page_size);
        let items = select_reviews(
            conn,
            &filter,
            "LIMIT ?2 OFFSET ?3",
            libsql::params![key.as_str(), i64::from(page_size), offset],
        )
        .await?;

        Ok(Page {
            items,
            page,
            page_size,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{
        assigned_review, instructor, open_review, reviewer, student, test_rubric, test_service,
        test_service_with_notifier, test_service_with_settings,
    };
    use crate::service::ServiceSettings;
    use crate::updates::review::ReviewUpdateBuilder;
    use cr_core::enums::ReviewStatus;
    use cr_core::transition::TransitionError;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn create_opens_review_and_notifies_session_reviewers() {
        let (svc, notifier) = test_service_with_notifier().await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = reviewer(&svc, "sam", Session::Am).await;
        let same = reviewer(&svc, "rae", Session::Am).await;
        reviewer(&svc, "pat", Session::Pm).await;

        let review = open_review(&svc, &s, &rubric).await;
        assert_eq!(review.status, ReviewStatus::Open);
        assert_eq!(review.student_id, s.id);
        assert_eq!(review.reviewer_id, None);
        assert_eq!(review.student_session, Session::Am);

        let events = notifier.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ReviewEventKind::Created);
        let ids: Vec<_> = events[0].recipients.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(ids, [same.id.as_str()], "creator and other session excluded");
        assert_eq!(events[0].subject(), "AM | Review created by Test sam");
    }

    #[tokio::test]
    async fn create_rejects_malformed_schoology_id() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        let err = svc.create_review(&s.id, "123456", &rubric.id).await.unwrap_err();
        assert_eq!(err.status_code(), 200);
        assert_eq!(
            err.user_messages(),
            vec!["Schoology ID should be in format: XX.XX.XX where X'es are numbers".to_string()]
        );
        assert!(svc.create_review(&s.id, "12.34.56", &rubric.id).await.is_ok());
    }

    #[tokio::test]
    async fn create_rejects_unknown_rubric() {
        let svc = test_service().await;
        let s = student(&svc, "sam", Session::Am).await;
        let err = svc.create_review(&s.id, "12.34.56", "rub-none").await.unwrap_err();
        assert_eq!(err.user_messages(), vec![INVALID_RUBRIC_MESSAGE.to_string()]);
    }

    #[tokio::test]
    async fn third_request_exceeds_capacity() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        open_review(&svc, &s, &rubric).await;
        open_review(&svc, &s, &rubric).await;

        let err = svc.create_review(&s.id, "12.34.56", &rubric.id).await.unwrap_err();
        assert_eq!(err.status_code(), 200);
        assert_eq!(
            err.user_messages(),
            vec!["You can only have 2 requested reviews at once.".to_string()]
        );
        assert_eq!(svc.home_dashboard(&s.id).await.unwrap().active.len(), 2);
    }

    #[tokio::test]
    async fn request_limit_follows_settings() {
        let settings = ServiceSettings {
            limits: transition::ReviewLimits {
                max_open_requests: 1,
                max_claimed: 1,
            },
            ..ServiceSettings::default()
        };
        let (svc, _) = test_service_with_settings(settings).await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        open_review(&svc, &s, &rubric).await;
        let err = svc.create_review(&s.id, "12.34.56", &rubric.id).await.unwrap_err();
        assert_eq!(
            err.user_messages(),
            vec!["You can only have 1 requested reviews at once.".to_string()]
        );
    }

    #[tokio::test]
    async fn claim_assigns_and_notifies_instructors() {
        let (svc, notifier) = test_service_with_notifier().await;
        let (staff, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Pm).await;
        let r = reviewer(&svc, "rae", Session::Pm).await;
        let review = open_review(&svc, &s, &rubric).await;
        notifier.clear();

        let claimed = svc.claim_review(&r.id, &review.id).await.unwrap();
        assert_eq!(claimed.status, ReviewStatus::Assigned);
        assert_eq!(claimed.reviewer_id.as_deref(), Some(r.id.as_str()));

        let events = notifier.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ReviewEventKind::Claimed);
        assert_eq!(events[0].recipients[0].user_id, staff.id);
        assert_eq!(events[0].subject(), "PM | Review accepted by Test rae");
    }

    #[tokio::test]
    async fn cross_session_claim_fails() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        let r = reviewer(&svc, "rae", Session::Pm).await;
        let review = open_review(&svc, &s, &rubric).await;

        let err = svc.claim_review(&r.id, &review.id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        let fresh = svc.get_review(&s.id, &review.id).await.unwrap().review;
        assert_eq!(fresh.status, ReviewStatus::Open);
    }

    #[tokio::test]
    async fn non_reviewer_cannot_claim() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        let other = student(&svc, "oli", Session::Am).await;
        let review = open_review(&svc, &s, &rubric).await;
        let err = svc.claim_review(&other.id, &review.id).await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Transition(TransitionError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn reviewer_cannot_claim_own_request() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let r = reviewer(&svc, "rae", Session::Am).await;
        let own = open_review(&svc, &r, &rubric).await;

        let err = svc.claim_review(&r.id, &own.id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
        let fresh = svc.get_review(&r.id, &own.id).await.unwrap().review;
        assert_eq!(fresh.status, ReviewStatus::Open);
        assert!(fresh.reviewer_id.is_none());
    }

    #[tokio::test]
    async fn third_claim_exceeds_capacity() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let a = student(&svc, "a", Session::Am).await;
        let b = student(&svc, "b", Session::Am).await;
        let r = reviewer(&svc, "rae", Session::Am).await;
        assigned_review(&svc, &a, &r, &rubric).await;
        assigned_review(&svc, &a, &r, &rubric).await;
        let third = open_review(&svc, &b, &rubric).await;

        let err = svc.claim_review(&r.id, &third.id).await.unwrap_err();
        assert_eq!(err.status_code(), 200);
        assert_eq!(
            err.user_messages(),
            vec!["You can only have 2 claimed reviews at once".to_string()]
        );
    }

    #[tokio::test]
    async fn reclaiming_assigned_review_fails() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        let r1 = reviewer(&svc, "rae", Session::Am).await;
        let r2 = reviewer(&svc, "ray", Session::Am).await;
        let review = assigned_review(&svc, &s, &r1, &rubric).await;

        let err = svc.claim_review(&r2.id, &review.id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn concurrent_claims_yield_one_winner() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        let r1 = reviewer(&svc, "rae", Session::Am).await;
        let r2 = reviewer(&svc, "ray", Session::Am).await;
        let review = open_review(&svc, &s, &rubric).await;

        let (first, second) = tokio::join!(
            svc.claim_review(&r1.id, &review.id),
            svc.claim_review(&r2.id, &review.id)
        );
        assert_eq!(
            usize::from(first.is_ok()) + usize::from(second.is_ok()),
            1,
            "exactly one claim wins"
        );
    }

    #[tokio::test]
    async fn abandon_returns_review_to_pool() {
        let (svc, notifier) = test_service_with_notifier().await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        let r = reviewer(&svc, "rae", Session::Am).await;
        let review = assigned_review(&svc, &s, &r, &rubric).await;
        svc.save_draft_grade(&r.id, &review.id, &[5.0, 2.0], "draft")
            .await
            .unwrap();
        notifier.clear();

        let err = svc.abandon_review(&s.id, &review.id).await.unwrap_err();
        assert_eq!(err.status_code(), 404, "students cannot abandon");

        let open = svc.abandon_review(&r.id, &review.id).await.unwrap();
        assert_eq!(open.status, ReviewStatus::Open);
        assert_eq!(open.reviewer_id, None);
        let detail = svc.get_review(&s.id, &review.id).await.unwrap();
        assert!(detail.scored_rows.is_empty(), "drafts are discarded");
        assert!(notifier.events().is_empty());

        let err = svc.abandon_review(&r.id, &review.id).await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Transition(TransitionError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn cancel_is_for_the_owner() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        let r = reviewer(&svc, "rae", Session::Am).await;
        let review = assigned_review(&svc, &s, &r, &rubric).await;

        assert_eq!(svc.cancel_review(&r.id, &review.id).await.unwrap_err().status_code(), 404);
        svc.cancel_review(&s.id, &review.id).await.unwrap();
        let err = svc.get_review(&s.id, &review.id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn delete_is_instructor_only() {
        let svc = test_service().await;
        let (staff, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        let review = open_review(&svc, &s, &rubric).await;

        assert_eq!(svc.delete_review(&s.id, &review.id).await.unwrap_err().status_code(), 403);
        svc.delete_review(&staff.id, &review.id).await.unwrap();
        assert_eq!(
            svc.delete_review(&staff.id, &review.id).await.unwrap_err().status_code(),
            404
        );
    }

    #[tokio::test]
    async fn strangers_cannot_view() {
        let svc = test_service().await;
        let (staff, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        let stranger = student(&svc, "sid", Session::Am).await;
        let review = open_review(&svc, &s, &rubric).await;

        assert_eq!(svc.get_review(&stranger.id, &review.id).await.unwrap_err().status_code(), 404);
        let detail = svc.get_review(&staff.id, &review.id).await.unwrap();
        assert_eq!(detail.rubric.id, rubric.id);
        assert_eq!(detail.score_fraction, None);
    }

    #[tokio::test]
    async fn edit_changes_fields_until_closed() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        let r = reviewer(&svc, "rae", Session::Am).await;
        let review = assigned_review(&svc, &s, &r, &rubric).await;

        let edited = svc
            .update_review(
                &s.id,
                &review.id,
                ReviewUpdateBuilder::new().schoology_id("99.88.77").build(),
            )
            .await
            .unwrap();
        assert_eq!(edited.schoology_id, "99.88.77");

        let err = svc
            .update_review(&r.id, &review.id, ReviewUpdateBuilder::new().schoology_id("11.11.11").build())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404, "reviewers cannot edit the request");

        svc.grade_review(&r.id, &review.id, &[5.0, 2.0], "").await.unwrap();
        let err = svc
            .update_review(&s.id, &review.id, ReviewUpdateBuilder::new().schoology_id("11.11.11").build())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Transition(TransitionError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn home_dashboard_lists() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let s = student(&svc, "sam", Session::Am).await;
        let r = reviewer(&svc, "rae", Session::Am).await;
        let other = student(&svc, "oli", Session::Pm).await;

        let taken = assigned_review(&svc, &s, &r, &rubric).await;
        let waiting = open_review(&svc, &s, &rubric).await;
        open_review(&svc, &other, &rubric).await;
        open_review(&svc, &r, &rubric).await;

        let home = svc.home_dashboard(&r.id).await.unwrap();
        let claimable: Vec<_> = home.claimable.iter().map(|rv| rv.id.as_str()).collect();
        assert_eq!(claimable, [waiting.id.as_str()], "same session, not own");
        assert_eq!(home.assigned.len(), 1);
        assert_eq!(home.assigned[0].id, taken.id);

        let home = svc.home_dashboard(&s.id).await.unwrap();
        assert_eq!(home.active.len(), 2);
        assert!(home.claimable.is_empty());
    }

    #[tokio::test]
    async fn instructor_dashboard_partitions_sessions() {
        let svc = test_service().await;
        let (staff, rubric) = test_rubric(&svc).await;
        let am = student(&svc, "am", Session::Am).await;
        let pm = student(&svc, "pm", Session::Pm).await;
        let r = reviewer(&svc, "rae", Session::Pm).await;
        open_review(&svc, &am, &rubric).await;
        let graded = assigned_review(&svc, &pm, &r, &rubric).await;
        svc.grade_review(&r.id, &graded.id, &[10.0, 2.0], "").await.unwrap();

        let dashboard = svc.instructor_dashboard(&staff.id).await.unwrap();
        assert_eq!(dashboard.session(Session::Am).active.len(), 1);
        assert!(dashboard.session(Session::Am).completed.is_empty());
        assert!(dashboard.session(Session::Pm).active.is_empty());
        assert_eq!(dashboard.session(Session::Pm).completed.len(), 1);

        let err = svc.instructor_dashboard(&am.id).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn completed_reviews_paginate() {
        let settings = ServiceSettings {
            page_size: 2,
            ..ServiceSettings::default()
        };
        let (svc, _) = test_service_with_settings(settings).await;
        let (staff, rubric) = test_rubric(&svc).await;
        let r = reviewer(&svc, "rae", Session::Am).await;
        for name in ["a", "b", "c"] {
            let s = student(&svc, name, Session::Am).await;
            let review = assigned_review(&svc, &s, &r, &rubric).await;
            svc.grade_review(&r.id, &review.id, &[5.0, 2.0], "").await.unwrap();
        }

        let first = svc.completed_reviews(&staff.id, None, 1).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert_eq!(first.total, 3);
        assert!(first.has_next());
        let second = svc.completed_reviews(&staff.id, Some("AM"), 2).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(!second.has_next());

        let pm = svc.completed_reviews(&staff.id, Some("PM"), 1).await.unwrap();
        assert_eq!(pm.total, 0);

        assert_eq!(svc.completed_reviews(&staff.id, Some("XX"), 1).await.unwrap_err().status_code(), 404);
        assert_eq!(svc.completed_reviews(&staff.id, None, 3).await.unwrap_err().status_code(), 404);
        assert_eq!(svc.completed_reviews(&staff.id, None, 0).await.unwrap_err().status_code(), 404);

        let mine = svc.completed_reviews(&r.id, Some("PM"), 1).await.unwrap();
        assert_eq!(mine.total, 3, "non-instructors ignore the session filter");
    }

    #[tokio::test]
    async fn instructor_home_dashboard_is_empty() {
        let svc = test_service().await;
        let staff = instructor(&svc, "teach").await;
        let home = svc.home_dashboard(&staff.id).await.unwrap();
        assert_eq!(home, HomeDashboard::default());
    }
}
