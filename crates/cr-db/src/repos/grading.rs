//! Grading repository: score vectors and scored-row reconciliation.

use chrono::Utc;

use cr_core::entities::{Rubric, ScoredRow};
use cr_core::enums::ReviewEventKind;
use cr_core::grading::{NOT_APPLICABLE, ScoreSyncPlan, plan_score_sync, validate_scores};
use cr_core::ids::PREFIX_SCORED_ROW;
use cr_core::responses::ReviewDetail;
use cr_core::transition;

use crate::error::DatabaseError;
use crate::helpers::get_u32;
use crate::repos::review::{build_event, load_review, review_detail};
use crate::repos::rubric::load_rubric;
use crate::repos::user::{instructors, load_user};
use crate::service::ReviewService;

const SELECT_COLS: &str = "id, review_id, row_id, row_index, score";

fn row_to_scored_row(row: &libsql::Row) -> Result<ScoredRow, DatabaseError> {
    Ok(ScoredRow {
        id: row.get(0)?,
        review_id: row.get(1)?,
        row_id: row.get(2)?,
        row_index: get_u32(row, 3)?,
        score: row.get(4)?,
    })
}

pub(crate) async fn fetch_scored_rows(
    conn: &libsql::Connection,
    review_id: &str,
) -> Result<Vec<ScoredRow>, DatabaseError> {
    let mut rows = conn
        .query(
            &format!("SELECT {SELECT_COLS} FROM scored_rows WHERE review_id = ?1 ORDER BY row_index"),
            [review_id],
        )
        .await?;
    let mut scored = Vec::new();
    while let Some(row) = rows.next().await? {
        scored.push(row_to_scored_row(&row)?);
    }
    Ok(scored)
}

/// Bring one review's scored rows in line with `rubric`: one per row, keyed
/// by index, scores that no longer name a cell reset to not-applicable.
/// Returns the plan that was applied.
pub(crate) async fn sync_review_scores(
    conn: &libsql::Connection,
    review_id: &str,
    rubric: &Rubric,
) -> Result<ScoreSyncPlan, DatabaseError> {
    let existing = fetch_scored_rows(conn, review_id).await?;
    let plan = plan_score_sync(rubric, &existing);
    if plan.is_empty() {
        return Ok(plan);
    }

    for id in &plan.delete {
        conn.execute("DELETE FROM scored_rows WHERE id = ?1", [id.as_str()])
            .await?;
    }
    for (id, row_id) in &plan.repoint {
        conn.execute(
            "UPDATE scored_rows SET row_id = ?1 WHERE id = ?2",
            libsql::params![row_id.as_str(), id.as_str()],
        )
        .await?;
    }
    for id in &plan.reset {
        conn.execute(
            "UPDATE scored_rows SET score = ?1 WHERE id = ?2",
            libsql::params![NOT_APPLICABLE, id.as_str()],
        )
        .await?;
    }
    for (row_id, index) in &plan.create {
        let id = crate::generate_id(conn, PREFIX_SCORED_ROW).await?;
        conn.execute(
            "INSERT INTO scored_rows (id, review_id, row_id, row_index, score) VALUES (?1, ?2, ?3, ?4, ?5)",
            libsql::params![
                id.as_str(),
                review_id,
                row_id.as_str(),
                i64::from(*index),
                NOT_APPLICABLE
            ],
        )
        .await?;
    }

    tracing::debug!(
        review = review_id,
        created = plan.create.len(),
        repointed = plan.repoint.len(),
        reset = plan.reset.len(),
        deleted = plan.delete.len(),
        "scored rows synced"
    );
    Ok(plan)
}

/// Write one scored row per rubric row, overwriting earlier drafts.
async fn write_scores(
    conn: &libsql::Connection,
    review_id: &str,
    rubric: &Rubric,
    scores: &[f64],
) -> Result<(), DatabaseError> {
    for (row, score) in rubric.rows.iter().zip(scores) {
        let id = crate::generate_id(conn, PREFIX_SCORED_ROW).await?;
        conn.execute(
            "INSERT INTO scored_rows (id, review_id, row_id, row_index, score)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (review_id, row_index)
             DO UPDATE SET row_id = excluded.row_id, score = excluded.score",
            libsql::params![
                id.as_str(),
                review_id,
                row.id.as_str(),
                i64::from(row.index),
                *score
            ],
        )
        .await?;
    }
    conn.execute(
        "DELETE FROM scored_rows WHERE review_id = ?1 AND row_index >= ?2",
        libsql::params![review_id, i64::try_from(rubric.rows.len()).unwrap_or(i64::MAX)],
    )
    .await?;
    Ok(())
}

impl ReviewService {
    /// Grade an assigned review and close it.
    ///
    /// Counts the review for both parties and tells the instructors.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Transition` unless the actor is the assigned
    /// reviewer of an assigned review, `Scores` when the vector does not fit
    /// the rubric. Nothing is written on error.
    pub async fn grade_review(
        &self,
        actor_id: &str,
        review_id: &str,
        scores: &[f64],
        comments: &str,
    ) -> Result<ReviewDetail, DatabaseError> {
        self.apply_grade(actor_id, review_id, scores, comments, true)
            .await
    }

    /// Save scores and comments without closing the review.
    ///
    /// # Errors
    ///
    /// Same as [`Self::grade_review`].
    pub async fn save_draft_grade(
        &self,
        actor_id: &str,
        review_id: &str,
        scores: &[f64],
        comments: &str,
    ) -> Result<ReviewDetail, DatabaseError> {
        self.apply_grade(actor_id, review_id, scores, comments, false)
            .await
    }

    async fn apply_grade(
        &self,
        actor_id: &str,
        review_id: &str,
        scores: &[f64],
        comments: &str,
        close: bool,
    ) -> Result<ReviewDetail, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let actor = load_user(conn, actor_id).await?;
            let review = load_review(conn, review_id).await?;
            let status = if close {
                transition::close(&actor, &review)?
            } else {
                transition::save_draft(&actor, &review)?
            };

            let rubric = load_rubric(conn, &review.rubric_id).await?;
            validate_scores(&rubric, scores)?;
            write_scores(conn, review_id, &rubric, scores).await?;

            if !close {
                conn.execute(
                    "UPDATE reviews SET additional_comments = ?1 WHERE id = ?2",
                    libsql::params![comments, review_id],
                )
                .await?;
                let review = load_review(conn, review_id).await?;
                return Ok((review_detail(conn, review).await?, None));
            }

            conn.execute(
                "UPDATE reviews SET status = ?1, additional_comments = ?2, date_completed = ?3
                 WHERE id = ?4",
                libsql::params![status.as_str(), comments, Utc::now().to_rfc3339(), review_id],
            )
            .await?;
            conn.execute(
                "UPDATE users SET reviews_done_as_reviewer = reviews_done_as_reviewer + 1 WHERE id = ?1",
                [actor_id],
            )
            .await?;
            conn.execute(
                "UPDATE users SET reviews_done_as_reviewee = reviews_done_as_reviewee + 1 WHERE id = ?1",
                [review.student_id.as_str()],
            )
            .await?;

            let review = load_review(conn, review_id).await?;
            let recipients = instructors(conn).await?;
            let event = build_event(conn, ReviewEventKind::Completed, &review, &recipients).await?;
            Ok((review_detail(conn, review).await?, Some(event)))
        }
        .await;
        let (detail, event) = tx.finish(result).await.inspect_err(|e| {
            if matches!(e, DatabaseError::Transition(_) | DatabaseError::Scores(_)) {
                tracing::warn!(actor = actor_id, review = review_id, error = %e, "grade rejected");
            }
        })?;

        match event {
            Some(event) => {
                tracing::info!(
                    review = review_id,
                    reviewer = actor_id,
                    score = detail.score_fraction.as_deref().unwrap_or_default(),
                    "review graded"
                );
                self.notify(&event);
            }
            None => tracing::info!(review = review_id, reviewer = actor_id, "draft saved"),
        }
        Ok(detail)
    }
}
