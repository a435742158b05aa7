//! Rubric repository: the row/cell tree and its in-place reconciliation.
//!
//! A rubric is edited by handing over its whole JSON definition. Rows and
//! cells are matched by index: existing ones are overwritten, missing ones
//! created, and anything past the new length deleted. Row and rubric maxima
//! are recomputed in SQL afterwards so the stored totals always agree with
//! the stored cells.

use chrono::Utc;

use cr_core::entities::{Rubric, RubricCell, RubricRow, RubricSummary};
use cr_core::ids::{PREFIX_CELL, PREFIX_ROW, PREFIX_RUBRIC};
use cr_core::permissions;
use cr_core::responses::DuplicateResponse;
use cr_core::rubric_format::{RowDefinition, RubricDefinition, parse_rubric_json};
use cr_core::validation::{copy_name, validate_rubric_name};

use crate::error::DatabaseError;
use crate::helpers::{get_opt_string, get_u32};
use crate::repos::grading::sync_review_scores;
use crate::repos::user::load_user;
use crate::service::ReviewService;

const DUPLICATE_NAME_WARNING: &str =
    "The length of the name is too long; the rubric has been named \"New Rubric\"";

fn as_index(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub(crate) async fn load_rubric(conn: &libsql::Connection, id: &str) -> Result<Rubric, DatabaseError> {
    let mut rows = conn
        .query("SELECT id, name, max_score FROM rubrics WHERE id = ?1", [id])
        .await?;
    let head = rows
        .next()
        .await?
        .ok_or_else(|| DatabaseError::not_found("rubric", id))?;
    let mut rubric = Rubric {
        id: head.get(0)?,
        name: head.get(1)?,
        max_score: head.get(2)?,
        rows: Vec::new(),
    };

    let mut rows = conn
        .query(
            "SELECT r.id, r.idx, r.name, r.description, r.max_score,
                    c.id, c.idx, c.description, c.score
             FROM rubric_rows r
             LEFT JOIN rubric_cells c ON c.row_id = r.id
             WHERE r.rubric_id = ?1
             ORDER BY r.idx, c.idx",
            [id],
        )
        .await?;
    while let Some(row) = rows.next().await? {
        let row_id: String = row.get(0)?;
        if rubric.rows.last().is_none_or(|last| last.id != row_id) {
            rubric.rows.push(RubricRow {
                id: row_id,
                index: get_u32(&row, 1)?,
                name: row.get(2)?,
                description: row.get(3)?,
                max_score: row.get(4)?,
                cells: Vec::new(),
            });
        }
        if let Some(cell_id) = get_opt_string(&row, 5)?
            && let Some(current) = rubric.rows.last_mut()
        {
            current.cells.push(RubricCell {
                id: cell_id,
                index: get_u32(&row, 6)?,
                description: row.get(7)?,
                score: row.get(8)?,
            });
        }
    }
    Ok(rubric)
}

/// Get-or-create the row at `idx` and return its id.
async fn upsert_row(
    conn: &libsql::Connection,
    rubric_id: &str,
    idx: i64,
    def: &RowDefinition,
) -> Result<String, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT id FROM rubric_rows WHERE rubric_id = ?1 AND idx = ?2",
            libsql::params![rubric_id, idx],
        )
        .await?;
    if let Some(row) = rows.next().await? {
        let id: String = row.get(0)?;
        conn.execute(
            "UPDATE rubric_rows SET name = ?1, description = ?2 WHERE id = ?3",
            libsql::params![def.name.as_str(), def.description.as_str(), id.as_str()],
        )
        .await?;
        return Ok(id);
    }

    let id = crate::generate_id(conn, PREFIX_ROW).await?;
    conn.execute(
        "INSERT INTO rubric_rows (id, rubric_id, idx, name, description) VALUES (?1, ?2, ?3, ?4, ?5)",
        libsql::params![
            id.as_str(),
            rubric_id,
            idx,
            def.name.as_str(),
            def.description.as_str()
        ],
    )
    .await?;
    tracing::debug!(rubric = rubric_id, row = %id, idx, "rubric row created");
    Ok(id)
}

async fn upsert_cells(
    conn: &libsql::Connection,
    row_id: &str,
    def: &RowDefinition,
) -> Result<(), DatabaseError> {
    for (idx, cell) in (0_i64..).zip(&def.cells) {
        let updated = conn
            .execute(
                "UPDATE rubric_cells SET description = ?1, score = ?2 WHERE row_id = ?3 AND idx = ?4",
                libsql::params![cell.description.as_str(), cell.score, row_id, idx],
            )
            .await?;
        if updated == 0 {
            let id = crate::generate_id(conn, PREFIX_CELL).await?;
            conn.execute(
                "INSERT INTO rubric_cells (id, row_id, idx, description, score) VALUES (?1, ?2, ?3, ?4, ?5)",
                libsql::params![id.as_str(), row_id, idx, cell.description.as_str(), cell.score],
            )
            .await?;
        }
    }

    conn.execute(
        "DELETE FROM rubric_cells WHERE row_id = ?1 AND idx >= ?2",
        libsql::params![row_id, as_index(def.cells.len())],
    )
    .await?;
    conn.execute(
        "UPDATE rubric_rows
         SET max_score = COALESCE((SELECT MAX(score) FROM rubric_cells WHERE row_id = ?1), 0)
         WHERE id = ?1",
        [row_id],
    )
    .await?;
    Ok(())
}

/// Bring the stored tree in line with `definition` and recompute maxima.
/// Rows removed here take their scored rows with them.
async fn reconcile_tree(
    conn: &libsql::Connection,
    rubric_id: &str,
    definition: &RubricDefinition,
) -> Result<(), DatabaseError> {
    for (idx, row_def) in (0_i64..).zip(&definition.rows) {
        let row_id = upsert_row(conn, rubric_id, idx, row_def).await?;
        upsert_cells(conn, &row_id, row_def).await?;
    }

    let removed = conn
        .execute(
            "DELETE FROM rubric_rows WHERE rubric_id = ?1 AND idx >= ?2",
            libsql::params![rubric_id, as_index(definition.rows.len())],
        )
        .await?;
    if removed > 0 {
        tracing::debug!(rubric = rubric_id, removed, "rubric rows removed");
    }

    conn.execute(
        "UPDATE rubrics
         SET max_score = COALESCE((SELECT SUM(max_score) FROM rubric_rows WHERE rubric_id = ?1), 0),
             updated_at = ?2
         WHERE id = ?1",
        libsql::params![rubric_id, Utc::now().to_rfc3339()],
    )
    .await?;
    Ok(())
}

async fn insert_rubric(
    conn: &libsql::Connection,
    name: &str,
    definition: &RubricDefinition,
) -> Result<Rubric, DatabaseError> {
    let id = crate::generate_id(conn, PREFIX_RUBRIC).await?;
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO rubrics (id, name, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        libsql::params![id.as_str(), name, now.as_str(), now.as_str()],
    )
    .await?;
    reconcile_tree(conn, &id, definition).await?;
    load_rubric(conn, &id).await
}

async fn require_rubric_manager(
    conn: &libsql::Connection,
    actor_id: &str,
    operation: &str,
) -> Result<(), DatabaseError> {
    let actor = load_user(conn, actor_id).await?;
    if permissions::can_manage_rubrics(&actor) {
        Ok(())
    } else {
        Err(DatabaseError::instructor_only(operation))
    }
}

impl ReviewService {
    /// Validate and store a new rubric.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Forbidden` for non-instructors,
    /// `Validation` for a bad name and `Rubric` with every positional
    /// problem for a bad definition. Nothing is written on error.
    pub async fn create_rubric(
        &self,
        actor_id: &str,
        name: &str,
        rubric_json: &str,
    ) -> Result<Rubric, DatabaseError> {
        let name = name.trim();
        validate_rubric_name(name)?;
        let definition = parse_rubric_json(rubric_json)?;

        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            require_rubric_manager(conn, actor_id, "Creating rubrics").await?;
            insert_rubric(conn, name, &definition).await
        }
        .await;
        let rubric = tx.finish(result).await?;

        tracing::info!(rubric = %rubric.id, rows = rubric.row_count(), max = rubric.max_score, "rubric created");
        Ok(rubric)
    }

    /// Replace a rubric's name and definition in place, then bring every
    /// review already scored against it back in line.
    ///
    /// # Errors
    ///
    /// Same as [`Self::create_rubric`], plus `NotFound` for an unknown id.
    pub async fn update_rubric(
        &self,
        actor_id: &str,
        rubric_id: &str,
        name: &str,
        rubric_json: &str,
    ) -> Result<Rubric, DatabaseError> {
        let name = name.trim();
        validate_rubric_name(name)?;
        let definition = parse_rubric_json(rubric_json)?;

        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            require_rubric_manager(conn, actor_id, "Editing rubrics").await?;

            let renamed = conn
                .execute(
                    "UPDATE rubrics SET name = ?1 WHERE id = ?2",
                    libsql::params![name, rubric_id],
                )
                .await?;
            if renamed == 0 {
                return Err(DatabaseError::not_found("rubric", rubric_id));
            }
            reconcile_tree(conn, rubric_id, &definition).await?;
            let rubric = load_rubric(conn, rubric_id).await?;

            let mut rows = conn
                .query(
                    "SELECT DISTINCT s.review_id FROM scored_rows s
                     JOIN reviews r ON r.id = s.review_id
                     WHERE r.rubric_id = ?1",
                    [rubric_id],
                )
                .await?;
            let mut scored_reviews = Vec::new();
            while let Some(row) = rows.next().await? {
                scored_reviews.push(row.get::<String>(0)?);
            }
            let mut synced = 0_usize;
            for review_id in &scored_reviews {
                if !sync_review_scores(conn, review_id, &rubric).await?.is_empty() {
                    synced += 1;
                }
            }
            Ok((rubric, synced))
        }
        .await;
        let (rubric, synced) = tx.finish(result).await?;

        tracing::info!(rubric = %rubric.id, rows = rubric.row_count(), synced, "rubric updated");
        Ok(rubric)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` for an unknown id.
    pub async fn get_rubric(&self, id: &str) -> Result<Rubric, DatabaseError> {
        let read = self.db().read().await;
        load_rubric(read.conn(), id).await
    }

    /// Every rubric, by name.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn list_rubrics(&self) -> Result<Vec<RubricSummary>, DatabaseError> {
        let read = self.db().read().await;
        let mut rows = read
            .conn()
            .query(
                "SELECT r.id, r.name, r.max_score,
                        (SELECT COUNT(*) FROM rubric_rows WHERE rubric_id = r.id)
                 FROM rubrics r
                 ORDER BY r.name, r.id",
                (),
            )
            .await?;
        let mut summaries = Vec::new();
        while let Some(row) = rows.next().await? {
            summaries.push(RubricSummary {
                id: row.get(0)?,
                name: row.get(1)?,
                max_score: row.get(2)?,
                row_count: get_u32(&row, 3)?,
            });
        }
        Ok(summaries)
    }

    /// Delete a rubric along with every review that uses it.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Forbidden` for non-instructors, `NotFound` for
    /// an unknown id.
    pub async fn delete_rubric(&self, actor_id: &str, rubric_id: &str) -> Result<(), DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            require_rubric_manager(conn, actor_id, "Deleting rubrics").await?;
            let deleted = conn
                .execute("DELETE FROM rubrics WHERE id = ?1", [rubric_id])
                .await?;
            if deleted == 0 {
                return Err(DatabaseError::not_found("rubric", rubric_id));
            }
            Ok(())
        }
        .await;
        tx.finish(result).await?;
        tracing::info!(rubric = rubric_id, "rubric deleted");
        Ok(())
    }

    /// Copy a rubric's whole tree under a derived name.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Forbidden` for non-instructors, `NotFound` for
    /// an unknown id.
    pub async fn duplicate_rubric(
        &self,
        actor_id: &str,
        rubric_id: &str,
    ) -> Result<DuplicateResponse, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            require_rubric_manager(conn, actor_id, "Duplicating rubrics").await?;
            let source = load_rubric(conn, rubric_id).await?;
            let (name, fell_back) = copy_name(&source.name);
            let copy = insert_rubric(conn, &name, &source.to_definition()).await?;
            Ok((copy, fell_back))
        }
        .await;
        let (copy, fell_back) = tx.finish(result).await?;

        tracing::info!(source = rubric_id, copy = %copy.id, "rubric duplicated");
        Ok(DuplicateResponse {
            rubric: copy.summary(),
            warning: fell_back.then(|| DUPLICATE_NAME_WARNING.to_string()),
        })
    }

    /// The rubric's definition in its editor JSON form.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` for an unknown id.
    pub async fn export_rubric_json(&self, rubric_id: &str) -> Result<String, DatabaseError> {
        let rubric = self.get_rubric(rubric_id).await?;
        rubric
            .to_json()
            .map_err(|e| DatabaseError::Other(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{TEST_RUBRIC_JSON, instructor, student, test_rubric, test_service};
    use cr_core::enums::Session;
    use pretty_assertions::assert_eq;

    const SHRUNK_JSON: &str = r#"[
        {"name": "only row", "description": "renamed", "cells": [
            {"score": 4, "description": "single"}
        ]}
    ]"#;

    async fn count(svc: &ReviewService, table: &str) -> i64 {
        let mut rows = svc
            .db()
            .conn()
            .query(&format!("SELECT COUNT(*) FROM {table}"), ())
            .await
            .unwrap();
        rows.next().await.unwrap().unwrap().get(0).unwrap()
    }

    #[tokio::test]
    async fn create_computes_maxima() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;

        assert_eq!(rubric.name, "Test Rubric");
        assert_eq!(rubric.row_count(), 2);
        assert!((rubric.max_score - 12.0).abs() < f64::EPSILON);
        assert!((rubric.rows[0].max_score - 10.0).abs() < f64::EPSILON);
        assert!((rubric.rows[1].max_score - 2.0).abs() < f64::EPSILON);
        assert!(rubric.max_scores_consistent());
        assert_eq!(rubric.to_string(), "Test Rubric (12 points)");
    }

    #[tokio::test]
    async fn invalid_definition_writes_nothing() {
        let svc = test_service().await;
        let staff = instructor(&svc, "teach").await;
        let err = svc
            .create_rubric(
                &staff.id,
                "Broken",
                r#"[{"name": "", "description": "d", "cells": []}]"#,
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 200);
        assert_eq!(
            err.user_messages(),
            vec![
                "Please enter a name in row 1".to_string(),
                "Row 1 must have at least one cell".to_string(),
            ]
        );
        assert_eq!(count(&svc, "rubrics").await, 0);
    }

    #[tokio::test]
    async fn students_cannot_manage_rubrics() {
        let svc = test_service().await;
        let s = student(&svc, "sam", Session::Am).await;
        let err = svc
            .create_rubric(&s.id, "Mine", TEST_RUBRIC_JSON)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn overlong_name_is_rejected() {
        let svc = test_service().await;
        let staff = instructor(&svc, "teach").await;
        let err = svc
            .create_rubric(&staff.id, &"x".repeat(51), TEST_RUBRIC_JSON)
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Validation(_)));
    }

    #[tokio::test]
    async fn update_reconciles_in_place() {
        let svc = test_service().await;
        let (staff, rubric) = test_rubric(&svc).await;
        let first_row = rubric.rows[0].id.clone();

        let updated = svc
            .update_rubric(&staff.id, &rubric.id, "Shrunk", SHRUNK_JSON)
            .await
            .unwrap();

        assert_eq!(updated.name, "Shrunk");
        assert_eq!(updated.row_count(), 1);
        assert_eq!(updated.rows[0].id, first_row, "row at index 0 keeps its id");
        assert_eq!(updated.rows[0].description, "renamed");
        assert_eq!(updated.rows[0].cells.len(), 1);
        assert!((updated.max_score - 4.0).abs() < f64::EPSILON);
        assert!(updated.max_scores_consistent());
        assert_eq!(count(&svc, "rubric_rows").await, 1);
        assert_eq!(count(&svc, "rubric_cells").await, 1);
    }

    #[tokio::test]
    async fn update_unknown_rubric_is_not_found() {
        let svc = test_service().await;
        let staff = instructor(&svc, "teach").await;
        let err = svc
            .update_rubric(&staff.id, "rub-missing", "Name", TEST_RUBRIC_JSON)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn export_matches_stored_definition() {
        let svc = test_service().await;
        let (_, rubric) = test_rubric(&svc).await;
        let json = svc.export_rubric_json(&rubric.id).await.unwrap();
        assert_eq!(
            parse_rubric_json(&json).unwrap(),
            parse_rubric_json(TEST_RUBRIC_JSON).unwrap()
        );
    }

    #[tokio::test]
    async fn duplicate_copies_tree() {
        let svc = test_service().await;
        let (staff, rubric) = test_rubric(&svc).await;
        let dup = svc.duplicate_rubric(&staff.id, &rubric.id).await.unwrap();

        assert_eq!(dup.rubric.name, "Copy of Test Rubric");
        assert_eq!(dup.warning, None);
        assert_ne!(dup.rubric.id, rubric.id);
        let copy = svc.get_rubric(&dup.rubric.id).await.unwrap();
        assert_eq!(copy.to_definition(), rubric.to_definition());
    }

    #[tokio::test]
    async fn duplicate_long_name_falls_back() {
        let svc = test_service().await;
        let staff = instructor(&svc, "teach").await;
        let rubric = svc
            .create_rubric(&staff.id, &"R".repeat(45), TEST_RUBRIC_JSON)
            .await
            .unwrap();
        let dup = svc.duplicate_rubric(&staff.id, &rubric.id).await.unwrap();
        assert_eq!(dup.rubric.name, "New Rubric");
        assert_eq!(dup.warning.as_deref(), Some(DUPLICATE_NAME_WARNING));
    }

    #[tokio::test]
    async fn list_and_delete() {
        let svc = test_service().await;
        let (staff, rubric) = test_rubric(&svc).await;
        let listed = svc.list_rubrics().await.unwrap();
        assert_eq!(listed, vec![rubric.summary()]);

        svc.delete_rubric(&staff.id, &rubric.id).await.unwrap();
        assert!(svc.list_rubrics().await.unwrap().is_empty());
        assert_eq!(count(&svc, "rubric_cells").await, 0);
        let err = svc.delete_rubric(&staff.id, &rubric.id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
