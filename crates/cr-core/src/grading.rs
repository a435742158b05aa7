//! Score vectors, score fractions, and score/rubric drift reconciliation.
//!
//! A score vector holds one entry per rubric row, by row index. Each entry is
//! either one of that row's cell scores or [`NOT_APPLICABLE`].

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entities::{Review, Rubric, ScoredRow};
use crate::enums::ReviewStatus;

/// Sentinel score for a row that does not apply to the submission.
pub const NOT_APPLICABLE: f64 = -1.0;

#[must_use]
pub fn is_not_applicable(score: f64) -> bool {
    (score - NOT_APPLICABLE).abs() < f64::EPSILON
}

/// Render a point value without a trailing `.0` (`12`, `7.5`).
#[must_use]
pub fn format_points(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        value.to_string()
    }
}

/// Render a score with at least one decimal (`7.0`, `7.5`).
#[must_use]
pub fn format_score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Every problem found in one score vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreErrors {
    messages: Vec<String>,
}

impl ScoreErrors {
    fn single(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    #[must_use]
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl fmt::Display for ScoreErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages.join("; "))
    }
}

impl std::error::Error for ScoreErrors {}

/// Decode a score vector from its JSON array form.
///
/// # Errors
///
/// Returns `ScoreErrors` when the input is not a JSON array of numbers.
pub fn parse_score_vector(raw: &str) -> Result<Vec<f64>, ScoreErrors> {
    let value: Value =
        serde_json::from_str(raw).map_err(|_| ScoreErrors::single("Invalid JSON"))?;
    let Value::Array(items) = value else {
        return Err(ScoreErrors::single("Scores must be a list of numbers"));
    };
    items
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ScoreErrors::single("Scores must be a list of numbers"))
}

/// Check a score vector against the rubric's current rows.
///
/// # Errors
///
/// Returns one message for a length mismatch, otherwise one message per
/// offending row.
pub fn validate_scores(rubric: &Rubric, scores: &[f64]) -> Result<(), ScoreErrors> {
    if scores.len() != rubric.rows.len() {
        return Err(ScoreErrors::single(format!(
            "Expected {} scores but got {}",
            rubric.rows.len(),
            scores.len()
        )));
    }

    let mut rows: Vec<_> = rubric.rows.iter().collect();
    rows.sort_by_key(|row| row.index);

    let messages: Vec<String> = rows
        .iter()
        .zip(scores)
        .enumerate()
        .filter(|(_, (row, score))| !is_not_applicable(**score) && !row.has_cell_score(**score))
        .map(|(i, (_, score))| format!("Invalid score: {} for row {}", format_points(*score), i + 1))
        .collect();

    if messages.is_empty() {
        Ok(())
    } else {
        Err(ScoreErrors { messages })
    }
}

// ---------------------------------------------------------------------------
// Score fraction
// ---------------------------------------------------------------------------

/// Achieved over possible points for a graded review.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ScoreFraction {
    pub achieved: f64,
    pub possible: f64,
}

impl ScoreFraction {
    /// Sum the applicable scores; rows marked not-applicable drop their
    /// maximum from the possible total.
    #[must_use]
    pub fn compute(rubric: &Rubric, scored: &[ScoredRow]) -> Self {
        let mut achieved = 0.0;
        let mut possible = rubric.max_score;
        for row in scored {
            if is_not_applicable(row.score) {
                let row_max = rubric
                    .rows
                    .iter()
                    .find(|r| r.id == row.row_id)
                    .map_or(0.0, |r| r.max_score);
                possible -= row_max;
            } else {
                achieved += row.score;
            }
        }
        Self { achieved, possible }
    }

    /// The fraction for a review, only once it is closed.
    #[must_use]
    pub fn for_review(review: &Review, rubric: &Rubric, scored: &[ScoredRow]) -> Option<Self> {
        (review.status == ReviewStatus::Closed).then(|| Self::compute(rubric, scored))
    }
}

impl fmt::Display for ScoreFraction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            format_score(self.achieved),
            format_score(self.possible)
        )
    }
}

// ---------------------------------------------------------------------------
// Drift reconciliation
// ---------------------------------------------------------------------------

/// Changes needed to bring a review's scored rows in line with a rubric.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreSyncPlan {
    /// `(row_id, row_index)` for rows that have no scored row yet; created as N/A.
    pub create: Vec<(String, u32)>,
    /// `(scored_row_id, row_id)` for scored rows that must point at a new row.
    pub repoint: Vec<(String, String)>,
    /// Scored rows whose score is no longer a cell score of their row.
    pub reset: Vec<String>,
    /// Scored rows whose index is past the rubric's last row.
    pub delete: Vec<String>,
}

impl ScoreSyncPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.create.is_empty()
            && self.repoint.is_empty()
            && self.reset.is_empty()
            && self.delete.is_empty()
    }
}

/// Match existing scored rows to the rubric's rows by index.
#[must_use]
pub fn plan_score_sync(rubric: &Rubric, existing: &[ScoredRow]) -> ScoreSyncPlan {
    let mut plan = ScoreSyncPlan::default();

    for scored in existing {
        match rubric.row_at(scored.row_index) {
            Some(row) => {
                if row.id != scored.row_id {
                    plan.repoint.push((scored.id.clone(), row.id.clone()));
                }
                if !is_not_applicable(scored.score) && !row.has_cell_score(scored.score) {
                    plan.reset.push(scored.id.clone());
                }
            }
            None => plan.delete.push(scored.id.clone()),
        }
    }

    for row in &rubric.rows {
        if !existing.iter().any(|s| s.row_index == row.index) {
            plan.create.push((row.id.clone(), row.index));
        }
    }
    plan.create.sort_by_key(|(_, index)| *index);

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{RubricCell, RubricRow};
    use crate::enums::Session;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn row(index: u32, cells: &[f64]) -> RubricRow {
        let max = cells.iter().copied().fold(0.0, f64::max);
        RubricRow {
            id: format!("row-{index}"),
            index,
            name: format!("row {}", index + 1),
            description: format!("row desc {}", index + 1),
            max_score: max,
            cells: cells
                .iter()
                .enumerate()
                .map(|(i, score)| RubricCell {
                    id: format!("cel-{index}-{i}"),
                    index: u32::try_from(i).unwrap(),
                    description: format!("cell {i}"),
                    score: *score,
                })
                .collect(),
        }
    }

    fn test_rubric() -> Rubric {
        Rubric {
            id: "rub-1".into(),
            name: "Test Rubric".into(),
            max_score: 12.0,
            rows: vec![row(0, &[10.0, 5.0]), row(1, &[2.0, 1.0])],
        }
    }

    fn scored(index: u32, score: f64) -> ScoredRow {
        ScoredRow {
            id: format!("scr-{index}"),
            review_id: "rev-1".into(),
            row_id: format!("row-{index}"),
            row_index: index,
            score,
        }
    }

    fn scored_vec(scores: &[f64]) -> Vec<ScoredRow> {
        scores
            .iter()
            .enumerate()
            .map(|(i, s)| scored(u32::try_from(i).unwrap(), *s))
            .collect()
    }

    #[rstest]
    #[case(&[5.0, 2.0], true)]
    #[case(&[10.0, 1.0], true)]
    #[case(&[-1.0, -1.0], true)]
    #[case(&[4.0, 2.0], false)]
    #[case(&[15.0, 2.0], false)]
    #[case(&[0.0, 0.0], false)]
    #[case(&[-50.0, 2.0], false)]
    fn score_vector_validation(#[case] scores: &[f64], #[case] ok: bool) {
        assert_eq!(validate_scores(&test_rubric(), scores).is_ok(), ok);
    }

    #[test]
    fn wrong_length_rejected() {
        let err = validate_scores(&test_rubric(), &[5.0]).unwrap_err();
        assert_eq!(err.messages(), ["Expected 2 scores but got 1"]);
    }

    #[test]
    fn each_bad_row_gets_a_message() {
        let err = validate_scores(&test_rubric(), &[0.0, 7.0]).unwrap_err();
        assert_eq!(
            err.messages(),
            ["Invalid score: 0 for row 1", "Invalid score: 7 for row 2"]
        );
    }

    #[test]
    fn parses_json_vectors() {
        assert_eq!(parse_score_vector("[5, -1, 2.5]").unwrap(), vec![5.0, -1.0, 2.5]);
        assert!(parse_score_vector("[5, \"x\"]").is_err());
        assert!(parse_score_vector("{}").is_err());
        assert!(parse_score_vector("nope").is_err());
    }

    #[rstest]
    #[case(&[5.0, 2.0], "7.0/12.0")]
    #[case(&[5.0, -1.0], "5.0/10.0")]
    #[case(&[-1.0, 1.0], "1.0/2.0")]
    #[case(&[-1.0, -1.0], "0.0/0.0")]
    fn fractions(#[case] scores: &[f64], #[case] expected: &str) {
        let fraction = ScoreFraction::compute(&test_rubric(), &scored_vec(scores));
        assert_eq!(fraction.to_string(), expected);
    }

    #[test]
    fn fraction_only_for_closed_reviews() {
        let mut review = Review {
            id: "rev-1".into(),
            student_id: "usr-1".into(),
            student_session: Session::Am,
            reviewer_id: Some("usr-2".into()),
            schoology_id: "12.34.56".into(),
            status: ReviewStatus::Assigned,
            rubric_id: "rub-1".into(),
            additional_comments: String::new(),
            date_created: Utc::now(),
            date_completed: None,
        };
        let rows = scored_vec(&[5.0, 2.0]);
        assert!(ScoreFraction::for_review(&review, &test_rubric(), &rows).is_none());
        review.status = ReviewStatus::Closed;
        assert!(ScoreFraction::for_review(&review, &test_rubric(), &rows).is_some());
    }

    #[test]
    fn point_formatting() {
        assert_eq!(format_points(12.0), "12");
        assert_eq!(format_points(7.5), "7.5");
        assert_eq!(format_score(7.0), "7.0");
        assert_eq!(format_score(-0.5), "-0.5");
    }

    #[test]
    fn sync_adds_missing_rows() {
        let mut rubric = test_rubric();
        rubric.rows.push(row(2, &[3.0]));
        let plan = plan_score_sync(&rubric, &scored_vec(&[5.0, 2.0]));
        assert_eq!(plan.create, vec![("row-2".to_string(), 2)]);
        assert!(plan.delete.is_empty());
        assert!(plan.reset.is_empty());
    }

    #[test]
    fn sync_deletes_rows_past_the_end() {
        let mut rubric = test_rubric();
        rubric.rows.pop();
        let plan = plan_score_sync(&rubric, &scored_vec(&[5.0, 2.0]));
        assert_eq!(plan.delete, vec!["scr-1".to_string()]);
        assert!(plan.create.is_empty());
    }

    #[test]
    fn sync_repoints_and_resets_on_rubric_swap() {
        let mut other = test_rubric();
        other.id = "rub-2".into();
        other.rows = vec![row(0, &[10.0, 5.0]), row(1, &[3.0])];
        for r in &mut other.rows {
            r.id = format!("new-{}", r.index);
        }
        let plan = plan_score_sync(&other, &scored_vec(&[5.0, 2.0]));
        assert_eq!(
            plan.repoint,
            vec![
                ("scr-0".to_string(), "new-0".to_string()),
                ("scr-1".to_string(), "new-1".to_string())
            ]
        );
        assert_eq!(plan.reset, vec!["scr-1".to_string()]);
    }

    #[test]
    fn matching_rows_need_no_changes() {
        assert!(plan_score_sync(&test_rubric(), &scored_vec(&[5.0, -1.0])).is_empty());
    }
}
