use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::grading::format_points;
use crate::rubric_format::{CellDefinition, RowDefinition, RubricDefinition};

/// A named, ordered set of grading criteria.
///
/// `max_score` always equals the sum of the rows' `max_score`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Rubric {
    pub id: String,
    pub name: String,
    pub max_score: f64,
    /// Rows ordered by `index`, which runs `0..rows.len()`.
    pub rows: Vec<RubricRow>,
}

/// One grading criterion. `max_score` equals the highest cell score, or 0.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RubricRow {
    pub id: String,
    pub index: u32,
    pub name: String,
    pub description: String,
    pub max_score: f64,
    /// Cells ordered by `index`.
    pub cells: Vec<RubricCell>,
}

/// A selectable score option within a row.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RubricCell {
    pub id: String,
    pub index: u32,
    pub description: String,
    pub score: f64,
}

/// Rubric header without its row tree, used for listings and pickers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RubricSummary {
    pub id: String,
    pub name: String,
    pub max_score: f64,
    pub row_count: u32,
}

impl Rubric {
    /// Row at `index`, if the rubric currently has that many rows.
    #[must_use]
    pub fn row_at(&self, index: u32) -> Option<&RubricRow> {
        self.rows.iter().find(|row| row.index == index)
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Convert back into the wire definition, rows and cells in index order.
    #[must_use]
    pub fn to_definition(&self) -> RubricDefinition {
        let mut rows: Vec<&RubricRow> = self.rows.iter().collect();
        rows.sort_by_key(|row| row.index);
        RubricDefinition {
            rows: rows
                .into_iter()
                .map(|row| {
                    let mut cells: Vec<&RubricCell> = row.cells.iter().collect();
                    cells.sort_by_key(|cell| cell.index);
                    RowDefinition {
                        name: row.name.clone(),
                        description: row.description.clone(),
                        cells: cells
                            .into_iter()
                            .map(|cell| CellDefinition {
                                score: cell.score,
                                description: cell.description.clone(),
                            })
                            .collect(),
                    }
                })
                .collect(),
        }
    }

    /// Serialize to the JSON array form used by the rubric editor.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        self.to_definition().to_json()
    }

    /// Check the max-score invariants of the whole tree.
    #[must_use]
    pub fn max_scores_consistent(&self) -> bool {
        let rows_ok = self
            .rows
            .iter()
            .all(|row| (row.max_score - row.computed_max_score()).abs() < f64::EPSILON);
        let total: f64 = self.rows.iter().map(|row| row.max_score).sum();
        rows_ok && (self.max_score - total).abs() < f64::EPSILON
    }

    #[must_use]
    pub fn summary(&self) -> RubricSummary {
        RubricSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            max_score: self.max_score,
            row_count: u32::try_from(self.rows.len()).unwrap_or(u32::MAX),
        }
    }
}

impl RubricRow {
    /// Highest cell score, 0 for a row without cells.
    #[must_use]
    pub fn computed_max_score(&self) -> f64 {
        self.cells.iter().map(|cell| cell.score).fold(0.0, f64::max)
    }

    /// Whether `score` is one of this row's cell scores.
    #[must_use]
    pub fn has_cell_score(&self, score: f64) -> bool {
        self.cells
            .iter()
            .any(|cell| (cell.score - score).abs() < f64::EPSILON)
    }
}

impl fmt::Display for Rubric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} points)", self.name, format_points(self.max_score))
    }
}

impl fmt::Display for RubricSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} points)", self.name, format_points(self.max_score))
    }
}
