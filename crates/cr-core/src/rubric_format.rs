//! Rubric JSON wire format and its positional validation.
//!
//! The editor submits a rubric as a JSON array of rows:
//!
//! ```json
//! [{"name": "Style", "description": "...", "cells": [{"score": 10, "description": "..."}]}]
//! ```
//!
//! [`parse_rubric_json`] validates the whole document before anything is
//! written. Every offending field produces one message, keyed by its position,
//! and all messages come back together ordered by row, then cell, then field.

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::validation::{DESCRIPTION_MAX_LEN, ROW_NAME_MAX_LEN, SCORE_MAX, SCORE_MIN};

// ---------------------------------------------------------------------------
// Definition types
// ---------------------------------------------------------------------------

/// A rubric's row tree as exchanged with the editor. Serializes as a bare array.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(transparent)]
pub struct RubricDefinition {
    pub rows: Vec<RowDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RowDefinition {
    pub name: String,
    pub description: String,
    pub cells: Vec<CellDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CellDefinition {
    pub score: f64,
    pub description: String,
}

impl RubricDefinition {
    /// Serialize to the editor's JSON array form.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Sum of the row maxima.
    #[must_use]
    pub fn max_score(&self) -> f64 {
        self.rows.iter().map(RowDefinition::max_score).sum()
    }
}

impl RowDefinition {
    /// Highest cell score, 0 without cells.
    #[must_use]
    pub fn max_score(&self) -> f64 {
        self.cells.iter().map(|cell| cell.score).fold(0.0, f64::max)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Which part of a row or cell an error refers to. Declaration order is
/// report order: a cell's score comes before its description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RubricField {
    /// The document as a whole, or a structurally broken row/cell.
    Structure,
    Name,
    Score,
    Description,
    Cells,
}

/// Position of a validation error. Ordering is row, then cell, then field;
/// document-level errors sort first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    pub row: Option<usize>,
    pub cell: Option<usize>,
    pub field: RubricField,
}

impl FieldPath {
    const fn document() -> Self {
        Self {
            row: None,
            cell: None,
            field: RubricField::Structure,
        }
    }

    const fn row(row: usize, field: RubricField) -> Self {
        Self {
            row: Some(row),
            cell: None,
            field,
        }
    }

    const fn cell(row: usize, cell: usize, field: RubricField) -> Self {
        Self {
            row: Some(row),
            cell: Some(cell),
            field,
        }
    }
}

/// One positional validation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubricError {
    pub path: FieldPath,
    pub message: String,
}

/// All validation errors found in one rubric document, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubricErrors {
    errors: Vec<RubricError>,
}

impl RubricErrors {
    /// A single error not tied to any row, such as a bad rubric name.
    #[must_use]
    pub fn single(message: impl Into<String>) -> Self {
        Self {
            errors: vec![RubricError {
                path: FieldPath::document(),
                message: message.into(),
            }],
        }
    }

    #[must_use]
    pub fn errors(&self) -> &[RubricError] {
        &self.errors
    }

    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.message.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for RubricErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join("; "))
    }
}

impl std::error::Error for RubricErrors {}

/// Collects the first error per field; later errors for the same path are dropped.
#[derive(Default)]
struct Collector {
    errors: BTreeMap<FieldPath, String>,
}

impl Collector {
    fn add(&mut self, path: FieldPath, message: String) {
        self.errors.entry(path).or_insert(message);
    }

    fn finish(self) -> Result<(), RubricErrors> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(RubricErrors {
            errors: self
                .errors
                .into_iter()
                .map(|(path, message)| RubricError { path, message })
                .collect(),
        })
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parse and validate a rubric document.
///
/// # Errors
///
/// Returns every validation error in the document; nothing is partially accepted.
pub fn parse_rubric_json(raw: &str) -> Result<RubricDefinition, RubricErrors> {
    let value: Value =
        serde_json::from_str(raw).map_err(|_| RubricErrors::single("Invalid JSON"))?;
    validate_rubric_value(&value)?;
    serde_json::from_value(value).map_err(|_| RubricErrors::single("Invalid JSON"))
}

/// Validate an already-decoded rubric document.
///
/// # Errors
///
/// Returns every validation error found.
pub fn validate_rubric_value(value: &Value) -> Result<(), RubricErrors> {
    let mut collector = Collector::default();
    match value.as_array() {
        Some(rows) if !rows.is_empty() => {
            for (index, row) in rows.iter().enumerate() {
                validate_row(&mut collector, index, row);
            }
        }
        _ => collector.add(
            FieldPath::document(),
            "Please provide at least one row".to_string(),
        ),
    }
    collector.finish()
}

fn validate_row(collector: &mut Collector, index: usize, row: &Value) {
    let row_num = index + 1;
    let location = format!("in row {row_num}");
    let Some(fields) = row.as_object() else {
        collector.add(
            FieldPath::row(index, RubricField::Structure),
            format!("Unknown error {location}"),
        );
        return;
    };

    for (key, field, limit) in [
        ("name", RubricField::Name, ROW_NAME_MAX_LEN),
        ("description", RubricField::Description, DESCRIPTION_MAX_LEN),
    ] {
        let path = FieldPath::row(index, field);
        match fields.get(key) {
            Some(Value::String(s)) if s.is_empty() => {
                collector.add(path, format!("Please enter a {key} {location}"));
            }
            Some(Value::String(s)) if s.chars().count() > limit => {
                collector.add(path, format!("{key} is too long {location}"));
            }
            Some(Value::String(_)) => {}
            _ => collector.add(path, format!("Unknown error {location}")),
        }
    }

    let cells_path = FieldPath::row(index, RubricField::Cells);
    match fields.get("cells") {
        Some(Value::Array(cells)) if cells.is_empty() => {
            collector.add(cells_path, format!("Row {row_num} must have at least one cell"));
        }
        Some(Value::Array(cells)) => {
            for (cell_index, cell) in cells.iter().enumerate() {
                validate_cell(collector, index, cell_index, cell);
            }
        }
        _ => collector.add(cells_path, format!("Unknown error {location}")),
    }
}

fn validate_cell(collector: &mut Collector, row: usize, index: usize, cell: &Value) {
    let location = format!("in row {}, cell {}", row + 1, index + 1);
    let Some(fields) = cell.as_object() else {
        collector.add(
            FieldPath::cell(row, index, RubricField::Structure),
            format!("Unknown error {location}"),
        );
        return;
    };

    let score_path = FieldPath::cell(row, index, RubricField::Score);
    match fields.get("score") {
        None => collector.add(score_path, format!("Unknown error {location}")),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(score) if (SCORE_MIN..=SCORE_MAX).contains(&score) => {}
            _ => collector.add(
                score_path,
                format!("The score must be between 0 and 100 {location}"),
            ),
        },
        Some(_) => collector.add(
            score_path,
            format!("Please enter a number for the score {location}"),
        ),
    }

    let description_path = FieldPath::cell(row, index, RubricField::Description);
    match fields.get("description") {
        Some(Value::String(s)) if s.is_empty() => collector.add(
            description_path,
            format!("Please enter a description {location}"),
        ),
        Some(Value::String(s)) if s.chars().count() > DESCRIPTION_MAX_LEN => collector.add(
            description_path,
            format!("Description is too long {location}"),
        ),
        Some(Value::String(_)) => {}
        _ => collector.add(description_path, format!("Unknown error {location}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    const VALID: &str = r#"[
        {"name": "row 1", "description": "row desc 1", "cells": [
            {"score": 10, "description": "cell 1"},
            {"score": 5, "description": "cell 2"}
        ]},
        {"name": "row 2", "description": "row desc 2", "cells": [
            {"score": 2, "description": "cell 1"},
            {"score": 1, "description": "cell 2"}
        ]}
    ]"#;

    fn messages(raw: &str) -> Vec<String> {
        parse_rubric_json(raw).unwrap_err().messages()
    }

    #[test]
    fn valid_document_parses() {
        let def = parse_rubric_json(VALID).unwrap();
        assert_eq!(def.rows.len(), 2);
        assert_eq!(def.rows[0].cells[1].score, 5.0);
        assert_eq!(def.rows[1].max_score(), 2.0);
        assert_eq!(def.max_score(), 12.0);
    }

    #[test]
    fn json_round_trip() {
        let def = parse_rubric_json(VALID).unwrap();
        let again = parse_rubric_json(&def.to_json().unwrap()).unwrap();
        assert_eq!(def, again);
    }

    #[rstest]
    #[case("not json", "Invalid JSON")]
    #[case("[", "Invalid JSON")]
    #[case("[]", "Please provide at least one row")]
    #[case("{}", "Please provide at least one row")]
    fn document_level_errors(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(messages(raw), vec![expected.to_string()]);
    }

    #[rstest]
    #[case(r#"[{"name": "", "description": "d", "cells": [{"score": 1, "description": "c"}]}]"#, "Please enter a name in row 1")]
    #[case(r#"[{"name": "n", "description": "", "cells": [{"score": 1, "description": "c"}]}]"#, "Please enter a description in row 1")]
    #[case(r#"[{"name": "n", "description": "d", "cells": []}]"#, "Row 1 must have at least one cell")]
    #[case(r#"[{"name": "n", "description": "d", "cells": [{"score": "x", "description": "c"}]}]"#, "Please enter a number for the score in row 1, cell 1")]
    #[case(r#"[{"name": "n", "description": "d", "cells": [{"score": 101, "description": "c"}]}]"#, "The score must be between 0 and 100 in row 1, cell 1")]
    #[case(r#"[{"name": "n", "description": "d", "cells": [{"score": -1, "description": "c"}]}]"#, "The score must be between 0 and 100 in row 1, cell 1")]
    #[case(r#"[{"name": "n", "description": "d", "cells": [{"score": 3, "description": ""}]}]"#, "Please enter a description in row 1, cell 1")]
    #[case(r#"[{"name": "n", "description": "d", "cells": [3]}]"#, "Unknown error in row 1, cell 1")]
    #[case(r#"[{"description": "d", "cells": [{"score": 3, "description": "c"}]}]"#, "Unknown error in row 1")]
    #[case("[5]", "Unknown error in row 1")]
    fn single_field_errors(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(messages(raw), vec![expected.to_string()]);
    }

    #[test]
    fn overlong_fields_are_reported() {
        let name = "n".repeat(ROW_NAME_MAX_LEN + 1);
        let desc = "d".repeat(DESCRIPTION_MAX_LEN + 1);
        let raw = serde_json::json!([{
            "name": name,
            "description": desc,
            "cells": [{"score": 1, "description": desc}]
        }])
        .to_string();
        assert_eq!(
            messages(&raw),
            vec![
                "name is too long in row 1".to_string(),
                "description is too long in row 1".to_string(),
                "Description is too long in row 1, cell 1".to_string(),
            ]
        );
    }

    #[test]
    fn errors_are_ordered_by_row_then_cell() {
        let raw = r#"[
            {"name": "ok", "description": "ok", "cells": [
                {"score": 1, "description": "ok"},
                {"score": 500, "description": ""}
            ]},
            {"name": "", "description": "ok", "cells": []}
        ]"#;
        assert_eq!(
            messages(raw),
            vec![
                "The score must be between 0 and 100 in row 1, cell 2".to_string(),
                "Please enter a description in row 1, cell 2".to_string(),
                "Please enter a name in row 2".to_string(),
                "Row 2 must have at least one cell".to_string(),
            ]
        );
    }

    #[test]
    fn cell_score_sorts_before_cell_description() {
        let mut paths = vec![
            FieldPath::cell(0, 1, RubricField::Description),
            FieldPath::row(0, RubricField::Cells),
            FieldPath::cell(0, 1, RubricField::Score),
            FieldPath::row(0, RubricField::Description),
            FieldPath::row(0, RubricField::Name),
        ];
        paths.sort();
        assert_eq!(
            paths,
            vec![
                FieldPath::row(0, RubricField::Name),
                FieldPath::row(0, RubricField::Description),
                FieldPath::row(0, RubricField::Cells),
                FieldPath::cell(0, 1, RubricField::Score),
                FieldPath::cell(0, 1, RubricField::Description),
            ]
        );
    }

    #[test]
    fn boundary_scores_accepted() {
        let raw = r#"[{"name": "n", "description": "d", "cells": [
            {"score": 0, "description": "zero"},
            {"score": 100, "description": "hundred"}
        ]}]"#;
        let def = parse_rubric_json(raw).unwrap();
        assert_eq!(def.max_score(), 100.0);
    }

    #[test]
    fn serializes_as_bare_array() {
        let def = parse_rubric_json(VALID).unwrap();
        let value: Value = serde_json::from_str(&def.to_json().unwrap()).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["cells"][0]["description"], "cell 1");
    }
}
