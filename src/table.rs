//! Immutable tabular snapshots.
//!
//! A [`Table`] is the hand-off boundary between the loader (CSV parsing,
//! filtering, pagination live outside this crate) and the pipeline. It holds
//! ordered rows with a stable integer id, declared numeric columns, and
//! declared categorical columns stored as delimited text
//! (e.g. `"Action, Drama"`).
//!
//! Tables are built once, then shared read-only: the loader wraps the finished
//! table in a [`Snapshot`] (an `Arc`) and every request clones the handle.
//! Nothing in this crate mutates a table after construction, so concurrent
//! requests over the same snapshot are safe.
//!
//! Rows that violate the schema (duplicate id, undeclared column) are skipped
//! with a warning during bulk construction rather than poisoning the whole
//! snapshot; `insert` reports the same conditions as errors for callers that
//! want them.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::error::{Error, Result};

/// Shared read-only handle to a table snapshot.
pub type Snapshot = Arc<Table>;

/// One entity (e.g. a movie): a stable id, display fields, numeric cells,
/// and delimited-text categorical cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Stable identifier, unique within a snapshot.
    pub id: i64,
    /// Display title.
    pub title: String,
    numeric: BTreeMap<String, Option<f64>>,
    categorical: BTreeMap<String, String>,
}

impl Row {
    /// Create a row with no cells.
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            numeric: BTreeMap::new(),
            categorical: BTreeMap::new(),
        }
    }

    /// Set a numeric cell. `None` marks the value as missing.
    pub fn with_numeric(mut self, column: impl Into<String>, value: Option<f64>) -> Self {
        let _ = self.numeric.insert(column.into(), value);
        self
    }

    /// Set a categorical cell (delimited text, e.g. `"Action, Drama"`).
    pub fn with_categorical(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        let _ = self.categorical.insert(column.into(), value.into());
        self
    }

    /// Numeric cell value; `None` when absent or stored as missing.
    /// Non-finite stored values are reported as missing.
    pub fn numeric(&self, column: &str) -> Option<f64> {
        self.numeric
            .get(column)
            .copied()
            .flatten()
            .filter(|v| v.is_finite())
    }

    /// Categorical cell value, if present.
    pub fn categorical(&self, column: &str) -> Option<&str> {
        self.categorical.get(column).map(String::as_str)
    }

    fn columns_declared(&self, table: &Table) -> bool {
        self.numeric
            .keys()
            .all(|c| table.numeric_columns.iter().any(|n| n == c))
            && self
                .categorical
                .keys()
                .all(|c| table.categorical_columns.iter().any(|n| n == c))
    }
}

/// An ordered, immutable-after-construction collection of rows plus its schema.
#[derive(Debug, Clone, Default)]
pub struct Table {
    rows: Vec<Row>,
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    zero_as_missing: BTreeSet<String>,
    seen_ids: HashSet<i64>,
}

impl Table {
    /// Create an empty table with the given declared columns.
    pub fn new<N: Into<String>, C: Into<String>>(
        numeric_columns: impl IntoIterator<Item = N>,
        categorical_columns: impl IntoIterator<Item = C>,
    ) -> Self {
        Self {
            rows: Vec::new(),
            numeric_columns: numeric_columns.into_iter().map(Into::into).collect(),
            categorical_columns: categorical_columns.into_iter().map(Into::into).collect(),
            zero_as_missing: BTreeSet::new(),
            seen_ids: HashSet::new(),
        }
    }

    /// Declare columns whose zero values mean "unknown" (monetary or duration
    /// fields where 0 cannot occur in valid data). These are treated as
    /// missing by imputation and by summary statistics.
    pub fn with_zero_as_missing<S: Into<String>>(
        mut self,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        self.zero_as_missing = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Insert one row. Rejects duplicate ids and undeclared columns.
    pub fn insert(&mut self, row: Row) -> Result<()> {
        if !self.seen_ids.insert(row.id) {
            return Err(Error::Other(format!("duplicate row id {}", row.id)));
        }
        if !row.columns_declared(self) {
            let _ = self.seen_ids.remove(&row.id);
            return Err(Error::Other(format!(
                "row {} references an undeclared column",
                row.id
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Insert many rows, skipping (and logging) any that fail validation.
    /// Returns the number of rows actually inserted.
    pub fn insert_all(&mut self, rows: impl IntoIterator<Item = Row>) -> usize {
        let mut inserted = 0;
        for row in rows {
            let id = row.id;
            match self.insert(row) {
                Ok(()) => inserted += 1,
                Err(err) => warn!(row_id = id, %err, "skipping invalid row"),
            }
        }
        inserted
    }

    /// Finish construction and wrap in a shared snapshot handle.
    pub fn into_snapshot(self) -> Snapshot {
        Arc::new(self)
    }

    /// Rows in insertion order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Declared numeric column names.
    pub fn numeric_columns(&self) -> &[String] {
        &self.numeric_columns
    }

    /// Whether `column` is a declared numeric column.
    pub fn is_numeric(&self, column: &str) -> bool {
        self.numeric_columns.iter().any(|c| c == column)
    }

    /// Whether `column` is a declared categorical column.
    pub fn is_categorical(&self, column: &str) -> bool {
        self.categorical_columns.iter().any(|c| c == column)
    }

    /// Whether zero values in `column` are treated as missing.
    pub fn zero_is_missing(&self, column: &str) -> bool {
        self.zero_as_missing.contains(column)
    }

    /// Validate a requested feature list: non-empty, every name a declared
    /// numeric column.
    pub fn check_features(&self, features: &[String]) -> Result<()> {
        if features.is_empty() {
            return Err(Error::InvalidParameter {
                name: "features",
                message: "at least one feature is required",
            });
        }
        for name in features {
            if !self.is_numeric(name) {
                return Err(Error::UnknownFeature(name.clone()));
            }
        }
        Ok(())
    }

    /// Raw cell value for clustering purposes: missing, non-finite, and
    /// (for flagged columns) zero all read as `None`.
    pub fn clean_value(&self, row: &Row, column: &str) -> Option<f64> {
        row.numeric(column)
            .filter(|&v| !(self.zero_is_missing(column) && v == 0.0))
    }
}
