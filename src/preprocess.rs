//! Missing-value imputation and feature scaling.
//!
//! Turns a table plus an ordered feature list into a dense, finite
//! `(rows × features)` matrix ready for clustering:
//!
//! 1. **Impute** — every missing cell (absent, non-finite, or a zero in a
//!    column where zero means "unknown") is replaced by the median of the
//!    column's observed values. Medians are computed over the request's own
//!    row set, never a global constant, since the active row set changes per
//!    request.
//! 2. **Scale** — per column, either standardization (subtract mean, divide
//!    by standard deviation) or min-max normalization onto `[0, 1]`. A
//!    constant column maps to uniform zero in both strategies instead of
//!    dividing by zero.
//!
//! `fit` and `transform` are split so the fitted statistics can be persisted
//! and replayed on new records by the trained pipeline without refitting.

use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result, Stage};
use crate::table::Table;

/// Scaling strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalerKind {
    /// Subtract the column mean, divide by the column standard deviation.
    Standard,
    /// Map the column's observed range linearly onto `[0, 1]`.
    MinMax,
}

impl ScalerKind {
    /// Parse a caller-supplied selector string.
    ///
    /// Unrecognized selectors are a validation error, not a silently unset
    /// scaler.
    pub fn parse(selector: &str) -> Result<Self> {
        match selector.to_ascii_lowercase().as_str() {
            "standard" | "standardscaler" | "standard_scaler" => Ok(ScalerKind::Standard),
            "minmax" | "min-max" | "minmaxscaler" | "min_max_scaler" => Ok(ScalerKind::MinMax),
            _ => Err(Error::UnknownScaler(selector.to_string())),
        }
    }
}

/// Per-column scaling statistics, fitted on one row set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedScaler {
    /// Standardization: per-column mean and standard deviation.
    Standard {
        /// Column means.
        means: Vec<f64>,
        /// Column standard deviations (population, as fitted).
        stds: Vec<f64>,
    },
    /// Min-max normalization: per-column observed range.
    MinMax {
        /// Column minima.
        mins: Vec<f64>,
        /// Column maxima.
        maxs: Vec<f64>,
    },
}

impl FittedScaler {
    fn fit(kind: ScalerKind, columns: &[Vec<f64>]) -> Self {
        match kind {
            ScalerKind::Standard => {
                let mut means = Vec::with_capacity(columns.len());
                let mut stds = Vec::with_capacity(columns.len());
                for column in columns {
                    let n = column.len() as f64;
                    let mean = column.iter().sum::<f64>() / n;
                    let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
                    means.push(mean);
                    stds.push(var.sqrt());
                }
                FittedScaler::Standard { means, stds }
            }
            ScalerKind::MinMax => {
                let mut mins = Vec::with_capacity(columns.len());
                let mut maxs = Vec::with_capacity(columns.len());
                for column in columns {
                    mins.push(column.iter().copied().fold(f64::INFINITY, f64::min));
                    maxs.push(column.iter().copied().fold(f64::NEG_INFINITY, f64::max));
                }
                FittedScaler::MinMax { mins, maxs }
            }
        }
    }

    /// Scale one value of column `j`. Constant columns collapse to 0.0.
    fn scale(&self, j: usize, value: f64) -> f64 {
        match self {
            FittedScaler::Standard { means, stds } => {
                if stds[j] == 0.0 {
                    0.0
                } else {
                    (value - means[j]) / stds[j]
                }
            }
            FittedScaler::MinMax { mins, maxs } => {
                let range = maxs[j] - mins[j];
                if range == 0.0 {
                    0.0
                } else {
                    (value - mins[j]) / range
                }
            }
        }
    }
}

/// Fitted imputation + scaling statistics for one feature list.
///
/// Reusable: a request fits one on its snapshot and discards it; the trained
/// pipeline persists one and replays it on new records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    features: Vec<String>,
    medians: Vec<f64>,
    zero_as_missing: Vec<bool>,
    scaler: FittedScaler,
}

impl FittedPreprocessor {
    /// Fit imputation medians and scaling statistics on `table` for the given
    /// ordered feature list.
    pub fn fit(table: &Table, features: &[String], kind: ScalerKind) -> Result<Self> {
        table.check_features(features)?;
        if table.is_empty() {
            return Err(Error::EmptyInput);
        }

        let mut medians = Vec::with_capacity(features.len());
        let mut zero_as_missing = Vec::with_capacity(features.len());
        let mut imputed_columns = Vec::with_capacity(features.len());

        for name in features {
            let observed: Vec<f64> = table
                .rows()
                .iter()
                .filter_map(|row| table.clean_value(row, name))
                .collect();
            // A column with nothing observed imputes to 0.0 and will scale to
            // uniform zero.
            let med = median(&observed).unwrap_or(0.0);

            let column: Vec<f64> = table
                .rows()
                .iter()
                .map(|row| table.clean_value(row, name).unwrap_or(med))
                .collect();

            medians.push(med);
            zero_as_missing.push(table.zero_is_missing(name));
            imputed_columns.push(column);
        }

        let scaler = FittedScaler::fit(kind, &imputed_columns);
        debug!(
            rows = table.len(),
            features = features.len(),
            "fitted preprocessor"
        );

        Ok(Self {
            features: features.to_vec(),
            medians,
            zero_as_missing,
            scaler,
        })
    }

    /// Ordered feature names this preprocessor was fitted on.
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Fitted imputation medians, in feature order.
    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    /// Apply the fitted transform to every row of `table`.
    ///
    /// The output shape is `(table.len(), features.len())` and every entry is
    /// finite.
    pub fn transform_table(&self, table: &Table) -> Result<Array2<f64>> {
        let n = table.len();
        let k = self.features.len();
        let mut matrix = Array2::zeros((n, k));

        for (i, row) in table.rows().iter().enumerate() {
            for (j, name) in self.features.iter().enumerate() {
                let raw = table.clean_value(row, name).unwrap_or(self.medians[j]);
                matrix[[i, j]] = self.scaler.scale(j, raw);
            }
        }

        check_finite(&matrix)?;
        Ok(matrix)
    }

    /// Apply the fitted transform to one new record.
    ///
    /// Features absent from `record` default to the fitted median; an explicit
    /// 0.0 in a zero-as-missing column is treated the same way.
    pub fn transform_record(&self, record: &BTreeMap<String, f64>) -> Vec<f64> {
        self.features
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let raw = record
                    .get(name)
                    .copied()
                    .filter(|v| v.is_finite())
                    .filter(|&v| !(self.zero_as_missing[j] && v == 0.0))
                    .unwrap_or(self.medians[j]);
                self.scaler.scale(j, raw)
            })
            .collect()
    }
}

/// Fit on `table` and transform it in one step; returns the fitted statistics
/// alongside the matrix.
pub fn fit_transform(
    table: &Table,
    features: &[String],
    kind: ScalerKind,
) -> Result<(FittedPreprocessor, Array2<f64>)> {
    let fitted = FittedPreprocessor::fit(table, features, kind)?;
    let matrix = fitted.transform_table(table)?;
    Ok((fitted, matrix))
}

/// Median of a slice; `None` on empty input. Even counts average the two
/// middle values.
fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn check_finite(matrix: &Array2<f64>) -> Result<()> {
    if matrix.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::Computation {
            stage: Stage::Scale,
            message: "non-finite value after scaling".to_string(),
        })
    }
}
