//! Clustering traits.

use ndarray::Array2;

use crate::error::Result;

/// Sentinel used in serialized outputs for rows that belong to no cluster.
pub const NOISE_LABEL: i64 = -1;

/// Trait for clustering strategies over a scaled feature matrix.
///
/// Both strategies share one capability: assign an integer label to every
/// row. The strategy is chosen once at request entry; downstream stages
/// (projection, summarization) only ever see the label vector.
pub trait Clustering {
    /// Assign a cluster label to every row of `data`.
    ///
    /// Returns one entry per row, in row order. `Some(c)` is membership in
    /// cluster `c`; `None` marks a noise row (density-based only — the
    /// partition-based strategy labels every row).
    ///
    /// Implementations must be deterministic: identical input and parameters
    /// produce identical labels.
    fn assign(&self, data: &Array2<f64>) -> Result<Vec<Option<usize>>>;
}

/// Number of distinct real (non-noise) clusters in an assignment.
pub fn cluster_count(labels: &[Option<usize>]) -> usize {
    let mut seen: Vec<usize> = labels.iter().flatten().copied().collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Number of noise rows in an assignment.
pub fn noise_count(labels: &[Option<usize>]) -> usize {
    labels.iter().filter(|l| l.is_none()).count()
}
