//! Request entry point for the clustering pipeline.
//!
//! One synchronous, stateless computation per request:
//!
//! ```text
//! snapshot + features + params
//!   → preprocess (impute, scale)
//!   → cluster    (fixed-k or density-based, chosen here, once)
//!   → project    (2-D, same scaled matrix)
//!   → summarize  (original values, noise excluded)
//! ```
//!
//! The result is three parallel collections: per-cluster summaries keyed by
//! cluster id, labeled rows in input order, and projection points in the same
//! order. Requests share their snapshot read-only, hold no cross-request
//! state, and cache nothing — every request recomputes.
//!
//! Validation happens up front: bad parameters are rejected before any
//! computation starts. All numeric output is finite; anything that is not
//! becomes an explicit `None` before leaving the engine.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::cluster::{cluster_count, noise_count, Clustering, Dbscan, Kmeans, NOISE_LABEL};
use crate::error::{Error, Result};
use crate::preprocess::{self, ScalerKind};
use crate::project;
use crate::summarize::{self, ClusterSummary};
use crate::table::Table;

/// Strategy-specific clustering parameters, tagged by strategy.
///
/// The variant decides which clusterer runs; the decision is made once, in
/// [`run`], and nothing downstream branches on it again.
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// Partition-based clustering with a fixed cluster count.
    Kmeans {
        /// Number of clusters (at least 2).
        k: usize,
        /// Scaling strategy for the feature matrix.
        scaler: ScalerKind,
    },
    /// Density-based clustering; cluster count is an output.
    Dbscan {
        /// Neighborhood radius (positive).
        eps: f64,
        /// Minimum neighborhood size (at least 2).
        min_pts: usize,
    },
}

/// One clustering request: feature list, category field for summaries, and
/// strategy parameters.
#[derive(Debug, Clone)]
pub struct Request {
    /// Ordered numeric feature names.
    pub features: Vec<String>,
    /// Delimited categorical column the dominant category is drawn from.
    pub category: String,
    /// Strategy selection and parameters.
    pub params: Params,
}

/// One input row with its assigned cluster, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct LabeledRow {
    /// Stable row id.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Assigned cluster, [`NOISE_LABEL`] for noise rows.
    pub cluster: i64,
    /// Original (unscaled) feature values; `None` where missing.
    pub values: BTreeMap<String, Option<f64>>,
}

/// 2-D projection of one row, tagged with its cluster for plotting.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectionPoint {
    /// First principal coordinate.
    pub pc1: f64,
    /// Second principal coordinate.
    pub pc2: f64,
    /// Assigned cluster, [`NOISE_LABEL`] for noise rows.
    pub cluster: i64,
}

/// Noise diagnostics for the density-based path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoiseInfo {
    /// Rows assigned to no cluster.
    pub noise_points: usize,
    /// Echo of the requested radius.
    pub eps: f64,
    /// Echo of the requested minimum neighborhood size.
    pub min_pts: usize,
}

/// Full result of one clustering request.
#[derive(Debug, Clone, Serialize)]
pub struct ClusteringOutput {
    /// Number of real (non-noise) clusters found.
    pub n_clusters: usize,
    /// One summary per real cluster, ascending by cluster id.
    pub summary: Vec<ClusterSummary>,
    /// Every input row with its label, in input order.
    pub rows: Vec<LabeledRow>,
    /// One projection point per row, same order as `rows`.
    pub projection: Vec<ProjectionPoint>,
    /// Present for the density-based path only.
    pub noise: Option<NoiseInfo>,
}

/// Run one clustering request against a table snapshot.
pub fn run(table: &Table, request: &Request) -> Result<ClusteringOutput> {
    validate(table, request)?;

    let scaler = match &request.params {
        Params::Kmeans { scaler, .. } => *scaler,
        // The density path always standardizes: eps is a distance in scaled
        // space and min-max ranges would make it feature-count dependent.
        Params::Dbscan { .. } => ScalerKind::Standard,
    };

    debug!(
        rows = table.len(),
        features = request.features.len(),
        "preprocessing feature matrix"
    );
    let (_, matrix) = preprocess::fit_transform(table, &request.features, scaler)?;

    // Strategy selection: the one place the request's variant is matched.
    let labels = match &request.params {
        Params::Kmeans { k, .. } => Kmeans::new(*k).assign(&matrix)?,
        Params::Dbscan { eps, min_pts } => Dbscan::new(*eps, *min_pts).assign(&matrix)?,
    };

    let points = project::principal_plane(&matrix)?;
    let summary = summarize::cluster_summaries(table, &request.features, &labels, &request.category)?;

    let rows = table
        .rows()
        .iter()
        .zip(labels.iter())
        .map(|(row, label)| LabeledRow {
            id: row.id,
            title: row.title.clone(),
            cluster: output_label(*label),
            values: request
                .features
                .iter()
                .map(|name| (name.clone(), row.numeric(name)))
                .collect(),
        })
        .collect();

    let projection = points
        .iter()
        .zip(labels.iter())
        .map(|(&(pc1, pc2), label)| ProjectionPoint {
            pc1,
            pc2,
            cluster: output_label(*label),
        })
        .collect();

    let n_clusters = cluster_count(&labels);
    let noise = match &request.params {
        Params::Kmeans { .. } => None,
        Params::Dbscan { eps, min_pts } => Some(NoiseInfo {
            noise_points: noise_count(&labels),
            eps: *eps,
            min_pts: *min_pts,
        }),
    };

    info!(
        rows = table.len(),
        n_clusters,
        noise_points = noise.as_ref().map_or(0, |n| n.noise_points),
        "clustering request complete"
    );

    Ok(ClusteringOutput {
        n_clusters,
        summary,
        rows,
        projection,
        noise,
    })
}

/// Reject invalid requests before any computation.
fn validate(table: &Table, request: &Request) -> Result<()> {
    if table.is_empty() {
        return Err(Error::EmptyInput);
    }
    table.check_features(&request.features)?;
    if !table.is_categorical(&request.category) {
        return Err(Error::UnknownCategory(request.category.clone()));
    }

    match &request.params {
        Params::Kmeans { k, .. } => {
            if *k < 2 {
                return Err(Error::InvalidParameter {
                    name: "k",
                    message: "must be at least 2",
                });
            }
            if *k > table.len() {
                return Err(Error::InvalidClusterCount {
                    requested: *k,
                    n_items: table.len(),
                });
            }
        }
        Params::Dbscan { eps, min_pts } => {
            if !(*eps > 0.0) || !eps.is_finite() {
                return Err(Error::InvalidParameter {
                    name: "eps",
                    message: "must be a positive finite number",
                });
            }
            if *min_pts < 2 {
                return Err(Error::InvalidParameter {
                    name: "min_pts",
                    message: "must be at least 2",
                });
            }
        }
    }

    Ok(())
}

fn output_label(label: Option<usize>) -> i64 {
    label.map_or(NOISE_LABEL, |c| c as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;

    fn tiny_table() -> Table {
        let mut table = Table::new(vec!["rating"], vec!["genres"]);
        let _ = table.insert_all((0..4).map(|i| {
            Row::new(i, format!("m{i}"))
                .with_numeric("rating", Some(i as f64))
                .with_categorical("genres", "Drama")
        }));
        table
    }

    fn kmeans_request(k: usize) -> Request {
        Request {
            features: vec!["rating".to_string()],
            category: "genres".to_string(),
            params: Params::Kmeans {
                k,
                scaler: ScalerKind::Standard,
            },
        }
    }

    #[test]
    fn test_rejects_k_of_one() {
        let err = run(&tiny_table(), &kmeans_request(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "k", .. }));
    }

    #[test]
    fn test_rejects_zero_eps() {
        let request = Request {
            features: vec!["rating".to_string()],
            category: "genres".to_string(),
            params: Params::Dbscan {
                eps: 0.0,
                min_pts: 2,
            },
        };
        let err = run(&tiny_table(), &request).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { name: "eps", .. }));
    }

    #[test]
    fn test_rejects_unknown_category() {
        let mut request = kmeans_request(2);
        request.category = "keywords".to_string();
        assert!(matches!(
            run(&tiny_table(), &request),
            Err(Error::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_rejects_empty_table() {
        let table = Table::new(vec!["rating"], vec!["genres"]);
        assert!(matches!(
            run(&table, &kmeans_request(2)),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_output_label_noise_sentinel() {
        assert_eq!(output_label(None), NOISE_LABEL);
        assert_eq!(output_label(Some(3)), 3);
    }
}
