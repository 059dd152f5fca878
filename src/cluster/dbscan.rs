//! DBSCAN: density-based clustering with a noise label.
//!
//! Groups rows that are mutually density-reachable: a row is a **core** row
//! when at least `min_pts` rows (itself included) lie within distance `eps`,
//! and a cluster is the transitive closure of core rows plus the border rows
//! within `eps` of one. Rows reachable from no core row get no cluster at all
//! — they are **noise**, reported as `None` here and as `-1` in serialized
//! output.
//!
//! Unlike the fixed-k strategy, the number of clusters is an *output*: it
//! falls out of the data and the `eps`/`min_pts` choice. On the scaled movie
//! matrix a generous `eps` tends to fuse the dense middle of the catalog into
//! one large cluster 0 with blockbusters as noise; a tight `eps` shatters it.
//!
//! The scan is entirely deterministic: rows are visited in input order and
//! there is no randomness, so cluster ids are stable across repeated requests.
//!
//! Region queries are the naive O(n²) pairwise scan, which is fine at catalog
//! scale (thousands of rows).
//!
//! Reference: Ester et al. (1996), "A Density-Based Algorithm for Discovering
//! Clusters in Large Spatial Databases with Noise."

use ndarray::Array2;

use super::traits::Clustering;
use crate::error::{Error, Result};

/// DBSCAN clustering strategy (density-based, variable cluster count).
#[derive(Debug, Clone)]
pub struct Dbscan {
    /// Neighborhood radius.
    eps: f64,
    /// Minimum neighborhood size (including the row itself) for a core row.
    min_pts: usize,
}

impl Dbscan {
    /// Create a new DBSCAN clusterer.
    ///
    /// `eps` must be positive and `min_pts` at least 2; both are checked at
    /// assignment time so invalid requests fail before any computation.
    pub fn new(eps: f64, min_pts: usize) -> Self {
        Self { eps, min_pts }
    }

    /// Set the neighborhood radius.
    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    /// Set the minimum neighborhood size.
    pub fn with_min_pts(mut self, min_pts: usize) -> Self {
        self.min_pts = min_pts;
        self
    }

    /// Configured neighborhood radius.
    pub fn eps(&self) -> f64 {
        self.eps
    }

    /// Configured minimum neighborhood size.
    pub fn min_pts(&self) -> usize {
        self.min_pts
    }

    fn validate(&self, n: usize) -> Result<()> {
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if !(self.eps > 0.0) || !self.eps.is_finite() {
            return Err(Error::InvalidParameter {
                name: "eps",
                message: "must be a positive finite number",
            });
        }
        if self.min_pts < 2 {
            return Err(Error::InvalidParameter {
                name: "min_pts",
                message: "must be at least 2",
            });
        }
        Ok(())
    }

    /// Euclidean distance between rows `a` and `b`.
    #[inline]
    fn distance(data: &Array2<f64>, a: usize, b: usize) -> f64 {
        data.row(a)
            .iter()
            .zip(data.row(b).iter())
            .map(|(x, y)| (x - y).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Indices of all other rows within `eps` of `point`.
    fn region_query(&self, data: &Array2<f64>, point: usize) -> Vec<usize> {
        (0..data.nrows())
            .filter(|&other| other != point && Self::distance(data, point, other) <= self.eps)
            .collect()
    }
}

impl Clustering for Dbscan {
    fn assign(&self, data: &Array2<f64>) -> Result<Vec<Option<usize>>> {
        let n = data.nrows();
        self.validate(n)?;

        let mut labels: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut cluster_id = 0usize;

        for point in 0..n {
            if visited[point] {
                continue;
            }
            visited[point] = true;

            let neighbors = self.region_query(data, point);
            // The neighborhood includes the row itself.
            if neighbors.len() + 1 < self.min_pts {
                // Not dense enough to seed a cluster; may still be adopted as
                // a border row later.
                continue;
            }

            labels[point] = Some(cluster_id);
            let mut frontier = neighbors;

            while let Some(next) = frontier.pop() {
                if labels[next].is_none() {
                    labels[next] = Some(cluster_id);
                }
                if visited[next] {
                    continue;
                }
                visited[next] = true;

                let next_neighbors = self.region_query(data, next);
                if next_neighbors.len() + 1 >= self.min_pts {
                    // Core row: its neighborhood joins the cluster.
                    for other in next_neighbors {
                        if !visited[other] || labels[other].is_none() {
                            frontier.push(other);
                        }
                    }
                }
            }

            cluster_id += 1;
        }

        Ok(labels)
    }
}
