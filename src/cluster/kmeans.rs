//! K-means clustering.
//!
//! Partitions rows into a caller-specified number of groups by minimizing
//! **within-cluster sum of squares** (WCSS):
//!
//! ```text
//! WCSS = Σₖ Σᵢ∈Cₖ ||xᵢ - μₖ||²
//! ```
//!
//! Lloyd iterations over k-means++ starting centroids. Lloyd only finds a
//! local minimum, so the fit runs `n_init` independent restarts and keeps the
//! assignment with the lowest WCSS.
//!
//! # Determinism
//!
//! Every source of randomness is driven by the configured seed: restart `r`
//! uses `seed + r`, so repeated fits on identical input produce identical
//! labels. This is a contract of the request pipeline, not a convenience —
//! callers compare cluster ids across repeated requests.
//!
//! # Inputs
//!
//! Expects the scaled matrix produced by the preprocessor. Raw movie columns
//! span wildly different ranges (a budget in the hundreds of millions next to
//! a 0–10 rating), and squared Euclidean distance would otherwise be decided
//! by the largest column alone.

use ndarray::{Array2, ArrayView1};
use rand::prelude::*;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::traits::Clustering;
use crate::error::{Error, Result};

/// K-means clustering strategy (fixed cluster count).
#[derive(Debug, Clone)]
pub struct Kmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum Lloyd iterations per restart.
    max_iter: usize,
    /// Independent restarts; the lowest-WCSS run wins.
    n_init: usize,
    /// Convergence tolerance on total centroid shift.
    tol: f64,
    /// Base random seed.
    seed: u64,
}

/// Result of a k-means fit: labels, final centroids, and the objective.
#[derive(Debug, Clone)]
pub struct KmeansFit {
    /// Cluster label per row, in `[0, k)`.
    pub labels: Vec<usize>,
    /// Final centroids, shape `(k, n_features)`.
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares of the winning restart.
    pub inertia: f64,
}

impl Kmeans {
    /// Create a new K-means clusterer with `k` clusters.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 300,
            n_init: 10,
            tol: 1e-4,
            seed: 42,
        }
    }

    /// Set maximum iterations per restart.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the number of independent restarts.
    pub fn with_n_init(mut self, n_init: usize) -> Self {
        self.n_init = n_init.max(1);
        self
    }

    /// Set convergence tolerance.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Set the base random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Requested cluster count.
    pub fn k(&self) -> usize {
        self.k
    }

    /// Fit on a scaled matrix, returning labels, centroids, and inertia.
    pub fn fit(&self, data: &Array2<f64>) -> Result<KmeansFit> {
        let n = data.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if self.k < 2 {
            return Err(Error::InvalidParameter {
                name: "k",
                message: "must be at least 2",
            });
        }
        if self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }

        let mut best = self.lloyd(data, self.seed);
        for restart in 1..self.n_init {
            let fit = self.lloyd(data, self.seed.wrapping_add(restart as u64));
            if fit.inertia < best.inertia {
                best = fit;
            }
        }
        Ok(best)
    }

    /// One Lloyd run from a k-means++ start.
    fn lloyd(&self, data: &Array2<f64>, seed: u64) -> KmeansFit {
        let n = data.nrows();
        let d = data.ncols();
        let mut rng = StdRng::seed_from_u64(seed);

        let mut centroids = self.init_centroids(data, &mut rng);
        let mut labels = vec![0usize; n];

        for _iter in 0..self.max_iter {
            Self::assign_step(data, &centroids, &mut labels);

            // Update step
            let mut new_centroids = Array2::zeros((self.k, d));
            let mut counts = vec![0usize; self.k];

            for i in 0..n {
                let c = labels[i];
                for j in 0..d {
                    new_centroids[[c, j]] += data[[i, j]];
                }
                counts[c] += 1;
            }

            for c in 0..self.k {
                if counts[c] > 0 {
                    for j in 0..d {
                        new_centroids[[c, j]] /= counts[c] as f64;
                    }
                } else {
                    // Empty cluster: re-seed from a random row.
                    let idx = rng.random_range(0..n);
                    new_centroids.row_mut(c).assign(&data.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();

            centroids = new_centroids;

            if shift < self.tol {
                break;
            }
        }

        // Final assignment against the converged centroids, so labels,
        // centroids, and inertia agree.
        Self::assign_step(data, &centroids, &mut labels);
        let inertia = (0..n)
            .map(|i| Self::squared_distance(&data.row(i), &centroids.row(labels[i])))
            .sum();

        KmeansFit {
            labels,
            centroids,
            inertia,
        }
    }

    /// Assign every row to its nearest centroid (ties to the lowest index).
    fn assign_step(data: &Array2<f64>, centroids: &Array2<f64>, labels: &mut [usize]) {
        #[cfg(feature = "parallel")]
        labels.par_iter_mut().enumerate().for_each(|(i, label)| {
            *label = Self::nearest(&data.row(i), centroids);
        });

        #[cfg(not(feature = "parallel"))]
        for (i, label) in labels.iter_mut().enumerate() {
            *label = Self::nearest(&data.row(i), centroids);
        }
    }

    fn nearest(point: &ArrayView1<'_, f64>, centroids: &Array2<f64>) -> usize {
        let mut best_cluster = 0;
        let mut best_dist = f64::MAX;
        for c in 0..centroids.nrows() {
            let dist = Self::squared_distance(point, &centroids.row(c));
            if dist < best_dist {
                best_dist = dist;
                best_cluster = c;
            }
        }
        best_cluster
    }

    /// Initialize centroids with k-means++ seeding.
    fn init_centroids(&self, data: &Array2<f64>, rng: &mut impl Rng) -> Array2<f64> {
        let n = data.nrows();
        let d = data.ncols();
        let mut centroids = Array2::zeros((self.k, d));

        // First centroid: random row
        let first = rng.random_range(0..n);
        centroids.row_mut(0).assign(&data.row(first));

        // Remaining centroids: sample proportional to squared distance from
        // the nearest already-chosen centroid
        for i in 1..self.k {
            let mut distances: Vec<f64> = Vec::with_capacity(n);
            for j in 0..n {
                let point = data.row(j);
                let min_dist = (0..i)
                    .map(|c| Self::squared_distance(&point, &centroids.row(c)))
                    .fold(f64::MAX, f64::min);
                distances.push(min_dist);
            }

            let total: f64 = distances.iter().sum();
            if total == 0.0 {
                // All rows coincide with a chosen centroid
                let idx = rng.random_range(0..n);
                centroids.row_mut(i).assign(&data.row(idx));
                continue;
            }

            let threshold = rng.random::<f64>() * total;
            let mut cumsum = 0.0;
            let mut selected = n - 1;
            for (j, &dist) in distances.iter().enumerate() {
                cumsum += dist;
                if cumsum >= threshold {
                    selected = j;
                    break;
                }
            }
            centroids.row_mut(i).assign(&data.row(selected));
        }

        centroids
    }

    /// Squared Euclidean distance.
    fn squared_distance(a: &ArrayView1<'_, f64>, b: &ArrayView1<'_, f64>) -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
    }
}

impl Clustering for Kmeans {
    fn assign(&self, data: &Array2<f64>) -> Result<Vec<Option<usize>>> {
        let fit = self.fit(data)?;
        Ok(fit.labels.into_iter().map(Some).collect())
    }
}
