//! 2-D projection of the scaled feature matrix, for plotting only.
//!
//! Principal-component style: the two orthogonal directions that retain the
//! most variance. The matrix is mean-centered, its feature covariance is
//! formed, and the top two eigenvectors are extracted by power iteration
//! (the second deflated against the first). The covariance is tiny — K×K for
//! K requested features — so the simple iteration is plenty.
//!
//! The projection is computed from the same scaled matrix the clusterer saw,
//! but is independent of which strategy produced the labels: callers zip
//! points with labels positionally. Output order always matches input row
//! order.
//!
//! Degenerate inputs are not errors: a constant matrix (or a single row)
//! projects to all-zero coordinates.

use faer::Mat;
use ndarray::Array2;
use tracing::debug;

use crate::error::{Error, Result, Stage};

const POWER_ITERATIONS: usize = 300;
const CONVERGENCE_TOL: f64 = 1e-12;

/// Project every row of `data` onto its two principal directions.
///
/// Returns one `(pc1, pc2)` pair per row, in row order. With a single
/// feature column the second coordinate is 0.0.
pub fn principal_plane(data: &Array2<f64>) -> Result<Vec<(f64, f64)>> {
    let n = data.nrows();
    let k = data.ncols();
    if n == 0 || k == 0 {
        return Err(Error::EmptyInput);
    }

    let means: Vec<f64> = (0..k)
        .map(|j| (0..n).map(|i| data[[i, j]]).sum::<f64>() / n as f64)
        .collect();

    if n < 2 {
        // No variance to decompose.
        return Ok(vec![(0.0, 0.0); n]);
    }

    let cov = covariance(data, &means);
    let first = dominant_direction(&cov, None);
    let second = if k >= 2 {
        dominant_direction(&cov, Some(&first))
    } else {
        vec![0.0; k]
    };

    debug!(rows = n, features = k, "projected onto principal plane");

    let mut points = Vec::with_capacity(n);
    for i in 0..n {
        let mut pc1 = 0.0;
        let mut pc2 = 0.0;
        for j in 0..k {
            let centered = data[[i, j]] - means[j];
            pc1 += centered * first[j];
            pc2 += centered * second[j];
        }
        if !pc1.is_finite() || !pc2.is_finite() {
            return Err(Error::Computation {
                stage: Stage::Project,
                message: format!("non-finite projection for row {i}"),
            });
        }
        points.push((pc1, pc2));
    }

    Ok(points)
}

/// Sample covariance of the feature columns (divisor N−1).
fn covariance(data: &Array2<f64>, means: &[f64]) -> Mat<f64> {
    let n = data.nrows();
    let k = data.ncols();
    let mut cov = Mat::<f64>::zeros(k, k);

    for a in 0..k {
        for b in a..k {
            let mut sum = 0.0;
            for i in 0..n {
                sum += (data[[i, a]] - means[a]) * (data[[i, b]] - means[b]);
            }
            let value = sum / (n as f64 - 1.0);
            cov[(a, b)] = value;
            cov[(b, a)] = value;
        }
    }

    cov
}

/// Leading eigenvector of a symmetric PSD matrix by power iteration,
/// optionally constrained orthogonal to a previous direction (deflation).
///
/// Deterministic: starts from a fixed uniform vector. A zero matrix (or a
/// subspace with no remaining variance) yields the zero vector, which
/// projects everything to 0.0 downstream.
fn dominant_direction(cov: &Mat<f64>, orthogonal_to: Option<&[f64]>) -> Vec<f64> {
    let k = cov.nrows();
    let mut v = Mat::<f64>::zeros(k, 1);
    let uniform = 1.0 / (k as f64).sqrt();
    for j in 0..k {
        v[(j, 0)] = uniform;
    }
    orthogonalize(&mut v, orthogonal_to);

    for _ in 0..POWER_ITERATIONS {
        let mut next = cov * &v;
        orthogonalize(&mut next, orthogonal_to);

        let norm = column_norm(&next);
        if norm < CONVERGENCE_TOL {
            // No variance along any admissible direction.
            return vec![0.0; k];
        }
        for j in 0..k {
            next[(j, 0)] /= norm;
        }

        // Converged when the direction stops moving (sign-insensitive).
        let mut same = 0.0;
        let mut flipped = 0.0;
        for j in 0..k {
            same += (next[(j, 0)] - v[(j, 0)]).powi(2);
            flipped += (next[(j, 0)] + v[(j, 0)]).powi(2);
        }
        v = next;
        if same.min(flipped) < CONVERGENCE_TOL {
            break;
        }
    }

    (0..k).map(|j| v[(j, 0)]).collect()
}

/// Remove the component of `v` along `direction`, in place.
fn orthogonalize(v: &mut Mat<f64>, direction: Option<&[f64]>) {
    let Some(u) = direction else { return };
    let k = v.nrows();
    let dot: f64 = (0..k).map(|j| v[(j, 0)] * u[j]).sum();
    for j in 0..k {
        v[(j, 0)] -= dot * u[j];
    }
}

fn column_norm(v: &Mat<f64>) -> f64 {
    (0..v.nrows()).map(|j| v[(j, 0)].powi(2)).sum::<f64>().sqrt()
}
