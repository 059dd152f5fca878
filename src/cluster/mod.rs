//! Clustering strategies for grouping catalog rows.
//!
//! Two interchangeable strategies over one capability — assign an integer
//! label to every row of a scaled feature matrix (the [`Clustering`] trait):
//!
//! - [`Kmeans`]: partition-based. The caller fixes the cluster count `k`;
//!   every row receives a label in `[0, k)`. Seeded, multi-restart, fully
//!   deterministic.
//! - [`Dbscan`]: density-based. The caller fixes a neighborhood radius and a
//!   minimum density; the cluster count falls out of the data, and rows in
//!   no dense region become noise (`None`, serialized as
//!   [`NOISE_LABEL`](traits::NOISE_LABEL)).
//!
//! Which strategy runs is decided once, at request entry, by matching the
//! request's parameter variant — never re-branched inside shared code.
//!
//! ```rust
//! use troupe::cluster::{Clustering, Kmeans};
//! use ndarray::array;
//!
//! let data = array![[0.0, 0.0], [0.1, 0.1], [10.0, 10.0], [10.1, 10.1]];
//! let labels = Kmeans::new(2).assign(&data).unwrap();
//! assert_eq!(labels[0], labels[1]);
//! assert_ne!(labels[0], labels[2]);
//! ```

mod dbscan;
mod kmeans;
mod traits;

pub use dbscan::Dbscan;
pub use kmeans::{Kmeans, KmeansFit};
pub use traits::{cluster_count, noise_count, Clustering, NOISE_LABEL};
