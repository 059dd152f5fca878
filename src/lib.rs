//! # troupe
//!
//! Clustering and summarization core for a tabular movie catalog: missing-value
//! imputation, feature scaling, partition-based and density-based clustering,
//! 2-D projection for visualization, per-cluster summaries with a dominant
//! category, and a persisted trained pipeline for classifying new records.
//!
//! The crate is the computational core behind a query API. Routing, CSV
//! loading, pagination, and filtering live outside; they hand in an immutable
//! [`table::Table`] snapshot and receive structured results back.
//!
//! ```rust
//! use troupe::engine::{self, Params, Request};
//! use troupe::preprocess::ScalerKind;
//! use troupe::table::{Row, Table};
//!
//! let mut table = Table::new(vec!["rating", "budget"], vec!["genres"])
//!     .with_zero_as_missing(vec!["budget"]);
//! for i in 0..6 {
//!     let side = if i < 3 { 0.0 } else { 100.0 };
//!     table
//!         .insert(
//!             Row::new(i, format!("movie-{i}"))
//!                 .with_numeric("rating", Some(5.0 + side / 50.0))
//!                 .with_numeric("budget", Some(1_000_000.0 * (1.0 + side)))
//!                 .with_categorical("genres", "Drama"),
//!         )
//!         .unwrap();
//! }
//!
//! let request = Request {
//!     features: vec!["rating".to_string(), "budget".to_string()],
//!     category: "genres".to_string(),
//!     params: Params::Kmeans { k: 2, scaler: ScalerKind::Standard },
//! };
//! let output = engine::run(&table, &request).unwrap();
//! assert_eq!(output.n_clusters, 2);
//! assert_eq!(output.projection.len(), 6);
//! ```

pub mod cluster;
pub mod engine;
/// Error types used across `troupe`.
pub mod error;
pub mod predict;
pub mod preprocess;
pub mod project;
pub mod summarize;
pub mod table;

#[cfg(test)]
mod engine_tests;

pub use cluster::{Clustering, Dbscan, Kmeans, KmeansFit, NOISE_LABEL};
pub use engine::{ClusteringOutput, Params, Request};
pub use error::{Error, Result};
pub use predict::{PipelineArtifact, Recommendation, DEFAULT_SAMPLE_SIZE};
pub use preprocess::{FittedPreprocessor, ScalerKind};
pub use summarize::{ClusterSummary, FeatureStat, NOT_AVAILABLE};
pub use table::{Row, Snapshot, Table};
