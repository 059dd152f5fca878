//! Trained-pipeline artifact: fit once offline, persist, apply without
//! refitting.
//!
//! The artifact bundles everything a prediction needs to reproduce the
//! training-time transform exactly: the fitted imputation medians, the fitted
//! scaling statistics, and the k-means centroids. It is produced by a
//! one-shot offline [`PipelineArtifact::fit`], written to disk as versioned
//! JSON, and loaded read-only at serving time — load it once at startup and
//! share the handle across prediction requests; retraining produces a new
//! artifact to swap in, never a mutation of the loaded one.
//!
//! Prediction classifies a single new record into one of the training run's
//! clusters by nearest centroid. A record far outside the observed range
//! still lands in some cluster — extrapolation is not an error.
//! Recommendations then re-assign the *live* table through the same frozen
//! transform, filter to the predicted cluster and an optional category
//! substring, and sample a few matches. The sample is the one intentionally
//! random step in the crate; everything before it is deterministic.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cluster::Kmeans;
use crate::error::{Error, Result, Stage};
use crate::preprocess::{self, FittedPreprocessor, ScalerKind};
use crate::table::Table;

/// Current artifact schema version.
pub const ARTIFACT_VERSION: u32 = 1;

/// Default number of recommendations returned.
pub const DEFAULT_SAMPLE_SIZE: usize = 3;

/// A persisted, versioned bundle of fitted preprocessing statistics and
/// cluster centroids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineArtifact {
    version: u32,
    preprocessor: FittedPreprocessor,
    centroids: Vec<Vec<f64>>,
}

/// A recommended row: display fields only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    /// Stable row id.
    pub id: i64,
    /// Display title.
    pub title: String,
    /// Original feature values for display; `None` where missing.
    pub values: BTreeMap<String, Option<f64>>,
}

impl PipelineArtifact {
    /// One-shot offline training: fit the preprocessor (median imputation +
    /// standardization) and a seeded k-means on a table snapshot.
    pub fn fit(table: &Table, features: &[String], k: usize, seed: u64) -> Result<Self> {
        let (preprocessor, matrix) =
            preprocess::fit_transform(table, features, ScalerKind::Standard)?;
        let fit = Kmeans::new(k).with_seed(seed).fit(&matrix)?;

        let centroids = (0..fit.centroids.nrows())
            .map(|c| fit.centroids.row(c).iter().copied().collect())
            .collect();

        info!(rows = table.len(), k, "trained pipeline artifact");
        Ok(Self {
            version: ARTIFACT_VERSION,
            preprocessor,
            centroids,
        })
    }

    /// Number of clusters in the training run.
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Ordered feature names the artifact was trained on.
    pub fn features(&self) -> &[String] {
        self.preprocessor.features()
    }

    /// Write the artifact as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("artifact serialization failed: {e}")))?;
        fs::write(path.as_ref(), json).map_err(|e| {
            Error::Other(format!(
                "writing artifact to {} failed: {e}",
                path.as_ref().display()
            ))
        })
    }

    /// Load a previously saved artifact, read-only.
    ///
    /// A missing or unreadable file, malformed JSON, or a version mismatch
    /// all report as the artifact being unavailable — a server-side
    /// condition, distinct from request validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| Error::ArtifactUnavailable(format!("{}: {e}", path.display())))?;
        let artifact: Self = serde_json::from_str(&json)
            .map_err(|e| Error::ArtifactUnavailable(format!("{}: {e}", path.display())))?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(Error::ArtifactUnavailable(format!(
                "{}: version {} (expected {})",
                path.display(),
                artifact.version,
                ARTIFACT_VERSION
            )));
        }
        debug!(path = %path.display(), k = artifact.k(), "loaded pipeline artifact");
        Ok(artifact)
    }

    /// Classify one new record into a training-run cluster.
    ///
    /// Features absent from `record` fall back to the fitted medians, so a
    /// caller may supply any subset. The fitted transform is replayed with no
    /// refitting.
    pub fn predict(&self, record: &BTreeMap<String, f64>) -> Result<usize> {
        let scaled = self.preprocessor.transform_record(record);
        self.nearest(&scaled)
    }

    /// Re-assign every row of a live table through the frozen pipeline.
    pub fn assign_all(&self, table: &Table) -> Result<Vec<usize>> {
        let matrix = self.preprocessor.transform_table(table)?;
        (0..matrix.nrows())
            .map(|i| {
                let row: Vec<f64> = matrix.row(i).iter().copied().collect();
                self.nearest(&row)
            })
            .collect()
    }

    /// Up to `sample_size` rows of `table` sharing `predicted`'s cluster and
    /// matching the optional case-insensitive `category_filter` substring.
    ///
    /// An empty result is not an error: the predicted cluster id is still a
    /// valid answer on its own.
    pub fn recommend(
        &self,
        table: &Table,
        category_column: &str,
        category_filter: Option<&str>,
        predicted: usize,
        sample_size: usize,
    ) -> Result<Vec<Recommendation>> {
        if category_filter.is_some() && !table.is_categorical(category_column) {
            return Err(Error::UnknownCategory(category_column.to_string()));
        }
        if table.is_empty() {
            return Ok(Vec::new());
        }

        let labels = self.assign_all(table)?;
        let needle = category_filter.map(str::to_lowercase);

        let matches: Vec<Recommendation> = table
            .rows()
            .iter()
            .zip(labels.iter())
            .filter(|(_, &label)| label == predicted)
            .filter(|(row, _)| match &needle {
                Some(needle) => row
                    .categorical(category_column)
                    .map_or(false, |cell| cell.to_lowercase().contains(needle)),
                None => true,
            })
            .map(|(row, _)| Recommendation {
                id: row.id,
                title: row.title.clone(),
                values: self
                    .features()
                    .iter()
                    .map(|name| (name.clone(), row.numeric(name)))
                    .collect(),
            })
            .collect();

        debug!(
            predicted,
            candidates = matches.len(),
            sample_size,
            "sampling recommendations"
        );

        // The intentionally random step: uniform sample without replacement.
        let mut rng = rand::rng();
        Ok(matches
            .choose_multiple(&mut rng, sample_size)
            .cloned()
            .collect())
    }

    /// Index of the nearest stored centroid.
    fn nearest(&self, scaled: &[f64]) -> Result<usize> {
        if self.centroids.is_empty() {
            return Err(Error::Computation {
                stage: Stage::Cluster,
                message: "artifact has no centroids".to_string(),
            });
        }

        let mut best = 0;
        let mut best_dist = f64::MAX;
        for (c, centroid) in self.centroids.iter().enumerate() {
            let dist: f64 = scaled
                .iter()
                .zip(centroid.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            if dist < best_dist {
                best_dist = dist;
                best = c;
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Row;

    /// Budgets split cleanly into a cheap group and an expensive group.
    fn budget_table() -> Table {
        let mut table = Table::new(vec!["budget", "rating"], vec!["genres"])
            .with_zero_as_missing(vec!["budget"]);
        let rows = [
            (1, 1_000_000.0, 6.0, "Drama"),
            (2, 2_000_000.0, 6.5, "Drama, Romance"),
            (3, 1_500_000.0, 5.5, "Comedy"),
            (4, 150_000_000.0, 7.0, "Action"),
            (5, 180_000_000.0, 7.5, "Action, Adventure"),
            (6, 160_000_000.0, 6.8, "Science Fiction"),
        ];
        for (id, budget, rating, genres) in rows {
            table
                .insert(
                    Row::new(id, format!("movie-{id}"))
                        .with_numeric("budget", Some(budget))
                        .with_numeric("rating", Some(rating))
                        .with_categorical("genres", genres),
                )
                .unwrap();
        }
        table
    }

    fn feats() -> Vec<String> {
        vec!["budget".to_string(), "rating".to_string()]
    }

    fn trained() -> (Table, PipelineArtifact) {
        let table = budget_table();
        let artifact = PipelineArtifact::fit(&table, &feats(), 2, 42).unwrap();
        (table, artifact)
    }

    #[test]
    fn test_fit_stores_k_centroids() {
        let (_, artifact) = trained();
        assert_eq!(artifact.k(), 2);
        assert_eq!(artifact.features(), feats().as_slice());
    }

    #[test]
    fn test_predict_groups_by_budget() {
        let (_, artifact) = trained();

        let mut cheap = BTreeMap::new();
        let _ = cheap.insert("budget".to_string(), 1_200_000.0);
        let mut expensive = BTreeMap::new();
        let _ = expensive.insert("budget".to_string(), 170_000_000.0);

        let cheap_cluster = artifact.predict(&cheap).unwrap();
        let expensive_cluster = artifact.predict(&expensive).unwrap();
        assert_ne!(cheap_cluster, expensive_cluster);
    }

    #[test]
    fn test_predict_extrapolates_outside_observed_range() {
        let (_, artifact) = trained();

        // Far beyond anything in training: still a valid cluster id.
        let mut record = BTreeMap::new();
        let _ = record.insert("budget".to_string(), 5_000_000_000.0);
        let cluster = artifact.predict(&record).unwrap();
        assert!(cluster < artifact.k());
    }

    #[test]
    fn test_predict_with_empty_record_uses_medians() {
        let (_, artifact) = trained();
        let cluster = artifact.predict(&BTreeMap::new()).unwrap();
        assert!(cluster < artifact.k());
    }

    #[test]
    fn test_assign_all_is_deterministic_and_total() {
        let (table, artifact) = trained();
        let a = artifact.assign_all(&table).unwrap();
        let b = artifact.assign_all(&table).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), table.len());
        assert!(a.iter().all(|&c| c < artifact.k()));
    }

    #[test]
    fn test_recommend_filters_by_cluster_and_category() {
        let (table, artifact) = trained();

        let mut record = BTreeMap::new();
        let _ = record.insert("budget".to_string(), 170_000_000.0);
        let predicted = artifact.predict(&record).unwrap();

        let recs = artifact
            .recommend(&table, "genres", Some("action"), predicted, DEFAULT_SAMPLE_SIZE)
            .unwrap();

        assert!(!recs.is_empty());
        assert!(recs.len() <= DEFAULT_SAMPLE_SIZE);
        for rec in &recs {
            assert!(matches!(rec.id, 4 | 5));
        }
    }

    #[test]
    fn test_recommend_no_match_is_empty_not_error() {
        let (table, artifact) = trained();

        let mut record = BTreeMap::new();
        let _ = record.insert("budget".to_string(), 1_000_000.0);
        let predicted = artifact.predict(&record).unwrap();

        let recs = artifact
            .recommend(&table, "genres", Some("western"), predicted, 3)
            .unwrap();
        assert!(recs.is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (_, artifact) = trained();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");

        artifact.save(&path).unwrap();
        let loaded = PipelineArtifact::load(&path).unwrap();
        assert_eq!(artifact, loaded);
    }

    #[test]
    fn test_load_missing_file_is_unavailable() {
        let err = PipelineArtifact::load("/nonexistent/pipeline.json").unwrap_err();
        assert!(matches!(err, Error::ArtifactUnavailable(_)));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_load_rejects_version_mismatch() {
        let (_, artifact) = trained();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");

        let mut json = serde_json::to_value(&artifact).unwrap();
        json["version"] = serde_json::json!(99);
        std::fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

        let err = PipelineArtifact::load(&path).unwrap_err();
        assert!(matches!(err, Error::ArtifactUnavailable(msg) if msg.contains("version")));
    }
}
