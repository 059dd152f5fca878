//! End-to-end tests over the full request pipeline.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::engine::{self, Params, Request};
    use crate::error::Error;
    use crate::predict::PipelineArtifact;
    use crate::preprocess::ScalerKind;
    use crate::summarize::NOT_AVAILABLE;
    use crate::table::{Row, Table};

    /// Six movies: three low-budget dramas, three blockbusters. The blobs are
    /// far apart in every feature, so k=2 recovers them regardless of seed.
    fn six_movies() -> Table {
        let mut table = Table::new(
            vec!["vote_average", "budget"],
            vec!["genres", "spoken_languages"],
        )
        .with_zero_as_missing(vec!["budget"]);

        let rows = [
            (1, "Quiet Rooms", 6.1, 1_000_000.0, "Drama"),
            (2, "Long Winter", 6.4, 2_000_000.0, "Drama, Romance"),
            (3, "Paper Town", 5.9, 1_500_000.0, "Drama, Comedy"),
            (4, "Starfall", 7.9, 180_000_000.0, "Action, Adventure"),
            (5, "Iron Tide", 7.6, 160_000_000.0, "Action"),
            (6, "Deep Orbit", 8.0, 200_000_000.0, "Action, Science Fiction"),
        ];
        for (id, title, vote, budget, genres) in rows {
            table
                .insert(
                    Row::new(id, title)
                        .with_numeric("vote_average", Some(vote))
                        .with_numeric("budget", Some(budget))
                        .with_categorical("genres", genres)
                        .with_categorical("spoken_languages", "English"),
                )
                .unwrap();
        }
        table
    }

    fn features() -> Vec<String> {
        vec!["vote_average".to_string(), "budget".to_string()]
    }

    fn kmeans_request(k: usize, scaler: ScalerKind) -> Request {
        Request {
            features: features(),
            category: "genres".to_string(),
            params: Params::Kmeans { k, scaler },
        }
    }

    fn dbscan_request(eps: f64, min_pts: usize) -> Request {
        Request {
            features: features(),
            category: "genres".to_string(),
            params: Params::Dbscan { eps, min_pts },
        }
    }

    #[test]
    fn test_kmeans_end_to_end() {
        let table = six_movies();
        let output = engine::run(&table, &kmeans_request(2, ScalerKind::Standard)).unwrap();

        assert_eq!(output.n_clusters, 2);
        assert_eq!(output.summary.len(), 2);
        assert_eq!(output.rows.len(), 6);
        assert_eq!(output.projection.len(), 6);
        assert!(output.noise.is_none());

        // Summary counts account for every row.
        let total: usize = output.summary.iter().map(|s| s.count).sum();
        assert_eq!(total, 6);

        // The three dramas share a cluster, as do the three blockbusters.
        assert_eq!(output.rows[0].cluster, output.rows[1].cluster);
        assert_eq!(output.rows[1].cluster, output.rows[2].cluster);
        assert_eq!(output.rows[3].cluster, output.rows[4].cluster);
        assert_ne!(output.rows[0].cluster, output.rows[3].cluster);

        // Dominant genres follow the blobs.
        let by_count_drama = output
            .summary
            .iter()
            .find(|s| s.cluster as i64 == output.rows[0].cluster)
            .unwrap();
        assert_eq!(by_count_drama.dominant_category, "Drama");
        let blockbusters = output
            .summary
            .iter()
            .find(|s| s.cluster as i64 == output.rows[3].cluster)
            .unwrap();
        assert_eq!(blockbusters.dominant_category, "Action");
    }

    #[test]
    fn test_kmeans_minmax_path() {
        let table = six_movies();
        let output = engine::run(&table, &kmeans_request(2, ScalerKind::MinMax)).unwrap();
        assert_eq!(output.n_clusters, 2);
    }

    #[test]
    fn test_kmeans_repeated_requests_identical() {
        let table = six_movies();
        let request = kmeans_request(2, ScalerKind::Standard);

        let a = engine::run(&table, &request).unwrap();
        let b = engine::run(&table, &request).unwrap();

        let labels_a: Vec<i64> = a.rows.iter().map(|r| r.cluster).collect();
        let labels_b: Vec<i64> = b.rows.iter().map(|r| r.cluster).collect();
        assert_eq!(labels_a, labels_b);
    }

    #[test]
    fn test_projection_zips_with_rows_positionally() {
        let table = six_movies();
        let output = engine::run(&table, &kmeans_request(2, ScalerKind::Standard)).unwrap();

        for (row, point) in output.rows.iter().zip(output.projection.iter()) {
            assert_eq!(row.cluster, point.cluster);
            assert!(point.pc1.is_finite());
            assert!(point.pc2.is_finite());
        }
        // Input row order is preserved.
        let ids: Vec<i64> = output.rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_dbscan_end_to_end_counts_add_up() {
        let table = six_movies();
        // Tight radius: the two blobs are dense, nothing in between.
        let output = engine::run(&table, &dbscan_request(1.0, 2)).unwrap();

        let noise = output.noise.expect("density path reports noise info");
        assert_eq!(noise.eps, 1.0);
        assert_eq!(noise.min_pts, 2);

        let clustered: usize = output.summary.iter().map(|s| s.count).sum();
        assert_eq!(clustered + noise.noise_points, 6);

        // Every non-noise label in the rows appears in the summary exactly once.
        let mut labels: Vec<i64> = output
            .rows
            .iter()
            .map(|r| r.cluster)
            .filter(|&c| c >= 0)
            .collect();
        labels.sort_unstable();
        labels.dedup();
        let summary_ids: Vec<i64> = output.summary.iter().map(|s| s.cluster as i64).collect();
        assert_eq!(labels, summary_ids);
    }

    #[test]
    fn test_dbscan_noise_bounded_by_row_count() {
        let table = six_movies();
        // Radius too small for anything to connect: everything is noise.
        let output = engine::run(&table, &dbscan_request(1e-6, 3)).unwrap();

        let noise = output.noise.unwrap();
        assert_eq!(noise.noise_points, 6);
        assert_eq!(output.n_clusters, 0);
        assert!(output.summary.is_empty());
        assert!(output.rows.iter().all(|r| r.cluster == -1));
    }

    #[test]
    fn test_missing_values_do_not_break_pipeline() {
        let mut table = six_movies();
        let _ = table.insert_all([
            Row::new(7, "No Budget")
                .with_numeric("vote_average", Some(6.0))
                .with_numeric("budget", Some(0.0)) // zero-as-missing
                .with_categorical("genres", "Drama"),
            Row::new(8, "No Numbers").with_categorical("genres", ""),
        ]);

        let output = engine::run(&table, &kmeans_request(2, ScalerKind::Standard)).unwrap();
        assert_eq!(output.rows.len(), 8);
        let total: usize = output.summary.iter().map(|s| s.count).sum();
        assert_eq!(total, 8);
    }

    #[test]
    fn test_empty_genres_summary_uses_sentinel() {
        let mut table = Table::new(vec!["rating"], vec!["genres"]);
        let _ = table.insert_all((0..4).map(|i| {
            Row::new(i, format!("m{i}"))
                .with_numeric("rating", Some(if i < 2 { 1.0 } else { 100.0 }))
                .with_categorical("genres", "")
        }));

        let request = Request {
            features: vec!["rating".to_string()],
            category: "genres".to_string(),
            params: Params::Kmeans {
                k: 2,
                scaler: ScalerKind::Standard,
            },
        };
        let output = engine::run(&table, &request).unwrap();
        for summary in &output.summary {
            assert_eq!(summary.dominant_category, NOT_AVAILABLE);
        }
    }

    #[test]
    fn test_validation_errors_are_immediate() {
        let table = six_movies();

        assert!(matches!(
            engine::run(&table, &kmeans_request(1, ScalerKind::Standard)),
            Err(Error::InvalidParameter { name: "k", .. })
        ));
        assert!(matches!(
            engine::run(&table, &dbscan_request(0.0, 3)),
            Err(Error::InvalidParameter { name: "eps", .. })
        ));
        assert!(matches!(
            engine::run(&table, &dbscan_request(0.5, 1)),
            Err(Error::InvalidParameter { name: "min_pts", .. })
        ));

        let mut bad_feature = kmeans_request(2, ScalerKind::Standard);
        bad_feature.features.push("genres".to_string());
        assert!(matches!(
            engine::run(&table, &bad_feature),
            Err(Error::UnknownFeature(name)) if name == "genres"
        ));
    }

    #[test]
    fn test_scaler_selector_parse_feeds_engine() {
        let table = six_movies();
        let scaler = ScalerKind::parse("minMaxScaler").unwrap();
        let output = engine::run(&table, &kmeans_request(2, scaler)).unwrap();
        assert_eq!(output.n_clusters, 2);

        assert!(matches!(
            ScalerKind::parse("powerTransformer"),
            Err(Error::UnknownScaler(_))
        ));
    }

    #[test]
    fn test_shared_snapshot_across_threads() {
        let snapshot = six_movies().into_snapshot();
        let request = kmeans_request(2, ScalerKind::Standard);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let snapshot = std::sync::Arc::clone(&snapshot);
                let request = request.clone();
                std::thread::spawn(move || engine::run(&snapshot, &request).unwrap())
            })
            .collect();

        let outputs: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let first: Vec<i64> = outputs[0].rows.iter().map(|r| r.cluster).collect();
        for output in &outputs {
            assert_eq!(output.n_clusters, 2);
            let labels: Vec<i64> = output.rows.iter().map(|r| r.cluster).collect();
            assert_eq!(labels, first);
        }
    }

    #[test]
    fn test_train_predict_recommend_round_trip() {
        let table = six_movies();
        let artifact = PipelineArtifact::fit(&table, &features(), 2, 42).unwrap();

        // Far-out-of-range budget still classifies.
        let mut record = BTreeMap::new();
        let _ = record.insert("budget".to_string(), 2_000_000_000.0);
        let _ = record.insert("vote_average".to_string(), 9.9);
        let predicted = artifact.predict(&record).unwrap();
        assert!(predicted < artifact.k());

        let recs = artifact
            .recommend(&table, "genres", Some("Action"), predicted, 3)
            .unwrap();
        assert!(recs.len() <= 3);
        for rec in &recs {
            assert!(!rec.title.is_empty());
        }
    }
}
