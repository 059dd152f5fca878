//! Per-cluster summaries over the original (unscaled) row values.
//!
//! For every real cluster in an assignment: member count, the mean of each
//! requested feature over members that actually have a value, and the
//! dominant category drawn from a delimited multi-valued field such as
//! `"Action, Drama"`. Noise rows are excluded from every statistic.
//!
//! Summary ids are exactly the distinct non-noise labels present in the
//! assignment, ascending — a cluster with zero rows cannot appear because
//! labels only come from rows.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::table::Table;

/// Sentinel reported when a cluster has no usable category tokens.
pub const NOT_AVAILABLE: &str = "N/A";

/// Count and mean of one feature over a cluster's members.
///
/// `count` is the number of members with an observed value (zero-as-missing
/// columns can make it smaller than the cluster size); `mean` is `None` when
/// nothing was observed — never NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureStat {
    /// Members with an observed value.
    pub count: usize,
    /// Mean of the observed values.
    pub mean: Option<f64>,
}

/// Aggregate description of one real cluster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSummary {
    /// Cluster id.
    pub cluster: usize,
    /// Number of member rows.
    pub count: usize,
    /// Per-feature statistics, keyed by feature name.
    pub features: BTreeMap<String, FeatureStat>,
    /// Most frequent category token among members, or [`NOT_AVAILABLE`].
    pub dominant_category: String,
}

/// Summarize every real cluster of `labels` against the original table
/// values.
///
/// `labels` must be in table row order (one entry per row); `None` entries
/// are noise and contribute to nothing. `category_column` is the delimited
/// multi-valued field the dominant category is drawn from.
pub fn cluster_summaries(
    table: &Table,
    features: &[String],
    labels: &[Option<usize>],
    category_column: &str,
) -> Result<Vec<ClusterSummary>> {
    table.check_features(features)?;
    if !table.is_categorical(category_column) {
        return Err(Error::UnknownCategory(category_column.to_string()));
    }
    if labels.len() != table.len() {
        return Err(Error::DimensionMismatch {
            expected: table.len(),
            found: labels.len(),
        });
    }

    let mut members: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, label) in labels.iter().enumerate() {
        if let Some(cluster) = label {
            members.entry(*cluster).or_default().push(i);
        }
    }

    let mut summaries = Vec::with_capacity(members.len());
    for (cluster, rows) in members {
        let mut stats = BTreeMap::new();
        for name in features {
            let observed: Vec<f64> = rows
                .iter()
                .filter_map(|&i| table.clean_value(&table.rows()[i], name))
                .collect();
            let mean = if observed.is_empty() {
                None
            } else {
                Some(observed.iter().sum::<f64>() / observed.len() as f64)
            };
            let _ = stats.insert(
                name.clone(),
                FeatureStat {
                    count: observed.len(),
                    // Belt-and-braces: a mean of finite values is finite, but
                    // nothing non-finite may leave the core.
                    mean: mean.filter(|m| m.is_finite()),
                },
            );
        }

        let dominant = dominant_category(
            rows.iter()
                .filter_map(|&i| table.rows()[i].categorical(category_column)),
        );

        summaries.push(ClusterSummary {
            cluster,
            count: rows.len(),
            features: stats,
            dominant_category: dominant,
        });
    }

    Ok(summaries)
}

/// Most frequent category token across a set of delimited values.
///
/// Each value is split on commas; tokens are trimmed of whitespace and
/// surrounding punctuation, and empties are dropped. Frequency ties break
/// lexicographically (smallest string wins) so the result does not depend on
/// row traversal order.
pub fn dominant_category<'a>(values: impl Iterator<Item = &'a str>) -> String {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        for raw in value.split(',') {
            let token = clean_token(raw);
            if !token.is_empty() {
                *counts.entry(token.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (token, &count) in &counts {
        // Strictly greater keeps the lexicographically first token on ties
        // (BTreeMap iterates in sorted order).
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((token, count));
        }
    }

    best.map_or_else(|| NOT_AVAILABLE.to_string(), |(token, _)| token.to_string())
}

/// Strip whitespace and surrounding punctuation, brackets, and quotes.
fn clean_token(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '[' | ']' | '(' | ')' | '{' | '}' | '.'))
        .trim()
}
