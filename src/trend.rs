//! Category trend analysis over a time-windowed aggregate series

use crate::model::{CategoryAggregate, TrendRecord};
use std::collections::{BTreeSet, HashMap};

/// Computes net category movement across a window of snapshots
///
/// Only the earliest and latest entries of the window are compared:
/// trend reflects net movement across the window, not a moving average.
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Compare the endpoints of `window` (ascending by time)
    ///
    /// Fewer than two distinct times is insufficient history and yields
    /// an empty result, not an error. Categories missing from one
    /// endpoint default to count 0; empty tags are excluded.
    pub fn trends(&self, window: &[(i64, Vec<CategoryAggregate>)]) -> Vec<TrendRecord> {
        let distinct: BTreeSet<i64> = window.iter().map(|(t, _)| *t).collect();
        if distinct.len() < 2 {
            return Vec::new();
        }

        let (_, earliest) = &window[0];
        let (_, latest) = &window[window.len() - 1];

        let earliest_map: HashMap<&str, &CategoryAggregate> =
            earliest.iter().map(|a| (a.category.as_str(), a)).collect();
        let latest_map: HashMap<&str, &CategoryAggregate> =
            latest.iter().map(|a| (a.category.as_str(), a)).collect();

        // Union of both endpoints, latest first so new categories keep
        // their aggregate order on ties
        let mut all: Vec<&str> = Vec::new();
        for agg in latest.iter().chain(earliest.iter()) {
            if !agg.category.is_empty() && !all.contains(&agg.category.as_str()) {
                all.push(agg.category.as_str());
            }
        }

        let mut trends: Vec<TrendRecord> = all
            .into_iter()
            .map(|category| {
                let now = latest_map.get(category);
                let then = earliest_map.get(category);
                let current_count = now.map(|a| a.count).unwrap_or(0);
                let previous_count = then.map(|a| a.count).unwrap_or(0);
                TrendRecord {
                    category: category.to_string(),
                    current_count,
                    previous_count,
                    change: current_count as i64 - previous_count as i64,
                    avg_rank: now.map(|a| a.avg_rank),
                }
            })
            .collect();

        trends.sort_by_key(|t| -t.change);
        trends
    }
}

impl Default for TrendAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
