//! Pairwise snapshot diffing with configurable surge thresholds

use crate::config::AnalyzerConfig;
use crate::model::{ChangeSet, ItemRecord, MetricSurge, RankShift, Snapshot};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Data-integrity violation inside a single snapshot
///
/// Fatal for that snapshot's processing: tolerating a duplicate id or a
/// gapped rank sequence would silently corrupt surge/drop classification.
#[derive(Debug, PartialEq)]
pub enum IntegrityError {
    DuplicateItemId { source: String, item_id: String },
    BadRankSequence { source: String, captured_at: i64 },
}

impl std::fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityError::DuplicateItemId { source, item_id } => {
                write!(f, "Duplicate item id '{}' in snapshot for {}", item_id, source)
            }
            IntegrityError::BadRankSequence { source, captured_at } => {
                write!(
                    f,
                    "Ranks are not a dense 1..N permutation in snapshot for {} at {}",
                    source, captured_at
                )
            }
        }
    }
}

impl std::error::Error for IntegrityError {}

/// Compares two snapshots of one source and categorizes every change
pub struct ChangeDetector {
    rank_surge_threshold: i64,
    read_surge_pct: f64,
    collect_surge_pct: f64,
}

impl ChangeDetector {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            rank_surge_threshold: config.rank_surge_threshold,
            read_surge_pct: config.read_surge_pct,
            collect_surge_pct: config.collect_surge_pct,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&AnalyzerConfig::default())
    }

    /// Diff `current` against `previous` into a fully ordered change set
    ///
    /// With no previous snapshot (first crawl of a source) every current
    /// item is a new entry and the other seven sequences stay empty.
    /// Both snapshots are integrity-checked before any comparison.
    pub fn detect(
        &self,
        current: &Snapshot,
        previous: Option<&Snapshot>,
    ) -> Result<ChangeSet, IntegrityError> {
        let curr_map = index_by_id(current)?;

        let mut changes = ChangeSet::default();

        let prev_snapshot = match previous {
            Some(prev) => prev,
            None => {
                changes.new_entries = current.items.clone();
                changes.new_entries.sort_by_key(|item| item.rank);
                return Ok(changes);
            }
        };
        let prev_map = index_by_id(prev_snapshot)?;

        for item in &current.items {
            let prev = match prev_map.get(item.item_id.as_str()) {
                Some(prev) => *prev,
                None => {
                    changes.new_entries.push(item.clone());
                    continue;
                }
            };

            let rank_diff = prev.rank as i64 - item.rank as i64; // positive = moved up

            if rank_diff >= self.rank_surge_threshold {
                changes.rank_surges.push(shift(item, prev, rank_diff));
            } else if rank_diff <= -self.rank_surge_threshold {
                changes.rank_drops.push(shift(item, prev, rank_diff));
            }

            if rank_diff > 0 {
                changes.top_movers_up.push(shift(item, prev, rank_diff));
            } else if rank_diff < 0 {
                changes.top_movers_down.push(shift(item, prev, rank_diff));
            }

            // Metric surges require a strictly positive previous value;
            // growth from zero is undefined, not infinite.
            if let Some(surge) = metric_surge(
                item,
                prev.read_count.unwrap_or(0),
                item.read_count.unwrap_or(0),
                self.read_surge_pct,
            ) {
                changes.read_surges.push(surge);
            }

            if let Some(surge) = metric_surge(
                item,
                prev.collect_count.unwrap_or(0),
                item.collect_count.unwrap_or(0),
                self.collect_surge_pct,
            ) {
                changes.collect_surges.push(surge);
            }
        }

        for item in &prev_snapshot.items {
            if !curr_map.contains_key(item.item_id.as_str()) {
                changes.exits.push(item.clone());
            }
        }

        // Stable sorts: ties keep snapshot rank order for reproducibility
        changes.rank_surges.sort_by_key(|s| -s.rank_change);
        changes.rank_drops.sort_by_key(|s| s.rank_change);
        changes.top_movers_up.sort_by_key(|s| -s.rank_change);
        changes.top_movers_down.sort_by_key(|s| s.rank_change);
        changes.read_surges.sort_by(desc_by_pct);
        changes.collect_surges.sort_by(desc_by_pct);
        changes.new_entries.sort_by_key(|item| item.rank);

        Ok(changes)
    }
}

fn shift(item: &ItemRecord, prev: &ItemRecord, rank_change: i64) -> RankShift {
    RankShift {
        item: item.clone(),
        prev_rank: prev.rank,
        rank_change,
    }
}

fn metric_surge(
    item: &ItemRecord,
    prev_value: u64,
    curr_value: u64,
    threshold_pct: f64,
) -> Option<MetricSurge> {
    if prev_value == 0 {
        return None;
    }

    // Threshold comparison uses the raw percentage; rounding is for
    // display only and must not promote a just-under change
    let pct = (curr_value as f64 - prev_value as f64) / prev_value as f64 * 100.0;

    if pct >= threshold_pct {
        Some(MetricSurge {
            item: item.clone(),
            prev_value,
            change_pct: (pct * 10.0).round() / 10.0,
        })
    } else {
        None
    }
}

fn desc_by_pct(a: &MetricSurge, b: &MetricSurge) -> Ordering {
    b.change_pct
        .partial_cmp(&a.change_pct)
        .unwrap_or(Ordering::Equal)
}

/// Index a snapshot by item id, validating id uniqueness and rank density
fn index_by_id(snapshot: &Snapshot) -> Result<HashMap<&str, &ItemRecord>, IntegrityError> {
    let mut map = HashMap::with_capacity(snapshot.items.len());
    for item in &snapshot.items {
        if map.insert(item.item_id.as_str(), item).is_some() {
            return Err(IntegrityError::DuplicateItemId {
                source: snapshot.source.clone(),
                item_id: item.item_id.clone(),
            });
        }
    }

    // Ranks must be a permutation of 1..=N with no duplicates or gaps
    let n = snapshot.items.len();
    let mut seen = vec![false; n];
    for item in &snapshot.items {
        let rank = item.rank as usize;
        if rank < 1 || rank > n || seen[rank - 1] {
            return Err(IntegrityError::BadRankSequence {
                source: snapshot.source.clone(),
                captured_at: snapshot.captured_at,
            });
        }
        seen[rank - 1] = true;
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, rank: u32) -> ItemRecord {
        ItemRecord {
            item_id: id.to_string(),
            title: format!("Title {}", id),
            description: None,
            categories: vec![],
            rank,
            read_count: None,
            collect_count: None,
            like_count: None,
            score: None,
        }
    }

    fn item_with_reads(id: &str, rank: u32, reads: u64) -> ItemRecord {
        ItemRecord {
            read_count: Some(reads),
            ..item(id, rank)
        }
    }

    fn snapshot(items: Vec<ItemRecord>) -> Snapshot {
        Snapshot::new("test_source", 1_700_000_000, items)
    }

    fn config(surge_threshold: i64, read_pct: f64, collect_pct: f64) -> AnalyzerConfig {
        AnalyzerConfig {
            rank_surge_threshold: surge_threshold,
            read_surge_pct: read_pct,
            collect_surge_pct: collect_pct,
            ..AnalyzerConfig::default()
        }
    }

    #[test]
    fn test_first_snapshot_all_new() {
        let detector = ChangeDetector::with_defaults();
        let current = snapshot(vec![item("b", 2), item("a", 1), item("c", 3)]);

        let changes = detector.detect(&current, None).unwrap();

        let ids: Vec<&str> = changes.new_entries.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]); // sorted by rank
        assert!(changes.exits.is_empty());
        assert!(changes.rank_surges.is_empty());
        assert!(changes.rank_drops.is_empty());
        assert!(changes.read_surges.is_empty());
        assert!(changes.collect_surges.is_empty());
        assert!(changes.top_movers_up.is_empty());
        assert!(changes.top_movers_down.is_empty());
    }

    #[test]
    fn test_self_comparison_is_quiet() {
        let detector = ChangeDetector::with_defaults();
        let snap = snapshot(vec![
            item_with_reads("a", 1, 100),
            item_with_reads("b", 2, 200),
            item_with_reads("c", 3, 300),
        ]);

        let changes = detector.detect(&snap, Some(&snap)).unwrap();

        assert!(changes.is_quiet());
        assert!(changes.rank_surges.is_empty());
        assert!(changes.rank_drops.is_empty());
    }

    #[test]
    fn test_spec_scenario() {
        // previous: A#1, B#2 (reads 100), C#3
        // current:  B#1 (reads 160), D#2, A#3
        let detector = ChangeDetector::new(&config(2, 50.0, 30.0));
        let previous = snapshot(vec![
            item("A", 1),
            item_with_reads("B", 2, 100),
            item("C", 3),
        ]);
        let current = snapshot(vec![
            item_with_reads("B", 1, 160),
            item("D", 2),
            item("A", 3),
        ]);

        let changes = detector.detect(&current, Some(&previous)).unwrap();

        assert_eq!(changes.exits.len(), 1);
        assert_eq!(changes.exits[0].item_id, "C");

        assert_eq!(changes.new_entries.len(), 1);
        assert_eq!(changes.new_entries[0].item_id, "D");
        assert_eq!(changes.new_entries[0].rank, 2);

        assert_eq!(changes.top_movers_up.len(), 1);
        assert_eq!(changes.top_movers_up[0].item.item_id, "B");
        assert_eq!(changes.top_movers_up[0].rank_change, 1);

        assert_eq!(changes.top_movers_down.len(), 1);
        assert_eq!(changes.top_movers_down[0].item.item_id, "A");
        assert_eq!(changes.top_movers_down[0].rank_change, -2);

        // |Δ| for B is 1, below the threshold of 2; A's -2 hits the drop side
        assert!(changes.rank_surges.is_empty());
        assert_eq!(changes.rank_drops.len(), 1);
        assert_eq!(changes.rank_drops[0].item.item_id, "A");

        assert_eq!(changes.read_surges.len(), 1);
        assert_eq!(changes.read_surges[0].item.item_id, "B");
        assert_eq!(changes.read_surges[0].change_pct, 60.0);
        assert_eq!(changes.read_surges[0].prev_value, 100);
    }

    #[test]
    fn test_surge_membership_monotonic_in_threshold() {
        let previous = snapshot(vec![
            item("a", 1),
            item("b", 2),
            item("c", 3),
            item("d", 4),
            item("e", 5),
        ]);
        // a falls to 5, e climbs to 1
        let current = snapshot(vec![
            item("e", 1),
            item("b", 2),
            item("c", 3),
            item("d", 4),
            item("a", 5),
        ]);

        let mut last_count = usize::MAX;
        for threshold in 1..=6 {
            let detector = ChangeDetector::new(&config(threshold, 50.0, 30.0));
            let changes = detector.detect(&current, Some(&previous)).unwrap();
            assert!(
                changes.rank_surges.len() <= last_count,
                "raising the threshold added surges at {}",
                threshold
            );
            last_count = changes.rank_surges.len();
        }
    }

    #[test]
    fn test_zero_previous_metric_never_surges() {
        let detector = ChangeDetector::new(&config(10, 50.0, 30.0));
        let previous = snapshot(vec![item_with_reads("a", 1, 0)]);
        let current = snapshot(vec![item_with_reads("a", 1, 1_000_000)]);

        let changes = detector.detect(&current, Some(&previous)).unwrap();
        assert!(changes.read_surges.is_empty());
    }

    #[test]
    fn test_pct_just_below_threshold_is_not_a_surge() {
        // +49.96% rounds to 50.0 for display but must not pass a 50% bar
        let detector = ChangeDetector::new(&config(10, 50.0, 30.0));
        let previous = snapshot(vec![item_with_reads("a", 1, 10_000)]);
        let current = snapshot(vec![item_with_reads("a", 1, 14_996)]);

        let changes = detector.detect(&current, Some(&previous)).unwrap();
        assert!(changes.read_surges.is_empty());
    }

    #[test]
    fn test_pct_exactly_at_threshold_is_a_surge() {
        let detector = ChangeDetector::new(&config(10, 50.0, 30.0));
        let previous = snapshot(vec![item_with_reads("a", 1, 10_000)]);
        let current = snapshot(vec![item_with_reads("a", 1, 15_000)]);

        let changes = detector.detect(&current, Some(&previous)).unwrap();
        assert_eq!(changes.read_surges.len(), 1);
        assert_eq!(changes.read_surges[0].change_pct, 50.0);
    }

    #[test]
    fn test_missing_metric_treated_as_no_surge() {
        let detector = ChangeDetector::with_defaults();
        let previous = snapshot(vec![item("a", 1)]);
        let current = snapshot(vec![item_with_reads("a", 1, 500)]);

        let changes = detector.detect(&current, Some(&previous)).unwrap();
        assert!(changes.read_surges.is_empty());
        assert!(changes.collect_surges.is_empty());
    }

    #[test]
    fn test_collect_surge_independent_of_read_surge() {
        let detector = ChangeDetector::new(&config(10, 50.0, 30.0));
        let mut prev_item = item("a", 1);
        prev_item.read_count = Some(100);
        prev_item.collect_count = Some(100);
        let mut curr_item = item("a", 1);
        curr_item.read_count = Some(200); // +100%
        curr_item.collect_count = Some(140); // +40%

        let previous = snapshot(vec![prev_item]);
        let current = snapshot(vec![curr_item]);

        let changes = detector.detect(&current, Some(&previous)).unwrap();
        assert_eq!(changes.read_surges.len(), 1);
        assert_eq!(changes.read_surges[0].change_pct, 100.0);
        assert_eq!(changes.collect_surges.len(), 1);
        assert_eq!(changes.collect_surges[0].change_pct, 40.0);
    }

    #[test]
    fn test_surge_sort_orders() {
        let detector = ChangeDetector::new(&config(1, 50.0, 30.0));
        let previous = snapshot(vec![
            item("a", 1),
            item("b", 2),
            item("c", 3),
            item("d", 4),
        ]);
        let current = snapshot(vec![
            item("d", 1),
            item("c", 2),
            item("a", 3),
            item("b", 4),
        ]);

        let changes = detector.detect(&current, Some(&previous)).unwrap();

        // Surges non-increasing by rank_change
        for pair in changes.rank_surges.windows(2) {
            assert!(pair[0].rank_change >= pair[1].rank_change);
        }
        // Drops non-decreasing (most negative first)
        for pair in changes.rank_drops.windows(2) {
            assert!(pair[0].rank_change <= pair[1].rank_change);
        }
        assert_eq!(changes.rank_surges[0].item.item_id, "d"); // +3
        assert_eq!(changes.rank_drops[0].item.item_id, "a"); // -2
    }

    #[test]
    fn test_every_nonzero_move_is_exactly_one_mover() {
        let detector = ChangeDetector::new(&config(3, 50.0, 30.0));
        let previous = snapshot(vec![item("a", 1), item("b", 2), item("c", 3)]);
        let current = snapshot(vec![item("b", 1), item("a", 2), item("c", 3)]);

        let changes = detector.detect(&current, Some(&previous)).unwrap();

        assert_eq!(changes.top_movers_up.len(), 1);
        assert_eq!(changes.top_movers_down.len(), 1);
        // c did not move, so it lands in neither bucket
        let moved: Vec<&str> = changes
            .top_movers_up
            .iter()
            .chain(&changes.top_movers_down)
            .map(|s| s.item.item_id.as_str())
            .collect();
        assert!(!moved.contains(&"c"));
    }

    #[test]
    fn test_duplicate_item_id_rejected() {
        let detector = ChangeDetector::with_defaults();
        let current = snapshot(vec![item("a", 1), item("a", 2)]);

        let err = detector.detect(&current, None).unwrap_err();
        assert!(matches!(err, IntegrityError::DuplicateItemId { .. }));
    }

    #[test]
    fn test_gapped_ranks_rejected() {
        let detector = ChangeDetector::with_defaults();
        let current = snapshot(vec![item("a", 1), item("b", 3)]);

        let err = detector.detect(&current, None).unwrap_err();
        assert!(matches!(err, IntegrityError::BadRankSequence { .. }));
    }

    #[test]
    fn test_duplicate_ranks_rejected() {
        let detector = ChangeDetector::with_defaults();
        let current = snapshot(vec![item("a", 1), item("b", 1)]);

        let err = detector.detect(&current, None).unwrap_err();
        assert!(matches!(err, IntegrityError::BadRankSequence { .. }));
    }

    #[test]
    fn test_bad_previous_snapshot_rejected() {
        let detector = ChangeDetector::with_defaults();
        let previous = snapshot(vec![item("a", 2)]); // rank 2 in a 1-item snapshot
        let current = snapshot(vec![item("a", 1)]);

        assert!(detector.detect(&current, Some(&previous)).is_err());
    }
}
