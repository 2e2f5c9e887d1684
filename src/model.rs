//! Core data model for ranked catalog snapshots and derived change sets

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry in a ranked catalog snapshot
///
/// Ranks are 1-based and dense within a snapshot. Metric counts are
/// optional because not every source publishes every metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Source-scoped identity (unique within one snapshot)
    pub item_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Category tags, ordered but semantically a set
    #[serde(default)]
    pub categories: Vec<String>,
    /// 1-based rank within the snapshot
    pub rank: u32,
    #[serde(default)]
    pub read_count: Option<u64>,
    #[serde(default)]
    pub collect_count: Option<u64>,
    #[serde(default)]
    pub like_count: Option<u64>,
    /// Source-defined ranking score; meaning varies per source
    #[serde(default)]
    pub score: Option<f64>,
}

/// Full ranked catalog for one (source, time) pair, ordered by rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub source: String,
    /// Unix seconds; monotonically increasing per source
    pub captured_at: i64,
    pub items: Vec<ItemRecord>,
}

impl Snapshot {
    pub fn new(source: impl Into<String>, captured_at: i64, items: Vec<ItemRecord>) -> Self {
        Self {
            source: source.into(),
            captured_at,
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A rank movement: current record plus where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankShift {
    pub item: ItemRecord,
    pub prev_rank: u32,
    /// prev_rank - current rank; positive = moved toward rank 1
    pub rank_change: i64,
}

/// A metric surge: current record plus the previous value and growth
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSurge {
    pub item: ItemRecord,
    pub prev_value: u64,
    /// Percent growth over the previous value, rounded to one decimal
    pub change_pct: f64,
}

/// Categorized, sorted diff between two snapshots of one source
///
/// `top_movers_up`/`top_movers_down` hold every non-zero rank move;
/// `rank_surges`/`rank_drops` are the thresholded subset. Both views are
/// kept because downstream consumers read both granularities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Present now, absent before; ascending by current rank
    pub new_entries: Vec<ItemRecord>,
    /// Present before, absent now; previous records, no delta fields
    pub exits: Vec<ItemRecord>,
    /// Moves of at least the surge threshold; descending by rank_change
    pub rank_surges: Vec<RankShift>,
    /// Moves of at most the negated threshold; ascending by rank_change
    pub rank_drops: Vec<RankShift>,
    /// Read count growth at or above threshold; descending by percent
    pub read_surges: Vec<MetricSurge>,
    /// Collect count growth at or above threshold; descending by percent
    pub collect_surges: Vec<MetricSurge>,
    /// Every improved rank; descending by rank_change
    pub top_movers_up: Vec<RankShift>,
    /// Every worsened rank; ascending by rank_change
    pub top_movers_down: Vec<RankShift>,
}

impl ChangeSet {
    /// True when nothing moved, appeared, or left
    pub fn is_quiet(&self) -> bool {
        self.new_entries.is_empty()
            && self.exits.is_empty()
            && self.top_movers_up.is_empty()
            && self.top_movers_down.is_empty()
            && self.read_surges.is_empty()
            && self.collect_surges.is_empty()
    }
}

/// Per-category grouping for one (source, time), supplied by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAggregate {
    pub category: String,
    pub count: u32,
    pub avg_rank: f64,
}

/// Net category movement across a trend window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub category: String,
    pub current_count: u32,
    pub previous_count: u32,
    /// current_count - previous_count
    pub change: i64,
    /// Average rank in the latest window endpoint only
    pub avg_rank: Option<f64>,
}

/// One source's share of a reporting cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAnalysis {
    /// Comparison baseline; None on a source's first-ever snapshot
    pub previous_time: Option<i64>,
    pub changes: ChangeSet,
    pub trends: Vec<TrendRecord>,
}

/// Complete result of one reporting cycle across all sources
///
/// Ephemeral: rendered or exported, never stored. The underlying
/// snapshots remain the durable record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Resolved comparison time (unix seconds)
    pub captured_at: i64,
    pub sources: BTreeMap<String, SourceAnalysis>,
    /// Sources whose processing failed this cycle, with the reason
    pub failures: BTreeMap<String, String>,
}
