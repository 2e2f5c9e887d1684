//! Read-only projection of analysis results into export rows
//!
//! Maps the internal change structures to the reduced field set the
//! report text and the machine-readable JSON export need. Ordering is
//! established by the detector and preserved verbatim here; truncation
//! happens strictly after sorting.

use crate::model::{
    AnalysisResult, ChangeSet, ItemRecord, MetricSurge, RankShift, TrendRecord,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// How many category tags the display string shows
const DISPLAY_TAGS: usize = 2;

/// One exported change entry with only the fields relevant to its sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeRow {
    pub rank: u32,
    pub item_id: String,
    pub title: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_rank: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_change: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_change_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collect_change_pct: Option<f64>,
}

impl ChangeRow {
    fn base(item: &ItemRecord) -> Self {
        Self {
            rank: item.rank,
            item_id: item.item_id.clone(),
            title: item.title.clone(),
            category: category_display(&item.categories),
            prev_rank: None,
            rank_change: None,
            read_change_pct: None,
            collect_change_pct: None,
        }
    }

    fn from_shift(shift: &RankShift) -> Self {
        Self {
            prev_rank: Some(shift.prev_rank),
            rank_change: Some(shift.rank_change),
            ..Self::base(&shift.item)
        }
    }

    fn from_read_surge(surge: &MetricSurge) -> Self {
        Self {
            read_change_pct: Some(surge.change_pct),
            ..Self::base(&surge.item)
        }
    }

    fn from_collect_surge(surge: &MetricSurge) -> Self {
        Self {
            collect_change_pct: Some(surge.change_pct),
            ..Self::base(&surge.item)
        }
    }
}

/// All eight sequences of a change set, truncated for display
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangesProjection {
    pub new_entries: Vec<ChangeRow>,
    pub exits: Vec<ChangeRow>,
    pub rank_surges: Vec<ChangeRow>,
    pub rank_drops: Vec<ChangeRow>,
    pub read_surges: Vec<ChangeRow>,
    pub collect_surges: Vec<ChangeRow>,
    pub top_movers_up: Vec<ChangeRow>,
    pub top_movers_down: Vec<ChangeRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceExport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_time: Option<i64>,
    pub changes: ChangesProjection,
    pub trends: Vec<TrendRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportMetadata {
    /// Comparison time of the cycle (unix seconds)
    pub as_of: i64,
    /// When the export itself was produced (unix seconds)
    pub generated_at: i64,
}

/// Machine-readable export of one reporting cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisExport {
    pub metadata: ExportMetadata,
    pub sources: BTreeMap<String, SourceExport>,
    /// Sources that failed this cycle, with the reason
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<String, String>,
}

/// Join the first tags of a category list for display
pub fn category_display(categories: &[String]) -> String {
    categories
        .iter()
        .take(DISPLAY_TAGS)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

/// Project one change set, capping each sequence at `max_items`
pub fn project_changes(changes: &ChangeSet, max_items: usize) -> ChangesProjection {
    fn take<T, F: Fn(&T) -> ChangeRow>(seq: &[T], max: usize, f: F) -> Vec<ChangeRow> {
        seq.iter().take(max).map(f).collect()
    }

    ChangesProjection {
        new_entries: take(&changes.new_entries, max_items, ChangeRow::base),
        exits: take(&changes.exits, max_items, ChangeRow::base),
        rank_surges: take(&changes.rank_surges, max_items, ChangeRow::from_shift),
        rank_drops: take(&changes.rank_drops, max_items, ChangeRow::from_shift),
        read_surges: take(&changes.read_surges, max_items, ChangeRow::from_read_surge),
        collect_surges: take(
            &changes.collect_surges,
            max_items,
            ChangeRow::from_collect_surge,
        ),
        top_movers_up: take(&changes.top_movers_up, max_items, ChangeRow::from_shift),
        top_movers_down: take(&changes.top_movers_down, max_items, ChangeRow::from_shift),
    }
}

/// Project a full cycle result into its export form
///
/// `generated_at` is passed in; the projection holds no clock and no
/// other side effects.
pub fn project_analysis(
    result: &AnalysisResult,
    max_items: usize,
    generated_at: i64,
) -> AnalysisExport {
    let sources = result
        .sources
        .iter()
        .map(|(source, analysis)| {
            (
                source.clone(),
                SourceExport {
                    previous_time: analysis.previous_time,
                    changes: project_changes(&analysis.changes, max_items),
                    trends: analysis.trends.clone(),
                },
            )
        })
        .collect();

    AnalysisExport {
        metadata: ExportMetadata {
            as_of: result.captured_at,
            generated_at,
        },
        sources,
        failures: result.failures.clone(),
    }
}
