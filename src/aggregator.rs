//! Per-cycle orchestration of change detection and trend analysis
//!
//! Fans out across every source present at the resolved comparison time.
//! Sources are independent: one source's missing history or bad data
//! never blocks the others.

use crate::config::AnalyzerConfig;
use crate::detector::ChangeDetector;
use crate::model::{AnalysisResult, Snapshot, SourceAnalysis};
use crate::store::{SnapshotStore, StoreError};
use crate::trend::TrendAnalyzer;

const SECS_PER_DAY: i64 = 24 * 60 * 60;

pub struct AnalysisAggregator {
    config: AnalyzerConfig,
    detector: ChangeDetector,
    trend_analyzer: TrendAnalyzer,
}

impl AnalysisAggregator {
    pub fn new(config: AnalyzerConfig) -> Self {
        let detector = ChangeDetector::new(&config);
        Self {
            config,
            detector,
            trend_analyzer: TrendAnalyzer::new(),
        }
    }

    /// Run one reporting cycle
    ///
    /// `as_of` defaults to the most recent snapshot time across all
    /// sources. Returns `None` when there is nothing to analyze at all.
    /// Per-source failures (integrity violations, store errors) land in
    /// the result's failure map; they are not retried.
    pub fn analyze<S: SnapshotStore>(
        &self,
        store: &S,
        as_of: Option<i64>,
    ) -> Result<Option<AnalysisResult>, StoreError> {
        let as_of = match as_of {
            Some(time) => time,
            None => match store.latest_time(None)? {
                Some(time) => time,
                None => {
                    log::info!("No snapshots stored yet, nothing to analyze");
                    return Ok(None);
                }
            },
        };

        let sources = store.sources_present(as_of)?;

        let mut result = AnalysisResult {
            captured_at: as_of,
            ..AnalysisResult::default()
        };

        for source in sources {
            match self.analyze_source(store, &source, as_of) {
                Ok(Some(analysis)) => {
                    result.sources.insert(source, analysis);
                }
                Ok(None) => {
                    // Snapshot vanished between the time lookup and the
                    // read; no data, not a failure
                    log::debug!("No items for {} at {}, skipping", source, as_of);
                }
                Err(e) => {
                    log::warn!("Analysis failed for {}: {}", source, e);
                    result.failures.insert(source, e.to_string());
                }
            }
        }

        Ok(Some(result))
    }

    fn analyze_source<S: SnapshotStore>(
        &self,
        store: &S,
        source: &str,
        as_of: i64,
    ) -> Result<Option<SourceAnalysis>, Box<dyn std::error::Error>> {
        let items = store.snapshot(as_of, source)?;
        if items.is_empty() {
            return Ok(None);
        }
        let current = Snapshot::new(source, as_of, items);

        let previous_time = store.previous_time(as_of, Some(source))?;
        let previous = match previous_time {
            Some(time) => {
                let items = store.snapshot(time, source)?;
                // An older snapshot can vanish too; degrade to first-crawl
                if items.is_empty() {
                    None
                } else {
                    Some(Snapshot::new(source, time, items))
                }
            }
            None => None,
        };

        let changes = self.detector.detect(&current, previous.as_ref())?;
        let trends = self.source_trends(store, source, as_of)?;

        Ok(Some(SourceAnalysis {
            previous_time: previous.map(|p| p.captured_at),
            changes,
            trends,
        }))
    }

    /// Category trends over the trailing window ending at `as_of`
    ///
    /// Only the window endpoints feed the comparison, so only their
    /// aggregates are fetched.
    fn source_trends<S: SnapshotStore>(
        &self,
        store: &S,
        source: &str,
        as_of: i64,
    ) -> Result<Vec<crate::model::TrendRecord>, StoreError> {
        let since = as_of - self.config.trend_window_days * SECS_PER_DAY;
        // The store returns everything at or after `since`; snapshots
        // captured after `as_of` are outside the window and must not
        // leak into a historical comparison
        let mut times = store.distinct_times(source, since)?;
        times.retain(|t| *t <= as_of);
        if times.len() < 2 {
            return Ok(Vec::new());
        }

        let earliest = times[0];
        let latest = times[times.len() - 1];
        let window = vec![
            (earliest, store.category_aggregate(source, earliest)?),
            (latest, store.category_aggregate(source, latest)?),
        ];

        Ok(self.trend_analyzer.trends(&window))
    }
}
