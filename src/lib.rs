//! Rankflow - Change Detection & Trend Analysis for Ranked Catalogs
//!
//! Tracks ranked catalogs published by independent sources and computes
//! what changed between snapshots: new entries, exits, rank surges and
//! drops, metric surges, and longer-window category trends.
//!
//! # Architecture
//!
//! ```text
//! SQLite Database → SqliteSnapshotStore (SnapshotStore trait)
//!     ↓
//! ChangeDetector (pairwise snapshot diff, configurable thresholds)
//!     ↓
//! TrendAnalyzer (category movement across a trailing window)
//!     ↓
//! AnalysisAggregator (per-source fan-out, failure isolation)
//!     ↓
//! Projection → JSON export / report layers
//! ```
//!
//! The engine is synchronous: every analysis cycle is a pure function of
//! the stored snapshots plus an explicit [`AnalyzerConfig`].

pub mod aggregator;
pub mod config;
pub mod detector;
pub mod model;
pub mod projection;
pub mod store;
pub mod trend;

pub use aggregator::AnalysisAggregator;
pub use config::AnalyzerConfig;
pub use detector::{ChangeDetector, IntegrityError};
pub use model::{
    AnalysisResult, CategoryAggregate, ChangeSet, ItemRecord, MetricSurge, RankShift, Snapshot,
    SourceAnalysis, TrendRecord,
};
pub use projection::{project_analysis, project_changes, AnalysisExport, ChangeRow};
pub use store::{SnapshotStore, SqliteSnapshotStore, StoreError};
pub use trend::TrendAnalyzer;
