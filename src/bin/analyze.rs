//! Analysis Binary - One Reporting Cycle
//!
//! Opens the snapshot database, runs change detection and trend analysis
//! across all sources, and writes the machine-readable JSON export.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin analyze
//! ```
//!
//! ## Environment Variables
//!
//! - RANKFLOW_DB_PATH - SQLite database path (default: rankings.db)
//! - RANKFLOW_SETTINGS - Settings JSON path (default: settings.json)
//! - RANKFLOW_EXPORT_PATH - Export output path (default: analysis_data.json)
//! - AS_OF - Unix seconds to analyze at (default: latest snapshot)
//! - RANK_SURGE_THRESHOLD / READ_SURGE_PCT / COLLECT_SURGE_PCT /
//!   TREND_WINDOW_DAYS / REPORT_MAX_ITEMS - threshold overrides
//! - RUST_LOG - Logging level (optional, default: info)

use chrono::Utc;
use rankflow::{project_analysis, AnalysisAggregator, AnalyzerConfig, SqliteSnapshotStore};
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let db_path =
        std::env::var("RANKFLOW_DB_PATH").unwrap_or_else(|_| "rankings.db".to_string());
    let settings_path =
        std::env::var("RANKFLOW_SETTINGS").unwrap_or_else(|_| "settings.json".to_string());
    let export_path = std::env::var("RANKFLOW_EXPORT_PATH")
        .unwrap_or_else(|_| "analysis_data.json".to_string());
    let as_of: Option<i64> = std::env::var("AS_OF").ok().and_then(|s| s.parse().ok());

    let config = AnalyzerConfig::from_file(&settings_path)?.with_env_overrides();

    log::info!("🚀 Starting analysis cycle");
    log::info!("   Database: {}", db_path);
    log::info!("   Rank surge threshold: {}", config.rank_surge_threshold);
    log::info!("   Read surge: {}%", config.read_surge_pct);
    log::info!("   Collect surge: {}%", config.collect_surge_pct);
    log::info!("   Trend window: {} days", config.trend_window_days);

    let store = SqliteSnapshotStore::open(&db_path)?;
    let aggregator = AnalysisAggregator::new(config.clone());

    let result = match aggregator.analyze(&store, as_of)? {
        Some(result) => result,
        None => {
            log::info!("💤 No snapshots to analyze. Run the crawler first.");
            return Ok(());
        }
    };

    for (source, analysis) in &result.sources {
        let changes = &analysis.changes;
        log::info!(
            "📺 {}: 🆕 {} new | 📈 {} surges | 📉 {} drops | 🚪 {} exits",
            source,
            changes.new_entries.len(),
            changes.rank_surges.len(),
            changes.rank_drops.len(),
            changes.exits.len()
        );
        if changes.is_quiet() {
            log::info!("   Rankings stable, no notable movement");
        }
    }
    for (source, reason) in &result.failures {
        log::warn!("⚠️  {} failed: {}", source, reason);
    }

    let export = project_analysis(&result, config.report_max_items, Utc::now().timestamp());
    let json = serde_json::to_string_pretty(&export)?;
    fs::write(&export_path, json)?;
    log::info!("✅ Exported analysis to {}", export_path);

    Ok(())
}
