//! Snapshot storage: trait seam plus the SQLite implementation
//!
//! Append-only time series keyed by (captured_at, source, item_id).
//! The engine only ever reads through the `SnapshotStore` trait; the
//! write path (`record_snapshot`, `log_ingest`) belongs to the
//! acquisition layer and to tests.

use crate::model::{CategoryAggregate, ItemRecord};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
    BadCategories(serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::BadCategories(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
            StoreError::BadCategories(e) => write!(f, "Invalid categories column: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Read interface the engine consumes
///
/// Times are unix seconds. All queries are point-in-time reads; read
/// consistency between calls is the store's concern, and callers treat
/// an empty snapshot as "no data."
pub trait SnapshotStore {
    /// Most recent snapshot time, optionally restricted to one source
    fn latest_time(&self, source: Option<&str>) -> Result<Option<i64>, StoreError>;

    /// Most recent snapshot time strictly earlier than `before`
    fn previous_time(&self, before: i64, source: Option<&str>) -> Result<Option<i64>, StoreError>;

    /// Items for one (time, source), ascending by rank; empty if none
    fn snapshot(&self, time: i64, source: &str) -> Result<Vec<ItemRecord>, StoreError>;

    /// Per-category count and average rank for one (source, time)
    fn category_aggregate(
        &self,
        source: &str,
        time: i64,
    ) -> Result<Vec<CategoryAggregate>, StoreError>;

    /// Distinct snapshot times for one source at or after `since`, ascending
    fn distinct_times(&self, source: &str, since: i64) -> Result<Vec<i64>, StoreError>;

    /// Sources that have a snapshot at exactly `time`
    fn sources_present(&self, time: i64) -> Result<Vec<String>, StoreError>;
}

/// SQLite-backed snapshot store
pub struct SqliteSnapshotStore {
    conn: Connection,
}

impl SqliteSnapshotStore {
    /// Open (or create) the database at `path` and ensure the schema
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// In-memory store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        // WAL lets the crawler append while an analysis cycle reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                captured_at INTEGER NOT NULL,
                source TEXT NOT NULL,
                item_id TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                categories TEXT,
                rank INTEGER NOT NULL,
                read_count INTEGER,
                collect_count INTEGER,
                like_count INTEGER,
                score REAL,
                UNIQUE(captured_at, source, item_id)
            );

            CREATE INDEX IF NOT EXISTS idx_items_time
                ON items(captured_at);
            CREATE INDEX IF NOT EXISTS idx_items_source
                ON items(source, captured_at);
            CREATE INDEX IF NOT EXISTS idx_items_lookup
                ON items(source, item_id, captured_at);

            CREATE TABLE IF NOT EXISTS ingest_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                captured_at INTEGER NOT NULL,
                source TEXT NOT NULL,
                count INTEGER NOT NULL,
                status TEXT NOT NULL,
                message TEXT,
                duration_sec REAL
            );",
        )?;

        Ok(Self { conn })
    }

    /// Persist one snapshot; re-ingesting the same (time, source, item)
    /// replaces the row
    pub fn record_snapshot(
        &self,
        source: &str,
        captured_at: i64,
        items: &[ItemRecord],
    ) -> Result<usize, StoreError> {
        let mut stmt = self.conn.prepare(
            "INSERT OR REPLACE INTO items
             (captured_at, source, item_id, title, description, categories,
              rank, read_count, collect_count, like_count, score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;

        for item in items {
            let categories = serde_json::to_string(&item.categories)?;
            stmt.execute(params![
                captured_at,
                source,
                item.item_id,
                item.title,
                item.description,
                categories,
                item.rank,
                item.read_count.map(|v| v as i64),
                item.collect_count.map(|v| v as i64),
                item.like_count.map(|v| v as i64),
                item.score,
            ])?;
        }

        log::debug!(
            "Recorded {} items for {} at {}",
            items.len(),
            source,
            captured_at
        );
        Ok(items.len())
    }

    /// Append one line to the ingest log
    pub fn log_ingest(
        &self,
        source: &str,
        captured_at: i64,
        count: usize,
        status: &str,
        message: Option<&str>,
        duration_sec: Option<f64>,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO ingest_log (captured_at, source, count, status, message, duration_sec)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![captured_at, source, count as i64, status, message, duration_sec],
        )?;
        Ok(())
    }
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<(ItemRecord, Option<String>)> {
    Ok((
        ItemRecord {
            item_id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            categories: Vec::new(), // filled in from the raw column below
            rank: row.get(4)?,
            read_count: row.get::<_, Option<i64>>(5)?.map(|v| v as u64),
            collect_count: row.get::<_, Option<i64>>(6)?.map(|v| v as u64),
            like_count: row.get::<_, Option<i64>>(7)?.map(|v| v as u64),
            score: row.get(8)?,
        },
        row.get::<_, Option<String>>(3)?,
    ))
}

fn parse_categories(raw: Option<String>) -> Result<Vec<String>, StoreError> {
    match raw {
        Some(s) if !s.is_empty() => Ok(serde_json::from_str(&s)?),
        _ => Ok(Vec::new()),
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn latest_time(&self, source: Option<&str>) -> Result<Option<i64>, StoreError> {
        let time = match source {
            Some(source) => self
                .conn
                .query_row(
                    "SELECT MAX(captured_at) FROM items WHERE source = ?1",
                    [source],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .optional()?
                .flatten(),
            None => self
                .conn
                .query_row("SELECT MAX(captured_at) FROM items", [], |row| {
                    row.get::<_, Option<i64>>(0)
                })
                .optional()?
                .flatten(),
        };
        Ok(time)
    }

    fn previous_time(&self, before: i64, source: Option<&str>) -> Result<Option<i64>, StoreError> {
        let time = match source {
            Some(source) => self
                .conn
                .query_row(
                    "SELECT MAX(captured_at) FROM items
                     WHERE captured_at < ?1 AND source = ?2",
                    params![before, source],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .optional()?
                .flatten(),
            None => self
                .conn
                .query_row(
                    "SELECT MAX(captured_at) FROM items WHERE captured_at < ?1",
                    [before],
                    |row| row.get::<_, Option<i64>>(0),
                )
                .optional()?
                .flatten(),
        };
        Ok(time)
    }

    fn snapshot(&self, time: i64, source: &str) -> Result<Vec<ItemRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id, title, description, categories, rank,
                    read_count, collect_count, like_count, score
             FROM items
             WHERE captured_at = ?1 AND source = ?2
             ORDER BY rank",
        )?;

        let rows = stmt.query_map(params![time, source], row_to_item)?;

        let mut items = Vec::new();
        for row in rows {
            let (mut item, raw_categories) = row?;
            item.categories = parse_categories(raw_categories)?;
            items.push(item);
        }
        Ok(items)
    }

    fn category_aggregate(
        &self,
        source: &str,
        time: i64,
    ) -> Result<Vec<CategoryAggregate>, StoreError> {
        // Tags are stored as a JSON list per item, so the grouping
        // explodes them here rather than in SQL
        let items = self.snapshot(time, source)?;

        let mut counts: HashMap<String, (u32, u64)> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for item in &items {
            for tag in &item.categories {
                if tag.is_empty() {
                    continue;
                }
                let entry = counts.entry(tag.clone()).or_insert_with(|| {
                    order.push(tag.clone());
                    (0, 0)
                });
                entry.0 += 1;
                entry.1 += item.rank as u64;
            }
        }

        let mut aggregates: Vec<CategoryAggregate> = order
            .into_iter()
            .map(|category| {
                let (count, rank_sum) = counts[&category];
                CategoryAggregate {
                    category,
                    avg_rank: rank_sum as f64 / count as f64,
                    count,
                }
            })
            .collect();

        aggregates.sort_by_key(|a| std::cmp::Reverse(a.count));
        Ok(aggregates)
    }

    fn distinct_times(&self, source: &str, since: i64) -> Result<Vec<i64>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT captured_at FROM items
             WHERE source = ?1 AND captured_at >= ?2
             ORDER BY captured_at",
        )?;

        let rows = stmt.query_map(params![source, since], |row| row.get(0))?;
        let mut times = Vec::new();
        for row in rows {
            times.push(row?);
        }
        Ok(times)
    }

    fn sources_present(&self, time: i64) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT source FROM items WHERE captured_at = ?1 ORDER BY source",
        )?;

        let rows = stmt.query_map([time], |row| row.get(0))?;
        let mut sources = Vec::new();
        for row in rows {
            sources.push(row?);
        }
        Ok(sources)
    }
}
