//! SQLite-backed market store
//!
//! Holds the market universe, price histories, the pruned correlation graph,
//! and refresh metadata. Single-writer access behind a mutex is plenty here:
//! writes happen once per refresh cycle, reads are request-sized.

use cascade_core::{
    CascadeError, CascadeResult, Category, CorrelationLink, Inefficiency, Market, PricePoint,
};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

pub struct MarketStore {
    conn: Mutex<Connection>,
}

impl MarketStore {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(db_path: P) -> CascadeResult<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CascadeError::storage(format!("Failed to create database directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path).map_err(db_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn new_in_memory() -> CascadeResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> CascadeResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS markets (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT DEFAULT '',
                category TEXT DEFAULT 'Other',
                volume REAL DEFAULT 0,
                probability REAL DEFAULT 0.5,
                clob_token_id TEXT DEFAULT '',
                start_date TEXT,
                end_date TEXT,
                closed INTEGER DEFAULT 0,
                updated_at INTEGER DEFAULT (strftime('%s', 'now'))
            );

            CREATE TABLE IF NOT EXISTS price_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                market_id TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                price REAL NOT NULL,
                UNIQUE(market_id, timestamp)
            );

            CREATE TABLE IF NOT EXISTS correlations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                target_id TEXT NOT NULL,
                correlation REAL NOT NULL,
                inefficiency TEXT DEFAULT 'Low',
                UNIQUE(source_id, target_id)
            );

            CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_price_history_market
            ON price_history(market_id, timestamp);

            CREATE INDEX IF NOT EXISTS idx_correlations_source ON correlations(source_id);
            CREATE INDEX IF NOT EXISTS idx_correlations_target ON correlations(target_id);
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    /// Insert or update a market.
    ///
    /// An already-classified category is never downgraded back to `Other`:
    /// classification is cached across refreshes.
    pub fn upsert_market(&self, market: &Market) -> CascadeResult<()> {
        let conn = self.lock()?;

        let existing: Option<String> = conn
            .query_row(
                "SELECT category FROM markets WHERE id = ?1",
                params![market.id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        let category = match existing {
            Some(known) if known != "Other" && market.category == Category::Other => known,
            _ => market.category.as_str().to_string(),
        };

        conn.execute(
            r#"
            INSERT OR REPLACE INTO markets
                (id, name, slug, category, volume, probability, clob_token_id,
                 start_date, end_date, closed, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, strftime('%s', 'now'))
            "#,
            params![
                market.id,
                market.name,
                market.slug,
                category,
                market.volume,
                market.probability,
                market.clob_token_id,
                market.start_date,
                market.end_date,
                market.closed as i64,
            ],
        )
        .map_err(db_err)?;

        Ok(())
    }

    /// Insert price points for a market, skipping duplicates.
    pub fn upsert_price_history(
        &self,
        market_id: &str,
        history: &[PricePoint],
    ) -> CascadeResult<usize> {
        if history.is_empty() {
            return Ok(0);
        }

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "INSERT OR IGNORE INTO price_history (market_id, timestamp, price)
                 VALUES (?1, ?2, ?3)",
            )
            .map_err(db_err)?;

        let mut inserted = 0;
        for point in history {
            inserted += stmt
                .execute(params![market_id, point.timestamp, point.price])
                .map_err(db_err)?;
        }

        Ok(inserted)
    }

    /// Replace the entire correlation graph with a freshly computed one.
    pub fn replace_correlations(&self, links: &[CorrelationLink]) -> CascadeResult<()> {
        let conn = self.lock()?;

        conn.execute("DELETE FROM correlations", []).map_err(db_err)?;

        let mut stmt = conn
            .prepare(
                "INSERT OR REPLACE INTO correlations (source_id, target_id, correlation, inefficiency)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .map_err(db_err)?;

        for link in links {
            stmt.execute(params![
                link.source_id,
                link.target_id,
                link.correlation,
                link.inefficiency.as_str(),
            ])
            .map_err(db_err)?;
        }

        Ok(())
    }

    pub fn clear_markets(&self) -> CascadeResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM markets", []).map_err(db_err)?;
        Ok(())
    }

    pub fn clear_correlations(&self) -> CascadeResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM correlations", [])
            .map_err(db_err)?;
        Ok(())
    }

    /// All markets, highest volume first.
    pub fn get_all_markets(&self) -> CascadeResult<Vec<Market>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, name, slug, category, volume, probability, clob_token_id,
                        start_date, end_date, closed
                 FROM markets ORDER BY volume DESC",
            )
            .map_err(db_err)?;

        let markets = stmt
            .query_map([], row_to_market)
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(markets)
    }

    pub fn get_market(&self, id: &str) -> CascadeResult<Option<Market>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, name, slug, category, volume, probability, clob_token_id,
                    start_date, end_date, closed
             FROM markets WHERE id = ?1",
            params![id],
            row_to_market,
        )
        .optional()
        .map_err(db_err)
    }

    /// Price history for a market, ascending by timestamp.
    pub fn get_market_history(&self, market_id: &str) -> CascadeResult<Vec<PricePoint>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, price FROM price_history
                 WHERE market_id = ?1 ORDER BY timestamp ASC",
            )
            .map_err(db_err)?;

        let points = stmt
            .query_map(params![market_id], |row| {
                Ok(PricePoint::new(row.get(0)?, row.get(1)?))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(points)
    }

    pub fn get_all_correlations(&self) -> CascadeResult<Vec<CorrelationLink>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT source_id, target_id, correlation, inefficiency FROM correlations")
            .map_err(db_err)?;

        let links = stmt
            .query_map([], |row| {
                let source_id: String = row.get(0)?;
                let target_id: String = row.get(1)?;
                let correlation: f64 = row.get(2)?;
                let inefficiency: String = row.get(3)?;
                Ok(CorrelationLink {
                    source_id,
                    target_id,
                    correlation,
                    inefficiency: if inefficiency == "High" {
                        Inefficiency::High
                    } else {
                        Inefficiency::Low
                    },
                })
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(links)
    }

    /// Already-known categories, for the classification cache.
    /// `Other` entries are omitted so they get re-classified.
    pub fn get_categories(&self) -> CascadeResult<HashMap<String, Category>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, category FROM markets WHERE category != 'Other'")
            .map_err(db_err)?;

        let pairs = stmt
            .query_map([], |row| {
                let id: String = row.get(0)?;
                let category: String = row.get(1)?;
                Ok((id, category))
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;

        Ok(pairs
            .into_iter()
            .filter_map(|(id, label)| Category::from_label(&label).map(|c| (id, c)))
            .collect())
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> CascadeResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(db_err)?;
        Ok(())
    }

    pub fn get_metadata(&self, key: &str) -> CascadeResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT value FROM metadata WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)
    }

    /// Drop price history older than `days` days. Returns rows deleted.
    pub fn cleanup_old_history(&self, days: i64) -> CascadeResult<usize> {
        let cutoff = chrono::Utc::now().timestamp() - days * 24 * 60 * 60;
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM price_history WHERE timestamp < ?1",
            params![cutoff],
        )
        .map_err(db_err)
    }

    fn lock(&self) -> CascadeResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CascadeError::storage("database lock poisoned"))
    }
}

fn row_to_market(row: &rusqlite::Row<'_>) -> rusqlite::Result<Market> {
    let category: String = row.get(3)?;
    let closed: i64 = row.get(9)?;
    Ok(Market {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        category: Category::from_label_lossy(&category),
        volume: row.get(4)?,
        probability: row.get(5)?,
        clob_token_id: row.get(6)?,
        start_date: row.get(7)?,
        end_date: row.get(8)?,
        closed: closed != 0,
    })
}

fn db_err(e: rusqlite::Error) -> CascadeError {
    CascadeError::storage(e.to_string())
}
