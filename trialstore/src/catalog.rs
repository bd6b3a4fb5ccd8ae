use crate::config::WarehouseConfig;
use crate::errors::Result;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// SQLite run log: one row per pipeline run plus one row per source,
/// queried by operators after the fact.
pub struct Catalog {
    conn: Arc<Mutex<Connection>>,
}

impl Catalog {
    pub fn new(config: &WarehouseConfig) -> Result<Self> {
        let conn = Connection::open(&config.catalog_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "BEGIN;
            CREATE TABLE IF NOT EXISTS run_logs (
                run_id TEXT PRIMARY KEY,
                start_time INTEGER NOT NULL,
                end_time INTEGER,
                status TEXT,
                details TEXT
            );
            CREATE TABLE IF NOT EXISTS source_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                source TEXT NOT NULL,
                status TEXT NOT NULL,
                rows_staged INTEGER NOT NULL,
                error TEXT
            );
            COMMIT;",
        )?;
        Ok(())
    }

    pub fn create_run_log(&self, run_id: Uuid) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let start_time = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO run_logs (run_id, start_time, status) VALUES (?1, ?2, 'RUNNING')",
            params![run_id.to_string(), start_time],
        )?;
        Ok(())
    }

    pub fn finish_run_log(&self, run_id: Uuid, status: &str, details: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let end_time = chrono::Utc::now().timestamp();
        conn.execute(
            "UPDATE run_logs SET status = ?1, details = ?2, end_time = ?3 WHERE run_id = ?4",
            params![status, details, end_time, run_id.to_string()],
        )?;
        Ok(())
    }

    pub fn record_source_outcome(
        &self,
        run_id: Uuid,
        source: &str,
        status: &str,
        rows_staged: u64,
        error: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO source_logs (run_id, source, status, rows_staged, error)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id.to_string(),
                source,
                status,
                rows_staged as i64,
                error
            ],
        )?;
        Ok(())
    }

    /// Returns (status, rows_staged) per source for one run, in insertion
    /// order.
    pub fn source_outcomes(&self, run_id: Uuid) -> Result<Vec<(String, String, i64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT source, status, rows_staged FROM source_logs WHERE run_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![run_id.to_string()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
