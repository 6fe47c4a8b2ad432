use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use super::{OutputRecord, RunRecord, RunStatus, RunStore};
use crate::context::TaskOutput;

/// SQLite-backed run history.
pub struct SqliteRunStore {
    conn: Mutex<Connection>,
}

impl SqliteRunStore {
    /// Open or create the run tables. Use `":memory:"` for tests.
    pub fn open(path: &str) -> Result<Self> {
        if path != ":memory:"
            && let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("failed to open run database")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL DEFAULT (datetime('now')),
                finished_at TEXT,
                inputs TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT
            );
            CREATE TABLE IF NOT EXISTS task_outputs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL REFERENCES runs(id),
                position INTEGER NOT NULL,
                task TEXT NOT NULL,
                agent TEXT NOT NULL,
                output TEXT NOT NULL,
                UNIQUE(run_id, position)
            );",
        )
        .context("failed to create run tables")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(":memory:")
    }
}

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, String, String, String, Option<String>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn to_record(
    (id, started_at, inputs, status, error): (i64, String, String, String, Option<String>),
) -> Result<RunRecord> {
    Ok(RunRecord {
        id,
        started_at,
        inputs: serde_json::from_str(&inputs)?,
        status: RunStatus::from_parts(&status, error),
    })
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn start_run(&self, inputs: &HashMap<String, String>) -> Result<i64> {
        let json = serde_json::to_string(inputs)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO runs (inputs, status) VALUES (?1, ?2)",
            params![json, RunStatus::Running.as_str()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn record_output(&self, run_id: i64, position: usize, output: &TaskOutput) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO task_outputs (run_id, position, task, agent, output)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                run_id,
                position as i64,
                output.label(),
                output.agent(),
                output.raw()
            ],
        )?;
        Ok(())
    }

    async fn finish_run(&self, run_id: i64, status: RunStatus) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE runs SET status = ?1, error = ?2, finished_at = datetime('now') WHERE id = ?3",
            params![status.as_str(), status.error(), run_id],
        )?;
        Ok(())
    }

    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, started_at, inputs, status, error FROM runs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map([limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(to_record).collect()
    }

    async fn run(&self, run_id: i64) -> Result<Option<RunRecord>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT id, started_at, inputs, status, error FROM runs WHERE id = ?1",
                [run_id],
                run_from_row,
            )
            .optional()?;
        row.map(to_record).transpose()
    }

    async fn outputs(&self, run_id: i64) -> Result<Vec<OutputRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT position, task, agent, output FROM task_outputs
             WHERE run_id = ?1 ORDER BY position ASC",
        )?;
        let outputs = stmt
            .query_map([run_id], |row| {
                Ok(OutputRecord {
                    position: row.get::<_, i64>(0)? as usize,
                    task: row.get(1)?,
                    agent: row.get(2)?,
                    output: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(outputs)
    }
}
