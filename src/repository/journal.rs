use anyhow::{Context, Result};
use sqlx::{sqlite::{SqliteConnectOptions, SqlitePoolOptions}, Pool, QueryBuilder, Row, Sqlite};
use std::str::FromStr;
use tracing::info;

use crate::model::{EventCategory, RepairEvent};

use super::SCHEMA_VERSION;

const BATCH_SIZE: usize = 200;

/// Summary of one repair run as written to the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub repository: String,
    pub started_at: i64,
    pub finished_at: i64,
    pub dry_run: bool,
    pub issues_found: i64,
    pub issues_remaining: i64,
    pub success: bool,
}

/// A run read back from the journal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRecord {
    pub id: i64,
    pub summary: RunSummary,
    pub event_count: i64,
}

/// SQLite journal of repair runs and their events
pub struct Journal {
    pool: Pool<Sqlite>,
}

fn category_from_str(value: &str) -> EventCategory {
    match value {
        "issue" => EventCategory::Issue,
        "replacement" => EventCategory::Replacement,
        "rewrite" => EventCategory::Rewrite,
        _ => EventCategory::Reference,
    }
}

impl Journal {
    pub async fn new(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", db_path))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open repair journal")?;

        Ok(Self { pool })
    }

    /// Initialize schema, returns true if it was (re)built
    pub async fn init_schema(&self) -> Result<bool> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )"
        ).execute(&self.pool).await?;

        let stored_version: Option<String> = sqlx::query("SELECT value FROM metadata WHERE key = 'schema_version'")
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.get("value"));

        let needs_rebuild = stored_version.as_deref() != Some(SCHEMA_VERSION);

        if needs_rebuild {
            if let Some(old) = &stored_version {
                info!("Journal schema changed ({} -> {}), rebuilding", old, SCHEMA_VERSION);
            }
            sqlx::query("DROP TABLE IF EXISTS events").execute(&self.pool).await?;
            sqlx::query("DROP TABLE IF EXISTS runs").execute(&self.pool).await?;
            sqlx::query("DELETE FROM metadata").execute(&self.pool).await?;
        }

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                repository TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                finished_at INTEGER NOT NULL,
                dry_run INTEGER NOT NULL,
                issues_found INTEGER NOT NULL,
                issues_remaining INTEGER NOT NULL,
                success INTEGER NOT NULL
            )"
        ).execute(&self.pool).await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS events (
                run_id INTEGER NOT NULL REFERENCES runs(id),
                seq INTEGER NOT NULL,
                category TEXT NOT NULL,
                subject TEXT NOT NULL,
                before_value TEXT,
                after_value TEXT,
                success INTEGER NOT NULL,
                detail TEXT NOT NULL,
                PRIMARY KEY (run_id, seq)
            )"
        ).execute(&self.pool).await?;

        if needs_rebuild {
            sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)")
                .bind(SCHEMA_VERSION)
                .execute(&self.pool)
                .await?;
        }

        Ok(needs_rebuild)
    }

    pub async fn get_metadata(&self, key: &str) -> Option<String> {
        sqlx::query("SELECT value FROM metadata WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .map(|row| row.get("value"))
    }

    /// Store a run and all its events in one transaction; returns the run id
    pub async fn record_run(&self, run: &RunSummary, events: &[RepairEvent]) -> Result<i64> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO runs (repository, started_at, finished_at, dry_run, issues_found, issues_remaining, success)
             VALUES (?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(&run.repository)
        .bind(run.started_at)
        .bind(run.finished_at)
        .bind(run.dry_run)
        .bind(run.issues_found)
        .bind(run.issues_remaining)
        .bind(run.success)
        .execute(&mut *tx)
        .await?;
        let run_id = result.last_insert_rowid();

        let numbered: Vec<(i64, &RepairEvent)> = events
            .iter()
            .enumerate()
            .map(|(i, e)| (i as i64, e))
            .collect();
        for chunk in numbered.chunks(BATCH_SIZE) {
            let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO events (run_id, seq, category, subject, before_value, after_value, success, detail) "
            );
            qb.push_values(chunk, |mut row, (seq, event)| {
                row.push_bind(run_id)
                    .push_bind(*seq)
                    .push_bind(event.category.as_str())
                    .push_bind(event.subject.as_str())
                    .push_bind(event.before.as_deref())
                    .push_bind(event.after.as_deref())
                    .push_bind(event.success)
                    .push_bind(event.detail.as_str());
            });
            qb.build().execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(run_id)
    }

    /// Most recent runs first
    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(
            "SELECT r.id, r.repository, r.started_at, r.finished_at, r.dry_run,
                    r.issues_found, r.issues_remaining, r.success,
                    (SELECT COUNT(*) FROM events e WHERE e.run_id = r.id) AS event_count
             FROM runs r ORDER BY r.id DESC LIMIT ?"
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| RunRecord {
            id: row.get("id"),
            summary: RunSummary {
                repository: row.get("repository"),
                started_at: row.get("started_at"),
                finished_at: row.get("finished_at"),
                dry_run: row.get("dry_run"),
                issues_found: row.get("issues_found"),
                issues_remaining: row.get("issues_remaining"),
                success: row.get("success"),
            },
            event_count: row.get("event_count"),
        }).collect())
    }

    pub async fn run_events(&self, run_id: i64) -> Result<Vec<RepairEvent>> {
        let rows = sqlx::query(
            "SELECT category, subject, before_value, after_value, success, detail
             FROM events WHERE run_id = ? ORDER BY seq"
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|row| {
            let category: String = row.get("category");
            RepairEvent {
                category: category_from_str(&category),
                subject: row.get("subject"),
                before: row.get("before_value"),
                after: row.get("after_value"),
                success: row.get("success"),
                detail: row.get("detail"),
            }
        }).collect())
    }
}
