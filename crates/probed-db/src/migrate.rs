// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Schema creation and additive migrations.
//!
//! Migrations never drop or rename columns — only `ADD COLUMN` or
//! `CREATE TABLE IF NOT EXISTS`, guarded by probing `PRAGMA table_info`
//! for column existence so re-running an already-applied migration is a
//! no-op. A `schema_version` counter in a `meta` table is bumped on every
//! successful open.

use sqlx::{Row, SqlitePool};

use crate::error::Result;

/// Bumped whenever a migration is appended below.
pub const SCHEMA_VERSION: i64 = 1;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
	create_base_schema(pool).await?;
	add_columns_if_missing(pool).await?;
	bump_schema_version(pool).await?;
	Ok(())
}

async fn create_base_schema(pool: &SqlitePool) -> Result<()> {
	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS meta (
			key TEXT PRIMARY KEY,
			value TEXT NOT NULL
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS jobs (
			id TEXT PRIMARY KEY,
			name TEXT NOT NULL,
			command TEXT NOT NULL,
			schedule TEXT NOT NULL,
			target_kind TEXT NOT NULL,
			target_value TEXT,
			retry_max_attempts INTEGER,
			retry_initial_backoff_ms INTEGER,
			retry_multiplier REAL,
			retry_max_backoff_ms INTEGER,
			enabled INTEGER NOT NULL DEFAULT 1,
			created_at TEXT NOT NULL,
			updated_at TEXT NOT NULL,
			last_run_at TEXT,
			last_status TEXT
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_enabled ON jobs(enabled)")
		.execute(pool)
		.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_updated_at ON jobs(updated_at)")
		.execute(pool)
		.await?;

	sqlx::query(
		r#"
		CREATE TABLE IF NOT EXISTS job_runs (
			id TEXT PRIMARY KEY,
			job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
			probe_id TEXT NOT NULL,
			request_id TEXT NOT NULL UNIQUE,
			execution_id TEXT NOT NULL,
			attempt INTEGER NOT NULL,
			max_attempts INTEGER NOT NULL,
			retry_scheduled_at TEXT,
			started_at TEXT NOT NULL,
			ended_at TEXT,
			status TEXT NOT NULL,
			admission_decision TEXT,
			admission_reason TEXT,
			admission_rationale TEXT,
			exit_code INTEGER,
			output TEXT NOT NULL DEFAULT ''
		)
		"#,
	)
	.execute(pool)
	.await?;

	sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_runs_job_started ON job_runs(job_id, started_at DESC)")
		.execute(pool)
		.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_runs_execution_attempt ON job_runs(execution_id, attempt)")
		.execute(pool)
		.await?;

	Ok(())
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool> {
	let rows = sqlx::query(&format!("PRAGMA table_info({table})"))
		.fetch_all(pool)
		.await?;
	Ok(rows
		.iter()
		.any(|row| row.get::<String, _>("name") == column))
}

/// Additive migrations land here, each guarded by a column-existence
/// probe so re-opening an up-to-date database is a cheap no-op.
async fn add_columns_if_missing(pool: &SqlitePool) -> Result<()> {
	if !column_exists(pool, "job_runs", "output").await? {
		sqlx::query("ALTER TABLE job_runs ADD COLUMN output TEXT NOT NULL DEFAULT ''")
			.execute(pool)
			.await?;
	}
	Ok(())
}

async fn bump_schema_version(pool: &SqlitePool) -> Result<()> {
	sqlx::query(
		r#"
		INSERT INTO meta (key, value) VALUES ('schema_version', ?1)
		ON CONFLICT(key) DO UPDATE SET value = excluded.value
		"#,
	)
	.bind(SCHEMA_VERSION.to_string())
	.execute(pool)
	.await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn migrations_are_idempotent() {
		let pool = SqlitePool::connect(":memory:").await.unwrap();
		run_migrations(&pool).await.unwrap();
		run_migrations(&pool).await.unwrap();

		let row = sqlx::query("SELECT value FROM meta WHERE key = 'schema_version'")
			.fetch_one(&pool)
			.await
			.unwrap();
		let value: String = row.get("value");
		assert_eq!(value, SCHEMA_VERSION.to_string());
	}

	#[tokio::test]
	async fn base_schema_creates_expected_tables() {
		let pool = SqlitePool::connect(":memory:").await.unwrap();
		run_migrations(&pool).await.unwrap();

		assert!(column_exists(&pool, "jobs", "target_kind").await.unwrap());
		assert!(column_exists(&pool, "job_runs", "execution_id").await.unwrap());
	}
}
