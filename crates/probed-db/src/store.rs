// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! The durable job/run store. `Store` is the only thing allowed to
//! write to the `jobs` and `job_runs` tables; every status change runs
//! through [`Store::check_transition`] plus a per-caller guarded
//! `UPDATE`, which re-checks the observed status inside the same
//! statement that applies it so a racing writer never clobbers a
//! state it didn't expect.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool, Transaction};

use probed_core::{cap_output, rollup_batch_status, Job, JobRun, RunStatus};

use crate::error::{Result, StoreError};
use crate::migrate::run_migrations;
use crate::query::RunQuery;
use crate::rows::{format_timestamp, job_bindings, JobRow, JobRunRow};

/// Runs older than this are pruned when the store opens.
const RUN_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Input to [`Store::record_run_start`]. Unset `execution_id`/`attempt`/
/// `max_attempts` are filled per the defaulting rule: `execution_id` to
/// the freshly generated run id, `attempt` to 1, `max_attempts` to
/// `attempt`.
#[derive(Debug, Clone)]
pub struct NewRun {
	pub job_id: String,
	pub probe_id: String,
	pub request_id: String,
	pub execution_id: Option<String>,
	pub attempt: Option<u32>,
	pub max_attempts: Option<u32>,
	pub status: RunStatus,
}

#[derive(Clone)]
pub struct Store {
	pool: SqlitePool,
}

impl Store {
	/// Run migrations and prune runs older than [`RUN_RETENTION`].
	#[tracing::instrument(skip(pool))]
	pub async fn open(pool: SqlitePool) -> Result<Self> {
		run_migrations(&pool).await?;
		let store = Self { pool };
		store.prune_expired_runs().await?;
		Ok(store)
	}

	async fn prune_expired_runs(&self) -> Result<()> {
		let cutoff = format_timestamp(Utc::now() - chrono::Duration::from_std(RUN_RETENTION).unwrap());
		let result = sqlx::query("DELETE FROM job_runs WHERE started_at < ?1")
			.bind(&cutoff)
			.execute(&self.pool)
			.await?;
		if result.rows_affected() > 0 {
			tracing::debug!(pruned = result.rows_affected(), "pruned expired job runs");
		}
		Ok(())
	}

	/// Cheap liveness probe for health endpoints: round-trips a trivial
	/// query through the pinned connection.
	pub async fn ping(&self) -> Result<()> {
		sqlx::query("SELECT 1").execute(&self.pool).await?;
		Ok(())
	}

	// ---- jobs ----------------------------------------------------

	#[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
	pub async fn create_job(&self, mut job: Job) -> Result<Job> {
		job.validate()?;
		if job.id.trim().is_empty() {
			job.id = uuid::Uuid::new_v4().to_string();
		}
		let now = Utc::now();
		job.created_at = now;
		job.updated_at = now;
		job.last_run_at = None;
		job.last_status = None;

		let bindings = job_bindings(&job);
		sqlx::query(
			r#"
			INSERT INTO jobs (
				id, name, command, schedule, target_kind, target_value,
				retry_max_attempts, retry_initial_backoff_ms, retry_multiplier, retry_max_backoff_ms,
				enabled, created_at, updated_at, last_run_at, last_status
			) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, NULL, NULL)
			"#,
		)
		.bind(&job.id)
		.bind(&job.name)
		.bind(&job.command)
		.bind(&job.schedule)
		.bind(&bindings.target_kind)
		.bind(&bindings.target_value)
		.bind(bindings.retry_max_attempts)
		.bind(bindings.retry_initial_backoff_ms)
		.bind(bindings.retry_multiplier)
		.bind(bindings.retry_max_backoff_ms)
		.bind(job.enabled)
		.bind(format_timestamp(job.created_at))
		.bind(format_timestamp(job.updated_at))
		.execute(&self.pool)
		.await?;

		Ok(job)
	}

	#[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
	pub async fn update_job(&self, mut job: Job) -> Result<Job> {
		job.validate()?;
		let existing = self.get_job(&job.id).await?;
		job.created_at = existing.created_at;
		job.last_run_at = existing.last_run_at;
		job.last_status = existing.last_status;
		job.updated_at = Utc::now();

		let bindings = job_bindings(&job);
		let result = sqlx::query(
			r#"
			UPDATE jobs SET
				name = ?1, command = ?2, schedule = ?3, target_kind = ?4, target_value = ?5,
				retry_max_attempts = ?6, retry_initial_backoff_ms = ?7, retry_multiplier = ?8,
				retry_max_backoff_ms = ?9, enabled = ?10, updated_at = ?11
			WHERE id = ?12
			"#,
		)
		.bind(&job.name)
		.bind(&job.command)
		.bind(&job.schedule)
		.bind(&bindings.target_kind)
		.bind(&bindings.target_value)
		.bind(bindings.retry_max_attempts)
		.bind(bindings.retry_initial_backoff_ms)
		.bind(bindings.retry_multiplier)
		.bind(bindings.retry_max_backoff_ms)
		.bind(job.enabled)
		.bind(format_timestamp(job.updated_at))
		.bind(&job.id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(StoreError::NotFound(job.id));
		}
		Ok(job)
	}

	#[tracing::instrument(skip(self))]
	pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<Job> {
		let result = sqlx::query("UPDATE jobs SET enabled = ?1, updated_at = ?2 WHERE id = ?3")
			.bind(enabled)
			.bind(format_timestamp(Utc::now()))
			.bind(id)
			.execute(&self.pool)
			.await?;
		if result.rows_affected() == 0 {
			return Err(StoreError::NotFound(id.to_string()));
		}
		self.get_job(id).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_job(&self, id: &str) -> Result<Job> {
		let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?1")
			.bind(id)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
		row.into_job()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_jobs(&self) -> Result<Vec<Job>> {
		let rows = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs ORDER BY updated_at DESC")
			.fetch_all(&self.pool)
			.await?;
		rows.into_iter().map(JobRow::into_job).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn delete_job(&self, id: &str) -> Result<()> {
		let result = sqlx::query("DELETE FROM jobs WHERE id = ?1")
			.bind(id)
			.execute(&self.pool)
			.await?;
		if result.rows_affected() == 0 {
			return Err(StoreError::NotFound(id.to_string()));
		}
		Ok(())
	}

	// ---- runs ------------------------------------------------------

	#[tracing::instrument(skip(self, new_run), fields(job_id = %new_run.job_id, probe_id = %new_run.probe_id))]
	pub async fn record_run_start(&self, new_run: NewRun) -> Result<JobRun> {
		let id = uuid::Uuid::new_v4().to_string();
		let execution_id = new_run.execution_id.unwrap_or_else(|| id.clone());
		let attempt = new_run.attempt.unwrap_or(1);
		let max_attempts = new_run.max_attempts.unwrap_or(attempt);
		if attempt > max_attempts {
			return Err(StoreError::InvalidJob(format!(
				"attempt {attempt} exceeds max_attempts {max_attempts}"
			)));
		}
		let started_at = Utc::now();

		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			INSERT INTO job_runs (
				id, job_id, probe_id, request_id, execution_id, attempt, max_attempts,
				retry_scheduled_at, started_at, ended_at, status, admission_decision,
				admission_reason, admission_rationale, exit_code, output
			) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, NULL, ?9, NULL, NULL, NULL, NULL, '')
			"#,
		)
		.bind(&id)
		.bind(&new_run.job_id)
		.bind(&new_run.probe_id)
		.bind(&new_run.request_id)
		.bind(&execution_id)
		.bind(attempt as i64)
		.bind(max_attempts as i64)
		.bind(format_timestamp(started_at))
		.bind(new_run.status.as_str())
		.execute(&mut *tx)
		.await?;

		sqlx::query("UPDATE jobs SET last_run_at = ?1, last_status = ?2 WHERE id = ?3")
			.bind(format_timestamp(started_at))
			.bind(new_run.status.as_str())
			.bind(&new_run.job_id)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;

		JobRunRow {
			id,
			job_id: new_run.job_id,
			probe_id: new_run.probe_id,
			request_id: new_run.request_id,
			execution_id,
			attempt: attempt as i64,
			max_attempts: max_attempts as i64,
			retry_scheduled_at: None,
			started_at: format_timestamp(started_at),
			ended_at: None,
			status: new_run.status.as_str().to_string(),
			admission_decision: None,
			admission_reason: None,
			admission_rationale: None,
			exit_code: None,
			output: String::new(),
		}
		.into_run()
	}

	#[tracing::instrument(skip(self))]
	pub async fn mark_run_pending(&self, run_id: &str) -> Result<JobRun> {
		self.simple_transition(
			run_id,
			&[RunStatus::Queued],
			RunStatus::Pending,
			"UPDATE job_runs SET status = ?1 WHERE id = ?2 AND status = ?3",
		)
		.await
	}

	#[tracing::instrument(skip(self))]
	pub async fn mark_run_running(&self, run_id: &str) -> Result<JobRun> {
		self.simple_transition(
			run_id,
			&[RunStatus::Pending],
			RunStatus::Running,
			"UPDATE job_runs SET status = ?1 WHERE id = ?2 AND status = ?3",
		)
		.await
	}

	#[allow(clippy::too_many_arguments)]
	#[tracing::instrument(skip(self, output), fields(run_id = %run_id))]
	pub async fn complete_run_with_retry(
		&self,
		run_id: &str,
		status: RunStatus,
		exit_code: Option<i32>,
		output: &str,
		retry_scheduled_at: Option<DateTime<Utc>>,
	) -> Result<JobRun> {
		if !matches!(status, RunStatus::Success | RunStatus::Failed) {
			return Err(StoreError::InvalidTransition {
				attempted: status.as_str().to_string(),
				observed: "running".to_string(),
			});
		}
		let capped = cap_output(output);
		let ended_at = format_timestamp(Utc::now());
		let retry_scheduled_at = retry_scheduled_at.map(format_timestamp);

		let mut tx = self.pool.begin().await?;
		let (job_id, observed) = self.check_transition(&mut tx, run_id, &[RunStatus::Running]).await?;

		let result = sqlx::query(
			r#"
			UPDATE job_runs SET status = ?1, exit_code = ?2, output = ?3, ended_at = ?4, retry_scheduled_at = ?5
			WHERE id = ?6 AND status = ?7
			"#,
		)
		.bind(status.as_str())
		.bind(exit_code)
		.bind(&capped)
		.bind(&ended_at)
		.bind(&retry_scheduled_at)
		.bind(run_id)
		.bind(observed.as_str())
		.execute(&mut *tx)
		.await?;
		self.check_rows_affected(&mut tx, run_id, status, result.rows_affected()).await?;
		self.recompute_job_last_status(&mut tx, &job_id).await?;
		tx.commit().await?;

		self.get_run(run_id).await
	}

	#[tracing::instrument(skip(self, reason))]
	pub async fn cancel_run(&self, run_id: &str, reason: &str) -> Result<JobRun> {
		let ended_at = format_timestamp(Utc::now());
		let mut tx = self.pool.begin().await?;
		let (job_id, observed) = self
			.check_transition(
				&mut tx,
				run_id,
				&[RunStatus::Queued, RunStatus::Pending, RunStatus::Running],
			)
			.await?;

		let result = sqlx::query(
			r#"
			UPDATE job_runs SET status = ?1, ended_at = ?2, admission_reason = ?3
			WHERE id = ?4 AND status = ?5
			"#,
		)
		.bind(RunStatus::Canceled.as_str())
		.bind(&ended_at)
		.bind(reason)
		.bind(run_id)
		.bind(observed.as_str())
		.execute(&mut *tx)
		.await?;
		self.check_rows_affected(&mut tx, run_id, RunStatus::Canceled, result.rows_affected())
			.await?;
		self.recompute_job_last_status(&mut tx, &job_id).await?;
		tx.commit().await?;
		self.get_run(run_id).await
	}

	#[tracing::instrument(skip(self, reason, rationale))]
	pub async fn mark_run_denied(
		&self,
		run_id: &str,
		reason: &str,
		rationale: Option<serde_json::Value>,
	) -> Result<JobRun> {
		let ended_at = format_timestamp(Utc::now());
		let rationale_raw = rationale.as_ref().map(serde_json::to_string).transpose()?;
		let mut tx = self.pool.begin().await?;
		let (job_id, observed) = self
			.check_transition(
				&mut tx,
				run_id,
				&[RunStatus::Queued, RunStatus::Pending, RunStatus::Running],
			)
			.await?;

		let result = sqlx::query(
			r#"
			UPDATE job_runs SET status = ?1, ended_at = ?2, admission_decision = 'denied',
				admission_reason = ?3, admission_rationale = ?4
			WHERE id = ?5 AND status = ?6
			"#,
		)
		.bind(RunStatus::Denied.as_str())
		.bind(&ended_at)
		.bind(reason)
		.bind(&rationale_raw)
		.bind(run_id)
		.bind(observed.as_str())
		.execute(&mut *tx)
		.await?;
		self.check_rows_affected(&mut tx, run_id, RunStatus::Denied, result.rows_affected())
			.await?;
		self.recompute_job_last_status(&mut tx, &job_id).await?;
		tx.commit().await?;
		self.get_run(run_id).await
	}

	/// Refresh a still-`queued` run's admission rationale / next
	/// re-evaluation time (carried in `retry_scheduled_at`) without
	/// changing its status.
	#[tracing::instrument(skip(self, reason, rationale))]
	pub async fn update_queued_run_admission(
		&self,
		run_id: &str,
		reason: Option<&str>,
		rationale: Option<serde_json::Value>,
		recheck_at: Option<DateTime<Utc>>,
	) -> Result<JobRun> {
		let rationale_raw = rationale.as_ref().map(serde_json::to_string).transpose()?;
		let recheck_raw = recheck_at.map(format_timestamp);

		let mut tx = self.pool.begin().await?;
		let (_, observed) = self.check_transition(&mut tx, run_id, &[RunStatus::Queued]).await?;

		let result = sqlx::query(
			r#"
			UPDATE job_runs SET admission_reason = ?1, admission_rationale = ?2, retry_scheduled_at = ?3
			WHERE id = ?4 AND status = ?5
			"#,
		)
		.bind(reason)
		.bind(&rationale_raw)
		.bind(&recheck_raw)
		.bind(run_id)
		.bind(observed.as_str())
		.execute(&mut *tx)
		.await?;
		self.check_rows_affected(&mut tx, run_id, RunStatus::Queued, result.rows_affected())
			.await?;
		tx.commit().await?;
		self.get_run(run_id).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_active_runs_by_job(&self, job_id: &str) -> Result<Vec<JobRun>> {
		let rows = sqlx::query_as::<_, JobRunRow>(
			r#"
			SELECT * FROM job_runs
			WHERE job_id = ?1 AND status IN ('queued', 'pending', 'running')
			ORDER BY started_at DESC
			"#,
		)
		.bind(job_id)
		.fetch_all(&self.pool)
		.await?;
		rows.into_iter().map(JobRunRow::into_run).collect()
	}

	#[tracing::instrument(skip(self, query))]
	pub async fn list_runs(&self, query: &RunQuery) -> Result<Vec<JobRun>> {
		let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new("SELECT * FROM job_runs WHERE 1 = 1");
		if let Some(job_id) = &query.job_id {
			builder.push(" AND job_id = ").push_bind(job_id.clone());
		}
		if let Some(probe_id) = &query.probe_id {
			builder.push(" AND probe_id = ").push_bind(probe_id.clone());
		}
		if let Some(status) = query.status {
			builder.push(" AND status = ").push_bind(status.as_str());
		}
		if let Some(started_after) = query.started_after {
			builder
				.push(" AND started_at > ")
				.push_bind(format_timestamp(started_after));
		}
		if let Some(started_before) = query.started_before {
			builder
				.push(" AND started_at < ")
				.push_bind(format_timestamp(started_before));
		}
		builder.push(" ORDER BY started_at DESC LIMIT ").push_bind(query.normalized_limit());

		let rows = builder.build_query_as::<JobRunRow>().fetch_all(&self.pool).await?;
		rows.into_iter().map(JobRunRow::into_run).collect()
	}

	#[tracing::instrument(skip(self))]
	pub async fn get_run(&self, run_id: &str) -> Result<JobRun> {
		let row = sqlx::query_as::<_, JobRunRow>("SELECT * FROM job_runs WHERE id = ?1")
			.bind(run_id)
			.fetch_optional(&self.pool)
			.await?
			.ok_or_else(|| StoreError::NotFound(run_id.to_string()))?;
		row.into_run()
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_runs_by_job(&self, job_id: &str, limit: i64) -> Result<Vec<JobRun>> {
		let limit = limit.clamp(1, crate::query::MAX_RUN_LIMIT);
		let rows = sqlx::query_as::<_, JobRunRow>(
			"SELECT * FROM job_runs WHERE job_id = ?1 ORDER BY started_at DESC LIMIT ?2",
		)
		.bind(job_id)
		.bind(limit)
		.fetch_all(&self.pool)
		.await?;
		rows.into_iter().map(JobRunRow::into_run).collect()
	}

	// ---- transition primitive --------------------------------------

	/// A transition with no extra columns to set beyond `status`
	/// itself — [`Self::mark_run_pending`] / [`Self::mark_run_running`].
	async fn simple_transition(
		&self,
		run_id: &str,
		from: &[RunStatus],
		to: RunStatus,
		sql: &str,
	) -> Result<JobRun> {
		let mut tx = self.pool.begin().await?;
		let (job_id, observed) = self.check_transition(&mut tx, run_id, from).await?;

		let result = sqlx::query(sql)
			.bind(to.as_str())
			.bind(run_id)
			.bind(observed.as_str())
			.execute(&mut *tx)
			.await?;
		self.check_rows_affected(&mut tx, run_id, to, result.rows_affected()).await?;
		self.recompute_job_last_status(&mut tx, &job_id).await?;
		tx.commit().await?;
		self.get_run(run_id).await
	}

	/// Read `(job_id, status)` for `run_id` and verify `status` is in
	/// `from`, returning `invalid_transition` (with what was actually
	/// observed) if not. Callers then issue their own `UPDATE … WHERE
	/// id = ? AND status = ?` binding `observed` last, keeping the
	/// check-then-apply atomic within one transaction.
	async fn check_transition<'c>(
		&self,
		tx: &mut Transaction<'c, Sqlite>,
		run_id: &str,
		from: &[RunStatus],
	) -> Result<(String, RunStatus)> {
		let row = sqlx::query("SELECT job_id, status FROM job_runs WHERE id = ?1")
			.bind(run_id)
			.fetch_optional(&mut **tx)
			.await?
			.ok_or_else(|| StoreError::NotFound(run_id.to_string()))?;
		let job_id: String = row.get("job_id");
		let observed_raw: String = row.get("status");
		let observed = RunStatus::from_str(&observed_raw).map_err(StoreError::InvalidJob)?;

		if !from.contains(&observed) {
			let legal = from.iter().map(RunStatus::as_str).collect::<Vec<_>>().join("|");
			return Err(StoreError::InvalidTransition {
				attempted: legal,
				observed: observed.as_str().to_string(),
			});
		}

		Ok((job_id, observed))
	}

	/// A zero-row `UPDATE` means a concurrent writer beat us to it
	/// between [`Self::check_transition`] and the apply: reread and
	/// report `invalid_transition` with whatever status is now there.
	async fn check_rows_affected<'c>(
		&self,
		tx: &mut Transaction<'c, Sqlite>,
		run_id: &str,
		attempted: RunStatus,
		rows_affected: u64,
	) -> Result<()> {
		if rows_affected > 0 {
			return Ok(());
		}
		let reread: String = sqlx::query_scalar("SELECT status FROM job_runs WHERE id = ?1")
			.bind(run_id)
			.fetch_one(&mut **tx)
			.await?;
		Err(StoreError::InvalidTransition {
			attempted: attempted.as_str().to_string(),
			observed: reread,
		})
	}

	/// Recompute the parent job's denormalized `last_status` over the
	/// batch of runs sharing `max(started_at)`, using
	/// [`rollup_batch_status`]'s `running > pending > queued > failed >
	/// denied > canceled > success` priority.
	async fn recompute_job_last_status<'c>(&self, tx: &mut Transaction<'c, Sqlite>, job_id: &str) -> Result<()> {
		let max_started: Option<String> =
			sqlx::query_scalar("SELECT MAX(started_at) FROM job_runs WHERE job_id = ?1")
				.bind(job_id)
				.fetch_one(&mut **tx)
				.await?;
		let Some(max_started) = max_started else {
			return Ok(());
		};

		let rows = sqlx::query("SELECT status FROM job_runs WHERE job_id = ?1 AND started_at = ?2")
			.bind(job_id)
			.bind(&max_started)
			.fetch_all(&mut **tx)
			.await?;
		let statuses = rows
			.iter()
			.map(|r| RunStatus::from_str(r.get::<String, _>("status").as_str()))
			.collect::<std::result::Result<Vec<_>, _>>()
			.map_err(StoreError::InvalidJob)?;

		if let Some(rollup) = rollup_batch_status(&statuses) {
			sqlx::query("UPDATE jobs SET last_status = ?1 WHERE id = ?2")
				.bind(rollup.as_str())
				.bind(job_id)
				.execute(&mut **tx)
				.await?;
		}
		Ok(())
	}
}
