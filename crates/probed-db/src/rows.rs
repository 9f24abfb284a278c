// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Row shapes mirroring the `jobs`/`job_runs` tables and their
//! conversions to/from the domain types in `probed-core`.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use probed_core::{Job, JobRun, RetryPolicy, RunStatus, Target, TargetKind};

use crate::error::{Result, StoreError};

#[derive(Debug, FromRow)]
pub struct JobRow {
	pub id: String,
	pub name: String,
	pub command: String,
	pub schedule: String,
	pub target_kind: String,
	pub target_value: Option<String>,
	pub retry_max_attempts: Option<i64>,
	pub retry_initial_backoff_ms: Option<i64>,
	pub retry_multiplier: Option<f64>,
	pub retry_max_backoff_ms: Option<i64>,
	pub enabled: bool,
	pub created_at: String,
	pub updated_at: String,
	pub last_run_at: Option<String>,
	pub last_status: Option<String>,
}

fn parse_rfc3339(value: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|e| StoreError::Sqlx(sqlx::Error::ColumnDecode {
			index: "timestamp".into(),
			source: Box::new(e),
		}))
}

/// RFC 3339 with nanosecond precision.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
	dt.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

impl JobRow {
	pub fn into_job(self) -> Result<Job> {
		let target_kind = TargetKind::from_str(&self.target_kind)
			.map_err(StoreError::InvalidJob)?;
		let retry_policy = match (
			self.retry_max_attempts,
			self.retry_initial_backoff_ms,
			self.retry_multiplier,
		) {
			(Some(max_attempts), Some(initial_backoff_ms), Some(multiplier)) => Some(RetryPolicy {
				max_attempts: max_attempts as u32,
				initial_backoff: Duration::from_millis(initial_backoff_ms as u64),
				multiplier,
				max_backoff: self.retry_max_backoff_ms.map(|ms| Duration::from_millis(ms as u64)),
			}),
			_ => None,
		};

		Ok(Job {
			id: self.id,
			name: self.name,
			command: self.command,
			schedule: self.schedule,
			target: Target {
				kind: target_kind,
				value: self.target_value,
			},
			retry_policy,
			enabled: self.enabled,
			created_at: parse_rfc3339(&self.created_at)?,
			updated_at: parse_rfc3339(&self.updated_at)?,
			last_run_at: self.last_run_at.as_deref().map(parse_rfc3339).transpose()?,
			last_status: self
				.last_status
				.as_deref()
				.map(RunStatus::from_str)
				.transpose()
				.map_err(StoreError::InvalidJob)?,
		})
	}
}

pub struct JobBindings {
	pub target_kind: String,
	pub target_value: Option<String>,
	pub retry_max_attempts: Option<i64>,
	pub retry_initial_backoff_ms: Option<i64>,
	pub retry_multiplier: Option<f64>,
	pub retry_max_backoff_ms: Option<i64>,
}

pub fn job_bindings(job: &Job) -> JobBindings {
	JobBindings {
		target_kind: job.target.kind.as_str().to_string(),
		target_value: job.target.value.clone(),
		retry_max_attempts: job.retry_policy.map(|p| p.max_attempts as i64),
		retry_initial_backoff_ms: job
			.retry_policy
			.map(|p| p.initial_backoff.as_millis() as i64),
		retry_multiplier: job.retry_policy.map(|p| p.multiplier),
		retry_max_backoff_ms: job
			.retry_policy
			.and_then(|p| p.max_backoff)
			.map(|d| d.as_millis() as i64),
	}
}

#[derive(Debug, FromRow)]
pub struct JobRunRow {
	pub id: String,
	pub job_id: String,
	pub probe_id: String,
	pub request_id: String,
	pub execution_id: String,
	pub attempt: i64,
	pub max_attempts: i64,
	pub retry_scheduled_at: Option<String>,
	pub started_at: String,
	pub ended_at: Option<String>,
	pub status: String,
	pub admission_decision: Option<String>,
	pub admission_reason: Option<String>,
	pub admission_rationale: Option<String>,
	pub exit_code: Option<i64>,
	pub output: String,
}

impl JobRunRow {
	pub fn into_run(self) -> Result<JobRun> {
		Ok(JobRun {
			id: self.id,
			job_id: self.job_id,
			probe_id: self.probe_id,
			request_id: self.request_id,
			execution_id: self.execution_id,
			attempt: self.attempt as u32,
			max_attempts: self.max_attempts as u32,
			retry_scheduled_at: self
				.retry_scheduled_at
				.as_deref()
				.map(parse_rfc3339)
				.transpose()?,
			started_at: parse_rfc3339(&self.started_at)?,
			ended_at: self.ended_at.as_deref().map(parse_rfc3339).transpose()?,
			status: RunStatus::from_str(&self.status).map_err(StoreError::InvalidJob)?,
			exit_code: self.exit_code.map(|c| c as i32),
			output: self.output,
			admission_decision: self.admission_decision,
			admission_reason: self.admission_reason,
			admission_rationale: self
				.admission_rationale
				.map(|raw| serde_json::from_str(&raw))
				.transpose()?,
		})
	}
}
