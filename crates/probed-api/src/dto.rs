// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Request/response bodies for the HTTP surface. These are thin
//! wrappers over the domain types in `probed-core` — the wire shape,
//! not the store's internal representation.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::{IntoParams, ToSchema};

use probed_core::{Job, JobRun, RetryPolicy, RunStatus, Target};

#[derive(Debug, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CreateJobRequest {
	pub name: String,
	pub command: String,
	pub schedule: String,
	pub target: Target,
	#[serde(default)]
	pub retry_policy: Option<RetryPolicy>,
	#[serde(default = "default_enabled")]
	pub enabled: bool,
}

fn default_enabled() -> bool {
	true
}

pub type UpdateJobRequest = CreateJobRequest;

impl CreateJobRequest {
	/// Lower a request body into the domain `Job` shape the store
	/// expects, filling in everything the store itself overwrites
	/// (`id`, `created_at`, `updated_at`, `last_run_at`, `last_status`)
	/// with placeholders.
	pub fn into_job(self, id: String) -> Job {
		let now = Utc::now();
		Job {
			id,
			name: self.name,
			command: self.command,
			schedule: self.schedule,
			target: self.target,
			retry_policy: self.retry_policy,
			enabled: self.enabled,
			created_at: now,
			updated_at: now,
			last_run_at: None,
			last_status: None,
		}
	}
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JobResponse {
	#[serde(flatten)]
	pub job: Job,
}

impl From<Job> for JobResponse {
	fn from(job: Job) -> Self {
		Self { job }
	}
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ListJobsResponse {
	pub jobs: Vec<Job>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RunResponse {
	#[serde(flatten)]
	pub run: JobRun,
}

impl From<JobRun> for RunResponse {
	fn from(run: JobRun) -> Self {
		Self { run }
	}
}

/// Per-status counts accompanying every list-runs response. Always
/// carries at least `running`/`success`/`failed`; every other status
/// is reported too so consumers never have to guess a default of zero.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RunStatusSummary {
	pub running: u32,
	pub success: u32,
	pub failed: u32,
	pub queued: u32,
	pub pending: u32,
	pub canceled: u32,
	pub denied: u32,
}

impl RunStatusSummary {
	pub fn tally<'a>(runs: impl IntoIterator<Item = &'a RunStatus>) -> Self {
		let mut counts: HashMap<RunStatus, u32> = HashMap::new();
		for status in runs {
			*counts.entry(*status).or_default() += 1;
		}
		Self {
			running: counts.get(&RunStatus::Running).copied().unwrap_or(0),
			success: counts.get(&RunStatus::Success).copied().unwrap_or(0),
			failed: counts.get(&RunStatus::Failed).copied().unwrap_or(0),
			queued: counts.get(&RunStatus::Queued).copied().unwrap_or(0),
			pending: counts.get(&RunStatus::Pending).copied().unwrap_or(0),
			canceled: counts.get(&RunStatus::Canceled).copied().unwrap_or(0),
			denied: counts.get(&RunStatus::Denied).copied().unwrap_or(0),
		}
	}
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ListRunsResponse {
	pub runs: Vec<JobRun>,
	pub summary: RunStatusSummary,
}

#[derive(Debug, Deserialize, Default)]
#[cfg_attr(feature = "openapi", derive(IntoParams))]
pub struct RunFilterParams {
	pub job_id: Option<String>,
	pub limit: Option<i64>,
	pub probe_id: Option<String>,
	pub status: Option<String>,
	pub started_after: Option<DateTime<Utc>>,
	pub started_before: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TriggerRunResponse {
	pub runs: Vec<JobRun>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CancelJobResponse {
	pub canceled_runs: u32,
	pub already_terminal: u32,
	pub canceled_retries: u32,
}

impl From<probed_scheduler::CancelJobSummary> for CancelJobResponse {
	fn from(summary: probed_scheduler::CancelJobSummary) -> Self {
		Self {
			canceled_runs: summary.canceled_runs,
			already_terminal: summary.already_terminal,
			canceled_retries: summary.canceled_retries,
		}
	}
}

/// Process-wide liveness: database pool reachability and, when a
/// scheduler is wired in, the last completed tick.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HealthResponse {
	pub status: &'static str,
	pub database_reachable: bool,
	pub scheduler_running: bool,
	pub last_tick_at: Option<DateTime<Utc>>,
}

/// Scheduler health as it pertains to a single job: whether it has an
/// active run right now and when it last ran.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JobHealthResponse {
	pub job_id: String,
	pub enabled: bool,
	pub last_status: Option<RunStatus>,
	pub last_run_at: Option<DateTime<Utc>>,
	pub active_runs: u32,
}

/// `{"error": "<kind>", "message": "<human readable>"}`, matching the
/// error-kind vocabulary every handler maps `ApiError` onto.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ErrorResponse {
	pub error: String,
	pub message: String,
}
