// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Route handlers for the job/run HTTP surface. Grounded on the
//! teacher's admin job routes: one handler per endpoint, `State` +
//! `Path`/`Query` extractors, `#[tracing::instrument]`, a match on the
//! collaborator result that short-circuits to the right status code.

use std::str::FromStr;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::instrument;

use probed_core::{LifecycleEvent, LifecycleEventKind, RunStatus};
use probed_db::RunQuery;

use crate::dto::{
	CancelJobResponse, CreateJobRequest, HealthResponse, JobHealthResponse, JobResponse,
	ListJobsResponse, ListRunsResponse, RunFilterParams, RunResponse, RunStatusSummary,
	TriggerRunResponse, UpdateJobRequest,
};
use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/healthz", get(healthz))
		.route("/api/v1/jobs", get(list_jobs).post(create_job))
		.route("/api/v1/jobs/runs", get(list_all_runs))
		.route("/api/v1/jobs/{id}", get(get_job).put(update_job).delete(delete_job))
		.route("/api/v1/jobs/{id}/run", post(trigger_now))
		.route("/api/v1/jobs/{id}/cancel", post(cancel_job))
		.route("/api/v1/jobs/{id}/enable", post(enable_job))
		.route("/api/v1/jobs/{id}/disable", post(disable_job))
		.route("/api/v1/jobs/{id}/health", get(job_health))
		.route("/api/v1/jobs/{id}/runs", get(list_runs_for_job))
		.route("/api/v1/jobs/{id}/runs/{run_id}/cancel", post(cancel_run))
		.route("/api/v1/jobs/{id}/runs/{run_id}/retry", post(retry_run))
		.with_state(state)
}

fn require_scheduler(state: &AppState) -> Result<&probed_scheduler::Scheduler, ApiError> {
	state
		.scheduler
		.as_ref()
		.ok_or_else(|| ApiError::ServiceUnavailable("scheduler is not running".to_string()))
}

fn build_run_query(job_id: Option<String>, params: RunFilterParams) -> Result<RunQuery, ApiError> {
	if let (Some(after), Some(before)) = (params.started_after, params.started_before) {
		if after > before {
			return Err(ApiError::InvalidRequest(
				"started_after must not be later than started_before".to_string(),
			));
		}
	}
	let status = match params.status {
		Some(s) => Some(
			RunStatus::from_str(&s)
				.map_err(|_| ApiError::InvalidRequest(format!("unknown run status: {s}")))?,
		),
		None => None,
	};
	Ok(RunQuery {
		job_id,
		probe_id: params.probe_id,
		status,
		started_after: params.started_after,
		started_before: params.started_before,
		limit: params.limit,
	})
}

#[instrument(skip(state))]
async fn list_jobs(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
	let jobs = state.store.list_jobs().await?;
	Ok((StatusCode::OK, Json(ListJobsResponse { jobs })))
}

/// Process liveness: always 200 once the HTTP surface itself answers,
/// carrying whether the pool and scheduler are actually healthy rather
/// than failing the whole probe on a transient scheduler gap.
#[instrument(skip(state))]
async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
	let database_reachable = state.store.ping().await.is_ok();
	let (scheduler_running, last_tick_at) = match &state.scheduler {
		Some(scheduler) => (scheduler.is_running().await, scheduler.last_tick_at().await),
		None => (false, None),
	};
	let status = if database_reachable { "ok" } else { "degraded" };
	(
		StatusCode::OK,
		Json(HealthResponse {
			status,
			database_reachable,
			scheduler_running,
			last_tick_at,
		}),
	)
}

#[instrument(skip(state))]
async fn job_health(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
	let job = state.store.get_job(&id).await?;
	let active_runs = state.store.list_active_runs_by_job(&id).await?.len() as u32;
	Ok((
		StatusCode::OK,
		Json(JobHealthResponse {
			job_id: job.id,
			enabled: job.enabled,
			last_status: job.last_status,
			last_run_at: job.last_run_at,
			active_runs,
		}),
	))
}

#[instrument(skip(state, body))]
async fn create_job(
	State(state): State<AppState>,
	Json(body): Json<CreateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
	let job = body.into_job(String::new());
	let created = state.store.create_job(job).await?;
	state
		.lifecycle
		.emit(LifecycleEvent::new(LifecycleEventKind::JobCreated, &created.id));
	Ok((StatusCode::CREATED, Json(JobResponse::from(created))))
}

#[instrument(skip(state))]
async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
	let job = state.store.get_job(&id).await?;
	Ok((StatusCode::OK, Json(JobResponse::from(job))))
}

#[instrument(skip(state, body))]
async fn update_job(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Json(body): Json<UpdateJobRequest>,
) -> Result<impl IntoResponse, ApiError> {
	let job = body.into_job(id);
	let updated = state.store.update_job(job).await?;
	state
		.lifecycle
		.emit(LifecycleEvent::new(LifecycleEventKind::JobUpdated, &updated.id));
	Ok((StatusCode::OK, Json(JobResponse::from(updated))))
}

#[instrument(skip(state))]
async fn delete_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
	state.store.delete_job(&id).await?;
	state.lifecycle.emit(LifecycleEvent::new(LifecycleEventKind::JobDeleted, &id));
	Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
async fn enable_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
	let job = state.store.set_enabled(&id, true).await?;
	Ok((StatusCode::OK, Json(JobResponse::from(job))))
}

#[instrument(skip(state))]
async fn disable_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
	let job = state.store.set_enabled(&id, false).await?;
	Ok((StatusCode::OK, Json(JobResponse::from(job))))
}

#[instrument(skip(state))]
async fn trigger_now(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
	let scheduler = require_scheduler(&state)?;
	let runs = scheduler.trigger_now(&id).await?;
	Ok((StatusCode::ACCEPTED, Json(TriggerRunResponse { runs })))
}

#[instrument(skip(state))]
async fn cancel_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
	let scheduler = require_scheduler(&state)?;
	let summary = scheduler.cancel_job(&id).await?;
	Ok((StatusCode::OK, Json(CancelJobResponse::from(summary))))
}

#[instrument(skip(state))]
async fn cancel_run(
	State(state): State<AppState>,
	Path((id, run_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
	let scheduler = require_scheduler(&state)?;
	let run = scheduler.cancel_run(&id, &run_id).await?;
	Ok((StatusCode::OK, Json(RunResponse::from(run))))
}

#[instrument(skip(state))]
async fn retry_run(
	State(state): State<AppState>,
	Path((id, run_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
	let scheduler = require_scheduler(&state)?;
	let run = scheduler.retry_run(&id, &run_id).await?;
	Ok((StatusCode::ACCEPTED, Json(RunResponse::from(run))))
}

#[instrument(skip(state, params))]
async fn list_runs_for_job(
	State(state): State<AppState>,
	Path(id): Path<String>,
	Query(params): Query<RunFilterParams>,
) -> Result<impl IntoResponse, ApiError> {
	// 404s if the job itself doesn't exist, before even looking at runs.
	state.store.get_job(&id).await?;
	let query = build_run_query(Some(id), params)?;
	let runs = state.store.list_runs(&query).await?;
	let summary = RunStatusSummary::tally(runs.iter().map(|r| &r.status));
	Ok((StatusCode::OK, Json(ListRunsResponse { runs, summary })))
}

#[instrument(skip(state, params))]
async fn list_all_runs(
	State(state): State<AppState>,
	Query(params): Query<RunFilterParams>,
) -> Result<impl IntoResponse, ApiError> {
	if let Some(job_id) = &params.job_id {
		state.store.get_job(job_id).await?;
	}
	let job_id = params.job_id.clone();
	let query = build_run_query(job_id, params)?;
	let runs = state.store.list_runs(&query).await?;
	let summary = RunStatusSummary::tally(runs.iter().map(|r| &r.status));
	Ok((StatusCode::OK, Json(ListRunsResponse { runs, summary })))
}
