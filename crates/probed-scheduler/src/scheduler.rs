// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! The Scheduler: tick loop, dispatch, attempt, result waiter, finish/
//! retry gating, retry scheduling, and cancellation. See the module
//! doc for the crash-safety stance on in-memory state.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use probed_core::{
	resolve_retry_policy, target_key, Job, JobRun, LifecycleEvent, LifecycleEventKind, RetryPolicy,
	RetryPolicyOverrides, RunStatus, TargetKind,
};
use probed_db::{NewRun, Store, StoreError};
use probed_lifecycle::LifecycleBus;
use probed_transport::{CommandResult, CommandTracker, Fleet, Hub};

use crate::context::CancellationToken;
use crate::error::{Result, SchedulerError};
use crate::state::SchedulerState;

/// Per-run tuning. Defaults mirror the documented system defaults: a
/// 30s tick and a 60s per-command timeout.
#[derive(Clone, Copy)]
pub struct SchedulerOptions {
	pub tick_interval: Duration,
	pub command_timeout: Duration,
	pub retry_overrides: Option<RetryPolicyOverrides>,
}

impl Default for SchedulerOptions {
	fn default() -> Self {
		Self {
			tick_interval: Duration::from_secs(30),
			command_timeout: Duration::from_secs(60),
			retry_overrides: None,
		}
	}
}

/// Result summary for [`Scheduler::cancel_job`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CancelJobSummary {
	pub canceled_runs: u32,
	pub already_terminal: u32,
	pub canceled_retries: u32,
}

struct Inner {
	store: Store,
	fleet: Arc<dyn Fleet>,
	hub: Arc<dyn Hub>,
	tracker: Arc<dyn CommandTracker>,
	lifecycle: Arc<LifecycleBus>,
	retry_overrides: Option<RetryPolicyOverrides>,
	tick_interval: Duration,
	command_timeout: Duration,
	state: Mutex<SchedulerState>,
	/// `Some` while started; doubles as the tick loop's shutdown signal.
	running: Mutex<Option<broadcast::Sender<()>>>,
	handles: Mutex<Vec<JoinHandle<()>>>,
	cancellation: CancellationToken,
	last_tick: Mutex<Option<DateTime<Utc>>>,
}

/// Owns the run lifecycle: due-detection, dispatch, retry, and
/// cancellation. Cheap to clone — every clone shares the same state
/// behind an `Arc`.
#[derive(Clone)]
pub struct Scheduler {
	inner: Arc<Inner>,
}

impl Scheduler {
	pub fn new(
		store: Store,
		fleet: Arc<dyn Fleet>,
		hub: Arc<dyn Hub>,
		tracker: Arc<dyn CommandTracker>,
		lifecycle: Arc<LifecycleBus>,
		options: SchedulerOptions,
	) -> Self {
		Self {
			inner: Arc::new(Inner {
				store,
				fleet,
				hub,
				tracker,
				lifecycle,
				retry_overrides: options.retry_overrides,
				tick_interval: options.tick_interval,
				command_timeout: options.command_timeout,
				state: Mutex::new(SchedulerState::default()),
				running: Mutex::new(None),
				handles: Mutex::new(Vec::new()),
				cancellation: CancellationToken::new(),
				last_tick: Mutex::new(None),
			}),
		}
	}

	pub async fn is_running(&self) -> bool {
		self.inner.running.lock().await.is_some()
	}

	/// Timestamp of the most recently completed tick, for health
	/// reporting. `None` before the first tick has run.
	pub async fn last_tick_at(&self) -> Option<DateTime<Utc>> {
		*self.inner.last_tick.lock().await
	}

	// ---- lifecycle (scheduler, not job lifecycle) -------------------

	/// Idempotent: a second call while already started is a no-op.
	#[instrument(skip(self))]
	pub async fn start(&self) {
		let mut running = self.inner.running.lock().await;
		if running.is_some() {
			return;
		}
		self.inner.cancellation.reset();
		let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

		let scheduler = self.clone();
		let handle = tokio::spawn(async move {
			scheduler.run_tick_loop(shutdown_rx).await;
		});
		self.inner.handles.lock().await.push(handle);
		*running = Some(shutdown_tx);
		tracing::info!("scheduler started");
	}

	/// Stops the ticker, cancels every in-flight tracker entry and
	/// pending retry timer, then blocks until all spawned workers have
	/// drained. May be `start`ed again afterward.
	#[instrument(skip(self))]
	pub async fn stop(&self) {
		let shutdown_tx = self.inner.running.lock().await.take();
		let Some(shutdown_tx) = shutdown_tx else {
			return;
		};
		self.inner.cancellation.cancel();
		let _ = shutdown_tx.send(());

		let request_ids = {
			let state = self.inner.state.lock().await;
			state.in_flight_request_ids()
		};
		for request_id in request_ids {
			self.inner.tracker.cancel(&request_id).await;
		}

		let retry_cancels = {
			let mut state = self.inner.state.lock().await;
			state.drain_pending_retries()
		};
		for tx in retry_cancels {
			let _ = tx.send(());
		}

		let handles: Vec<JoinHandle<()>> = self.inner.handles.lock().await.drain(..).collect();
		for handle in handles {
			let _ = handle.await;
		}
		tracing::info!("scheduler stopped");
	}

	// ---- manual triggers ---------------------------------------------

	/// Dispatch `job_id` immediately, bypassing the schedule check.
	/// Targets whose `(job, probe)` pair already has an active run are
	/// skipped silently, so calling this twice back-to-back against a
	/// single-probe job yields at most one new run.
	#[instrument(skip(self))]
	pub async fn trigger_now(&self, job_id: &str) -> Result<Vec<JobRun>> {
		let job = self.inner.store.get_job(job_id).await?;
		Ok(self.dispatch_job(&job).await)
	}

	#[instrument(skip(self))]
	pub async fn cancel_job(&self, job_id: &str) -> Result<CancelJobSummary> {
		let job = self.inner.store.get_job(job_id).await?;
		let active = self.inner.store.list_active_runs_by_job(&job.id).await?;

		let mut summary = CancelJobSummary::default();
		for run in &active {
			match self.inner.store.cancel_run(&run.id, "canceled via API").await {
				Ok(canceled) => {
					summary.canceled_runs += 1;
					self.emit_canceled(&job.id, &canceled, "canceled via API");
					self.cancel_tracker_for_run(&canceled.id).await;
				}
				Err(StoreError::InvalidTransition { .. }) => {
					summary.already_terminal += 1;
				}
				Err(e) => return Err(e.into()),
			}
		}

		summary.canceled_retries = {
			let mut state = self.inner.state.lock().await;
			state.cancel_retries_for_job(&job.id)
		};

		Ok(summary)
	}

	#[instrument(skip(self))]
	pub async fn cancel_run(&self, job_id: &str, run_id: &str) -> Result<JobRun> {
		let existing = self.inner.store.get_run(run_id).await?;
		if existing.job_id != job_id {
			return Err(SchedulerError::NotFound(run_id.to_string()));
		}

		let canceled = self.inner.store.cancel_run(run_id, "canceled via API").await?;
		self.emit_canceled(job_id, &canceled, "canceled via API");
		self.cancel_tracker_for_run(&canceled.id).await;

		let key = target_key(job_id, &canceled.probe_id);
		let retry_cancel = {
			let mut state = self.inner.state.lock().await;
			let retry_cancel = state.take_pending_retry(&key);
			if retry_cancel.is_some() {
				// No replacement timer is taking over this target, unlike
				// the supersede path in `register_pending_retry` — release
				// the claim ourselves.
				state.release_target(&key);
			}
			retry_cancel
		};
		if let Some(tx) = retry_cancel {
			let _ = tx.send(());
		}

		Ok(canceled)
	}

	/// Force a fresh attempt for a terminal run (`failed`, `canceled`,
	/// or `denied`), reusing its `execution_id` and incrementing
	/// `attempt`. Any other status is `invalid_transition`.
	#[instrument(skip(self))]
	pub async fn retry_run(&self, job_id: &str, run_id: &str) -> Result<JobRun> {
		let run = self.inner.store.get_run(run_id).await?;
		if run.job_id != job_id {
			return Err(SchedulerError::NotFound(run_id.to_string()));
		}
		if !matches!(run.status, RunStatus::Failed | RunStatus::Canceled | RunStatus::Denied) {
			return Err(SchedulerError::InvalidTransition(format!(
				"run {run_id} has status {} and is not retryable",
				run.status
			)));
		}

		let job = self.inner.store.get_job(job_id).await?;
		let policy = resolve_retry_policy(self.inner.retry_overrides, job.retry_policy)?;
		let key = target_key(job_id, &run.probe_id);

		let claimed = {
			let mut state = self.inner.state.lock().await;
			state.claim_target(&key)
		};
		if !claimed {
			return Err(SchedulerError::InvalidTransition(format!(
				"target {key} already has an active run"
			)));
		}

		let next_attempt = run.attempt + 1;
		let max_attempts = run.max_attempts.max(next_attempt);

		match self
			.dispatch_attempt(&job, &run.probe_id, &key, &run.execution_id, next_attempt, max_attempts, policy)
			.await
		{
			Some(new_run) => Ok(new_run),
			None => Err(SchedulerError::DispatchFailed(format!(
				"retry of run {run_id} did not produce a new attempt"
			))),
		}
	}

	// ---- tick loop ----------------------------------------------------

	async fn run_tick_loop(&self, mut shutdown_rx: broadcast::Receiver<()>) {
		self.tick().await;
		let mut interval = tokio::time::interval(self.inner.tick_interval);
		interval.tick().await; // consume the immediate tick already taken above

		loop {
			tokio::select! {
				_ = interval.tick() => {
					self.tick().await;
				}
				_ = shutdown_rx.recv() => {
					break;
				}
			}
		}
	}

	async fn tick(&self) {
		*self.inner.last_tick.lock().await = Some(Utc::now());
		let jobs = match self.inner.store.list_jobs().await {
			Ok(jobs) => jobs,
			Err(e) => {
				warn!(error = %e, "failed to list jobs for tick");
				return;
			}
		};
		let now = Utc::now();
		for job in jobs {
			if self.inner.cancellation.is_cancelled() {
				return;
			}
			if !job.enabled {
				continue;
			}
			match probed_core::is_schedule_due(&job.schedule, job.last_run_at, job.created_at, now) {
				Ok(true) => {
					self.dispatch_job(&job).await;
				}
				Ok(false) => {}
				Err(e) => {
					warn!(job_id = %job.id, error = %e, "invalid schedule; skipping tick dispatch");
				}
			}
		}
	}

	// ---- dispatch / attempt --------------------------------------------

	async fn resolve_targets(&self, job: &Job) -> Vec<String> {
		let mut ids: Vec<String> = match job.target.kind {
			TargetKind::Probe => job.target.value.clone().into_iter().collect(),
			TargetKind::Tag => {
				let tag = job.target.value.as_deref().unwrap_or_default();
				self.inner.fleet.list_by_tag(tag).await.into_iter().map(|p| p.id).collect()
			}
			TargetKind::All => self.inner.fleet.list().await.into_iter().map(|p| p.id).collect(),
		};
		ids.sort();
		ids.dedup();
		ids
	}

	async fn dispatch_job(&self, job: &Job) -> Vec<JobRun> {
		let policy = match resolve_retry_policy(self.inner.retry_overrides, job.retry_policy) {
			Ok(policy) => policy,
			Err(e) => {
				warn!(job_id = %job.id, error = %e, "invalid retry policy; skipping dispatch");
				return Vec::new();
			}
		};

		let targets = self.resolve_targets(job).await;
		let execution_id = uuid::Uuid::new_v4().to_string();
		let mut dispatched = Vec::new();

		for probe_id in targets {
			let key = target_key(&job.id, &probe_id);
			let claimed = {
				let mut state = self.inner.state.lock().await;
				state.claim_target(&key)
			};
			if !claimed {
				debug!(job_id = %job.id, probe_id = %probe_id, "target already active; skipping");
				continue;
			}
			if let Some(run) = self
				.dispatch_attempt(job, &probe_id, &key, &execution_id, 1, policy.max_attempts, policy)
				.await
			{
				dispatched.push(run);
			}
		}

		dispatched
	}

	#[allow(clippy::too_many_arguments)]
	async fn dispatch_attempt(
		&self,
		job: &Job,
		probe_id: &str,
		target_key: &str,
		execution_id: &str,
		attempt: u32,
		max_attempts: u32,
		policy: RetryPolicy,
	) -> Option<JobRun> {
		let now = Utc::now();
		let request_id = format!(
			"job-{}-{}-attempt-{}-{}",
			job.id,
			probe_id,
			attempt,
			now.timestamp_nanos_opt().unwrap_or_default()
		);

		let run = match self
			.inner
			.store
			.record_run_start(NewRun {
				job_id: job.id.clone(),
				probe_id: probe_id.to_string(),
				request_id: request_id.clone(),
				execution_id: Some(execution_id.to_string()),
				attempt: Some(attempt),
				max_attempts: Some(max_attempts),
				status: RunStatus::Pending,
			})
			.await
		{
			Ok(run) => run,
			Err(e) => {
				warn!(job_id = %job.id, probe_id, error = %e, "failed to record run start");
				self.release_target(target_key).await;
				return None;
			}
		};

		self.emit(
			LifecycleEvent::new(LifecycleEventKind::RunQueued, &job.id)
				.with_run(&run.id)
				.with_probe(probe_id),
		);

		let run = match self.inner.store.mark_run_running(&run.id).await {
			Ok(run) => run,
			Err(StoreError::InvalidTransition { .. }) => {
				// Canceled between insert and here; nothing left to do.
				self.release_target(target_key).await;
				return None;
			}
			Err(e) => {
				warn!(run_id = %run.id, error = %e, "failed to mark run running");
				self.release_target(target_key).await;
				return None;
			}
		};

		self.emit(
			LifecycleEvent::new(LifecycleEventKind::RunStarted, &job.id)
				.with_run(&run.id)
				.with_probe(probe_id),
		);

		if !self.inner.fleet.is_online(probe_id).await {
			self.finish_attempt(&run, job, policy, target_key, RunStatus::Failed, None, "probe offline".to_string())
				.await;
			return Some(run);
		}

		let pending = self.inner.tracker.track(&request_id, probe_id, &job.command, "info").await;
		{
			let mut state = self.inner.state.lock().await;
			state.track_attempt(&request_id, &run.id, target_key);
		}

		let payload = serde_json::json!({
			"run_id": run.id,
			"command": job.command,
			"timeout_secs": self.inner.command_timeout.as_secs(),
		});

		if let Err(e) = self.inner.hub.send(probe_id, "exec", payload).await {
			warn!(job_id = %job.id, probe_id, error = %e, "hub send failed");
			self.inner.tracker.cancel(&request_id).await;
			{
				let mut state = self.inner.state.lock().await;
				state.forget_attempt(&request_id);
			}
			self.finish_attempt(&run, job, policy, target_key, RunStatus::Failed, None, "probe offline".to_string())
				.await;
			return Some(run);
		}

		self.spawn_result_waiter(run.clone(), job.clone(), policy, target_key.to_string(), request_id, pending.result_rx)
			.await;

		Some(run)
	}

	async fn spawn_result_waiter(
		&self,
		run: JobRun,
		job: Job,
		policy: RetryPolicy,
		target_key: String,
		request_id: String,
		result_rx: oneshot::Receiver<Option<CommandResult>>,
	) {
		let scheduler = self.clone();
		// A generous watchdog on top of the payload-level timeout: if the
		// probe never answers and never drops the channel, don't wait
		// forever for a result that isn't coming.
		let watchdog = self.inner.command_timeout + Duration::from_secs(5);

		let handle = tokio::spawn(async move {
			let outcome = tokio::time::timeout(watchdog, result_rx).await;
			{
				let mut state = scheduler.inner.state.lock().await;
				state.forget_attempt(&request_id);
			}

			match outcome {
				Ok(Ok(Some(result))) => {
					let status = if result.exit_code == 0 { RunStatus::Success } else { RunStatus::Failed };
					let output = format_output(&result.stdout, &result.stderr);
					scheduler
						.finish_attempt(&run, &job, policy, &target_key, status, Some(result.exit_code), output)
						.await;
				}
				// Channel closed, nil result, or watchdog elapsed: all mean
				// the same thing to a waiter — treat it as a cancellation.
				Ok(Ok(None)) | Ok(Err(_)) | Err(_) => {
					scheduler.handle_canceled_result(&run, &job, &target_key).await;
				}
			}
		});

		self.inner.handles.lock().await.push(handle);
	}

	async fn handle_canceled_result(&self, run: &JobRun, job: &Job, target_key: &str) {
		match self.inner.store.cancel_run(&run.id, "command canceled").await {
			Ok(canceled) => {
				self.emit_canceled(&job.id, &canceled, "command canceled");
			}
			Err(StoreError::InvalidTransition { .. }) => {
				// Already terminal (e.g. canceled via the API first) —
				// the late result never gets to overwrite that status.
				debug!(run_id = %run.id, "run already terminal; dropping late result");
			}
			Err(e) => {
				warn!(run_id = %run.id, error = %e, "failed to record cancellation");
			}
		}
		self.release_target(target_key).await;
	}

	#[allow(clippy::too_many_arguments)]
	async fn finish_attempt(
		&self,
		run: &JobRun,
		job: &Job,
		policy: RetryPolicy,
		target_key: &str,
		status: RunStatus,
		exit_code: Option<i32>,
		output: String,
	) {
		let now = Utc::now();
		let retry_scheduled_at = if status == RunStatus::Failed && run.attempt < run.max_attempts {
			chrono::Duration::from_std(policy.next_delay(run.attempt)).ok().map(|d| now + d)
		} else {
			None
		};

		let completed = self
			.inner
			.store
			.complete_run_with_retry(&run.id, status, exit_code, &output, retry_scheduled_at)
			.await;

		match completed {
			Ok(_) => {}
			Err(StoreError::InvalidTransition { .. }) => {
				debug!(run_id = %run.id, "run already terminal; dropping late result");
				self.release_target(target_key).await;
				return;
			}
			Err(e) => {
				warn!(run_id = %run.id, error = %e, "failed to complete run");
				self.release_target(target_key).await;
				return;
			}
		}

		let kind = match status {
			RunStatus::Success => LifecycleEventKind::RunSucceeded,
			RunStatus::Failed => LifecycleEventKind::RunFailed,
			other => {
				warn!(run_id = %run.id, status = %other, "finish_attempt called with a non-terminal status");
				self.release_target(target_key).await;
				return;
			}
		};
		self.emit(LifecycleEvent::new(kind, &job.id).with_run(&run.id).with_probe(&run.probe_id));

		match retry_scheduled_at {
			Some(scheduled_at) => {
				self.emit(
					LifecycleEvent::new(LifecycleEventKind::RunRetryScheduled, &job.id)
						.with_run(&run.id)
						.with_probe(&run.probe_id),
				);
				self.schedule_retry(
					job.id.clone(),
					run.probe_id.clone(),
					target_key.to_string(),
					run.execution_id.clone(),
					run.attempt + 1,
					run.max_attempts,
					policy,
					scheduled_at,
				)
				.await;
			}
			None => {
				self.release_target(target_key).await;
			}
		}
	}

	#[allow(clippy::too_many_arguments)]
	async fn schedule_retry(
		&self,
		job_id: String,
		probe_id: String,
		target_key: String,
		execution_id: String,
		next_attempt: u32,
		max_attempts: u32,
		policy: RetryPolicy,
		scheduled_at: DateTime<Utc>,
	) {
		let (cancel_tx, mut cancel_rx) = oneshot::channel();
		{
			let mut state = self.inner.state.lock().await;
			state.register_pending_retry(&target_key, cancel_tx);
		}

		let delay = (scheduled_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
		let scheduler = self.clone();

		let handle = tokio::spawn(async move {
			tokio::select! {
				_ = tokio::time::sleep(delay) => {}
				_ = &mut cancel_rx => {
					return;
				}
			}

			{
				let mut state = scheduler.inner.state.lock().await;
				state.take_pending_retry(&target_key);
			}

			if scheduler.inner.cancellation.is_cancelled() {
				scheduler.release_target(&target_key).await;
				return;
			}

			let job = match scheduler.inner.store.get_job(&job_id).await {
				Ok(job) if job.enabled => job,
				Ok(_) => {
					scheduler.release_target(&target_key).await;
					return;
				}
				Err(_) => {
					scheduler.release_target(&target_key).await;
					return;
				}
			};

			if next_attempt > max_attempts {
				scheduler.release_target(&target_key).await;
				return;
			}

			scheduler
				.dispatch_attempt(&job, &probe_id, &target_key, &execution_id, next_attempt, max_attempts, policy)
				.await;
		});

		self.inner.handles.lock().await.push(handle);
	}

	// ---- small helpers --------------------------------------------------

	async fn release_target(&self, target_key: &str) {
		let mut state = self.inner.state.lock().await;
		state.release_target(target_key);
	}

	async fn cancel_tracker_for_run(&self, run_id: &str) {
		let request_id = {
			let state = self.inner.state.lock().await;
			state.request_id_for_run(run_id)
		};
		if let Some(request_id) = request_id {
			self.inner.tracker.cancel(&request_id).await;
		}
	}

	fn emit_canceled(&self, job_id: &str, run: &JobRun, reason: &str) {
		self.emit(
			LifecycleEvent::new(LifecycleEventKind::RunCanceled, job_id)
				.with_run(&run.id)
				.with_probe(&run.probe_id)
				.with_reason(reason),
		);
	}

	fn emit(&self, event: LifecycleEvent) {
		self.inner.lifecycle.emit(event);
	}
}

/// `stdout` + (newline if both present) + `stderr`, each trimmed.
fn format_output(stdout: &str, stderr: &str) -> String {
	let stdout = stdout.trim();
	let stderr = stderr.trim();
	match (stdout.is_empty(), stderr.is_empty()) {
		(true, true) => String::new(),
		(false, true) => stdout.to_string(),
		(true, false) => stderr.to_string(),
		(false, false) => format!("{stdout}\n{stderr}"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use probed_core::{RetryPolicy, Target};
	use probed_db::testing::create_test_store;
	use probed_transport::{FakeCommandTracker, FakeFleet, FakeHub, ProbeInfo};
	use std::time::Duration as StdDuration;

	async fn test_scheduler(
	) -> (Scheduler, Arc<FakeFleet>, Arc<FakeHub>, Arc<FakeCommandTracker>) {
		let store = create_test_store().await;
		let fleet = Arc::new(FakeFleet::new());
		let hub = Arc::new(FakeHub::new());
		let tracker = FakeCommandTracker::new();
		let lifecycle = Arc::new(LifecycleBus::new(vec![]));
		let scheduler = Scheduler::new(
			store,
			fleet.clone(),
			hub.clone(),
			tracker.clone(),
			lifecycle,
			SchedulerOptions::default(),
		);
		(scheduler, fleet, hub, tracker)
	}

	fn sample_job(schedule: &str, probe_id: &str) -> Job {
		let now = Utc::now();
		Job {
			id: String::new(),
			name: "probe check".into(),
			command: "uptime".into(),
			schedule: schedule.into(),
			target: Target {
				kind: TargetKind::Probe,
				value: Some(probe_id.into()),
			},
			retry_policy: None,
			enabled: true,
			created_at: now,
			updated_at: now,
			last_run_at: None,
			last_status: None,
		}
	}

	#[tokio::test]
	async fn trigger_now_records_failed_run_when_probe_offline() {
		let (scheduler, _fleet, _hub, _tracker) = test_scheduler().await;
		let job = scheduler.inner.store.create_job(sample_job("5m", "probe-1")).await.unwrap();

		let runs = scheduler.trigger_now(&job.id).await.unwrap();
		assert_eq!(runs.len(), 1);

		tokio::time::sleep(StdDuration::from_millis(20)).await;
		let run = scheduler.inner.store.get_run(&runs[0].id).await.unwrap();
		assert_eq!(run.status, RunStatus::Failed);
	}

	#[tokio::test]
	async fn overlap_suppression_skips_second_trigger_until_first_completes() {
		let (scheduler, fleet, _hub, tracker) = test_scheduler().await;
		fleet
			.upsert(ProbeInfo {
				id: "probe-1".into(),
				tags: vec![],
				online: true,
			})
			.await;
		let job = scheduler.inner.store.create_job(sample_job("5m", "probe-1")).await.unwrap();

		let first = scheduler.trigger_now(&job.id).await.unwrap();
		assert_eq!(first.len(), 1);

		let second = scheduler.trigger_now(&job.id).await.unwrap();
		assert!(second.is_empty(), "second trigger should be suppressed while the first is active");

		tracker
			.resolve(
				&first[0].request_id,
				CommandResult {
					exit_code: 0,
					stdout: "ok".into(),
					stderr: String::new(),
				},
			)
			.await;
		tokio::time::sleep(StdDuration::from_millis(50)).await;

		let third = scheduler.trigger_now(&job.id).await.unwrap();
		assert_eq!(third.len(), 1, "target should be free again once the first run finished");
	}

	#[tokio::test]
	async fn cancel_race_keeps_status_canceled_despite_late_result() {
		let (scheduler, fleet, _hub, tracker) = test_scheduler().await;
		fleet
			.upsert(ProbeInfo {
				id: "probe-1".into(),
				tags: vec![],
				online: true,
			})
			.await;
		let job = scheduler.inner.store.create_job(sample_job("5m", "probe-1")).await.unwrap();
		let runs = scheduler.trigger_now(&job.id).await.unwrap();
		let run_id = runs[0].id.clone();
		let request_id = runs[0].request_id.clone();

		let summary = scheduler.cancel_job(&job.id).await.unwrap();
		assert_eq!(summary.canceled_runs, 1);

		// Late result arrives after the cancellation already went through.
		tracker
			.resolve(
				&request_id,
				CommandResult {
					exit_code: 0,
					stdout: "too late".into(),
					stderr: String::new(),
				},
			)
			.await;
		tokio::time::sleep(StdDuration::from_millis(50)).await;

		let run = scheduler.inner.store.get_run(&run_id).await.unwrap();
		assert_eq!(run.status, RunStatus::Canceled);
		assert!(run.ended_at.is_some());
	}

	#[tokio::test]
	async fn retry_progression_schedules_increasing_attempts() {
		let (scheduler, fleet, _hub, tracker) = test_scheduler().await;
		fleet
			.upsert(ProbeInfo {
				id: "probe-1".into(),
				tags: vec![],
				online: true,
			})
			.await;
		let mut job = sample_job("5m", "probe-1");
		job.retry_policy = Some(RetryPolicy {
			max_attempts: 3,
			initial_backoff: StdDuration::from_millis(20),
			multiplier: 1.0,
			max_backoff: None,
		});
		let job = scheduler.inner.store.create_job(job).await.unwrap();

		let runs = scheduler.trigger_now(&job.id).await.unwrap();
		assert_eq!(runs[0].attempt, 1);

		for expected_attempt in 1..=3u32 {
			let request_id = {
				let active = scheduler.inner.store.list_active_runs_by_job(&job.id).await.unwrap();
				let run = active.iter().find(|r| r.attempt == expected_attempt).expect("attempt should be active");
				run.request_id.clone()
			};
			tracker
				.resolve(
					&request_id,
					CommandResult {
						exit_code: 1,
						stdout: String::new(),
						stderr: "boom".into(),
					},
				)
				.await;
			tokio::time::sleep(StdDuration::from_millis(150)).await;
		}

		let all = scheduler.inner.store.list_runs_by_job(&job.id, 10).await.unwrap();
		assert_eq!(all.len(), 3);
		assert!(all.iter().all(|r| r.execution_id == all[0].execution_id));
		assert!(all.iter().all(|r| r.status == RunStatus::Failed));
		assert!(scheduler.inner.store.list_active_runs_by_job(&job.id).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn cancel_job_during_backoff_frees_the_target_for_a_new_trigger() {
		let (scheduler, fleet, _hub, tracker) = test_scheduler().await;
		fleet
			.upsert(ProbeInfo {
				id: "probe-1".into(),
				tags: vec![],
				online: true,
			})
			.await;
		let mut job = sample_job("5m", "probe-1");
		job.retry_policy = Some(RetryPolicy {
			max_attempts: 3,
			initial_backoff: StdDuration::from_secs(60),
			multiplier: 1.0,
			max_backoff: None,
		});
		let job = scheduler.inner.store.create_job(job).await.unwrap();

		let runs = scheduler.trigger_now(&job.id).await.unwrap();
		tracker
			.resolve(
				&runs[0].request_id,
				CommandResult {
					exit_code: 1,
					stdout: String::new(),
					stderr: "boom".into(),
				},
			)
			.await;
		tokio::time::sleep(StdDuration::from_millis(50)).await;

		// The run is now failed with a retry scheduled far in the future —
		// the target stays claimed across the backoff window.
		let retried = scheduler.trigger_now(&job.id).await.unwrap();
		assert!(retried.is_empty(), "target should still be claimed by the pending retry");

		let summary = scheduler.cancel_job(&job.id).await.unwrap();
		assert_eq!(summary.canceled_retries, 1);

		let freed = scheduler.trigger_now(&job.id).await.unwrap();
		assert_eq!(freed.len(), 1, "canceling the job should release the target claimed by the pending retry");
	}

	#[tokio::test]
	async fn retry_run_rejects_non_terminal_runs() {
		let (scheduler, fleet, _hub, _tracker) = test_scheduler().await;
		fleet
			.upsert(ProbeInfo {
				id: "probe-1".into(),
				tags: vec![],
				online: true,
			})
			.await;
		let job = scheduler.inner.store.create_job(sample_job("5m", "probe-1")).await.unwrap();
		let runs = scheduler.trigger_now(&job.id).await.unwrap();

		let err = scheduler.retry_run(&job.id, &runs[0].id).await.unwrap_err();
		assert!(matches!(err, SchedulerError::InvalidTransition(_)));
	}

	#[tokio::test]
	async fn retry_run_dispatches_a_new_attempt_for_a_failed_run() {
		let (scheduler, fleet, _hub, tracker) = test_scheduler().await;
		fleet
			.upsert(ProbeInfo {
				id: "probe-1".into(),
				tags: vec![],
				online: true,
			})
			.await;
		let job = scheduler.inner.store.create_job(sample_job("5m", "probe-1")).await.unwrap();
		let runs = scheduler.trigger_now(&job.id).await.unwrap();
		tracker
			.resolve(
				&runs[0].request_id,
				CommandResult {
					exit_code: 1,
					stdout: String::new(),
					stderr: "boom".into(),
				},
			)
			.await;
		tokio::time::sleep(StdDuration::from_millis(50)).await;

		let retried = scheduler.retry_run(&job.id, &runs[0].id).await.unwrap();
		assert_eq!(retried.attempt, 2);
		assert_eq!(retried.execution_id, runs[0].execution_id);
	}

	#[tokio::test]
	async fn last_tick_at_is_set_after_start_and_survives_stop() {
		let (scheduler, _fleet, _hub, _tracker) = test_scheduler().await;
		assert!(scheduler.last_tick_at().await.is_none());

		scheduler.start().await;
		tokio::time::sleep(StdDuration::from_millis(20)).await;
		assert!(scheduler.last_tick_at().await.is_some());

		scheduler.stop().await;
		assert!(scheduler.last_tick_at().await.is_some());
	}

	#[tokio::test]
	async fn start_stop_is_idempotent_and_restartable() {
		let (scheduler, _fleet, _hub, _tracker) = test_scheduler().await;
		scheduler.start().await;
		assert!(scheduler.is_running().await);
		scheduler.start().await; // no-op
		assert!(scheduler.is_running().await);

		scheduler.stop().await;
		assert!(!scheduler.is_running().await);

		scheduler.start().await;
		assert!(scheduler.is_running().await);
		scheduler.stop().await;
	}

	#[test]
	fn format_output_joins_non_empty_streams() {
		assert_eq!(format_output("out", "err"), "out\nerr");
		assert_eq!(format_output("out", ""), "out");
		assert_eq!(format_output("", "err"), "err");
		assert_eq!(format_output("  ", "  "), "");
	}
}
