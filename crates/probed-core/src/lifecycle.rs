// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Lifecycle event vocabulary.
//!
//! This module only defines the event shape and kind vocabulary; the
//! normalizing bus that fans events out to observers lives in
//! `probed-lifecycle` so this crate stays free of any async runtime
//! dependency.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// The lifecycle event vocabulary. Serializes to the dotted name
/// (`job.run.queued`, etc.) via `as_str`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEventKind {
	JobCreated,
	JobUpdated,
	JobDeleted,
	RunQueued,
	RunStarted,
	RunSucceeded,
	RunFailed,
	RunCanceled,
	RunDenied,
	RunRetryScheduled,
	RunAdmissionAllowed,
	RunAdmissionQueued,
	RunAdmissionDenied,
}

impl LifecycleEventKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			LifecycleEventKind::JobCreated => "job.created",
			LifecycleEventKind::JobUpdated => "job.updated",
			LifecycleEventKind::JobDeleted => "job.deleted",
			LifecycleEventKind::RunQueued => "job.run.queued",
			LifecycleEventKind::RunStarted => "job.run.started",
			LifecycleEventKind::RunSucceeded => "job.run.succeeded",
			LifecycleEventKind::RunFailed => "job.run.failed",
			LifecycleEventKind::RunCanceled => "job.run.canceled",
			LifecycleEventKind::RunDenied => "job.run.denied",
			LifecycleEventKind::RunRetryScheduled => "job.run.retry_scheduled",
			LifecycleEventKind::RunAdmissionAllowed => "job.run.admission_allowed",
			LifecycleEventKind::RunAdmissionQueued => "job.run.admission_queued",
			LifecycleEventKind::RunAdmissionDenied => "job.run.admission_denied",
		}
	}
}

impl std::fmt::Display for LifecycleEventKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A single lifecycle event, before normalization by the bus.
///
/// `run.queued` is emitted at initial row insert regardless of the run's
/// actual initial stored status — the name reflects historical intent (an
/// admission-queue phase later superseded by direct-to-pending) and new
/// consumers should treat it as "run recorded", not "run in queued state".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct LifecycleEvent {
	pub kind: LifecycleEventKind,
	pub job_id: String,
	pub run_id: Option<String>,
	pub probe_id: Option<String>,
	pub reason: Option<String>,
	/// Timestamp defaults to "now UTC" at bus normalization when left zero.
	pub timestamp: DateTime<Utc>,
	pub deferred_until: Option<DateTime<Utc>>,
	pub details: Option<serde_json::Value>,
}

impl LifecycleEvent {
	pub fn new(kind: LifecycleEventKind, job_id: impl Into<String>) -> Self {
		Self {
			kind,
			job_id: job_id.into(),
			run_id: None,
			probe_id: None,
			reason: None,
			timestamp: Utc::now(),
			deferred_until: None,
			details: None,
		}
	}

	pub fn with_run(mut self, run_id: impl Into<String>) -> Self {
		self.run_id = Some(run_id.into());
		self
	}

	pub fn with_probe(mut self, probe_id: impl Into<String>) -> Self {
		self.probe_id = Some(probe_id.into());
		self
	}

	pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
		self.reason = Some(reason.into());
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn event_kind_names_use_dotted_form() {
		assert_eq!(LifecycleEventKind::JobCreated.as_str(), "job.created");
		assert_eq!(LifecycleEventKind::RunQueued.as_str(), "job.run.queued");
		assert_eq!(
			LifecycleEventKind::RunRetryScheduled.as_str(),
			"job.run.retry_scheduled"
		);
		assert_eq!(
			LifecycleEventKind::RunAdmissionDenied.as_str(),
			"job.run.admission_denied"
		);
	}

	#[test]
	fn builder_sets_optional_fields() {
		let event = LifecycleEvent::new(LifecycleEventKind::RunStarted, "job-1")
			.with_run("run-1")
			.with_probe("probe-1")
			.with_reason("dispatched");
		assert_eq!(event.run_id.as_deref(), Some("run-1"));
		assert_eq!(event.probe_id.as_deref(), Some("probe-1"));
		assert_eq!(event.reason.as_deref(), Some("dispatched"));
	}
}
