// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::{CoreError, Result};
use crate::retry::RetryPolicy;
use crate::run::RunStatus;
use crate::schedule::validate_schedule;
use crate::target::Target;

/// A scheduled (or ad-hoc triggered) shell command dispatched to one or
/// more probes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Job {
	pub id: String,
	pub name: String,
	pub command: String,
	pub schedule: String,
	pub target: Target,
	pub retry_policy: Option<RetryPolicy>,
	pub enabled: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
	pub last_run_at: Option<DateTime<Utc>>,
	pub last_status: Option<RunStatus>,
}

impl Job {
	/// Validate the fields a caller controls: `name`/`command`/`schedule`
	/// non-empty, `target` valid, `schedule` parseable, and `retry_policy`
	/// (if present) internally consistent.
	pub fn validate(&self) -> Result<()> {
		if self.name.trim().is_empty() {
			return Err(CoreError::InvalidJob("name must not be empty".into()));
		}
		if self.command.trim().is_empty() {
			return Err(CoreError::InvalidJob("command must not be empty".into()));
		}
		if self.schedule.trim().is_empty() {
			return Err(CoreError::InvalidJob("schedule must not be empty".into()));
		}
		self.target
			.validate()
			.map_err(CoreError::InvalidJob)?;
		validate_schedule(&self.schedule).map_err(|e| CoreError::InvalidSchedule(e.to_string()))?;
		if let Some(policy) = &self.retry_policy {
			policy.validate().map_err(|e| CoreError::InvalidRetryPolicy(e.to_string()))?;
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::target::TargetKind;

	fn base_job() -> Job {
		let now = Utc::now();
		Job {
			id: "job-1".into(),
			name: "nightly backup".into(),
			command: "tar czf /tmp/backup.tgz /data".into(),
			schedule: "5m".into(),
			target: Target {
				kind: TargetKind::Probe,
				value: Some("probe-1".into()),
			},
			retry_policy: None,
			enabled: true,
			created_at: now,
			updated_at: now,
			last_run_at: None,
			last_status: None,
		}
	}

	#[test]
	fn valid_job_passes() {
		assert!(base_job().validate().is_ok());
	}

	#[test]
	fn empty_name_rejected() {
		let mut job = base_job();
		job.name = "  ".into();
		assert!(job.validate().is_err());
	}

	#[test]
	fn empty_command_rejected() {
		let mut job = base_job();
		job.command = "".into();
		assert!(job.validate().is_err());
	}

	#[test]
	fn empty_schedule_rejected() {
		let mut job = base_job();
		job.schedule = "".into();
		assert!(job.validate().is_err());
	}

	#[test]
	fn unparseable_schedule_rejected() {
		let mut job = base_job();
		job.schedule = "not a schedule".into();
		assert!(job.validate().is_err());
	}

	#[test]
	fn tag_target_without_value_rejected() {
		let mut job = base_job();
		job.target = Target {
			kind: TargetKind::Tag,
			value: None,
		};
		assert!(job.validate().is_err());
	}

	#[test]
	fn invalid_retry_policy_rejected() {
		let mut job = base_job();
		job.retry_policy = Some(RetryPolicy {
			max_attempts: 0,
			..RetryPolicy::default()
		});
		assert!(job.validate().is_err());
	}
}
