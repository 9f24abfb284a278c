// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// One attempt of a logical execution, dispatched to a single probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct JobRun {
	pub id: String,
	pub job_id: String,
	pub probe_id: String,
	pub request_id: String,
	pub execution_id: String,
	pub attempt: u32,
	pub max_attempts: u32,
	pub retry_scheduled_at: Option<DateTime<Utc>>,
	pub started_at: DateTime<Utc>,
	pub ended_at: Option<DateTime<Utc>>,
	pub status: RunStatus,
	pub exit_code: Option<i32>,
	pub output: String,
	pub admission_decision: Option<String>,
	pub admission_reason: Option<String>,
	pub admission_rationale: Option<serde_json::Value>,
}

/// Output larger than this is truncated with a trailing marker.
pub const OUTPUT_CAP_BYTES: usize = 10 * 1024;
pub const OUTPUT_TRUNCATION_MARKER: &str = "…[truncated]";

/// Clamp `output` to [`OUTPUT_CAP_BYTES`], appending the truncation marker
/// when the input exceeds the cap. Truncation happens on a char boundary so
/// the result is always valid UTF-8.
pub fn cap_output(output: &str) -> String {
	if output.len() <= OUTPUT_CAP_BYTES {
		return output.to_string();
	}
	let marker_len = OUTPUT_TRUNCATION_MARKER.len();
	let budget = OUTPUT_CAP_BYTES.saturating_sub(marker_len);
	let mut cut = budget.min(output.len());
	while cut > 0 && !output.is_char_boundary(cut) {
		cut -= 1;
	}
	let mut truncated = String::with_capacity(cut + marker_len);
	truncated.push_str(&output[..cut]);
	truncated.push_str(OUTPUT_TRUNCATION_MARKER);
	truncated
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
	Queued,
	Pending,
	Running,
	Success,
	Failed,
	Canceled,
	Denied,
}

impl RunStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			RunStatus::Queued => "queued",
			RunStatus::Pending => "pending",
			RunStatus::Running => "running",
			RunStatus::Success => "success",
			RunStatus::Failed => "failed",
			RunStatus::Canceled => "canceled",
			RunStatus::Denied => "denied",
		}
	}

	/// `success`, `failed`, `canceled`, `denied` — no further transition allowed.
	pub fn is_terminal(&self) -> bool {
		matches!(
			self,
			RunStatus::Success | RunStatus::Failed | RunStatus::Canceled | RunStatus::Denied
		)
	}

	/// Priority used to roll many runs in a batch up into one job-level
	/// `last_status`: lower number wins. Mirrors
	/// `running > pending > queued > failed > denied > canceled > success`.
	pub fn batch_priority(&self) -> u8 {
		match self {
			RunStatus::Running => 0,
			RunStatus::Pending => 1,
			RunStatus::Queued => 2,
			RunStatus::Failed => 3,
			RunStatus::Denied => 4,
			RunStatus::Canceled => 5,
			RunStatus::Success => 6,
		}
	}
}

impl std::str::FromStr for RunStatus {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"queued" => Ok(RunStatus::Queued),
			"pending" => Ok(RunStatus::Pending),
			"running" => Ok(RunStatus::Running),
			"success" => Ok(RunStatus::Success),
			"failed" => Ok(RunStatus::Failed),
			"canceled" => Ok(RunStatus::Canceled),
			"denied" => Ok(RunStatus::Denied),
			other => Err(format!("unknown run status: {other}")),
		}
	}
}

impl std::fmt::Display for RunStatus {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Given the statuses of every run in a batch, pick the representative
/// status for the parent job's denormalized `last_status`.
pub fn rollup_batch_status<'a, I: IntoIterator<Item = &'a RunStatus>>(
	statuses: I,
) -> Option<RunStatus> {
	statuses
		.into_iter()
		.copied()
		.min_by_key(RunStatus::batch_priority)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn terminal_statuses() {
		assert!(RunStatus::Success.is_terminal());
		assert!(RunStatus::Failed.is_terminal());
		assert!(RunStatus::Canceled.is_terminal());
		assert!(RunStatus::Denied.is_terminal());
		assert!(!RunStatus::Queued.is_terminal());
		assert!(!RunStatus::Pending.is_terminal());
		assert!(!RunStatus::Running.is_terminal());
	}

	#[test]
	fn batch_rollup_prefers_running_over_everything() {
		let statuses = [RunStatus::Success, RunStatus::Running, RunStatus::Failed];
		assert_eq!(rollup_batch_status(&statuses), Some(RunStatus::Running));
	}

	#[test]
	fn batch_rollup_failed_dominates_success() {
		let statuses = [RunStatus::Success, RunStatus::Failed];
		assert_eq!(rollup_batch_status(&statuses), Some(RunStatus::Failed));
	}

	#[test]
	fn batch_rollup_empty_is_none() {
		let statuses: [RunStatus; 0] = [];
		assert_eq!(rollup_batch_status(&statuses), None);
	}

	#[test]
	fn cap_output_under_limit_is_unchanged() {
		assert_eq!(cap_output("hello"), "hello");
	}

	#[test]
	fn cap_output_over_limit_gets_marker() {
		let huge = "a".repeat(OUTPUT_CAP_BYTES + 100);
		let capped = cap_output(&huge);
		assert!(capped.len() <= OUTPUT_CAP_BYTES);
		assert!(capped.ends_with(OUTPUT_TRUNCATION_MARKER));
	}
}
