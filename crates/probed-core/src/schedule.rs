// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Schedule expression parsing and due-detection.
//!
//! Two dialects are accepted, tried in order: a positive duration literal
//! (`5m`, `1h30m`, `250ms`), then a standard 5-field cron expression.

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Widen a 5-field Unix cron expression to the 6-field form (`second minute
/// hour day-of-month month day-of-week`) the `cron` crate expects, by
/// prepending a `0` seconds field. Expressions that already carry 6+ fields
/// pass through unchanged.
fn widen_to_six_fields(expression: &str) -> String {
	let field_count = expression.split_whitespace().count();
	if field_count >= 6 {
		expression.to_string()
	} else {
		format!("0 {expression}")
	}
}

enum ParsedSchedule {
	Duration(Duration),
	Cron(CronSchedule),
}

fn parse_schedule(schedule: &str) -> Result<ParsedSchedule> {
	let trimmed = schedule.trim();
	if trimmed.is_empty() {
		return Err(CoreError::InvalidSchedule("schedule must not be empty".into()));
	}

	if let Ok(duration) = humantime::parse_duration(trimmed) {
		if duration.is_zero() {
			return Err(CoreError::InvalidSchedule(
				"duration schedule must be > 0".into(),
			));
		}
		return Ok(ParsedSchedule::Duration(duration));
	}

	let widened = widen_to_six_fields(trimmed);
	match CronSchedule::from_str(&widened) {
		Ok(cron) => Ok(ParsedSchedule::Cron(cron)),
		Err(e) => Err(CoreError::InvalidSchedule(format!(
			"schedule {trimmed:?} is neither a valid duration nor a valid cron expression: {e}"
		))),
	}
}

/// Validate a schedule expression without evaluating due-ness.
pub fn validate_schedule(schedule: &str) -> Result<()> {
	parse_schedule(schedule).map(|_| ())
}

/// Is `schedule` due to run given its `last_run_at` anchor (or `created_at`
/// if there has been no prior run, or `now` if `created_at` is itself the
/// zero value), evaluated at `now`?
///
/// This function is a pure predicate of its inputs: identical
/// arguments always yield the identical answer.
pub fn is_schedule_due(
	schedule: &str,
	last_run_at: Option<DateTime<Utc>>,
	created_at: DateTime<Utc>,
	now: DateTime<Utc>,
) -> Result<bool> {
	let anchor = last_run_at.unwrap_or(if created_at.timestamp() != 0 {
		created_at
	} else {
		now
	});

	match parse_schedule(schedule)? {
		ParsedSchedule::Duration(duration) => {
			let due_at = anchor
				+ chrono::Duration::from_std(duration)
					.map_err(|e| CoreError::InvalidSchedule(e.to_string()))?;
			Ok(due_at <= now)
		}
		ParsedSchedule::Cron(cron) => {
			let next = cron.after(&anchor).next();
			Ok(next.map(|next| next <= now).unwrap_or(false))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
		Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
	}

	#[test]
	fn interval_due_scenario_1() {
		let created_at = dt(2026, 1, 1, 0, 0, 0);
		let now = created_at + chrono::Duration::minutes(20);
		assert!(is_schedule_due("5m", None, created_at, now).unwrap());
	}

	#[test]
	fn interval_not_due_with_recent_last_run() {
		let created_at = dt(2026, 1, 1, 0, 0, 0);
		let now = created_at + chrono::Duration::minutes(20);
		let last_run_at = now - chrono::Duration::minutes(2);
		assert!(!is_schedule_due("5m", Some(last_run_at), created_at, now).unwrap());
	}

	#[test]
	fn cron_boundary_scenario_2() {
		let last_run_at = dt(2026, 2, 28, 8, 5, 0);
		let created_at = last_run_at;
		let not_yet = dt(2026, 2, 28, 8, 9, 59);
		assert!(!is_schedule_due("*/5 * * * *", Some(last_run_at), created_at, not_yet).unwrap());

		let due = dt(2026, 2, 28, 8, 10, 0);
		assert!(is_schedule_due("*/5 * * * *", Some(last_run_at), created_at, due).unwrap());
	}

	#[test]
	fn zero_duration_is_error() {
		assert!(validate_schedule("0s").is_err());
	}

	#[test]
	fn empty_schedule_is_error() {
		assert!(validate_schedule("").is_err());
	}

	#[test]
	fn garbage_schedule_is_error() {
		assert!(validate_schedule("not a schedule").is_err());
	}

	#[test]
	fn compound_duration_parses() {
		assert!(validate_schedule("1h30m").is_ok());
	}

	#[test]
	fn five_field_cron_parses() {
		assert!(validate_schedule("*/15 * * * *").is_ok());
	}

	#[test]
	fn anchor_falls_back_to_now_when_created_at_is_zero() {
		let zero = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
		let now = dt(2026, 3, 1, 0, 0, 0);
		// anchor == now, so a 5m schedule is not yet due.
		assert!(!is_schedule_due("5m", None, zero, now).unwrap());
	}

	#[test]
	fn due_is_pure_function_of_inputs() {
		let created_at = dt(2026, 1, 1, 0, 0, 0);
		let now = created_at + chrono::Duration::minutes(20);
		let a = is_schedule_due("5m", None, created_at, now).unwrap();
		let b = is_schedule_due("5m", None, created_at, now).unwrap();
		assert_eq!(a, b);
	}
}
