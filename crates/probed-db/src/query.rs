// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use probed_core::RunStatus;

pub const DEFAULT_RUN_LIMIT: i64 = 50;
pub const MAX_RUN_LIMIT: i64 = 500;

/// Filters for `Store::list_runs`. `limit` is normalized to
/// `1 ..= 500`, defaulting to 50 when unset.
#[derive(Debug, Clone, Default)]
pub struct RunQuery {
	pub job_id: Option<String>,
	pub probe_id: Option<String>,
	pub status: Option<RunStatus>,
	pub started_after: Option<DateTime<Utc>>,
	pub started_before: Option<DateTime<Utc>>,
	pub limit: Option<i64>,
}

impl RunQuery {
	pub fn normalized_limit(&self) -> i64 {
		self.limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_limit_is_fifty() {
		let query = RunQuery::default();
		assert_eq!(query.normalized_limit(), 50);
	}

	#[test]
	fn limit_is_clamped_to_max() {
		let query = RunQuery {
			limit: Some(10_000),
			..Default::default()
		};
		assert_eq!(query.normalized_limit(), 500);
	}

	#[test]
	fn limit_is_clamped_to_min() {
		let query = RunQuery {
			limit: Some(0),
			..Default::default()
		};
		assert_eq!(query.normalized_limit(), 1);

		let query = RunQuery {
			limit: Some(-5),
			..Default::default()
		};
		assert_eq!(query.normalized_limit(), 1);
	}
}
