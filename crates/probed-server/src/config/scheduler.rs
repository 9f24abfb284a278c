// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Scheduler tuning: tick interval, per-command timeout, and the
//! global retry policy overrides layered under a job's own
//! `retry_policy` (§4.2 of the resolver).

use std::time::Duration;

use serde::Deserialize;

use probed_core::RetryPolicyOverrides;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
	pub tick_interval: Duration,
	pub command_timeout: Duration,
	pub retry_overrides: Option<RetryPolicyOverrides>,
}

impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			tick_interval: Duration::from_secs(30),
			command_timeout: Duration::from_secs(60),
			retry_overrides: None,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SchedulerConfigLayer {
	#[serde(default, with = "humantime_serde::option")]
	pub tick_interval: Option<Duration>,
	#[serde(default, with = "humantime_serde::option")]
	pub command_timeout: Option<Duration>,
	#[serde(default)]
	pub retry_max_attempts: Option<u32>,
	#[serde(default, with = "humantime_serde::option")]
	pub retry_initial_backoff: Option<Duration>,
	#[serde(default)]
	pub retry_multiplier: Option<f64>,
	#[serde(default, with = "humantime_serde::option")]
	pub retry_max_backoff: Option<Duration>,
}

impl SchedulerConfigLayer {
	pub fn merge(&mut self, other: SchedulerConfigLayer) {
		if other.tick_interval.is_some() {
			self.tick_interval = other.tick_interval;
		}
		if other.command_timeout.is_some() {
			self.command_timeout = other.command_timeout;
		}
		if other.retry_max_attempts.is_some() {
			self.retry_max_attempts = other.retry_max_attempts;
		}
		if other.retry_initial_backoff.is_some() {
			self.retry_initial_backoff = other.retry_initial_backoff;
		}
		if other.retry_multiplier.is_some() {
			self.retry_multiplier = other.retry_multiplier;
		}
		if other.retry_max_backoff.is_some() {
			self.retry_max_backoff = other.retry_max_backoff;
		}
	}

	pub fn finalize(self) -> SchedulerConfig {
		let defaults = SchedulerConfig::default();

		let retry_overrides = if self.retry_max_attempts.is_some()
			|| self.retry_initial_backoff.is_some()
			|| self.retry_multiplier.is_some()
			|| self.retry_max_backoff.is_some()
		{
			Some(RetryPolicyOverrides {
				max_attempts: self.retry_max_attempts,
				initial_backoff: self.retry_initial_backoff,
				multiplier: self.retry_multiplier,
				max_backoff: self.retry_max_backoff,
			})
		} else {
			None
		};

		SchedulerConfig {
			tick_interval: self.tick_interval.unwrap_or(defaults.tick_interval),
			command_timeout: self.command_timeout.unwrap_or(defaults.command_timeout),
			retry_overrides,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_match_spec() {
		let config = SchedulerConfigLayer::default().finalize();
		assert_eq!(config.tick_interval, Duration::from_secs(30));
		assert_eq!(config.command_timeout, Duration::from_secs(60));
		assert!(config.retry_overrides.is_none());
	}

	#[test]
	fn partial_retry_overrides_still_populate() {
		let layer = SchedulerConfigLayer {
			retry_max_attempts: Some(5),
			..Default::default()
		};
		let config = layer.finalize();
		let overrides = config.retry_overrides.expect("overrides present");
		assert_eq!(overrides.max_attempts, Some(5));
		assert!(overrides.initial_backoff.is_none());
	}
}
