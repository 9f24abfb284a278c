// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Pure retry policy composition and backoff math.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::error::{CoreError, Result};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 1;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(5);
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Backoff policy for a job's retries. Durations are stored as
/// nanosecond-precision `Duration`s and serialized as humantime strings
/// (e.g. `"5s"`, `"250ms"`) at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RetryPolicy {
	pub max_attempts: u32,
	#[serde(with = "humantime_serde")]
	pub initial_backoff: Duration,
	pub multiplier: f64,
	/// `None` means uncapped.
	#[serde(with = "humantime_serde::option")]
	pub max_backoff: Option<Duration>,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: DEFAULT_MAX_ATTEMPTS,
			initial_backoff: DEFAULT_INITIAL_BACKOFF,
			multiplier: DEFAULT_MULTIPLIER,
			max_backoff: None,
		}
	}
}

impl RetryPolicy {
	pub fn validate(&self) -> Result<()> {
		if self.max_attempts < 1 {
			return Err(CoreError::InvalidRetryPolicy(
				"max_attempts must be >= 1".into(),
			));
		}
		if self.initial_backoff.is_zero() {
			return Err(CoreError::InvalidRetryPolicy(
				"initial_backoff must be > 0".into(),
			));
		}
		if self.multiplier < 1.0 {
			return Err(CoreError::InvalidRetryPolicy(
				"multiplier must be >= 1".into(),
			));
		}
		if let Some(max_backoff) = self.max_backoff {
			if max_backoff.is_zero() {
				return Err(CoreError::InvalidRetryPolicy(
					"max_backoff must be > 0 when set".into(),
				));
			}
		}
		Ok(())
	}

	/// `next_delay(n)` = `min(max_backoff, initial_backoff * multiplier^(n-1))`.
	/// `n < 1` is clamped to 1.
	pub fn next_delay(&self, failed_attempt: u32) -> Duration {
		let n = failed_attempt.max(1);
		let exponent = (n - 1) as i32;
		let delay_secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
		let delay = Duration::from_secs_f64(delay_secs.max(0.0));
		match self.max_backoff {
			Some(cap) => delay.min(cap),
			None => delay,
		}
	}
}

/// Global config-level overrides layered between defaults and a job's own
/// `retry_policy`. Every field is optional; `None` means "no override at
/// this layer".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RetryPolicyOverrides {
	pub max_attempts: Option<u32>,
	pub initial_backoff: Option<Duration>,
	pub multiplier: Option<f64>,
	pub max_backoff: Option<Duration>,
}

/// Compose `defaults ⊕ global ⊕ per_job` into one resolved, validated
/// policy. Each layer only overrides a field when its override rule is
/// satisfied; an override that fails its rule is an error, not a
/// silent no-op.
pub fn resolve_retry_policy(
	global: Option<RetryPolicyOverrides>,
	per_job: Option<RetryPolicy>,
) -> Result<RetryPolicy> {
	let mut resolved = RetryPolicy::default();

	if let Some(overrides) = global {
		apply_overrides(&mut resolved, &overrides)?;
	}

	if let Some(job_policy) = per_job {
		let overrides = RetryPolicyOverrides {
			max_attempts: Some(job_policy.max_attempts),
			initial_backoff: Some(job_policy.initial_backoff),
			multiplier: Some(job_policy.multiplier),
			max_backoff: job_policy.max_backoff,
		};
		apply_overrides(&mut resolved, &overrides)?;
	}

	resolved.validate()?;
	Ok(resolved)
}

fn apply_overrides(resolved: &mut RetryPolicy, overrides: &RetryPolicyOverrides) -> Result<()> {
	if let Some(max_attempts) = overrides.max_attempts {
		if max_attempts == 0 {
			return Err(CoreError::InvalidRetryPolicy(
				"max_attempts must be > 0".into(),
			));
		}
		resolved.max_attempts = max_attempts;
	}
	if let Some(initial_backoff) = overrides.initial_backoff {
		if initial_backoff.is_zero() {
			return Err(CoreError::InvalidRetryPolicy(
				"initial_backoff must be > 0".into(),
			));
		}
		resolved.initial_backoff = initial_backoff;
	}
	if let Some(multiplier) = overrides.multiplier {
		if multiplier < 1.0 {
			return Err(CoreError::InvalidRetryPolicy(
				"multiplier must be >= 1".into(),
			));
		}
		resolved.multiplier = multiplier;
	}
	if let Some(max_backoff) = overrides.max_backoff {
		if max_backoff.is_zero() {
			return Err(CoreError::InvalidRetryPolicy(
				"max_backoff must be > 0 when set".into(),
			));
		}
		resolved.max_backoff = Some(max_backoff);
	}
	Ok(())
}
