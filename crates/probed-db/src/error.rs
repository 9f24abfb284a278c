// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Error kinds the Store itself can raise.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("not found: {0}")]
	NotFound(String),

	#[error("invalid job: {0}")]
	InvalidJob(String),

	#[error("invalid schedule: {0}")]
	InvalidSchedule(String),

	#[error("invalid retry policy: {0}")]
	InvalidRetryPolicy(String),

	/// A state-machine transition was attempted from a status outside the
	/// legal `from` set. Carries both what was attempted and what was
	/// actually observed so callers can log or render both.
	#[error("invalid transition: cannot move to {attempted} from observed status {observed}")]
	InvalidTransition { attempted: String, observed: String },

	#[error("database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),
}

impl From<probed_core::CoreError> for StoreError {
	fn from(err: probed_core::CoreError) -> Self {
		match err {
			probed_core::CoreError::InvalidJob(m) => StoreError::InvalidJob(m),
			probed_core::CoreError::InvalidSchedule(m) => StoreError::InvalidSchedule(m),
			probed_core::CoreError::InvalidRetryPolicy(m) => StoreError::InvalidRetryPolicy(m),
		}
	}
}

pub type Result<T> = std::result::Result<T, StoreError>;
