// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Validation and pure-computation failures raised by this crate.
///
/// Storage and transport errors live in their own crates; this enum only
/// covers failures that can be detected without touching a database or
/// a network connection.
#[derive(Debug, Error)]
pub enum CoreError {
	#[error("invalid job: {0}")]
	InvalidJob(String),

	#[error("invalid retry policy: {0}")]
	InvalidRetryPolicy(String),

	#[error("invalid schedule: {0}")]
	InvalidSchedule(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
