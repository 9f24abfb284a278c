// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
	#[error("not found: {0}")]
	NotFound(String),

	/// A caller-facing state-machine rejection distinct from the
	/// Store's own `invalid_transition` (e.g. retrying a run that isn't
	/// terminal, or racing another claim on the same target).
	#[error("invalid transition: {0}")]
	InvalidTransition(String),

	#[error("dispatch failed: {0}")]
	DispatchFailed(String),

	#[error(transparent)]
	Core(#[from] probed_core::CoreError),

	#[error(transparent)]
	Store(#[from] probed_db::StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
