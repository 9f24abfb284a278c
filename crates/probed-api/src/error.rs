// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Maps store/scheduler errors onto the HTTP error-kind vocabulary and
//! renders them as a JSON body. Grounded on the teacher's
//! `ApiErrorResponse` helpers, simplified to this service's flatter
//! error space (no auth/org/audit concerns here).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use probed_db::StoreError;
use probed_scheduler::SchedulerError;

use crate::dto::ErrorResponse;

#[derive(Debug)]
pub enum ApiError {
	InvalidRequest(String),
	NotFound(String),
	InvalidTransition(String),
	InvalidJob(String),
	InvalidSchedule(String),
	InvalidRetryPolicy(String),
	DispatchFailed(String),
	ServiceUnavailable(String),
	Internal(String),
}

impl ApiError {
	fn kind(&self) -> &'static str {
		match self {
			ApiError::InvalidRequest(_) => "invalid_request",
			ApiError::NotFound(_) => "not_found",
			ApiError::InvalidTransition(_) => "invalid_transition",
			ApiError::InvalidJob(_) => "invalid_job",
			ApiError::InvalidSchedule(_) => "invalid_schedule",
			ApiError::InvalidRetryPolicy(_) => "invalid_retry_policy",
			ApiError::DispatchFailed(_) => "dispatch_failed",
			ApiError::ServiceUnavailable(_) => "service_unavailable",
			ApiError::Internal(_) => "internal_error",
		}
	}

	fn status(&self) -> StatusCode {
		match self {
			ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
			ApiError::NotFound(_) => StatusCode::NOT_FOUND,
			ApiError::InvalidTransition(_) => StatusCode::CONFLICT,
			ApiError::InvalidJob(_) => StatusCode::BAD_REQUEST,
			ApiError::InvalidSchedule(_) => StatusCode::BAD_REQUEST,
			ApiError::InvalidRetryPolicy(_) => StatusCode::BAD_REQUEST,
			ApiError::DispatchFailed(_) => StatusCode::BAD_GATEWAY,
			ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
			ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	fn message(&self) -> &str {
		match self {
			ApiError::InvalidRequest(m)
			| ApiError::NotFound(m)
			| ApiError::InvalidTransition(m)
			| ApiError::InvalidJob(m)
			| ApiError::InvalidSchedule(m)
			| ApiError::InvalidRetryPolicy(m)
			| ApiError::DispatchFailed(m)
			| ApiError::ServiceUnavailable(m)
			| ApiError::Internal(m) => m,
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let status = self.status();
		if status == StatusCode::INTERNAL_SERVER_ERROR {
			tracing::error!(message = self.message(), "internal error serving request");
		}
		let body = ErrorResponse {
			error: self.kind().to_string(),
			message: self.message().to_string(),
		};
		(status, Json(body)).into_response()
	}
}

impl From<StoreError> for ApiError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound(id) => ApiError::NotFound(id),
			StoreError::InvalidJob(m) => ApiError::InvalidJob(m),
			StoreError::InvalidSchedule(m) => ApiError::InvalidSchedule(m),
			StoreError::InvalidRetryPolicy(m) => ApiError::InvalidRetryPolicy(m),
			StoreError::InvalidTransition { attempted, observed } => ApiError::InvalidTransition(format!(
				"cannot move to {attempted} from observed status {observed}"
			)),
			StoreError::Sqlx(e) => ApiError::Internal(e.to_string()),
			StoreError::Serialization(e) => ApiError::Internal(e.to_string()),
		}
	}
}

impl From<SchedulerError> for ApiError {
	fn from(err: SchedulerError) -> Self {
		match err {
			SchedulerError::NotFound(id) => ApiError::NotFound(id),
			SchedulerError::InvalidTransition(m) => ApiError::InvalidTransition(m),
			SchedulerError::DispatchFailed(m) => ApiError::DispatchFailed(m),
			SchedulerError::Core(e) => ApiError::from(e),
			SchedulerError::Store(e) => ApiError::from(e),
		}
	}
}

impl From<probed_core::CoreError> for ApiError {
	fn from(err: probed_core::CoreError) -> Self {
		match err {
			probed_core::CoreError::InvalidJob(m) => ApiError::InvalidJob(m),
			probed_core::CoreError::InvalidSchedule(m) => ApiError::InvalidSchedule(m),
			probed_core::CoreError::InvalidRetryPolicy(m) => ApiError::InvalidRetryPolicy(m),
		}
	}
}
