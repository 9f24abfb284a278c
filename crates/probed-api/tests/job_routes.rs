// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Router-level integration tests: drive the real axum `Router` with
//! `tower::ServiceExt::oneshot` against an in-memory store, the way
//! the ambient stack's own route tests exercise its app router.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use probed_api::{router, AppState};
use probed_db::testing::create_test_store;
use probed_lifecycle::{LifecycleBus, LifecycleEvent, Observer, ObserverError};

async fn test_app() -> axum::Router {
	let store = create_test_store().await;
	let lifecycle = Arc::new(LifecycleBus::new(vec![]));
	router(AppState::new(store, None, lifecycle))
}

/// Records every event kind it observes, for asserting the HTTP surface
/// emits lifecycle events on mutation endpoints (spec §2/§4.5).
#[derive(Default)]
struct RecordingObserver {
	kinds: std::sync::Mutex<Vec<String>>,
	count: AtomicUsize,
}

#[async_trait]
impl Observer for RecordingObserver {
	fn name(&self) -> &str {
		"recording"
	}

	async fn observe(&self, event: &LifecycleEvent) -> Result<(), ObserverError> {
		self.count.fetch_add(1, Ordering::SeqCst);
		self.kinds.lock().unwrap().push(event.kind.as_str().to_string());
		Ok(())
	}
}

async fn body_json(response: axum::response::Response) -> Value {
	let bytes = response.into_body().collect().await.unwrap().to_bytes();
	serde_json::from_slice(&bytes).unwrap()
}

fn create_body() -> Body {
	Body::from(
		json!({
			"name": "disk-check",
			"command": "df -h",
			"schedule": "5m",
			"target": {"kind": "probe", "value": "probe-1"},
			"enabled": true
		})
		.to_string(),
	)
}

#[tokio::test]
async fn create_then_get_round_trips() {
	let app = test_app().await;

	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/v1/jobs")
				.header("content-type", "application/json")
				.body(create_body())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::CREATED);
	let created = body_json(response).await;
	let id = created["id"].as_str().unwrap().to_string();
	assert_eq!(created["name"], "disk-check");

	let response = app
		.oneshot(
			Request::builder()
				.uri(format!("/api/v1/jobs/{id}"))
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	let fetched = body_json(response).await;
	assert_eq!(fetched["id"], id);
	assert_eq!(fetched["command"], "df -h");
}

#[tokio::test]
async fn get_unknown_job_is_404() {
	let app = test_app().await;
	let response = app
		.oneshot(
			Request::builder()
				.uri("/api/v1/jobs/does-not-exist")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::NOT_FOUND);
	let body = body_json(response).await;
	assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn invalid_schedule_is_400() {
	let app = test_app().await;
	let bad_body = Body::from(
		json!({
			"name": "bad",
			"command": "true",
			"schedule": "",
			"target": {"kind": "all", "value": null},
			"enabled": true
		})
		.to_string(),
	);
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/v1/jobs")
				.header("content-type", "application/json")
				.body(bad_body)
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_then_get_is_404() {
	let app = test_app().await;
	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/v1/jobs")
				.header("content-type", "application/json")
				.body(create_body())
				.unwrap(),
		)
		.await
		.unwrap();
	let created = body_json(response).await;
	let id = created["id"].as_str().unwrap().to_string();

	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("DELETE")
				.uri(format!("/api/v1/jobs/{id}"))
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::NO_CONTENT);

	let response = app
		.oneshot(
			Request::builder()
				.uri(format!("/api/v1/jobs/{id}"))
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trigger_without_scheduler_is_503() {
	let app = test_app().await;
	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/v1/jobs")
				.header("content-type", "application/json")
				.body(create_body())
				.unwrap(),
		)
		.await
		.unwrap();
	let created = body_json(response).await;
	let id = created["id"].as_str().unwrap().to_string();

	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri(format!("/api/v1/jobs/{id}/run"))
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
	let body = body_json(response).await;
	assert_eq!(body["error"], "service_unavailable");
}

#[tokio::test]
async fn mutation_endpoints_emit_lifecycle_events() {
	let store = create_test_store().await;
	let observer = Arc::new(RecordingObserver::default());
	let lifecycle = Arc::new(LifecycleBus::new(vec![observer.clone()]));
	let app = router(AppState::new(store, None, lifecycle));

	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/v1/jobs")
				.header("content-type", "application/json")
				.body(create_body())
				.unwrap(),
		)
		.await
		.unwrap();
	let created = body_json(response).await;
	let id = created["id"].as_str().unwrap().to_string();

	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("PUT")
				.uri(format!("/api/v1/jobs/{id}"))
				.header("content-type", "application/json")
				.body(Body::from(
					json!({
						"name": "disk-check-renamed",
						"command": "df -h",
						"schedule": "5m",
						"target": {"kind": "probe", "value": "probe-1"},
						"enabled": true
					})
					.to_string(),
				))
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);

	let response = app
		.oneshot(
			Request::builder()
				.method("DELETE")
				.uri(format!("/api/v1/jobs/{id}"))
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::NO_CONTENT);

	tokio::time::sleep(std::time::Duration::from_millis(50)).await;
	let kinds = observer.kinds.lock().unwrap().clone();
	assert_eq!(kinds, vec!["job.created", "job.updated", "job.deleted"]);
}

#[tokio::test]
async fn healthz_reports_database_reachable_with_no_scheduler() {
	let app = test_app().await;
	let response = app
		.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	let body = body_json(response).await;
	assert_eq!(body["database_reachable"], true);
	assert_eq!(body["scheduler_running"], false);
	assert!(body["last_tick_at"].is_null());
}

#[tokio::test]
async fn job_health_reports_active_run_count() {
	let app = test_app().await;
	let response = app
		.clone()
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/api/v1/jobs")
				.header("content-type", "application/json")
				.body(create_body())
				.unwrap(),
		)
		.await
		.unwrap();
	let created = body_json(response).await;
	let id = created["id"].as_str().unwrap().to_string();

	let response = app
		.oneshot(
			Request::builder()
				.uri(format!("/api/v1/jobs/{id}/health"))
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::OK);
	let body = body_json(response).await;
	assert_eq!(body["job_id"], id);
	assert_eq!(body["active_runs"], 0);
}

#[tokio::test]
async fn job_health_for_unknown_job_is_404() {
	let app = test_app().await;
	let response = app
		.oneshot(
			Request::builder()
				.uri("/api/v1/jobs/does-not-exist/health")
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_runs_started_after_later_than_before_is_400() {
	let app = test_app().await;
	let response = app
		.oneshot(
			Request::builder()
				.uri(
					"/api/v1/jobs/runs?started_after=2026-01-02T00:00:00Z&started_before=2026-01-01T00:00:00Z",
				)
				.body(Body::empty())
				.unwrap(),
		)
		.await
		.unwrap();
	assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
