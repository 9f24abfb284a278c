// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Normalizes and fans lifecycle events out to observers.
//!
//! The bus itself never panics from emission and never blocks the
//! caller: `emit` normalizes the event and hands it to a bounded queue, a
//! background task drains the queue and delivers to every registered
//! sink concurrently, and a slow or failing sink is logged and dropped
//! rather than stalling the others — the same fan-out shape the ambient
//! audit pipeline this crate is modeled on uses for its own sinks.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{instrument, warn};

pub use probed_core::{LifecycleEvent, LifecycleEventKind};

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
	#[error("observer {sink} failed: {message}")]
	Failed { sink: String, message: String },
}

/// Sink-only consumer of lifecycle events.
#[async_trait]
pub trait Observer: Send + Sync {
	fn name(&self) -> &str;
	async fn observe(&self, event: &LifecycleEvent) -> Result<(), ObserverError>;
}

/// Replaces a caller's absent observer so the bus never special-cases
/// "no observer configured".
pub struct NoopObserver;

#[async_trait]
impl Observer for NoopObserver {
	fn name(&self) -> &str {
		"noop"
	}

	async fn observe(&self, _event: &LifecycleEvent) -> Result<(), ObserverError> {
		Ok(())
	}
}

/// Always-installed sink that renders every event as a structured
/// `tracing::info!` record, so lifecycle events are visible in logs even
/// with no external observer configured.
pub struct TracingObserver;

#[async_trait]
impl Observer for TracingObserver {
	fn name(&self) -> &str {
		"tracing"
	}

	async fn observe(&self, event: &LifecycleEvent) -> Result<(), ObserverError> {
		tracing::info!(
			kind = %event.kind,
			job_id = %event.job_id,
			run_id = ?event.run_id,
			probe_id = ?event.probe_id,
			reason = ?event.reason,
			timestamp = %event.timestamp,
			"lifecycle event"
		);
		Ok(())
	}
}

/// Normalize an event before it reaches any sink: trim all string fields,
/// default a zero timestamp to "now UTC", and coerce `deferred_until` to
/// UTC (a no-op under our `DateTime<Utc>` type, kept explicit so this
/// stays correct if that type ever widens).
fn normalize(mut event: LifecycleEvent) -> LifecycleEvent {
	event.job_id = event.job_id.trim().to_string();
	event.run_id = event.run_id.map(|s| s.trim().to_string());
	event.probe_id = event.probe_id.map(|s| s.trim().to_string());
	event.reason = event.reason.map(|s| s.trim().to_string());
	if event.timestamp.timestamp() == 0 {
		event.timestamp = Utc::now();
	}
	event.deferred_until = event.deferred_until.map(|d| d.with_timezone(&Utc));
	event
}

/// Normalizing fan-out bus. Construct once per process and clone the
/// `Arc` around it; `emit` is cheap and non-blocking.
pub struct LifecycleBus {
	tx: mpsc::Sender<LifecycleEvent>,
}

impl LifecycleBus {
	/// `observers` are additive on top of the always-installed tracing
	/// sink. Passing an empty vec still yields working structured logging.
	pub fn new(observers: Vec<Arc<dyn Observer>>) -> Self {
		Self::with_capacity(observers, DEFAULT_QUEUE_CAPACITY)
	}

	pub fn with_capacity(observers: Vec<Arc<dyn Observer>>, capacity: usize) -> Self {
		let (tx, rx) = mpsc::channel(capacity);
		let mut sinks: Vec<Arc<dyn Observer>> = vec![Arc::new(TracingObserver)];
		sinks.extend(observers);
		tokio::spawn(Self::background_task(rx, sinks));
		Self { tx }
	}

	async fn background_task(mut rx: mpsc::Receiver<LifecycleEvent>, sinks: Vec<Arc<dyn Observer>>) {
		while let Some(event) = rx.recv().await {
			let event = Arc::new(event);
			for sink in &sinks {
				let sink = Arc::clone(sink);
				let event = Arc::clone(&event);
				tokio::spawn(async move {
					if let Err(e) = sink.observe(&event).await {
						warn!(sink = sink.name(), error = %e, "lifecycle sink failed");
					}
				});
			}
		}
	}

	/// Normalize and enqueue `event`. Never panics, never blocks; drops
	/// the event and logs a warning if the queue is full.
	#[instrument(skip(self, event), fields(kind = %event.kind, job_id = %event.job_id))]
	pub fn emit(&self, event: LifecycleEvent) {
		let event = normalize(event);
		let kind = event.kind;
		if self.tx.try_send(event).is_err() {
			warn!(%kind, "lifecycle event queue full; event dropped");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::DateTime;
	use probed_core::LifecycleEventKind;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use tokio::time::{sleep, Duration};

	struct CountingObserver {
		count: Arc<AtomicUsize>,
	}

	#[async_trait]
	impl Observer for CountingObserver {
		fn name(&self) -> &str {
			"counting"
		}

		async fn observe(&self, _event: &LifecycleEvent) -> Result<(), ObserverError> {
			self.count.fetch_add(1, Ordering::SeqCst);
			Ok(())
		}
	}

	struct FailingObserver;

	#[async_trait]
	impl Observer for FailingObserver {
		fn name(&self) -> &str {
			"failing"
		}

		async fn observe(&self, _event: &LifecycleEvent) -> Result<(), ObserverError> {
			Err(ObserverError::Failed {
				sink: "failing".into(),
				message: "boom".into(),
			})
		}
	}

	#[tokio::test]
	async fn emit_reaches_registered_observer() {
		let count = Arc::new(AtomicUsize::new(0));
		let bus = LifecycleBus::new(vec![Arc::new(CountingObserver {
			count: Arc::clone(&count),
		})]);

		bus.emit(LifecycleEvent::new(LifecycleEventKind::JobCreated, "job-1"));
		sleep(Duration::from_millis(50)).await;
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn failing_observer_does_not_block_others() {
		let count = Arc::new(AtomicUsize::new(0));
		let bus = LifecycleBus::new(vec![
			Arc::new(FailingObserver),
			Arc::new(CountingObserver {
				count: Arc::clone(&count),
			}),
		]);

		bus.emit(LifecycleEvent::new(LifecycleEventKind::RunStarted, "job-1"));
		sleep(Duration::from_millis(50)).await;
		assert_eq!(count.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn no_observer_still_works_via_tracing_sink() {
		let bus = LifecycleBus::new(vec![]);
		bus.emit(LifecycleEvent::new(LifecycleEventKind::JobDeleted, "job-1"));
		sleep(Duration::from_millis(20)).await;
	}

	#[test]
	fn normalize_trims_fields_and_defaults_zero_timestamp() {
		let mut event = LifecycleEvent::new(LifecycleEventKind::RunCanceled, "  job-1  ");
		event.timestamp = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
		event.reason = Some("  canceled via API  ".into());

		let normalized = normalize(event);
		assert_eq!(normalized.job_id, "job-1");
		assert_eq!(normalized.reason.as_deref(), Some("canceled via API"));
		assert_ne!(normalized.timestamp.timestamp(), 0);
	}
}
