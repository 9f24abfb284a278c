// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use probed_db::Store;
use probed_lifecycle::LifecycleBus;
use probed_scheduler::Scheduler;

/// Shared handler state. `scheduler` is `None` in deployments (or tests)
/// that only want the durable store surfaced without a live dispatch
/// loop — every endpoint that needs to actually act on a run or job
/// returns `service_unavailable` in that case rather than panicking.
#[derive(Clone)]
pub struct AppState {
	pub store: Store,
	pub scheduler: Option<Scheduler>,
	pub lifecycle: Arc<LifecycleBus>,
}

impl AppState {
	pub fn new(store: Store, scheduler: Option<Scheduler>, lifecycle: Arc<LifecycleBus>) -> Self {
		Self {
			store,
			scheduler,
			lifecycle,
		}
	}
}
