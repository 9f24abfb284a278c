// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! In-memory bookkeeping for dispatched attempts and per-(job, probe)
//! mutual exclusion. None of this is persisted.

use std::collections::{HashMap, HashSet};

use tokio::sync::oneshot;

#[derive(Default)]
pub(crate) struct SchedulerState {
	pub in_flight: HashMap<String, String>,
	pub run_request: HashMap<String, String>,
	pub request_target: HashMap<String, String>,
	pub active_targets: HashSet<String>,
	pub pending_retries: HashMap<String, oneshot::Sender<()>>,
}

impl SchedulerState {
	/// Returns `true` if `target_key` was unclaimed and is now claimed.
	pub fn claim_target(&mut self, target_key: &str) -> bool {
		self.active_targets.insert(target_key.to_string())
	}

	pub fn release_target(&mut self, target_key: &str) {
		self.active_targets.remove(target_key);
	}

	pub fn track_attempt(&mut self, request_id: &str, run_id: &str, target_key: &str) {
		self.in_flight.insert(request_id.to_string(), run_id.to_string());
		self.run_request.insert(run_id.to_string(), request_id.to_string());
		self.request_target.insert(request_id.to_string(), target_key.to_string());
	}

	/// Drop all bookkeeping for a concluded attempt. Deliberately leaves
	/// `active_targets` untouched — releasing the claim is a separate,
	/// retry-aware decision the caller makes.
	pub fn forget_attempt(&mut self, request_id: &str) {
		if let Some(run_id) = self.in_flight.remove(request_id) {
			self.run_request.remove(&run_id);
		}
		self.request_target.remove(request_id);
	}

	pub fn request_id_for_run(&self, run_id: &str) -> Option<String> {
		self.run_request.get(run_id).cloned()
	}

	/// Replace any existing pending-retry timer for `target_key`,
	/// canceling it first so the old timer never fires into a state
	/// this one is about to supersede.
	pub fn register_pending_retry(&mut self, target_key: &str, cancel_tx: oneshot::Sender<()>) {
		if let Some(previous) = self.pending_retries.insert(target_key.to_string(), cancel_tx) {
			let _ = previous.send(());
		}
	}

	pub fn take_pending_retry(&mut self, target_key: &str) -> Option<oneshot::Sender<()>> {
		self.pending_retries.remove(target_key)
	}

	/// Cancel and remove every pending retry whose target_key belongs to
	/// `job_id` (keys are `"job_id::probe_id"`), releasing each target's
	/// claim along with it since no replacement timer is taking over,
	/// and returning the count.
	pub fn cancel_retries_for_job(&mut self, job_id: &str) -> u32 {
		let prefix = format!("{job_id}::");
		let keys: Vec<String> = self
			.pending_retries
			.keys()
			.filter(|k| k.starts_with(&prefix))
			.cloned()
			.collect();
		let mut count = 0u32;
		for key in keys {
			if let Some(tx) = self.pending_retries.remove(&key) {
				let _ = tx.send(());
				self.active_targets.remove(&key);
				count += 1;
			}
		}
		count
	}

	pub fn drain_pending_retries(&mut self) -> Vec<oneshot::Sender<()>> {
		self.pending_retries.drain().map(|(_, tx)| tx).collect()
	}

	pub fn in_flight_request_ids(&self) -> Vec<String> {
		self.in_flight.keys().cloned().collect()
	}
}
