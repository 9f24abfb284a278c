// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! In-memory fakes for `Hub`/`Fleet`/`CommandTracker`, used by
//! `probed-scheduler`'s tests to drive the dispatch/retry/cancel state
//! machine without a real transport.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex};

use crate::{CommandResult, CommandTracker, Fleet, Hub, PendingCommand, ProbeInfo, Result, TransportError};

#[derive(Default)]
pub struct FakeFleet {
	probes: Mutex<HashMap<String, ProbeInfo>>,
}

impl FakeFleet {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn upsert(&self, probe: ProbeInfo) {
		self.probes.lock().await.insert(probe.id.clone(), probe);
	}

	pub async fn set_online(&self, probe_id: &str, online: bool) {
		if let Some(probe) = self.probes.lock().await.get_mut(probe_id) {
			probe.online = online;
		}
	}
}

#[async_trait]
impl Fleet for FakeFleet {
	async fn get(&self, probe_id: &str) -> Option<ProbeInfo> {
		self.probes.lock().await.get(probe_id).cloned()
	}

	async fn list_by_tag(&self, tag: &str) -> Vec<ProbeInfo> {
		self.probes
			.lock()
			.await
			.values()
			.filter(|p| p.tags.iter().any(|t| t == tag))
			.cloned()
			.collect()
	}

	async fn list(&self) -> Vec<ProbeInfo> {
		self.probes.lock().await.values().cloned().collect()
	}
}

enum HubMode {
	Ok,
	FailAll,
	FailFor(std::collections::HashSet<String>),
}

pub struct FakeHub {
	mode: Mutex<HubMode>,
	sent: Mutex<Vec<(String, String, Value)>>,
}

impl Default for FakeHub {
	fn default() -> Self {
		Self {
			mode: Mutex::new(HubMode::Ok),
			sent: Mutex::new(Vec::new()),
		}
	}
}

impl FakeHub {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn fail_all_sends(&self) {
		*self.mode.lock().await = HubMode::FailAll;
	}

	pub async fn fail_sends_to(&self, probe_id: &str) {
		let mut mode = self.mode.lock().await;
		match &mut *mode {
			HubMode::FailFor(set) => {
				set.insert(probe_id.to_string());
			}
			_ => {
				let mut set = std::collections::HashSet::new();
				set.insert(probe_id.to_string());
				*mode = HubMode::FailFor(set);
			}
		}
	}

	pub async fn sent_messages(&self) -> Vec<(String, String, Value)> {
		self.sent.lock().await.clone()
	}
}

#[async_trait]
impl Hub for FakeHub {
	async fn send(&self, probe_id: &str, message_type: &str, payload: Value) -> Result<()> {
		let should_fail = match &*self.mode.lock().await {
			HubMode::Ok => false,
			HubMode::FailAll => true,
			HubMode::FailFor(set) => set.contains(probe_id),
		};
		if should_fail {
			return Err(TransportError::SendFailed(format!(
				"simulated failure sending to {probe_id}"
			)));
		}
		self.sent
			.lock()
			.await
			.push((probe_id.to_string(), message_type.to_string(), payload));
		Ok(())
	}
}

/// In-memory command tracker. Tests drive results by calling
/// [`FakeCommandTracker::resolve`] or [`FakeCommandTracker::cancel`]
/// (via the trait) on a tracked `request_id`.
#[derive(Default)]
pub struct FakeCommandTracker {
	pending: Mutex<HashMap<String, oneshot::Sender<Option<CommandResult>>>>,
}

impl FakeCommandTracker {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Deliver a result to whoever is awaiting `request_id`. No-op if the
	/// request is unknown or was already resolved/canceled.
	pub async fn resolve(&self, request_id: &str, result: CommandResult) {
		if let Some(tx) = self.pending.lock().await.remove(request_id) {
			let _ = tx.send(Some(result));
		}
	}

	pub async fn is_tracked(&self, request_id: &str) -> bool {
		self.pending.lock().await.contains_key(request_id)
	}
}

#[async_trait]
impl CommandTracker for FakeCommandTracker {
	async fn track(
		&self,
		request_id: &str,
		_probe_id: &str,
		_command: &str,
		_level: &str,
	) -> PendingCommand {
		let (tx, rx) = oneshot::channel();
		self.pending.lock().await.insert(request_id.to_string(), tx);
		PendingCommand {
			request_id: request_id.to_string(),
			result_rx: rx,
		}
	}

	async fn cancel(&self, request_id: &str) {
		// Dropping the sender closes the channel; the waiter observes this
		// as a `None`-equivalent (channel closed) result.
		self.pending.lock().await.remove(request_id);
	}
}
