// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! The Scheduler's external collaborators: the bidirectional transport
//! (`Hub`), the read-only fleet directory (`Fleet`), and the command
//! tracker that hands out one-shot result channels per dispatched
//! attempt. This crate only defines the traits plus in-memory fakes
//! good enough to drive scheduler tests — the real WebSocket transport,
//! probe registry, and command execution pipeline live elsewhere.

mod fake;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;

pub use fake::{FakeCommandTracker, FakeFleet, FakeHub};

#[derive(Debug, Error)]
pub enum TransportError {
	#[error("probe {0} is not connected")]
	NotConnected(String),
	#[error("send failed: {0}")]
	SendFailed(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// A single probe's online status and declared tags, as known to the
/// fleet directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeInfo {
	pub id: String,
	pub tags: Vec<String>,
	pub online: bool,
}

/// Read-only lookup over the connected probe fleet.
#[async_trait]
pub trait Fleet: Send + Sync {
	async fn get(&self, probe_id: &str) -> Option<ProbeInfo>;
	async fn list_by_tag(&self, tag: &str) -> Vec<ProbeInfo>;
	async fn list(&self) -> Vec<ProbeInfo>;

	async fn is_online(&self, probe_id: &str) -> bool {
		self.get(probe_id).await.map(|p| p.online).unwrap_or(false)
	}
}

/// Bidirectional transport sink. `send` delivers a typed payload
/// to a probe; inbound results arrive out-of-band through the
/// `CommandTracker`'s pending-command channel, not through this trait.
#[async_trait]
pub trait Hub: Send + Sync {
	async fn send(&self, probe_id: &str, message_type: &str, payload: Value) -> Result<()>;
}

/// The result of one dispatched command attempt, as reported back by the
/// probe-side executor.
#[derive(Debug, Clone)]
pub struct CommandResult {
	pub exit_code: i32,
	pub stdout: String,
	pub stderr: String,
}

/// A handle to one in-flight command, carrying the one-shot channel its
/// result (or cancellation) arrives on.
pub struct PendingCommand {
	pub request_id: String,
	pub result_rx: oneshot::Receiver<Option<CommandResult>>,
}

/// Registers pending commands and routes inbound results back to whoever
/// is awaiting them.
#[async_trait]
pub trait CommandTracker: Send + Sync {
	async fn track(
		&self,
		request_id: &str,
		probe_id: &str,
		command: &str,
		level: &str,
	) -> PendingCommand;

	/// Best-effort: cancels the registration for `request_id` if still
	/// pending. Never raises.
	async fn cancel(&self, request_id: &str);
}
