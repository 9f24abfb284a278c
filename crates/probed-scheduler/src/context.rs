// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! A cheaply clonable cooperative cancellation flag shared between the
//! scheduler's background workers, so `Stop` can signal "no more new
//! work" without touching a channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Clone, Default)]
pub(crate) struct CancellationToken {
	flag: Arc<AtomicBool>,
}

impl CancellationToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.flag.store(true, Ordering::SeqCst);
	}

	pub fn reset(&self) {
		self.flag.store(false, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.flag.load(Ordering::SeqCst)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cancel_then_reset_roundtrips() {
		let token = CancellationToken::new();
		assert!(!token.is_cancelled());
		token.cancel();
		assert!(token.is_cancelled());
		token.reset();
		assert!(!token.is_cancelled());
	}

	#[test]
	fn clones_share_the_same_flag() {
		let token = CancellationToken::new();
		let clone = token.clone();
		token.cancel();
		assert!(clone.is_cancelled());
	}
}
