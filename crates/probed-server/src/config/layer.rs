// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Partial configuration layer for merging defaults, TOML, and
//! environment sources.

use serde::Deserialize;

use super::database::DatabaseConfigLayer;
use super::http::HttpConfigLayer;
use super::logging::LoggingConfigLayer;
use super::scheduler::SchedulerConfigLayer;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfigLayer {
	#[serde(default)]
	pub http: Option<HttpConfigLayer>,
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub scheduler: Option<SchedulerConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl ServerConfigLayer {
	/// Merge `other` into `self`. `other` takes precedence field-by-field.
	pub fn merge(&mut self, other: ServerConfigLayer) {
		merge_option(&mut self.http, other.http, HttpConfigLayer::merge);
		merge_option(
			&mut self.database,
			other.database,
			DatabaseConfigLayer::merge,
		);
		merge_option(
			&mut self.scheduler,
			other.scheduler,
			SchedulerConfigLayer::merge,
		);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T>(slot: &mut Option<T>, other: Option<T>, merge_fn: impl FnOnce(&mut T, T)) {
	match (slot.as_mut(), other) {
		(Some(existing), Some(incoming)) => merge_fn(existing, incoming),
		(None, Some(incoming)) => *slot = Some(incoming),
		_ => {}
	}
}
