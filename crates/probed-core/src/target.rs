// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Selector that maps a job onto one or more probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
	/// A single probe identified by `value`.
	Probe,
	/// Every probe currently bearing the tag `value`.
	Tag,
	/// Every known probe; `value` is ignored.
	All,
}

impl TargetKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			TargetKind::Probe => "probe",
			TargetKind::Tag => "tag",
			TargetKind::All => "all",
		}
	}
}

impl std::str::FromStr for TargetKind {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"probe" => Ok(TargetKind::Probe),
			"tag" => Ok(TargetKind::Tag),
			"all" => Ok(TargetKind::All),
			other => Err(format!("unknown target kind: {other}")),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Target {
	pub kind: TargetKind,
	pub value: Option<String>,
}

impl Target {
	/// `value` is mandatory for `probe`/`tag` kinds and ignored for `all`.
	pub fn validate(&self) -> Result<(), String> {
		match self.kind {
			TargetKind::Probe | TargetKind::Tag => {
				if self.value.as_deref().unwrap_or("").trim().is_empty() {
					return Err(format!(
						"target.value is required when target.kind is {}",
						self.kind.as_str()
					));
				}
				Ok(())
			}
			TargetKind::All => Ok(()),
		}
	}
}

/// Composite key enforcing per-(job, probe) mutual exclusion.
pub fn target_key(job_id: &str, probe_id: &str) -> String {
	format!("{job_id}::{probe_id}")
}
