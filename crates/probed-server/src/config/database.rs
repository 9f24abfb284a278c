// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Store connection configuration.

use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
	pub url: String,
}

impl Default for DatabaseConfig {
	fn default() -> Self {
		Self {
			url: "sqlite:./probed.db".to_string(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfigLayer {
	#[serde(default)]
	pub url: Option<String>,
}

impl DatabaseConfigLayer {
	pub fn merge(&mut self, other: DatabaseConfigLayer) {
		if other.url.is_some() {
			self.url = other.url;
		}
	}

	pub fn finalize(self) -> DatabaseConfig {
		DatabaseConfig {
			url: self.url.unwrap_or_else(|| DatabaseConfig::default().url),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_url() {
		assert_eq!(
			DatabaseConfigLayer::default().finalize().url,
			"sqlite:./probed.db"
		);
	}

	#[test]
	fn custom_url_wins() {
		let layer = DatabaseConfigLayer {
			url: Some("sqlite:/var/lib/probed/probed.db".to_string()),
		};
		assert_eq!(layer.finalize().url, "sqlite:/var/lib/probed/probed.db");
	}
}
