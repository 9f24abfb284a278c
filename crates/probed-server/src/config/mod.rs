// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Layered server configuration: built-in defaults, an optional TOML
//! file, then `PROBED_*` environment overrides — in ascending
//! precedence, matching the ambient config-layering idiom this binary
//! is modeled on. A malformed value at any layer is a startup error;
//! nothing silently falls back to a default once a value was supplied.

mod database;
mod error;
mod http;
mod layer;
mod logging;
mod scheduler;
mod sources;

pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use http::HttpConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use scheduler::SchedulerConfig;

use layer::ServerConfigLayer;
use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};
use tracing::{debug, info};

/// Fully resolved configuration, ready to drive startup.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub scheduler: SchedulerConfig,
	pub logging: LoggingConfig,
}

impl ServerConfig {
	pub fn socket_addr(&self) -> String {
		self.http.socket_addr()
	}
}

/// Load configuration from built-in defaults, `/etc/probed/server.toml`
/// if present, then `PROBED_*` environment overrides.
pub fn load_config() -> Result<ServerConfig, ConfigError> {
	load_with_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration using an explicit TOML file path instead of the
/// system default location.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<ServerConfig, ConfigError> {
	load_with_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_with_sources(mut sources: Vec<Box<dyn ConfigSource>>) -> Result<ServerConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());
	debug_assert!(sources.windows(2).all(|w| w[0].precedence() <= w[1].precedence()));

	let mut merged = ServerConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: ServerConfigLayer) -> Result<ServerConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize();
	let database = layer.database.unwrap_or_default().finalize();
	let scheduler = layer.scheduler.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate(&scheduler)?;

	info!(
		host = %http.host,
		port = http.port,
		database = %database.url,
		tick_interval = ?scheduler.tick_interval,
		command_timeout = ?scheduler.command_timeout,
		log_level = %logging.level,
		"probed-server configuration loaded"
	);

	Ok(ServerConfig {
		http,
		database,
		scheduler,
		logging,
	})
}

fn validate(scheduler: &SchedulerConfig) -> Result<(), ConfigError> {
	if scheduler.tick_interval.is_zero() {
		return Err(ConfigError::Validation(
			"scheduler.tick_interval must be > 0".to_string(),
		));
	}
	if scheduler.command_timeout.is_zero() {
		return Err(ConfigError::Validation(
			"scheduler.command_timeout must be > 0".to_string(),
		));
	}
	if let Some(overrides) = &scheduler.retry_overrides {
		if let Some(multiplier) = overrides.multiplier {
			if multiplier < 1.0 {
				return Err(ConfigError::Validation(
					"scheduler.retry_multiplier must be >= 1".to_string(),
				));
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_resolve_without_any_source() {
		let config = finalize(ServerConfigLayer::default()).unwrap();
		assert_eq!(config.socket_addr(), "0.0.0.0:8080");
		assert_eq!(config.database.url, "sqlite:./probed.db");
	}

	#[test]
	fn zero_tick_interval_rejected() {
		let mut layer = ServerConfigLayer::default();
		layer.scheduler = Some(super::scheduler::SchedulerConfigLayer {
			tick_interval: Some(std::time::Duration::ZERO),
			..Default::default()
		});
		assert!(finalize(layer).is_err());
	}
}
