// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Configuration sources: built-in defaults, an optional TOML file,
//! and `PROBED_*` environment variables. Sources are applied in
//! ascending [`Precedence`] order so later sources win.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, trace};

use super::database::DatabaseConfigLayer;
use super::error::ConfigError;
use super::http::HttpConfigLayer;
use super::layer::ServerConfigLayer;
use super::logging::{LogFormat, LoggingConfigLayer};
use super::scheduler::SchedulerConfigLayer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<ServerConfigLayer, ConfigError>;
}

pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(ServerConfigLayer::default())
	}
}

pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/probed/server.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(ServerConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: ServerConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// `PROBED_*` environment overrides, highest precedence.
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ServerConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(ServerConfigLayer {
			http: Some(load_http_from_env()?),
			database: Some(load_database_from_env()?),
			scheduler: Some(load_scheduler_from_env()?),
			logging: Some(load_logging_from_env()?),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_u16(name: &str) -> Result<Option<u16>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u16 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_f64(name: &str) -> Result<Option<f64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid f64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_u32(name: &str) -> Result<Option<u32>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u32 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn env_duration(name: &str) -> Result<Option<Duration>, ConfigError> {
	match env_var(name) {
		Some(v) => humantime::parse_duration(&v)
			.map(Some)
			.map_err(|e| ConfigError::InvalidValue {
				key: name.to_string(),
				message: e.to_string(),
			}),
		None => Ok(None),
	}
}

fn load_http_from_env() -> Result<HttpConfigLayer, ConfigError> {
	Ok(HttpConfigLayer {
		host: env_var("PROBED_HOST"),
		port: env_u16("PROBED_PORT")?,
	})
}

fn load_database_from_env() -> Result<DatabaseConfigLayer, ConfigError> {
	Ok(DatabaseConfigLayer {
		url: env_var("PROBED_DATABASE_URL"),
	})
}

fn load_scheduler_from_env() -> Result<SchedulerConfigLayer, ConfigError> {
	Ok(SchedulerConfigLayer {
		tick_interval: env_duration("PROBED_TICK_INTERVAL")?,
		command_timeout: env_duration("PROBED_COMMAND_TIMEOUT")?,
		retry_max_attempts: env_u32("PROBED_RETRY_MAX_ATTEMPTS")?,
		retry_initial_backoff: env_duration("PROBED_RETRY_INITIAL_BACKOFF")?,
		retry_multiplier: env_f64("PROBED_RETRY_MULTIPLIER")?,
		retry_max_backoff: env_duration("PROBED_RETRY_MAX_BACKOFF")?,
	})
}

fn load_logging_from_env() -> Result<LoggingConfigLayer, ConfigError> {
	let format = env_var("PROBED_LOG_FORMAT").map(|v| match v.to_lowercase().as_str() {
		"json" => LogFormat::Json,
		_ => LogFormat::Pretty,
	});

	Ok(LoggingConfigLayer {
		level: env_var("PROBED_LOG_LEVEL"),
		format,
	})
}
