// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! `probed-server` binary: loads configuration, opens the durable
//! store, wires the scheduler to its external collaborators, and
//! serves the HTTP surface until a shutdown signal arrives.

mod config;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use probed_db::{create_pool, Store};
use probed_lifecycle::{LifecycleBus, TracingObserver};
use probed_scheduler::{Scheduler, SchedulerOptions};
use probed_transport::{FakeCommandTracker, FakeFleet, FakeHub};

use config::{LogFormat, ServerConfig};

/// Control-plane scheduler and dispatcher for probe command jobs.
#[derive(Parser, Debug)]
#[command(name = "probed-server", about = "Probe job scheduler and dispatcher", version)]
struct Args {
	/// Path to a TOML config file, overriding the system default
	/// (`/etc/probed/server.toml`).
	#[arg(long)]
	config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	let server_config = match &args.config {
		Some(path) => config::load_config_with_file(path.clone()),
		None => config::load_config(),
	}
	.map_err(|e| {
		eprintln!("configuration error: {e}");
		e
	})?;

	init_tracing(&server_config);

	tracing::info!(
		addr = %server_config.socket_addr(),
		database = %server_config.database.url,
		"starting probed-server"
	);

	let pool = create_pool(&server_config.database.url).await?;
	let store = Store::open(pool).await?;

	// The transport, fleet directory, and command tracker are explicit
	// non-goals of this system (see the architecture notes) — this
	// binary wires the in-memory fakes so the scheduler has something
	// to dispatch against standalone. A real deployment replaces these
	// three with WebSocket-backed implementations without touching the
	// scheduler itself.
	let fleet = Arc::new(FakeFleet::new());
	let hub = Arc::new(FakeHub::new());
	let tracker = FakeCommandTracker::new();

	let lifecycle = Arc::new(LifecycleBus::new(vec![Arc::new(TracingObserver)]));

	let scheduler_options = SchedulerOptions {
		tick_interval: server_config.scheduler.tick_interval,
		command_timeout: server_config.scheduler.command_timeout,
		retry_overrides: server_config.scheduler.retry_overrides,
	};

	let scheduler = Scheduler::new(
		store.clone(),
		fleet,
		hub,
		tracker,
		lifecycle.clone(),
		scheduler_options,
	);
	scheduler.start().await;

	let state = probed_api::AppState::new(store, Some(scheduler.clone()), lifecycle);
	let app = probed_api::router(state);

	let listener = tokio::net::TcpListener::bind(server_config.socket_addr()).await?;
	tracing::info!(addr = %server_config.socket_addr(), "listening");

	tokio::select! {
		result = axum::serve(listener, app) => {
			if let Err(e) = result {
				tracing::error!(error = %e, "server error");
			}
		}
		_ = shutdown_signal() => {
			tracing::info!("received shutdown signal");
		}
	}

	tracing::info!("stopping scheduler");
	scheduler.stop().await;
	tracing::info!("probed-server shutdown complete");

	Ok(())
}

async fn shutdown_signal() {
	#[cfg(unix)]
	{
		use tokio::signal::unix::{signal, SignalKind};
		let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {}
			_ = sigterm.recv() => {}
		}
	}
	#[cfg(not(unix))]
	{
		let _ = tokio::signal::ctrl_c().await;
	}
}

fn init_tracing(config: &ServerConfig) {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.logging.level.clone()));

	match config.logging.format {
		LogFormat::Json => {
			tracing_subscriber::registry()
				.with(env_filter)
				.with(tracing_subscriber::fmt::layer().json())
				.init();
		}
		LogFormat::Pretty => {
			tracing_subscriber::registry()
				.with(env_filter)
				.with(tracing_subscriber::fmt::layer())
				.init();
		}
	}
}
