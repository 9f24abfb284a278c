// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Durable persistence for jobs and job runs.
//!
//! [`Store`] is the only component permitted to mutate the `jobs` and
//! `job_runs` tables. Every status change goes through a guarded
//! transition primitive that checks the observed status against a
//! legal `from` set inside the same statement that applies the
//! change, so a racing writer never silently clobbers a state it
//! didn't expect.

mod error;
mod migrate;
mod pool;
mod query;
mod rows;
mod store;

pub use error::{Result, StoreError};
pub use migrate::{run_migrations, SCHEMA_VERSION};
pub use pool::create_pool;
pub use query::{RunQuery, DEFAULT_RUN_LIMIT, MAX_RUN_LIMIT};
pub use store::{NewRun, Store};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
