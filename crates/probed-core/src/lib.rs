// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Domain types shared across the scheduler, store, and HTTP surface.
//!
//! This crate has no knowledge of SQLite, axum, or WebSockets — it holds
//! the `Job`/`JobRun` shapes, the retry policy resolver, the schedule
//! evaluator, and the lifecycle event vocabulary that every other crate
//! in the workspace builds on.

pub mod error;
pub mod job;
pub mod lifecycle;
pub mod retry;
pub mod run;
pub mod schedule;
pub mod target;

pub use error::CoreError;
pub use job::Job;
pub use lifecycle::{LifecycleEvent, LifecycleEventKind};
pub use retry::{resolve_retry_policy, RetryPolicy, RetryPolicyOverrides};
pub use run::{cap_output, rollup_batch_status, JobRun, RunStatus, OUTPUT_CAP_BYTES, OUTPUT_TRUNCATION_MARKER};
pub use schedule::{is_schedule_due, validate_schedule};
pub use target::{target_key, Target, TargetKind};
