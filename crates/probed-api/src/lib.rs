// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! Thin `axum` HTTP surface over the Store and Scheduler (spec §6.1).
//! Handlers validate input, delegate to their collaborator, and map
//! the result onto the documented status codes — no business logic
//! lives in this crate.

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
