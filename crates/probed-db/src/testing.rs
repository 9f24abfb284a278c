// Copyright (c) 2026 Probed Authors. All rights reserved.
// SPDX-License-Identifier: MIT

//! In-memory pool fixtures for downstream crates' tests.

use sqlx::SqlitePool;

use crate::migrate::run_migrations;
use crate::store::Store;

pub async fn create_test_pool() -> SqlitePool {
	let pool = SqlitePool::connect(":memory:").await.unwrap();
	run_migrations(&pool).await.unwrap();
	pool
}

pub async fn create_test_store() -> Store {
	let pool = create_test_pool().await;
	Store::open(pool).await.unwrap()
}
