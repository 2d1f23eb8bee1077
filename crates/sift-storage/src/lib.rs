// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reference collaborators for the Sift engine.
//!
//! A WAL-mode SQLite turn log with embedded migrations, in-process session
//! snapshots with TTL, in-memory content/event/action stores and a
//! deterministic hashing embedder for running without external services.

pub mod database;
pub mod embedder;
pub mod fixtures;
pub mod memory;
pub mod migrations;
pub mod session;

pub use database::Database;
pub use embedder::HashingEmbedder;
pub use fixtures::Fixtures;
pub use memory::{InMemoryActionStore, InMemoryEventStore, InMemoryVectorStore};
pub use session::{InMemorySessionStore, SqliteSessionStore};
