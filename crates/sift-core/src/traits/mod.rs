// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! All collaborators extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod embedding;
pub mod generation;
pub mod llm;
pub mod session;
pub mod stores;

pub use adapter::PluginAdapter;
pub use embedding::EmbeddingAdapter;
pub use generation::{GenerationAdapter, GenerationRequest};
pub use llm::LlmAdapter;
pub use session::SessionStore;
pub use stores::{ActionStore, EventStore, VectorStore};
