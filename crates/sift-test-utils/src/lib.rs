// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Sift integration tests.
//!
//! - [`MockLlm`]: scripted analysis, judgment and profiling payloads
//! - [`MockGenerator`]: queued answers with request capture
//! - [`ScriptedEvaluator`]: replayed sufficiency scores and gaps
//! - [`FailingStore`]: a store that fails every call
//! - [`TestHarness`]: a full engine over seeded in-memory stores

pub mod failing;
pub mod harness;
pub mod mock_evaluator;
pub mod mock_generation;
pub mod mock_llm;

pub use failing::FailingStore;
pub use harness::{TEST_USER, TestHarness, action, document, event};
pub use mock_evaluator::ScriptedEvaluator;
pub use mock_generation::MockGenerator;
pub use mock_llm::MockLlm;
