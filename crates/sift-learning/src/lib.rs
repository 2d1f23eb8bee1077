// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quality metrics and the learning optimizer for the Sift engine.
//!
//! [`QualityMetrics`] is the producer side: the orchestrator records every
//! completed turn and any user feedback onto a bounded queue.
//! [`LearningOptimizer`] is the consumer: a cancellable background task that
//! periodically drains a batch and publishes adjusted system parameters.

pub mod optimizer;
pub mod quality;

pub use optimizer::{BatchSummary, LearningOptimizer};
pub use quality::{IntentStats, LearningRecord, QualityIssue, QualityMetrics, TurnQuality};
