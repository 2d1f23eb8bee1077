// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn orchestration for the Sift engine.
//!
//! The [`Engine`] wires the analyzer, retriever, evaluator, expander,
//! memory manager and cache around a set of external collaborators, runs
//! each turn through the [`Orchestrator`] state machine and keeps the
//! learning optimizer running in the background.

pub mod orchestrator;
pub mod recording;
pub mod session;
pub mod shutdown;

use std::sync::Arc;

use sift_analyzer::QueryAnalyzer;
use sift_cache::ContextCache;
use sift_config::model::SiftConfig;
use sift_core::error::SiftError;
use sift_core::params::ParameterStore;
use sift_core::traits::{
    ActionStore, EmbeddingAdapter, EventStore, GenerationAdapter, LlmAdapter, PluginAdapter,
    SessionStore, VectorStore,
};
use sift_core::types::Feedback;
use sift_learning::{LearningOptimizer, QualityMetrics};
use sift_memory::MemoryManager;
use sift_retrieval::{HybridRetriever, RetrievalSources};
use sift_sufficiency::{ContextEvaluator, ContextExpander, SufficiencyEvaluator};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use orchestrator::{Orchestrator, Round, TurnOutcome, TurnPipeline, TurnRequest, TurnState};

/// The external collaborators an engine runs against.
#[derive(Clone)]
pub struct Adapters {
    /// Optional; without it analysis, evaluation and profiling stay heuristic.
    pub llm: Option<Arc<dyn LlmAdapter>>,
    pub generation: Arc<dyn GenerationAdapter>,
    pub embedder: Arc<dyn EmbeddingAdapter>,
    pub vector: Arc<dyn VectorStore>,
    pub events: Arc<dyn EventStore>,
    pub actions: Arc<dyn ActionStore>,
    pub sessions: Arc<dyn SessionStore>,
    /// Replaces the built-in sufficiency evaluator when set.
    pub evaluator: Option<Arc<dyn ContextEvaluator>>,
}

pub struct Engine {
    orchestrator: Orchestrator,
    params: Arc<ParameterStore>,
    adapters: Adapters,
    cancel: CancellationToken,
    optimizer: Option<JoinHandle<()>>,
}

impl Engine {
    /// Build every component from `config` and start the learning optimizer
    /// when learning is enabled. Must be called inside a tokio runtime.
    pub fn start(config: &SiftConfig, adapters: Adapters) -> Self {
        let params = Arc::new(ParameterStore::new(config.parameters.to_system_parameters()));
        let cache = Arc::new(ContextCache::new(config.cache.clone(), params.clone()));
        let (quality, rx) = QualityMetrics::new(config.learning.queue_capacity);

        let evaluator: Arc<dyn ContextEvaluator> = match &adapters.evaluator {
            Some(evaluator) => evaluator.clone(),
            None => Arc::new(SufficiencyEvaluator::new(
                config.sufficiency.clone(),
                params.clone(),
                adapters.llm.clone(),
            )),
        };
        let retriever = HybridRetriever::new(
            RetrievalSources {
                vector: adapters.vector.clone(),
                events: adapters.events.clone(),
                actions: adapters.actions.clone(),
                embedder: adapters.embedder.clone(),
            },
            cache.clone(),
            params.clone(),
            config.retrieval.clone(),
        );
        let pipeline = TurnPipeline {
            analyzer: QueryAnalyzer::new(config.analyzer.clone(), adapters.llm.clone()),
            retriever,
            evaluator,
            expander: ContextExpander::new(config.expansion.clone()),
            memory: MemoryManager::new(config.memory.clone(), adapters.llm.clone()),
            cache,
            quality: Arc::new(quality),
            generator: adapters.generation.clone(),
            sessions: adapters.sessions.clone(),
        };

        let cancel = CancellationToken::new();
        let optimizer = if config.learning.enabled {
            let optimizer = LearningOptimizer::new(config.learning.clone(), params.clone(), rx);
            Some(optimizer.spawn(cancel.child_token()))
        } else {
            drop(rx);
            None
        };

        info!(
            learning = config.learning.enabled,
            max_expansion_attempts = config.engine.max_expansion_attempts,
            llm = adapters.llm.is_some(),
            "engine started"
        );

        Self {
            orchestrator: Orchestrator::new(config.engine.clone(), pipeline),
            params,
            adapters,
            cancel,
            optimizer,
        }
    }

    pub async fn handle_turn(&self, request: TurnRequest) -> TurnOutcome {
        self.orchestrator.handle_turn(request).await
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn params(&self) -> &Arc<ParameterStore> {
        &self.params
    }

    pub async fn invalidate_user(&self, user_id: &str) -> usize {
        self.orchestrator.invalidate_user(user_id).await
    }

    pub fn record_feedback(&self, feedback: Feedback) {
        self.orchestrator.quality().record_feedback(feedback);
    }

    /// Stop the optimizer and shut every collaborator down.
    ///
    /// Adapter shutdown failures are logged; the first one is returned after
    /// all adapters have been asked to stop.
    pub async fn shutdown(mut self) -> Result<(), SiftError> {
        self.cancel.cancel();
        if let Some(handle) = self.optimizer.take()
            && let Err(e) = handle.await
        {
            warn!(error = %e, "learning optimizer task failed");
        }

        let a = &self.adapters;
        let mut first_error = None;
        stop(a.generation.as_ref(), &mut first_error).await;
        stop(a.embedder.as_ref(), &mut first_error).await;
        stop(a.vector.as_ref(), &mut first_error).await;
        stop(a.events.as_ref(), &mut first_error).await;
        stop(a.actions.as_ref(), &mut first_error).await;
        stop(a.sessions.as_ref(), &mut first_error).await;
        if let Some(llm) = &a.llm {
            stop(llm.as_ref(), &mut first_error).await;
        }
        info!("engine stopped");
        first_error.map_or(Ok(()), Err)
    }
}

async fn stop<A: PluginAdapter + ?Sized>(adapter: &A, first_error: &mut Option<SiftError>) {
    if let Err(e) = adapter.shutdown().await {
        warn!(adapter = adapter.name(), error = %e, "adapter shutdown failed");
        first_error.get_or_insert(e);
    }
}
