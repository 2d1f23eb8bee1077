// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `sift shell` command implementation.
//!
//! Launches an interactive REPL with a colored prompt and readline history.
//! Stores are in memory and seeded from a fixture file; turns are logged to
//! the configured SQLite database. Creates a new session per invocation.

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use sift_agent::shutdown::install_signal_handler;
use sift_agent::{Adapters, Engine, TurnOutcome, TurnRequest};
use sift_config::model::SiftConfig;
use sift_core::error::SiftError;
use sift_core::traits::SessionStore;
use sift_core::types::Feedback;
use sift_storage::{
    Fixtures, HashingEmbedder, InMemoryActionStore, InMemoryEventStore, InMemorySessionStore,
    InMemoryVectorStore, SqliteSessionStore,
};
use tracing::{info, warn};

use crate::generation::ExtractiveGenerator;

/// Results quoted per answer.
const ANSWER_ITEMS: usize = 5;

/// Runs the `sift shell` interactive REPL.
pub async fn run_shell(
    config: SiftConfig,
    fixtures: Option<PathBuf>,
    user_id: String,
) -> Result<(), SiftError> {
    let embedder = Arc::new(HashingEmbedder::default());
    let vectors = Arc::new(InMemoryVectorStore::new(embedder.clone()));
    let events = Arc::new(InMemoryEventStore::new());
    let actions = Arc::new(InMemoryActionStore::new());
    match &fixtures {
        Some(path) => {
            Fixtures::load(path)
                .await?
                .seed(&vectors, &events, &actions)
                .await?
        }
        None => info!("no fixtures given, stores start empty"),
    }

    let sessions: Arc<dyn SessionStore> = match SqliteSessionStore::open(&config.storage).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "turn log unavailable, keeping turns in memory");
            Arc::new(InMemorySessionStore::new())
        }
    };

    let engine = Engine::start(
        &config,
        Adapters {
            llm: None,
            generation: Arc::new(ExtractiveGenerator::new(ANSWER_ITEMS)),
            embedder,
            vector: vectors,
            events,
            actions,
            sessions,
            evaluator: None,
        },
    );
    let shutdown = install_signal_handler();
    let session_id = uuid::Uuid::new_v4().to_string();

    let mut rl = DefaultEditor::new()
        .map_err(|e| SiftError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "sift shell".bold().green());
    println!(
        "Type {} to exit, {} for commands.\n",
        "/quit".yellow(),
        "/help".yellow()
    );

    let prompt = format!("{}> ", "sift".green());
    loop {
        if shutdown.is_cancelled() {
            break;
        }
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                if trimmed.starts_with('/') {
                    run_command(&engine, &session_id, &user_id, trimmed).await;
                    continue;
                }

                let outcome = engine
                    .handle_turn(TurnRequest::new(&session_id, &user_id, trimmed))
                    .await;
                print_outcome(&outcome);
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    engine.shutdown().await?;
    println!("{}", "goodbye".dimmed());
    Ok(())
}

fn print_outcome(outcome: &TurnOutcome) {
    if outcome.errored {
        println!("{}", outcome.response.red());
    } else if outcome.low_confidence {
        println!("{}", outcome.response.yellow());
    } else {
        println!("{}", outcome.response);
    }

    let mut meta = format!(
        "turn={} intent={} score={:.2} rounds={}",
        outcome.turn_index,
        outcome.intent,
        outcome.sufficiency_score,
        outcome.rounds.len()
    );
    if outcome.from_response_cache {
        meta.push_str(" response-cache");
    } else if outcome.rounds.first().is_some_and(|r| r.from_cache) {
        meta.push_str(" context-cache");
    }
    if outcome.compressed {
        meta.push_str(" compressed");
    }
    println!("{}\n", meta.dimmed());
}

async fn run_command(engine: &Engine, session_id: &str, user_id: &str, input: &str) {
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or_default();
    match command {
        "/help" => {
            println!("  /stats            cache and per-intent quality figures");
            println!("  /params           current tunable parameters");
            println!("  /good, /bad       rate the last answer");
            println!("  /invalidate       drop cached entries for this user");
            println!("  /quit             leave the shell");
        }
        "/stats" => {
            let stats = engine.orchestrator().cache().stats().await;
            for (name, s) in [
                ("query", &stats.query),
                ("context", &stats.context),
                ("embedding", &stats.embedding),
                ("response", &stats.response),
            ] {
                println!(
                    "  cache {name:<10} entries={} hits={} misses={} evictions={}",
                    s.entries, s.hits, s.misses, s.evictions
                );
            }
            for (intent, s) in engine.orchestrator().quality().intent_summary() {
                println!(
                    "  intent {:<16} turns={} success={:.2} sufficiency={:.2}",
                    intent.to_string(),
                    s.turns,
                    s.success_rate(),
                    s.average_sufficiency()
                );
            }
        }
        "/params" => {
            let params = engine.params().snapshot();
            println!("  version {}", params.version);
            for (name, value) in params.entries() {
                println!("  {name:<36} {value:.4}");
            }
        }
        "/good" | "/bad" => {
            let helpful = command == "/good";
            let score = if helpful { 1.0 } else { 0.0 };
            engine.record_feedback(Feedback {
                session_id: session_id.to_string(),
                relevance_score: score,
                completeness_score: score,
                helpful,
            });
            println!("{}", "feedback recorded".dimmed());
        }
        "/invalidate" => {
            let removed = engine.invalidate_user(user_id).await;
            println!("{}", format!("{removed} cached entries dropped").dimmed());
        }
        other => {
            println!("{}: unknown command {other}, try /help", "error".red());
        }
    }
}
