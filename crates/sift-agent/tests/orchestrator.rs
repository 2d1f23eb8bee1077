// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Full-turn tests driving the orchestrator through the test harness.

use std::sync::Arc;

use sift_agent::TurnState;
use sift_core::context::{ActionStatus, ResultSource};
use sift_core::evaluation::{ExpansionFocus, ExpansionStrategy, GapKind};
use sift_core::traits::SessionStore;
use sift_core::types::Platform;
use sift_storage::Fixtures;
use sift_test_utils::{
    MockGenerator, MockLlm, ScriptedEvaluator, TestHarness, action, document, event,
};

fn fixtures() -> Fixtures {
    Fixtures {
        content: vec![
            document("d1", "Auth bug in the login token refresh", Platform::Github, 2),
            document("d2", "Budget review notes for the quarter", Platform::Notion, 30),
            document("d3", "Deploy checklist for the release", Platform::Slack, 5),
        ],
        events: vec![
            event("e1", "Alice merged the auth fix", Platform::Github, 1),
            event("e2", "Standup moved to 10am", Platform::Slack, 3),
        ],
        actions: vec![
            action("a1", "Review the auth patch", ActionStatus::Pending, 4),
            action("a2", "Send the budget draft", ActionStatus::Completed, 20),
        ],
    }
}

#[tokio::test]
async fn sufficient_turn_takes_the_short_path() {
    let harness = TestHarness::builder()
        .with_fixtures(fixtures())
        .with_evaluator(Arc::new(ScriptedEvaluator::constant(0.7, 0.9)))
        .build()
        .await
        .unwrap();

    let outcome = harness.ask("s1", "Find me the auth bug").await;
    assert_eq!(
        outcome.states,
        vec![
            TurnState::Analyze,
            TurnState::Retrieve,
            TurnState::Evaluate,
            TurnState::Generate
        ]
    );
    assert_eq!(outcome.rounds.len(), 1);
    assert_eq!(outcome.rounds[0].sequence, 1);
    assert_eq!(outcome.expansion_attempts(), 0);
    assert!(!outcome.low_confidence);
    assert_eq!(outcome.turn_index, 0);
    assert_eq!(outcome.response, "answer: Find me the auth bug");

    let request = harness.generator.last_request().await.unwrap();
    assert!(!request.context.is_empty());
    assert!(!request.low_confidence);
}

#[tokio::test]
async fn simple_confident_query_skips_llm_analysis() {
    let llm = Arc::new(MockLlm::new());
    let harness = TestHarness::builder()
        .with_llm(llm.clone())
        .with_evaluator(Arc::new(ScriptedEvaluator::constant(0.7, 0.9)))
        .build()
        .await
        .unwrap();

    harness.ask("s1", "Find me the auth bug").await;
    assert_eq!(llm.analyze_calls(), 0);
}

#[tokio::test]
async fn temporal_gap_gets_one_targeted_expansion() {
    let evaluator = Arc::new(ScriptedEvaluator::new(
        0.7,
        vec![(0.4, vec![GapKind::TemporalCoverage]), (0.8, vec![])],
    ));
    let harness = TestHarness::builder()
        .with_fixtures(fixtures())
        .with_evaluator(evaluator.clone())
        .build()
        .await
        .unwrap();

    let outcome = harness
        .ask("s1", "What happened on github yesterday?")
        .await;

    assert_eq!(outcome.rounds.len(), 2);
    assert_eq!(evaluator.calls(), 2);
    assert_eq!(outcome.expansions.len(), 1);
    let plan = &outcome.expansions[0];
    assert_eq!(plan.strategy, ExpansionStrategy::TargetedExpansion);
    assert_eq!(plan.focus, ExpansionFocus::TemporalFirst);
    assert_eq!(outcome.rounds[1].sequence, 2);
    assert!((outcome.sufficiency_score - 0.8).abs() < 1e-9);
    assert!(!outcome.low_confidence);
    assert_eq!(
        outcome.states,
        vec![
            TurnState::Analyze,
            TurnState::Retrieve,
            TurnState::Evaluate,
            TurnState::Expand,
            TurnState::Retrieve,
            TurnState::Evaluate,
            TurnState::Generate
        ]
    );
}

#[tokio::test]
async fn attempt_cap_answers_with_best_context_and_low_confidence() {
    let evaluator = Arc::new(ScriptedEvaluator::new(
        0.7,
        vec![
            (0.3, vec![GapKind::EntityCoverage]),
            (0.5, vec![GapKind::EntityCoverage]),
            (0.2, vec![GapKind::InsufficientResults]),
            (0.1, vec![GapKind::InsufficientResults]),
        ],
    ));
    let harness = TestHarness::builder()
        .with_fixtures(fixtures())
        .with_evaluator(evaluator.clone())
        .build()
        .await
        .unwrap();

    let outcome = harness.ask("s1", "Tell me about the Zephyr migration").await;

    assert_eq!(outcome.expansion_attempts(), 3);
    assert_eq!(outcome.rounds.len(), 4);
    assert_eq!(evaluator.calls(), 4);
    assert!(outcome.low_confidence);
    assert!((outcome.sufficiency_score - 0.5).abs() < 1e-9);
    let strategies: Vec<_> = outcome.expansions.iter().map(|p| p.strategy).collect();
    assert_eq!(
        strategies,
        vec![
            ExpansionStrategy::TargetedExpansion,
            ExpansionStrategy::BroadExpansion,
            ExpansionStrategy::ExhaustiveExpansion
        ]
    );

    let request = harness.generator.last_request().await.unwrap();
    assert!(request.low_confidence);
    assert_eq!(request.context.provenance.attempt, 2);

    // Low-confidence answers are not cached.
    let again = harness.ask("s1", "Tell me about the Zephyr migration").await;
    assert!(!again.from_response_cache);
}

#[tokio::test]
async fn zero_attempt_cap_never_expands() {
    let harness = TestHarness::builder()
        .configure(|c| c.engine.max_expansion_attempts = 0)
        .with_evaluator(Arc::new(ScriptedEvaluator::constant(0.7, 0.2)))
        .build()
        .await
        .unwrap();

    let outcome = harness.ask("s1", "anything new?").await;
    assert_eq!(outcome.rounds.len(), 1);
    assert!(outcome.expansions.is_empty());
    assert!(outcome.low_confidence);
}

#[tokio::test]
async fn generation_failure_returns_fallback_and_logs_errored_turn() {
    let harness = TestHarness::builder()
        .with_generator(MockGenerator::failing())
        .with_evaluator(Arc::new(ScriptedEvaluator::constant(0.7, 0.9)))
        .build()
        .await
        .unwrap();

    let outcome = harness.ask("s1", "Find me the auth bug").await;
    assert!(outcome.errored);
    assert_eq!(outcome.response, harness.config.engine.fallback_response);
    assert_eq!(outcome.states.last(), Some(&TurnState::Error));

    let turns = harness.sessions.load_turns("s1").await.unwrap();
    assert_eq!(turns.len(), 1);
    assert!(turns[0].errored);

    // The session stays usable and errored answers are not cached.
    let next = harness.ask("s1", "Find me the auth bug").await;
    assert!(!next.from_response_cache);
    assert_eq!(next.turn_index, 1);
}

#[tokio::test]
async fn sufficient_answers_are_served_from_the_response_cache() {
    let evaluator = Arc::new(ScriptedEvaluator::constant(0.7, 0.9));
    let harness = TestHarness::builder()
        .with_fixtures(fixtures())
        .with_evaluator(evaluator.clone())
        .build()
        .await
        .unwrap();

    let first = harness.ask("s1", "Find me the auth bug").await;
    let second = harness.ask("s2", "  find me the AUTH bug ").await;
    assert!(second.from_response_cache);
    assert_eq!(second.response, first.response);
    assert_eq!(evaluator.calls(), 1);

    assert!(harness.engine.invalidate_user(sift_test_utils::TEST_USER).await > 0);
    let third = harness.ask("s2", "Find me the auth bug").await;
    assert!(!third.from_response_cache);
}

#[tokio::test]
async fn cached_answers_are_logged_and_recorded_as_turns() {
    let harness = TestHarness::builder()
        .with_fixtures(fixtures())
        .with_evaluator(Arc::new(ScriptedEvaluator::constant(0.7, 0.9)))
        .build()
        .await
        .unwrap();

    harness.ask("s1", "Find me the auth bug").await;
    let cached = harness.ask("s2", "Find me the auth bug").await;
    assert!(cached.from_response_cache);
    assert_eq!(cached.turn_index, 0);
    assert_eq!(cached.intent, sift_core::types::Intent::SearchContent);

    let logged = harness.sessions.load_turns("s2").await.unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].response, cached.response);
    assert!(logged[0].context_ids.contains(&"d1".to_string()));

    let recorded: u64 = harness
        .engine
        .orchestrator()
        .quality()
        .intent_summary()
        .values()
        .map(|s| s.turns)
        .sum();
    assert_eq!(recorded, 2);

    let next = harness.ask("s2", "Show the deploy checklist").await;
    assert_eq!(next.turn_index, 1);
}

#[tokio::test]
async fn follow_ups_are_never_answered_from_the_response_cache() {
    let evaluator = Arc::new(ScriptedEvaluator::constant(0.7, 0.9));
    let harness = TestHarness::builder()
        .with_fixtures(fixtures())
        .with_evaluator(evaluator.clone())
        .build()
        .await
        .unwrap();

    harness.ask("s1", "Find the auth bug").await;
    let first = harness.ask("s1", "who fixed it?").await;
    assert!(!first.from_response_cache);

    harness.ask("s2", "Show the deploy checklist").await;
    let second = harness.ask("s2", "who fixed it?").await;
    assert!(!second.from_response_cache);
    assert_eq!(evaluator.calls(), 4);

    let logged = harness.sessions.load_turns("s2").await.unwrap();
    assert_eq!(logged.len(), 2);
    assert!(logged[1].references_previous_turn);

    // Opening a session with the same words is not a follow-up, and the
    // follow-up answers were never stored.
    let opening = harness.ask("s3", "who fixed it?").await;
    assert!(!opening.from_response_cache);
}

#[tokio::test]
async fn failed_channel_still_yields_partial_context() {
    let harness = TestHarness::builder()
        .with_fixtures(fixtures())
        .with_failing_events()
        .with_evaluator(Arc::new(ScriptedEvaluator::constant(0.7, 0.9)))
        .build()
        .await
        .unwrap();

    let outcome = harness.ask("s1", "Find me the auth bug").await;
    assert!(!outcome.errored);

    let request = harness.generator.last_request().await.unwrap();
    assert_eq!(
        request.context.provenance.failed_sources,
        vec![ResultSource::Event]
    );
    assert!(request.context.events.is_empty());
    assert!(!request.context.content.is_empty());
}

#[tokio::test]
async fn session_store_failure_does_not_fail_the_turn() {
    let harness = TestHarness::builder()
        .with_failing_sessions()
        .with_evaluator(Arc::new(ScriptedEvaluator::constant(0.7, 0.9)))
        .build()
        .await
        .unwrap();

    let outcome = harness.ask("s1", "Find me the auth bug").await;
    assert!(!outcome.errored);
    assert_eq!(outcome.turn_index, 0);
}

#[tokio::test]
async fn sixth_turn_compresses_the_session() {
    let harness = TestHarness::builder()
        .configure(|c| {
            c.memory.compression_threshold = 5;
            c.memory.max_recent_turns = 3;
        })
        .with_evaluator(Arc::new(ScriptedEvaluator::constant(0.7, 0.9)))
        .build()
        .await
        .unwrap();

    let queries = [
        "Find the auth bug",
        "Who fixed the login issue?",
        "Show the deploy checklist",
        "Any pending reviews?",
        "What did Alice merge?",
        "Summarize the budget notes",
    ];
    let mut outcomes = Vec::new();
    for query in queries {
        outcomes.push(harness.ask("s1", query).await);
    }

    let compressed: Vec<bool> = outcomes.iter().map(|o| o.compressed).collect();
    assert_eq!(compressed, [false, false, false, false, false, true]);

    let snapshot = harness.sessions.get_snapshot("s1").await.unwrap().unwrap();
    let memory = snapshot.compressed.as_ref().unwrap();
    assert_eq!(memory.recent_context.len(), 3);
    assert_eq!(memory.compression_count, 1);
    assert_eq!(memory.last_turn_index, 4);
    assert_eq!(snapshot.turns.len(), 4);
    assert_eq!(snapshot.next_turn_index, 6);

    // Compressed memory reaches the generation request.
    let request = harness.generator.last_request().await.unwrap();
    assert!(request.memory.profile.is_some());
    assert_eq!(request.memory.recent_turns.len(), 3);
}

#[tokio::test]
async fn turns_are_logged_durably_per_session() {
    let harness = TestHarness::builder()
        .with_sqlite_sessions()
        .with_evaluator(Arc::new(ScriptedEvaluator::constant(0.7, 0.9)))
        .build()
        .await
        .unwrap();

    harness.ask("s1", "Find the auth bug").await;
    harness.ask("s1", "Who fixed it?").await;
    harness.ask("s2", "Show the deploy checklist").await;

    let s1 = harness.sessions.load_turns("s1").await.unwrap();
    let indices: Vec<u64> = s1.iter().map(|t| t.turn_index).collect();
    assert_eq!(indices, [0, 1]);
    assert_eq!(harness.sessions.load_turns("s2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_turns_in_one_session_are_serialized() {
    let harness = TestHarness::builder()
        .with_evaluator(Arc::new(ScriptedEvaluator::constant(0.7, 0.9)))
        .build()
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        harness.ask("s1", "Find the auth bug"),
        harness.ask("s1", "Show the deploy checklist"),
    );
    let mut indices = vec![a.turn_index, b.turn_index];
    indices.sort_unstable();
    assert_eq!(indices, [0, 1]);
}

#[tokio::test]
async fn feedback_is_dropped_while_learning_is_disabled() {
    let harness = TestHarness::builder().build().await.unwrap();
    harness.engine.record_feedback(sift_core::types::Feedback {
        session_id: "s1".into(),
        relevance_score: 0.9,
        completeness_score: 0.8,
        helpful: true,
    });
    assert_eq!(harness.engine.orchestrator().quality().dropped(), 1);
}
