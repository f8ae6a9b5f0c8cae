//! Multi-turn conversations through the library API.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use tutor_context::config::Config;
use tutor_context::sweeper::spawn_sweeper;
use tutor_context::tutor::Tutor;
use tutor_context_core::assemble::AssemblyParams;
use tutor_context_core::guardrail::{ResponseGuardrail, Verdict};
use tutor_context_core::memory::{ConversationStore, ManualClock, StoreParams};
use tutor_context_core::models::{RetrievedResult, Role};

fn passages() -> Vec<RetrievedResult> {
    vec![
        RetrievedResult::new("fees-1", "Tuition is due on the first of May.", 0.91),
        RetrievedResult::new("fees-2", "A late fee of 50 pounds applies after ten days.", 0.74),
    ]
}

#[test]
fn test_follow_up_question_sees_previous_turn() {
    let tutor = Tutor::from_config(&Config::default()).unwrap();

    let first = tutor.begin_turn("When is tuition due?", None, Some("student-7"), &passages());
    let answer = tutor.complete_turn(&first, "Tuition is due on the first of May.");
    assert_eq!(answer.verdict, Verdict::Accepted);

    let second = tutor.begin_turn(
        "What if I pay late?",
        Some(&first.session_id),
        Some("student-7"),
        &passages(),
    );
    let rendered = second.context.render();
    assert!(rendered.starts_with("Previous conversation:\nUser: When is tuition due?\nAssistant:"));
    assert!(!rendered.contains("What if I pay late?"));

    let summary = tutor.store().unwrap().summary(&first.session_id).unwrap();
    assert_eq!(summary.message_count, 3);
    assert_eq!(summary.student_id.as_deref(), Some("student-7"));
}

#[test]
fn test_long_conversation_keeps_latest_messages() {
    let mut config = Config::default();
    config.memory.max_conversation_history = 4;
    let tutor = Tutor::from_config(&config).unwrap();

    let mut session = None;
    for i in 0..5 {
        let question = format!("Question {}", i);
        let turn = tutor.begin_turn(&question, session.as_deref(), None, &passages());
        tutor.complete_turn(&turn, &format!("Answer number {} is here.", i));
        session = Some(turn.session_id);
    }

    let id = session.unwrap();
    let history = tutor.store().unwrap().get_history(&id, None);
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].content, "Question 3");
    assert_eq!(history[3].content, "Answer number 4 is here.");
    assert_eq!(history[3].role, Role::Assistant);
}

#[test]
fn test_overlong_answer_is_truncated_and_recorded() {
    let tutor = Tutor::new(
        Some(Arc::new(ConversationStore::new(StoreParams::default()))),
        AssemblyParams::default(),
        ResponseGuardrail::new(10, 500).unwrap(),
        0.7,
    );
    let turn = tutor.begin_turn("Tell me everything about fees.", None, None, &passages());
    let long_answer = "Tuition is due on the first of May. ".repeat(56);
    assert!(long_answer.chars().count() >= 2000);

    let outcome = tutor.complete_turn(&turn, &long_answer);
    assert_eq!(outcome.verdict, Verdict::Truncated);
    assert!(outcome.text.chars().count() <= 500);
    assert!(outcome.text.ends_with('.'));

    let history = tutor.store().unwrap().get_history(&turn.session_id, None);
    assert_eq!(history.last().unwrap().content, outcome.text);
}

#[tokio::test]
async fn test_concurrent_sessions_do_not_interfere() {
    let tutor = Arc::new(Tutor::from_config(&Config::default()).unwrap());

    let mut handles = Vec::new();
    for student in 0..8 {
        let tutor = tutor.clone();
        handles.push(tokio::spawn(async move {
            let student_id = format!("student-{}", student);
            let mut session: Option<String> = None;
            for i in 0..3 {
                let turn = tutor.begin_turn(
                    &format!("{} asks {}", student_id, i),
                    session.as_deref(),
                    Some(&student_id),
                    &passages(),
                );
                tutor.complete_turn(&turn, &format!("Reply {} for {}.", i, student_id));
                session = Some(turn.session_id);
            }
            (student_id, session.unwrap())
        }));
    }

    for handle in handles {
        let (student_id, session_id) = handle.await.unwrap();
        let history = tutor.store().unwrap().get_history(&session_id, None);
        assert_eq!(history.len(), 6);
        assert!(history.iter().all(|m| m.content.contains(&student_id)));
    }
}

#[tokio::test]
async fn test_idle_session_expires_and_is_swept() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap(),
    ));
    let params = StoreParams::new(10, chrono::Duration::hours(24), 4).unwrap();
    let store = Arc::new(ConversationStore::with_clock(params, clock.clone()));
    let tutor = Tutor::new(
        Some(store.clone()),
        AssemblyParams::default(),
        ResponseGuardrail::default(),
        0.7,
    );

    let turn = tutor.begin_turn("When is tuition due?", None, None, &passages());
    tutor.complete_turn(&turn, "Tuition is due on the first of May.");
    clock.advance(chrono::Duration::hours(25));

    assert!(store.is_expired(&turn.session_id));
    let handle = spawn_sweeper(store.clone(), Duration::from_millis(10));
    for _ in 0..100 {
        if store.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();
    assert!(store.is_empty());

    let resumed = tutor.begin_turn("Hello again", Some(&turn.session_id), None, &passages());
    assert!(resumed.history.is_empty());
    assert_eq!(store.get_history(&turn.session_id, None).len(), 1);
}
