//! Classroom scenarios driven through the Dispatcher.

use chrono::{TimeZone, Utc};
use serde_json::Value;

use coeus_core::{AttendanceId, ClassSessionId, Question, QuestionId, SectionId, UserId};
use coeusd::connection::{outbound_channel, OutboundQueue};
use coeusd::dispatch::Dispatcher;
use coeusd::registry::{spawn_registry, RegistryHandle, Scope};

async fn connect(handle: &RegistryHandle, scope: Scope, capacity: usize) -> OutboundQueue {
    let (outbound, queue) = outbound_channel(capacity);
    handle.register(scope, outbound).await.unwrap();
    queue
}

fn drain(queue: &mut OutboundQueue) -> Vec<Value> {
    let mut out = Vec::new();
    while let Some(payload) = queue.try_next() {
        out.push(serde_json::from_str(&payload).unwrap());
    }
    out
}

fn actions(events: &[Value]) -> Vec<&str> {
    events
        .iter()
        .map(|e| e["action"].as_str().unwrap_or_default())
        .collect()
}

#[tokio::test]
async fn test_new_question_envelope() {
    let handle = spawn_registry();
    let dispatcher = Dispatcher::new(handle.clone());
    let mut student = connect(&handle, Scope::Session(ClassSessionId::new(10)), 1).await;

    let question = Question::posted(
        QuestionId::new(5),
        ClassSessionId::new(10),
        UserId::new(1),
        "What is a monad?",
        Utc.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap(),
    );
    dispatcher.new_question(ClassSessionId::new(10), &question);
    handle.stats().await;

    let raw = student.try_next().expect("question should be delivered");
    assert_eq!(
        &*raw,
        r#"{"action":"new-question","userID":1,"questionID":5,"sessionID":10,"text":"What is a monad?","votes":0,"answered":false,"createdAt":"14:05"}"#
    );
}

#[tokio::test]
async fn test_class_session_timeline() {
    let handle = spawn_registry();
    let dispatcher = Dispatcher::new(handle.clone());
    let session = ClassSessionId::new(7);

    let mut dashboard = connect(&handle, Scope::Global, 16).await;
    let mut student = connect(&handle, Scope::Session(session), 16).await;
    let mut other_class = connect(&handle, Scope::Session(ClassSessionId::new(8)), 16).await;

    dispatcher.start_session(session, SectionId::new(7), AttendanceId::new(42));
    dispatcher.participant_joined(session, 1);
    dispatcher.new_question(
        session,
        &Question::posted(
            QuestionId::new(3),
            session,
            UserId::new(9),
            "Is this on the exam?",
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ),
    );
    dispatcher.vote_up(session, UserId::new(2), QuestionId::new(3), 1);
    dispatcher.mark_question(session, QuestionId::new(3));
    dispatcher.end_session(session, SectionId::new(7));
    handle.stats().await;

    let seen = drain(&mut student);
    assert_eq!(
        actions(&seen),
        vec![
            "start-session",
            "participant-joined",
            "new-question",
            "vote-up",
            "mark-question",
            "end-session",
        ]
    );
    assert_eq!(seen[4]["answered"], true);

    let global = drain(&mut dashboard);
    assert_eq!(actions(&global), vec!["start-session", "end-session"]);
    assert_eq!(global[0]["attendanceID"], 42);

    assert!(drain(&mut other_class).is_empty());
}

#[tokio::test]
async fn test_dispatch_without_listeners_is_harmless() {
    let handle = spawn_registry();
    let dispatcher = Dispatcher::new(handle.clone());

    dispatcher.vote_up(ClassSessionId::new(1), UserId::new(1), QuestionId::new(1), 1);
    dispatcher.end_session(ClassSessionId::new(1), SectionId::new(1));

    let stats = handle.stats().await;
    assert_eq!(stats.connections, 0);
    assert!(stats.sessions.is_empty());
}
