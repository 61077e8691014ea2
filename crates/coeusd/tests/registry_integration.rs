//! Integration tests for the Registry Actor.
//!
//! These tests drive the registry as a complete system through
//! spawn_registry() and the RegistryHandle interface, observing deliveries
//! on the consumer side of each connection's outbound queue.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::sync::Arc;
use std::time::Duration;

use coeus_core::{AttendanceId, ClassSessionId, QuestionId, SectionId, UserId};
use coeusd::connection::{outbound_channel, ConnectionId, OutboundQueue, Payload};
use coeusd::dispatch::Dispatcher;
use coeusd::registry::{spawn_registry, RegistryHandle, Scope};
use tokio::time::timeout;

// ============================================================================
// Test Helpers
// ============================================================================

async fn connect(handle: &RegistryHandle, scope: Scope) -> (ConnectionId, OutboundQueue) {
    let (outbound, queue) = outbound_channel(1);
    let id = outbound.id();
    handle
        .register(scope, outbound)
        .await
        .expect("registration should succeed");
    (id, queue)
}

/// Everything delivered to `queue` so far.
///
/// Callers first await a registry round trip (e.g. `stats()`) so that every
/// earlier broadcast has been applied.
fn drain(queue: &mut OutboundQueue) -> Vec<String> {
    let mut out = Vec::new();
    while let Some(payload) = queue.try_next() {
        out.push(payload.to_string());
    }
    out
}

fn session(id: u64) -> Scope {
    Scope::Session(ClassSessionId::new(id))
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_vote_up_reaches_only_its_session() {
    let handle = spawn_registry();
    let dispatcher = Dispatcher::new(handle.clone());

    let (_a, mut a) = connect(&handle, session(10)).await;
    let (_b, mut b) = connect(&handle, session(10)).await;
    let (_c, mut c) = connect(&handle, Scope::Global).await;

    dispatcher.vote_up(ClassSessionId::new(10), UserId::new(1), QuestionId::new(5), 3);
    handle.stats().await;

    let expected = vec![r#"{"action":"vote-up","userID":1,"questionID":5,"votes":3}"#.to_string()];
    assert_eq!(drain(&mut a), expected);
    assert_eq!(drain(&mut b), expected);
    assert!(drain(&mut c).is_empty());
}

#[tokio::test]
async fn test_start_session_reaches_global_once() {
    let handle = spawn_registry();
    let dispatcher = Dispatcher::new(handle.clone());

    let (_d, mut d) = connect(&handle, Scope::Global).await;
    let (_other, mut other) = connect(&handle, session(8)).await;

    dispatcher.start_session(ClassSessionId::new(7), SectionId::new(7), AttendanceId::new(42));
    handle.stats().await;

    assert_eq!(
        drain(&mut d),
        vec![r#"{"action":"start-session","sectionID":7,"attendanceID":42}"#.to_string()]
    );
    assert!(drain(&mut other).is_empty(), "unrelated session must not see it");
}

#[tokio::test]
async fn test_unregister_then_broadcast() {
    let handle = spawn_registry();
    let dispatcher = Dispatcher::new(handle.clone());

    let (gone, mut gone_queue) = connect(&handle, session(3)).await;
    let (_stay, mut stay_queue) = connect(&handle, session(3)).await;
    assert_eq!(handle.stats().await.connections, 2);

    assert!(handle.unregister(session(3), gone).await.unwrap());
    dispatcher.participant_joined(ClassSessionId::new(3), 5);

    let stats = handle.stats().await;
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.session(ClassSessionId::new(3)), 1);
    assert!(drain(&mut gone_queue).is_empty());
    assert_eq!(
        drain(&mut stay_queue),
        vec![r#"{"action":"participant-joined","count":5}"#.to_string()]
    );
}

// ============================================================================
// Fanout Properties
// ============================================================================

#[tokio::test]
async fn test_each_connection_receives_exactly_once() {
    let handle = spawn_registry();
    let mut queues = Vec::new();
    for _ in 0..25 {
        queues.push(connect(&handle, session(42)).await.1);
    }

    handle.broadcast_session(ClassSessionId::new(42), Arc::from("event"));
    handle.stats().await;

    for queue in &mut queues {
        assert_eq!(drain(queue), vec!["event".to_string()]);
    }
}

#[tokio::test]
async fn test_broadcast_to_empty_session_is_noop() {
    let handle = spawn_registry();
    let (_g, mut global) = connect(&handle, Scope::Global).await;

    handle.broadcast_session(ClassSessionId::new(999), Arc::from("nobody"));

    let stats = handle.stats().await;
    assert_eq!(stats.session(ClassSessionId::new(999)), 0);
    assert!(stats.sessions.is_empty(), "no bucket should be created");
    assert!(drain(&mut global).is_empty());
    assert!(handle.is_connected());
}

#[tokio::test]
async fn test_full_queue_is_evicted_and_broadcaster_does_not_block() {
    let handle = spawn_registry();
    let (_slow, mut slow) = connect(&handle, session(1)).await;
    let (_fast, mut fast) = connect(&handle, session(1)).await;

    let first: Payload = Arc::from("first");
    handle.broadcast_session(ClassSessionId::new(1), Arc::clone(&first));
    handle.stats().await;
    // The fast consumer keeps up; the slow one never reads.
    assert_eq!(drain(&mut fast), vec!["first".to_string()]);

    // Broadcasting must return promptly even though `slow` is full.
    timeout(Duration::from_secs(1), async {
        handle.broadcast_session(ClassSessionId::new(1), Arc::from("second"));
    })
    .await
    .expect("broadcast should not block");

    let stats = handle.stats().await;
    assert_eq!(stats.session(ClassSessionId::new(1)), 1);
    assert!(slow.is_closed(), "evicted connection is closed");
    assert!(slow.next().await.is_none());
    assert_eq!(drain(&mut fast), vec!["second".to_string()]);

    handle.broadcast_session(ClassSessionId::new(1), Arc::from("third"));
    handle.stats().await;
    assert!(slow.try_next().is_none(), "evicted connection receives nothing further");
}

#[tokio::test]
async fn test_dropped_consumer_is_evicted_on_next_broadcast() {
    let handle = spawn_registry();
    let (_id, queue) = connect(&handle, Scope::Global).await;
    drop(queue);

    handle.broadcast_global(Arc::from("x"));
    assert_eq!(handle.stats().await.global, 0);
}

#[tokio::test]
async fn test_close_all_empties_every_scope() {
    let handle = spawn_registry();
    let (_g, global) = connect(&handle, Scope::Global).await;
    let (_s, sess) = connect(&handle, session(2)).await;

    assert_eq!(handle.close_all().await, 2);
    assert!(global.is_closed());
    assert!(sess.is_closed());
    assert_eq!(handle.stats().await.connections, 0);
}

#[tokio::test]
async fn test_concurrent_register_and_broadcast() {
    let handle = spawn_registry();

    let mut tasks = Vec::new();
    for i in 0..20u64 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let (outbound, queue) = outbound_channel(8);
            handle.register(session(i % 4), outbound).await.unwrap();
            handle.broadcast_session(ClassSessionId::new(i % 4), Arc::from("tick"));
            queue
        }));
    }

    let mut queues = Vec::new();
    for task in tasks {
        queues.push(task.await.unwrap());
    }

    let stats = handle.stats().await;
    assert_eq!(stats.connections, 20);
    assert_eq!(stats.sessions.len(), 4);
    for queue in &mut queues {
        // Each connection saw at least its own broadcast.
        assert!(!drain(queue).is_empty());
    }
}
