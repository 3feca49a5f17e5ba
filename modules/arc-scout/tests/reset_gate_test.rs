use std::sync::Arc;

use arc_common::SessionKey;
use arc_scout::testing::{MockRelay, ResetReply};
use arc_scout::{MemoryStore, ResetGate, ResetOutcome, SessionStore};

fn gate(relay: &Arc<MockRelay>, sessions: &Arc<MemoryStore>) -> ResetGate {
    ResetGate::new(relay.clone(), sessions.clone())
}

#[tokio::test]
async fn same_session_resets_once() {
    let relay = Arc::new(MockRelay::new());
    let sessions = Arc::new(MemoryStore::new());
    let gate = gate(&relay, &sessions);
    let key = SessionKey::new("P123");

    assert_eq!(gate.ensure_reset(&key).await, ResetOutcome::Sent);
    assert_eq!(gate.ensure_reset(&key).await, ResetOutcome::AlreadyDone);
    assert_eq!(relay.count("reset"), 1);
}

#[tokio::test]
async fn new_session_key_resets_again() {
    let relay = Arc::new(MockRelay::new());
    let sessions = Arc::new(MemoryStore::new());
    let gate = gate(&relay, &sessions);

    gate.ensure_reset(&SessionKey::new("P123")).await;
    gate.ensure_reset(&SessionKey::new("P456")).await;

    assert_eq!(relay.count("reset"), 2);
    assert_eq!(
        sessions.reset_marker().await.unwrap(),
        Some(SessionKey::new("P456"))
    );
}

#[tokio::test]
async fn failed_reset_is_marked_and_not_retried() {
    let relay = Arc::new(MockRelay::new().with_reset_reply(ResetReply::Unreachable));
    let sessions = Arc::new(MemoryStore::new());
    let gate = gate(&relay, &sessions);
    let key = SessionKey::new("P123");

    assert_eq!(gate.ensure_reset(&key).await, ResetOutcome::Failed);
    assert_eq!(gate.ensure_reset(&key).await, ResetOutcome::AlreadyDone);
    assert_eq!(relay.count("reset"), 1);
}

#[tokio::test]
async fn unacknowledged_reset_counts_as_failed() {
    let relay = Arc::new(MockRelay::new().with_reset_reply(ResetReply::NotOk));
    let sessions = Arc::new(MemoryStore::new());
    let gate = gate(&relay, &sessions);

    assert_eq!(
        gate.ensure_reset(&SessionKey::new("P123")).await,
        ResetOutcome::Failed
    );
}

#[tokio::test]
async fn marker_is_shared_by_gates_on_the_same_store() {
    let relay = Arc::new(MockRelay::new());
    let sessions = Arc::new(MemoryStore::new());
    let key = SessionKey::new("P123");

    gate(&relay, &sessions).ensure_reset(&key).await;
    let outcome = gate(&relay, &sessions).ensure_reset(&key).await;

    assert_eq!(outcome, ResetOutcome::AlreadyDone);
    assert_eq!(relay.count("reset"), 1);
}
