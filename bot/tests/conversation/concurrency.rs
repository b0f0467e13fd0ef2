//! Concurrent turns, timeouts and swaps during inference

use std::time::Duration;

use muicebot::muice::ChatRequest;

use super::support::{pair, FakeState, Harness};

#[tokio::test]
async fn test_concurrent_refreshes_keep_single_entry() {
    let h = Harness::loaded(
        FakeState::new()
            .with_replies(&["r1", "r2", "r3"])
            .with_delay(Duration::from_millis(20)),
    )
    .await;
    h.muice.ask(ChatRequest::new("q1", "u1")).await;

    let (a, b) = tokio::join!(h.muice.refresh("u1"), h.muice.refresh("u1"));

    assert_eq!((a.as_str(), b.as_str()), ("r2", "r3"));
    assert_eq!(h.memory("u1").await, vec![pair("q1", "r3")]);
    assert_eq!(h.db.count_all_items("u1").unwrap(), 1);
}

#[tokio::test]
async fn test_same_user_turns_persist_in_call_order() {
    let h = Harness::loaded(FakeState::new().with_delay(Duration::from_millis(30))).await;

    let (first, second) = tokio::join!(
        h.muice.ask(ChatRequest::new("first", "u1")),
        h.muice.ask(ChatRequest::new("second", "u1")),
    );

    assert_eq!(first, "reply to first");
    assert_eq!(second, "reply to second");
    assert_eq!(
        h.memory("u1").await,
        vec![pair("first", "reply to first"), pair("second", "reply to second")]
    );

    let calls = h.fake.calls();
    assert_eq!(calls[1].history, vec![pair("first", "reply to first")]);
    assert_eq!(h.fake.max_in_flight(), 1);
}

#[tokio::test]
async fn test_different_users_run_in_parallel() {
    let h = Harness::loaded(FakeState::new().with_delay(Duration::from_millis(100))).await;

    tokio::join!(
        h.muice.ask(ChatRequest::new("hi", "alice")),
        h.muice.ask(ChatRequest::new("hi", "bob")),
    );

    assert_eq!(h.fake.max_in_flight(), 2);
}

#[tokio::test]
async fn test_slow_model_times_out() {
    let h = Harness::loaded_with_timeout(
        FakeState::new().with_delay(Duration::from_secs(5)),
        Duration::from_millis(50),
    )
    .await;

    let reply = h.muice.ask(ChatRequest::new("hello", "u1")).await;

    assert_eq!(reply, "(模型响应超时)");
    assert!(h.memory("u1").await.is_empty());
}

#[tokio::test]
async fn test_swap_waits_for_inflight_inference() {
    let h = Harness::loaded(FakeState::new().with_delay(Duration::from_millis(100))).await;

    let (reply, switched) = tokio::join!(h.muice.ask(ChatRequest::new("hi", "u1")), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        h.muice.change_model_config("vision").await
    });

    assert_eq!(reply, "reply to hi");
    assert_eq!(switched, "已成功加载 vision");
    assert_eq!(h.memory("u1").await, vec![pair("hi", "reply to hi")]);
}
