//! Conversation turns and history persistence

use std::sync::atomic::Ordering;
use std::time::Duration;

use muicebot::muice::ChatRequest;

use super::support::{pair, FakeState, Harness};

// =============================================================================
// ask
// =============================================================================

#[tokio::test]
async fn test_ask_shows_thought_but_persists_answer() {
    let h = Harness::loaded(
        FakeState::new().with_replies(&["<think>let me think\nabout greetings</think>\n\nHello there"]),
    )
    .await;

    let reply = h.muice.ask(ChatRequest::new("hi", "u1")).await;

    assert_eq!(reply, "思考过程：let me think about greetings\n\nHello there");
    assert_eq!(h.memory("u1").await, vec![pair("hi", "Hello there")]);
}

#[tokio::test]
async fn test_ask_passes_prior_history() {
    let h = Harness::loaded(FakeState::new()).await;

    h.muice.ask(ChatRequest::new("first", "u1")).await;
    h.muice.ask(ChatRequest::new("second", "u1")).await;

    let calls = h.fake.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].history.is_empty());
    assert_eq!(calls[1].history, vec![pair("first", "reply to first")]);
}

#[tokio::test]
async fn test_ask_when_not_loaded_adds_nothing() {
    let h = Harness::new(FakeState::new());

    let reply = h.muice.ask(ChatRequest::new("hello?", "u1")).await;

    assert_eq!(reply, "(模型未加载)");
    assert!(h.memory("u1").await.is_empty());
    assert!(h.fake.calls().is_empty());
}

#[tokio::test]
async fn test_failed_inference_is_not_persisted() {
    let h = Harness::loaded(FakeState::new()).await;
    h.fake.fail_ask.store(true, Ordering::SeqCst);

    let reply = h.muice.ask(ChatRequest::new("hi", "u1")).await;

    assert_eq!(reply, "(模型调用失败，请稍后再试)");
    assert!(h.memory("u1").await.is_empty());
}

#[tokio::test]
async fn test_history_is_per_user() {
    let h = Harness::loaded(FakeState::new()).await;

    h.muice.ask(ChatRequest::new("from alice", "alice")).await;
    h.muice.ask(ChatRequest::new("from bob", "bob")).await;

    assert_eq!(h.memory("alice").await, vec![pair("from alice", "reply to from alice")]);
    assert_eq!(h.memory("bob").await, vec![pair("from bob", "reply to from bob")]);
}

#[tokio::test]
async fn test_group_and_username_are_stored() {
    let h = Harness::loaded(FakeState::new()).await;

    h.muice
        .ask(
            ChatRequest::new("hi", "10001")
                .with_username("Alice")
                .with_group("42"),
        )
        .await;

    let entries = h.db.get_history("10001").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].username, "Alice");
    assert_eq!(entries[0].group_id.as_deref(), Some("42"));
}

#[tokio::test]
async fn test_text_model_ignores_images() {
    let h = Harness::loaded(FakeState::new()).await;

    h.muice
        .ask(ChatRequest::new("look", "u1").with_images(vec!["/tmp/cat.png".into()]))
        .await;

    let calls = h.fake.calls();
    assert!(!calls[0].vision);
    assert!(calls[0].images.is_empty());
}

// =============================================================================
// refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_without_history() {
    let h = Harness::loaded(FakeState::new()).await;

    let reply = h.muice.refresh("u1").await;

    assert_eq!(reply, "你都还没和我说过一句话呢，得和我至少聊上一段才能刷新哦");
    assert!(h.fake.calls().is_empty());
}

#[tokio::test]
async fn test_refresh_replaces_last_answer() {
    let h = Harness::loaded(FakeState::new().with_replies(&["r1", "r2", "r3"])).await;

    h.muice.ask(ChatRequest::new("q1", "u1")).await;
    h.muice.ask(ChatRequest::new("q2", "u1")).await;
    let reply = h.muice.refresh("u1").await;

    assert_eq!(reply, "r3");
    assert_eq!(h.memory("u1").await, vec![pair("q1", "r1"), pair("q2", "r3")]);
    assert_eq!(h.db.count_all_items("u1").unwrap(), 2);

    // The regenerated turn must not see its own old answer
    let calls = h.fake.calls();
    assert_eq!(calls[2].prompt, "q2");
    assert_eq!(calls[2].history, vec![pair("q1", "r1")]);
}

#[tokio::test]
async fn test_refresh_failure_keeps_old_answer() {
    let h = Harness::loaded(FakeState::new().with_replies(&["r1"])).await;
    h.muice.ask(ChatRequest::new("q1", "u1")).await;

    h.fake.fail_ask.store(true, Ordering::SeqCst);
    let reply = h.muice.refresh("u1").await;

    assert_eq!(reply, "(模型调用失败，请稍后再试)");
    assert_eq!(h.memory("u1").await, vec![pair("q1", "r1")]);
}

#[tokio::test]
async fn test_refresh_when_not_loaded_keeps_history() {
    let h = Harness::loaded(FakeState::new().with_replies(&["r1"])).await;
    h.muice.ask(ChatRequest::new("q1", "u1")).await;

    h.fake.fail_load.store(true, Ordering::SeqCst);
    h.muice.change_model_config("model").await;
    let reply = h.muice.refresh("u1").await;

    assert_eq!(reply, "(模型未加载)");
    assert_eq!(h.memory("u1").await, vec![pair("q1", "r1")]);
    assert_eq!(h.fake.calls().len(), 1);
}

#[tokio::test]
async fn test_refresh_without_history_checked_before_model() {
    let h = Harness::new(FakeState::new());

    let reply = h.muice.refresh("u1").await;

    assert_eq!(reply, "你都还没和我说过一句话呢，得和我至少聊上一段才能刷新哦");
}

#[tokio::test]
async fn test_refresh_timeout_keeps_old_answer() {
    let h = Harness::loaded_with_timeout(
        FakeState::new().with_replies(&["r1", "r2"]),
        Duration::from_millis(50),
    )
    .await;
    h.muice.ask(ChatRequest::new("q1", "u1")).await;

    h.fake.set_delay(Duration::from_secs(5));
    let reply = h.muice.refresh("u1").await;

    assert_eq!(reply, "(模型响应超时)");
    assert_eq!(h.memory("u1").await, vec![pair("q1", "r1")]);
    assert_eq!(h.db.count_all_items("u1").unwrap(), 1);
}

#[tokio::test]
async fn test_refresh_keeps_group_and_images() {
    let h = Harness::loaded(FakeState::new()).await;
    h.muice
        .ask(
            ChatRequest::new("q1", "u1")
                .with_group("7")
                .with_images(vec!["/tmp/a.png".into()]),
        )
        .await;

    h.muice.refresh("u1").await;

    let entries = h.db.get_history("u1").unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].group_id.as_deref(), Some("7"));
    assert_eq!(entries[0].images, vec![std::path::PathBuf::from("/tmp/a.png")]);
}

// =============================================================================
// undo / reset
// =============================================================================

#[tokio::test]
async fn test_undo_twice_empties_history() {
    let h = Harness::loaded(FakeState::new()).await;
    h.muice.ask(ChatRequest::new("a", "u1")).await;
    h.muice.ask(ChatRequest::new("b", "u1")).await;

    assert_eq!(h.muice.undo("u1").await, "已成功撤销上一段对话~");
    assert_eq!(h.memory("u1").await, vec![pair("a", "reply to a")]);

    assert_eq!(h.muice.undo("u1").await, "已成功撤销上一段对话~");
    assert!(h.memory("u1").await.is_empty());

    // Nothing left; still acknowledged
    assert_eq!(h.muice.undo("u1").await, "已成功撤销上一段对话~");
}

#[tokio::test]
async fn test_undo_after_reset_leaves_hidden_rows() {
    let h = Harness::loaded(FakeState::new()).await;
    h.muice.ask(ChatRequest::new("a", "u1")).await;
    h.muice.reset("u1").await;

    h.muice.undo("u1").await;

    assert_eq!(h.db.count_all_items("u1").unwrap(), 1);
}

#[tokio::test]
async fn test_reset_hides_history() {
    let h = Harness::loaded(FakeState::new()).await;
    h.muice.ask(ChatRequest::new("a", "u1")).await;
    h.muice.ask(ChatRequest::new("b", "u1")).await;

    assert_eq!(h.muice.reset("u1").await, "已成功移除对话历史~");
    assert!(h.memory("u1").await.is_empty());
    assert_eq!(h.db.count_all_items("u1").unwrap(), 2);

    h.muice.ask(ChatRequest::new("c", "u1")).await;
    let calls = h.fake.calls();
    assert!(calls[2].history.is_empty());
}

#[tokio::test]
async fn test_refresh_after_reset_has_nothing_to_refresh() {
    let h = Harness::loaded(FakeState::new()).await;
    h.muice.ask(ChatRequest::new("a", "u1")).await;
    h.muice.reset("u1").await;

    let reply = h.muice.refresh("u1").await;

    assert_eq!(reply, "你都还没和我说过一句话呢，得和我至少聊上一段才能刷新哦");
}
