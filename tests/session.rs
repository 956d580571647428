use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use school_messenger::chat::session::Direction;
use school_messenger::error::{SendError, SessionError};
use school_messenger::{ApiClient, ConversationView, Messenger, Profile, Role, Store, Thread, ThreadStatus};

fn guardian(server: &MockServer) -> Messenger {
    let mut profile = Profile::new(Role::Guardian);
    profile.username = Some("jdoe".into());
    Messenger::new(ApiClient::new(&server.uri()), Store::new(), Role::Guardian, profile).unwrap()
}

fn exam_thread() -> serde_json::Value {
    json!({
        "id": "t1",
        "sender_id": "guardian_jdoe",
        "recipient_id": "staff_42",
        "questions": ["When is the exam?"],
        "status": "pending",
        "created_at": "2024-01-01T00:00:00Z"
    })
}

#[tokio::test]
async fn quick_message_round_trip_stores_server_thread() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chats/requests"))
        .and(body_json(json!({
            "senderId": "guardian_jdoe",
            "recipientId": "staff_42",
            "questions": ["When is the exam?"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(exam_thread()))
        .expect(1)
        .mount(&server)
        .await;

    let mut view = ConversationView::new(guardian(&server));
    view.select("staff_42");
    view.set_compose("When is the exam?");

    let thread = view.send_quick_message().await.unwrap();
    assert_eq!(thread.id, "t1");
    assert_eq!(view.compose(), "");
    assert!(!view.is_sending());

    let store = view.messenger().store().clone();
    let threads = store.requests_by_user("staff_42");
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].id, "t1");

    // The same thread arriving again over the socket must not duplicate.
    let pushed: Thread = serde_json::from_value(exam_thread()).unwrap();
    store.add_request("staff_42", pushed);
    assert_eq!(store.requests_by_user("staff_42").len(), 1);

    let bubbles = view.bubbles();
    assert_eq!(bubbles.len(), 1);
    assert_eq!(bubbles[0].direction, Direction::Sent);
}

#[tokio::test]
async fn failed_send_keeps_compose_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chats/requests"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut view = ConversationView::new(guardian(&server));
    view.select("staff_42");
    view.set_compose("Is school open tomorrow?");

    let err = view.send_quick_message().await.unwrap_err();
    assert!(matches!(err, SendError::Api(_)));
    assert_eq!(view.compose(), "Is school open tomorrow?");
    assert!(!view.is_sending());
    assert!(view.threads().is_empty());
}

#[tokio::test]
async fn nothing_is_sent_without_text_or_counterpart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chats/requests"))
        .respond_with(ResponseTemplate::new(201).set_body_json(exam_thread()))
        .expect(0)
        .mount(&server)
        .await;

    let mut view = ConversationView::new(guardian(&server));
    view.set_compose("hello");
    assert!(matches!(view.send_quick_message().await, Err(SendError::NoCounterpart)));

    view.select("staff_42");
    view.set_compose("   ");
    assert!(matches!(view.send_quick_message().await, Err(SendError::EmptyMessage)));
    assert!(matches!(view.send_multi_message().await, Err(SendError::EmptyMessage)));
}

#[tokio::test]
async fn multi_message_sends_non_empty_drafts_in_one_call() {
    let server = MockServer::start().await;
    let mut reply = exam_thread();
    reply["questions"] = json!(["Homework?", "Uniform?"]);
    Mock::given(method("POST"))
        .and(path("/api/chats/requests"))
        .and(body_json(json!({
            "senderId": "guardian_jdoe",
            "recipientId": "staff_42",
            "questions": ["Homework?", "Uniform?"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": reply})))
        .expect(1)
        .mount(&server)
        .await;

    let mut view = ConversationView::new(guardian(&server));
    view.select("staff_42");
    view.push_draft("Homework?");
    view.push_draft("  ");
    view.push_draft("Uniform?");

    let thread = view.send_multi_message().await.unwrap();
    assert_eq!(thread.questions.len(), 2);
    assert!(view.drafts().is_empty());
}

#[tokio::test]
async fn history_is_filed_under_each_counterpart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/user/staff_42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a", "sender_id": "guardian_a", "recipient_id": "staff_42",
             "questions": ["q1"], "status": "pending", "created_at": "2024-03-01T10:00:00Z"},
            {"id": "b", "sender_id": "staff_42", "recipient_id": "guardian_b",
             "questions": ["q2"], "status": "responded", "created_at": "2024-03-02T10:00:00Z",
             "responses": [{"answer": "ok", "timestamp": "2024-03-02T11:00:00Z"}]}
        ])))
        .mount(&server)
        .await;

    let mut profile = Profile::new(Role::Teacher);
    profile.global_staff_id = Some("42".into());
    let messenger = Messenger::new(ApiClient::new(&server.uri()), Store::new(), Role::Teacher, profile).unwrap();

    assert_eq!(messenger.load_history().await, 2);
    let store = messenger.store();
    assert_eq!(store.requests_by_user("guardian_a")[0].id, "a");
    assert_eq!(store.requests_by_user("guardian_b")[0].id, "b");
    assert_eq!(store.counterparts(), ["guardian_b", "guardian_a"]);

    let mut view = ConversationView::new(messenger.clone());
    view.select("guardian_a");
    assert_eq!(view.bubbles()[0].direction, Direction::Received);
}

#[tokio::test]
async fn history_keeps_threads_with_odd_timestamps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/chats/user/staff_42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "sql", "sender_id": "guardian_a", "recipient_id": "staff_42",
             "questions": ["q1"], "status": "pending", "created_at": "2024-03-01 10:00:00"},
            {"id": "junk", "sender_id": "guardian_a", "recipient_id": "staff_42",
             "questions": ["q2"], "status": "pending", "created_at": "yesterday-ish"},
            {"id": "iso", "sender_id": "guardian_a", "recipient_id": "staff_42",
             "questions": ["q3"], "status": "pending", "created_at": "2024-03-02T10:00:00Z"},
            {"id": "blank", "sender_id": "guardian_a", "recipient_id": "staff_42",
             "questions": [], "status": "pending", "created_at": "2024-03-03T10:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let mut profile = Profile::new(Role::Teacher);
    profile.global_staff_id = Some("42".into());
    let messenger = Messenger::new(ApiClient::new(&server.uri()), Store::new(), Role::Teacher, profile).unwrap();

    assert_eq!(messenger.load_history().await, 3);
    let ids: Vec<_> = messenger.store().requests_by_user("guardian_a").into_iter().map(|t| t.id).collect();
    assert_eq!(ids, ["iso", "sql", "junk"]);
}

#[tokio::test]
async fn respond_without_echo_marks_thread_responded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chats/requests/a/respond"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let mut profile = Profile::new(Role::Teacher);
    profile.global_staff_id = Some("42".into());
    let messenger = Messenger::new(ApiClient::new(&server.uri()), Store::new(), Role::Teacher, profile).unwrap();
    let incoming: Thread = serde_json::from_value(json!({
        "id": "a", "sender_id": "guardian_a", "recipient_id": "staff_42",
        "questions": ["q1"], "status": "pending"
    }))
    .unwrap();
    messenger.store().add_request("guardian_a", incoming);

    messenger.respond("a", vec!["Next Monday".into()]).await.unwrap();

    assert_eq!(messenger.store().requests_by_user("guardian_a")[0].status, ThreadStatus::Responded);
}

#[test]
fn teacher_without_staff_id_cannot_mount() {
    let mut profile = Profile::new(Role::Teacher);
    profile.username = Some("abebe".into());
    let result = Messenger::new(ApiClient::new("http://127.0.0.1:9"), Store::new(), Role::Teacher, profile);
    assert!(matches!(result, Err(SessionError::Identity(_))));
}
