use super::{ndjson, CHAT_PATH, DIRECTORY_PATH};
use courier::CourierSession;
use courier_core::{
    CancellationToken, ChatEvent, ClientSettings, MemoryRedirectStore, OutgoingChatMessage,
    RedirectStore, RouteEntry,
};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn session(server: &MockServer, store: Arc<MemoryRedirectStore>) -> CourierSession {
    let settings = ClientSettings::new(&server.uri(), "https://auth.example.com/start")
        .expect("settings")
        .with_routes(vec![RouteEntry::new("", "Home", "Home").into()]);
    CourierSession::new(settings, store).expect("session")
}

#[tokio::test]
async fn chat_forwards_events_as_they_arrive() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            ndjson(&[
                json!({"type": "text", "text": "Hi "}),
                json!({"type": "text", "text": "there"}),
            ]),
            "application/x-ndjson",
        ))
        .mount(&server)
        .await;

    let session = session(&server, Arc::new(MemoryRedirectStore::new()));
    let mut seen = Vec::new();
    let reply = session
        .chat(
            &OutgoingChatMessage::new("docs", "hello"),
            CancellationToken::new(),
            |event| seen.push(event.clone()),
        )
        .await
        .expect("chat");

    assert_eq!(reply.text, "Hi there");
    assert_eq!(seen.len(), 2);
    assert!(matches!(&seen[0], ChatEvent::Text { text } if text == "Hi "));
}

#[tokio::test]
async fn expired_chat_stores_the_assistant_view() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(499))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryRedirectStore::new());
    let session = session(&server, store.clone());
    let err = session
        .chat(
            &OutgoingChatMessage::new("docs", "hello"),
            CancellationToken::new(),
            |_| {},
        )
        .await
        .unwrap_err();

    assert!(!err.is_cancelled());
    assert_eq!(store.get().as_deref(), Some("/assistants/docs"));
    assert_eq!(
        session.navigator().pending_sign_in().as_deref(),
        Some("https://auth.example.com/start")
    );
    assert_eq!(session.stored_redirect().as_deref(), Some("/assistants/docs"));
}

#[tokio::test]
async fn routes_merge_directory_into_static_table() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{"name": "hr", "displayName": "HR Helper"}])),
        )
        .mount(&server)
        .await;

    let session = session(&server, Arc::new(MemoryRedirectStore::new()));
    let routes = session.routes().await.expect("routes");
    assert_eq!(routes.len(), 2);
    assert_eq!(routes[1].label(), "HR Helper");
    assert_eq!(session.static_routes().len(), 1);
}
