use super::{ndjson, Harness, CHAT_PATH, MULTIPART_PATH};
use courier_core::{
    CancellationToken, ChatEvent, Citation, DispatchError, FileAttachment, OutgoingChatMessage,
    StreamError,
};
use serde_json::json;
use std::time::{Duration, Instant};
use wiremock::matchers::{body_json, body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn question() -> OutgoingChatMessage {
    OutgoingChatMessage::new("docs", "Where is the onboarding guide?")
}

async fn failure_for(status: u16) -> (DispatchError, Harness) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(status).set_body_string("failure"))
        .expect(1)
        .mount(&server)
        .await;
    let harness = Harness::new(&server);
    let err = harness
        .dispatcher()
        .send(&question(), &CancellationToken::new())
        .await
        .err()
        .expect("dispatch should fail");
    (err, harness)
}

#[tokio::test]
async fn plain_message_streams_text_and_citations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_json(json!({
            "message": "Where is the onboarding guide?",
            "assistantName": "docs"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(
                ndjson(&[
                    json!({"type": "text", "text": "It is in "}),
                    json!({"type": "text", "text": "the handbook."}),
                    json!({"type": "source", "title": "Handbook", "url": "https://example.com/hb"}),
                ]),
                "application/x-ndjson",
            ),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(MULTIPART_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let harness = Harness::new(&server);
    let reply = harness
        .dispatcher()
        .dispatch(&question(), CancellationToken::new())
        .await
        .expect("dispatch")
        .collect_reply()
        .await
        .expect("reply");

    assert_eq!(reply.text, "It is in the handbook.");
    assert_eq!(
        reply.sources,
        [Citation {
            title: "Handbook".into(),
            url: Some("https://example.com/hb".into()),
            excerpt: None,
        }]
    );
    server.verify().await;
}

#[tokio::test]
async fn attachments_go_to_the_multipart_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(MULTIPART_PATH))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(body_string_contains("\"assistantName\":\"docs\""))
        .and(body_string_contains("filename=\"notes.txt\""))
        .and(body_string_contains("remember the milk"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            ndjson(&[json!({"type": "text", "text": "Noted."})]),
            "application/x-ndjson",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let harness = Harness::new(&server);
    let message = question().with_file(FileAttachment::new(
        "notes.txt",
        "text/plain",
        "remember the milk",
    ));
    let mut events = harness
        .dispatcher()
        .dispatch(&message, CancellationToken::new())
        .await
        .expect("dispatch");

    assert_eq!(
        events.next_event().await.expect("event").expect("ok"),
        ChatEvent::Text {
            text: "Noted.".into()
        }
    );
    server.verify().await;
}

#[tokio::test]
async fn server_error_is_classified() {
    let (err, harness) = failure_for(500).await;
    assert!(matches!(err, DispatchError::ServerError));
    assert!(harness.navigator.visits().is_empty());
}

#[tokio::test]
async fn missing_assistant_is_not_found() {
    let (err, _) = failure_for(404).await;
    assert!(matches!(err, DispatchError::NotFound));
}

#[tokio::test]
async fn other_statuses_are_unclassified() {
    let (err, harness) = failure_for(418).await;
    assert!(matches!(err, DispatchError::Unclassified { status } if status.as_u16() == 418));
    assert_eq!(harness.stored_redirect(), None);
}

#[tokio::test]
async fn session_expiry_redirects_once_and_reraises() {
    let (err, harness) = failure_for(499).await;
    assert!(matches!(err, DispatchError::SessionExpired));
    assert_eq!(harness.stored_redirect().as_deref(), Some("/assistants/docs"));
    assert_eq!(harness.navigator.visits(), [harness.settings.auth_url.to_string()]);
}

#[tokio::test]
async fn success_without_body_is_unclassified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let harness = Harness::new(&server);
    let err = harness
        .dispatcher()
        .send(&question(), &CancellationToken::new())
        .await
        .err()
        .expect("empty body should fail");
    assert!(matches!(err, DispatchError::Unclassified { status } if status.as_u16() == 200));
}

#[tokio::test]
async fn cancelling_a_slow_request_resolves_promptly() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .mount(&server)
        .await;

    let harness = Harness::new(&server);
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = harness
        .dispatcher()
        .send(&question(), &cancel)
        .await
        .err()
        .expect("cancelled");
    assert!(err.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(harness.navigator.visits().is_empty());
}

#[tokio::test]
async fn malformed_body_fails_after_valid_events() {
    let server = MockServer::start().await;
    let body = format!(
        "{}{{\"type\":\"text\",\"text\":\n",
        ndjson(&[json!({"type": "text", "text": "partial answer"})])
    );
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
        .mount(&server)
        .await;

    let harness = Harness::new(&server);
    let mut events = harness
        .dispatcher()
        .dispatch(&question(), CancellationToken::new())
        .await
        .expect("dispatch");

    assert_eq!(
        events.next_event().await.expect("event").expect("ok"),
        ChatEvent::Text {
            text: "partial answer".into()
        }
    );
    assert!(matches!(
        events.next_event().await,
        Some(Err(StreamError::Parse { line: 2, .. }))
    ));
    assert!(events.next_event().await.is_none());
}

/// Drain one request (headers plus `Content-Length` body) from the socket.
async fn read_request(socket: &mut tokio::net::TcpStream) {
    use tokio::io::AsyncReadExt;

    let mut request = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let read = socket.read(&mut buf).await.expect("read request");
        if read == 0 {
            return;
        }
        request.extend_from_slice(&buf[..read]);
        let text = String::from_utf8_lossy(&request);
        let Some(end) = text.find("\r\n\r\n") else {
            continue;
        };
        let length = text[..end]
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        if request.len() >= end + 4 + length {
            return;
        }
    }
}

#[tokio::test]
async fn chunked_success_without_bytes_is_unclassified() {
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        read_request(&mut socket).await;
        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: application/x-ndjson\r\n\
                  Transfer-Encoding: chunked\r\nConnection: close\r\n\r\n0\r\n\r\n",
            )
            .await
            .expect("write response");
        let _ = socket.shutdown().await;
    });

    let base = format!("http://{addr}");
    let settings =
        courier_core::ClientSettings::new(&base, &format!("{base}/login")).expect("settings");
    let dispatcher = courier_core::Dispatcher::new(
        courier_core::HttpBackend::new(&settings).expect("http backend"),
    );
    let err = dispatcher
        .send(&question(), &CancellationToken::new())
        .await
        .err()
        .expect("empty chunked body should fail");
    assert!(matches!(err, DispatchError::Unclassified { status } if status.as_u16() == 200));
}
