use super::{Harness, DIRECTORY_PATH};
use courier_core::routes::flatten;
use courier_core::{refresh_routes, RouteEntry, RouteNode, TransportError};
use std::time::Duration;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn static_table() -> Vec<RouteNode> {
    vec![
        RouteEntry::new("", "Home", "Home").into(),
        RouteEntry::new("assistants/docs", "Docs", "Documentation").into(),
    ]
}

#[tokio::test]
async fn directory_listing_adds_only_new_assistants() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"name": "docs", "displayName": "Docs Bot"},
            {"name": "hr", "displayName": "HR Helper"}
        ])))
        .expect(2)
        .mount(&server)
        .await;

    let harness = Harness::new(&server);
    let directory = harness.directory();
    let table = static_table();

    let reconciled = refresh_routes(&directory, &table).await.expect("refresh");
    let paths: Vec<&str> = flatten(&reconciled).map(|e| e.path.as_str()).collect();
    assert_eq!(paths, ["", "assistants/docs", "assistants/hr"]);
    assert_eq!(
        reconciled[2],
        RouteNode::Entry(RouteEntry::new("assistants/hr", "HR Helper", "HR Helper"))
    );

    let again = refresh_routes(&directory, &reconciled).await.expect("refresh");
    assert_eq!(again, reconciled);
    assert_eq!(table, static_table());
}

#[tokio::test]
async fn directory_failure_leaves_the_table_to_the_caller() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let harness = Harness::new(&server);
    let err = refresh_routes(&harness.directory(), &static_table())
        .await
        .unwrap_err();
    assert_eq!(err.0.status().map(|s| s.as_u16()), Some(503));
    assert!(harness.navigator.visits().is_empty());
}

#[tokio::test]
async fn directory_session_expiry_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .respond_with(ResponseTemplate::new(499))
        .expect(1)
        .mount(&server)
        .await;

    let harness = Harness::new(&server);
    harness.navigator.set_location("/");
    assert!(refresh_routes(&harness.directory(), &static_table())
        .await
        .is_err());
    assert_eq!(harness.stored_redirect().as_deref(), Some("/"));
    assert_eq!(harness.navigator.visits().len(), 1);
}

#[tokio::test]
async fn slow_directory_listing_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DIRECTORY_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut harness = Harness::new(&server);
    harness.settings.request_timeout = Duration::from_millis(100);
    let err = refresh_routes(&harness.directory(), &static_table())
        .await
        .unwrap_err();
    assert!(matches!(&err.0, TransportError::Http(inner) if inner.is_timeout()));
}
