use httpmock::{Method::GET, MockServer};
use scholia::{ApiRequest, ScholiaError};

use crate::common;

#[tokio::test]
async fn unauthorized_surfaces_auth_error_without_retry() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(401).body("unauthorized");
    });

    let client = common::client(&server);
    let err = client
        .execute(&ApiRequest::get("works"))
        .await
        .unwrap_err();

    // Retries are configured, but auth rejections are terminal.
    mock.assert_hits(1);
    assert!(matches!(err, ScholiaError::Auth { .. }));
}

#[tokio::test]
async fn forbidden_is_an_auth_error_too() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(403);
    });

    let err = common::client(&server)
        .execute(&ApiRequest::get("works"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScholiaError::Auth { .. }));
}

#[tokio::test]
async fn missing_resource_surfaces_not_found() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(404);
    });

    let err = common::client(&server)
        .execute(&ApiRequest::get("works"))
        .await
        .unwrap_err();

    mock.assert_hits(1);
    match err {
        ScholiaError::NotFound { method, url } => {
            assert_eq!(method, "GET");
            assert!(url.ends_with("/v1/works"));
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn empty_success_body_parses_as_empty_object() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(200);
    });

    let doc = common::client(&server)
        .execute(&ApiRequest::get("works"))
        .await
        .unwrap();
    assert_eq!(doc, serde_json::json!({}));
}

#[tokio::test]
async fn malformed_json_surfaces_validation_error() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(200)
            .header("content-type", "application/json")
            .body("{not json");
    });

    let err = common::client(&server)
        .execute(&ApiRequest::get("works"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScholiaError::Validation(_)));
}

#[tokio::test]
async fn raw_body_is_returned_when_json_is_not_expected() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(200).body("plain text payload");
    });

    let doc = common::client(&server)
        .execute(&ApiRequest::get("works").expects_json(false))
        .await
        .unwrap();
    assert_eq!(doc, serde_json::json!("plain text payload"));
}

#[tokio::test]
async fn error_snippet_is_bounded_to_one_kilobyte() {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(400).body("x".repeat(4096));
    });

    let err = common::client(&server)
        .execute(&ApiRequest::get("works"))
        .await
        .unwrap_err();
    match err {
        ScholiaError::Api { body_snippet, .. } => {
            assert_eq!(body_snippet.unwrap().len(), 1024);
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn accept_and_user_agent_headers_are_stamped() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/works")
            .header("accept", "application/json")
            .header("user-agent", "atlas-client/9.9");
        then.status(200)
            .header("content-type", "application/json")
            .body(common::page_body(&[], None, 0));
    });

    let client = scholia::ApiClient::builder()
        .base_url(common::base_url(&server))
        .envelope(common::GraphEnvelope)
        .user_agent("atlas-client/9.9")
        .build()
        .unwrap();

    client.execute(&ApiRequest::get("works")).await.unwrap();
    mock.assert();
}
