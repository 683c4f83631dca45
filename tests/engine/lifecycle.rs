use std::time::Duration;

use httpmock::{Method::GET, MockServer};
use scholia::{ApiClient, ApiRequest, ClientSettings, ScholiaError};

use crate::common::{self, GraphEnvelope};

#[tokio::test]
async fn calls_after_close_surface_config_error() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(200)
            .header("content-type", "application/json")
            .body(common::page_body(&[], None, 0));
    });

    let client = common::client(&server);
    client.execute(&ApiRequest::get("works")).await.unwrap();
    mock.assert_hits(1);

    client.close().await;
    assert!(client.is_closed());

    let err = client
        .execute(&ApiRequest::get("works"))
        .await
        .unwrap_err();
    assert!(matches!(err, ScholiaError::Config(_)));
    mock.assert_hits(1);
}

#[tokio::test]
async fn close_is_visible_across_clones() {
    let server = MockServer::start();
    let client = common::client(&server);
    let clone = client.clone();

    client.close().await;
    assert!(clone.is_closed());
    assert!(clone.execute(&ApiRequest::get("works")).await.is_err());
}

#[tokio::test]
async fn builder_rejects_invalid_settings_bundles() {
    let server = MockServer::start();

    let result = ApiClient::builder()
        .base_url(common::base_url(&server))
        .envelope(GraphEnvelope)
        .settings(ClientSettings {
            request_timeout: Duration::ZERO,
            ..ClientSettings::default()
        })
        .build();

    assert!(matches!(result, Err(ScholiaError::Config(_))));
}

#[tokio::test]
async fn concurrent_calls_share_one_engine() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(200)
            .header("content-type", "application/json")
            .body(common::page_body(&[], None, 0));
    });

    let client = common::client(&server);
    let calls = (0..8).map(|_| {
        let client = client.clone();
        tokio::spawn(async move { client.execute(&ApiRequest::get("works")).await })
    });

    for handle in calls {
        handle.await.unwrap().unwrap();
    }
    mock.assert_hits(8);
}
