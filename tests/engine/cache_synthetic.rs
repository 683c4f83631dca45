use std::time::Duration;

use httpmock::{Method::GET, Method::POST, MockServer};
use scholia::{ApiClient, ApiRequest, CacheMode};

use crate::common::{self, GraphEnvelope};

fn cached_client(server: &MockServer) -> ApiClient {
    ApiClient::builder()
        .base_url(common::base_url(server))
        .envelope(GraphEnvelope)
        .retry_policy(common::fast_retry(0))
        .cache_ttl(Duration::from_secs(60))
        .cache_capacity(8)
        .build()
        .unwrap()
}

#[tokio::test]
async fn second_identical_get_is_served_from_cache() {
    let server = MockServer::start();

    // This mock only expects to be called ONCE.
    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/works").query_param("id", "X");
        then.status(200)
            .header("content-type", "application/json")
            .body(common::page_body(
                &[serde_json::json!({"id": "X"})],
                None,
                1,
            ));
    });

    let client = cached_client(&server);
    let req = ApiRequest::get("works").query_pair("id", "X");

    let first = client.execute(&req).await.unwrap();
    mock.assert();

    let second = client.execute(&req).await.unwrap();
    // The hit count must still be 1: no network I/O on the second call.
    mock.assert();

    assert_eq!(first, second);
}

#[tokio::test]
async fn permuted_query_parameters_share_one_cache_entry() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/v1/works")
            .query_param("page", "1")
            .query_param("pageSize", "10");
        then.status(200)
            .header("content-type", "application/json")
            .body(common::page_body(&[], None, 0));
    });

    let client = cached_client(&server);

    let forward = ApiRequest::get("works")
        .query_pair("page", "1")
        .query_pair("pageSize", "10");
    let reversed = ApiRequest::get("works")
        .query_pair("pageSize", "10")
        .query_pair("page", "1");

    client.execute(&forward).await.unwrap();
    client.execute(&reversed).await.unwrap();

    mock.assert();
}

#[tokio::test]
async fn refresh_bypasses_cache_read_but_updates_entry() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(200)
            .header("content-type", "application/json")
            .body(common::page_body(&[], None, 0));
    });

    let client = cached_client(&server);
    let req = ApiRequest::get("works");

    client.execute(&req).await.unwrap();
    mock.assert_hits(1);

    client
        .execute(&req.clone().cache_mode(CacheMode::Refresh))
        .await
        .unwrap();
    mock.assert_hits(2);

    // Back to CacheMode::Use: served from the refreshed entry.
    client.execute(&req).await.unwrap();
    mock.assert_hits(2);
}

#[tokio::test]
async fn bypass_never_reads_or_writes_the_cache() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(200)
            .header("content-type", "application/json")
            .body(common::page_body(&[], None, 0));
    });

    let client = cached_client(&server);
    let req = ApiRequest::get("works").cache_mode(CacheMode::Bypass);

    client.execute(&req).await.unwrap();
    client.execute(&req).await.unwrap();
    mock.assert_hits(2);

    // Nothing was stored: a CacheMode::Use call still has to fetch.
    client
        .execute(&ApiRequest::get("works"))
        .await
        .unwrap();
    mock.assert_hits(3);
}

#[tokio::test]
async fn caching_disabled_dispatches_every_call() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(200)
            .header("content-type", "application/json")
            .body(common::page_body(&[], None, 0));
    });

    // common::client builds without a cache.
    let client = common::client(&server);
    let req = ApiRequest::get("works");

    client.execute(&req).await.unwrap();
    client.execute(&req).await.unwrap();
    mock.assert_hits(2);
}

#[tokio::test]
async fn non_success_responses_are_never_cached() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(404);
    });

    let client = cached_client(&server);
    let req = ApiRequest::get("works");

    assert!(client.execute(&req).await.is_err());
    assert!(client.execute(&req).await.is_err());

    // Both calls reached the server: the 404 was not stored.
    mock.assert_hits(2);
}

#[tokio::test]
async fn mutating_methods_are_never_cached() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/works");
        then.status(200)
            .header("content-type", "application/json")
            .body(common::page_body(&[], None, 0));
    });

    let client = cached_client(&server);
    let req = ApiRequest::new(reqwest::Method::POST, "works")
        .json_body(serde_json::json!({"query": "graphs"}));

    client.execute(&req).await.unwrap();
    client.execute(&req).await.unwrap();
    mock.assert_hits(2);
}

#[tokio::test]
async fn expired_entries_are_fetched_again() {
    let server = MockServer::start();

    let mock = server.mock(|when, then| {
        when.method(GET).path("/v1/works");
        then.status(200)
            .header("content-type", "application/json")
            .body(common::page_body(&[], None, 0));
    });

    let client = ApiClient::builder()
        .base_url(common::base_url(&server))
        .envelope(GraphEnvelope)
        .retry_policy(common::fast_retry(0))
        .cache_ttl(Duration::from_millis(50))
        .build()
        .unwrap();
    let req = ApiRequest::get("works");

    client.execute(&req).await.unwrap();
    mock.assert_hits(1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    client.execute(&req).await.unwrap();
    mock.assert_hits(2);
}
