#![allow(dead_code)]

use std::time::Duration;

use httpmock::MockServer;
use scholia::{ApiClient, Backoff, ResponseEnvelope, RetryConfig, ScholiaError};
use serde_json::Value;
use url::Url;

/// Envelope of the synthetic graph API used across these tests:
/// `{"header":{"numFound":N,"nextCursor":...},"results":[...]}`
#[derive(Debug)]
pub struct GraphEnvelope;

impl ResponseEnvelope for GraphEnvelope {
    fn results(&self, doc: &Value) -> Vec<Value> {
        doc.get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    }

    fn single(&self, doc: &Value) -> Result<Value, ScholiaError> {
        self.results(doc).into_iter().next().ok_or_else(|| {
            ScholiaError::Validation("response contains no single item".into())
        })
    }

    fn next_cursor(&self, doc: &Value) -> Option<String> {
        doc.get("header")?
            .get("nextCursor")?
            .as_str()
            .map(str::to_string)
    }

    fn total(&self, doc: &Value) -> Option<u64> {
        doc.get("header")?.get("numFound")?.as_u64()
    }
}

pub fn base_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/v1/", server.base_url())).unwrap()
}

/// Fast, jitter-free retry policy so synthetic tests stay quick.
pub fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        backoff: Backoff::Exponential {
            base: Duration::from_millis(50),
            factor: 2.0,
            max: Duration::from_secs(2),
            jitter: false,
        },
        ..RetryConfig::default()
    }
}

/// Client against the mock server with fast retries and no cache.
pub fn client(server: &MockServer) -> ApiClient {
    ApiClient::builder()
        .base_url(base_url(server))
        .envelope(GraphEnvelope)
        .retry_policy(fast_retry(2))
        .build()
        .unwrap()
}

/// JSON body in the synthetic envelope shape.
pub fn page_body(items: &[Value], next_cursor: Option<&str>, total: u64) -> String {
    serde_json::json!({
        "header": { "numFound": total, "nextCursor": next_cursor },
        "results": items,
    })
    .to_string()
}
