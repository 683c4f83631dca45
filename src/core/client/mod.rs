//! Public engine surface + builder.
//!
//! Internals are split into `auth` (credential strategies), `cache`
//! (response store), `rate_limit` (header tracking + dispatch gate),
//! `retry` (backoff policy) and `settings` (knobs + hooks).

mod auth;
mod cache;
mod constants;
mod rate_limit;
mod retry;
mod settings;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Method;
use reqwest::header::ACCEPT;
use serde_json::Value;
use url::Url;

pub use auth::{AuthStrategy, BearerAuth, ClientCredentialsAuth, NoAuth};
pub use retry::{Backoff, CacheMode, RetryConfig};
pub use settings::{
    ClientSettings, HookError, PostResponseHook, PreRequestHook, RequestContext, ResponseContext,
};

pub(crate) use constants::{DEFAULT_PAGE_SIZE, INITIAL_CURSOR, ITERATE_PAGE_SIZE};

use cache::ResponseCache;
use constants::BODY_SNIPPET_MAX;
use rate_limit::RateLimitTracker;

use crate::core::envelope::ResponseEnvelope;
use crate::core::error::ScholiaError;

/// One API call: method, path relative to the engine's base URL, query
/// pairs, and per-call behavior overrides.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    body_fingerprint: Option<String>,
    expects_json: bool,
    cache_mode: CacheMode,
    retry_override: Option<RetryConfig>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            body_fingerprint: None,
            expects_json: true,
            cache_mode: CacheMode::Use,
            retry_override: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    pub fn query_pair(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attach a JSON body. Reads never need one; this exists for the odd
    /// endpoint that searches via POST.
    pub fn json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Caller-supplied digest of the body, mixed into the cache key.
    pub fn body_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.body_fingerprint = Some(fingerprint.into());
        self
    }

    /// Whether a 2xx response body is parsed as JSON (default) or returned
    /// as a raw string value.
    pub fn expects_json(mut self, expects_json: bool) -> Self {
        self.expects_json = expects_json;
        self
    }

    pub fn cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    /// Per-call retry override; `RetryConfig::none()` suppresses retries
    /// for this call entirely.
    pub fn retry_policy(mut self, cfg: Option<RetryConfig>) -> Self {
        self.retry_override = cfg;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn is_idempotent_read(&self) -> bool {
        self.method == Method::GET || self.method == Method::HEAD
    }
}

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    settings: ClientSettings,
    envelope: Arc<dyn ResponseEnvelope>,
    auth: Arc<dyn AuthStrategy>,
    cache: Option<ResponseCache>,
    rate_limits: RateLimitTracker,
    closed: AtomicBool,
}

/// Asynchronous request engine bound to one API.
///
/// Owns the HTTP transport, the response cache and the rate-limit state.
/// Cloning is cheap and shares all of them; many concurrent calls may be in
/// flight against one engine.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl ApiClient {
    /// Create a new builder.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    pub(crate) fn envelope(&self) -> &dyn ResponseEnvelope {
        self.inner.envelope.as_ref()
    }

    /// Absolute URL the request would be dispatched to.
    pub(crate) fn url_for(&self, req: &ApiRequest) -> Result<Url, ScholiaError> {
        let mut url = self
            .inner
            .base_url
            .join(req.path.trim_start_matches('/'))
            .map_err(|e| {
                ScholiaError::Validation(format!("invalid request path '{}': {e}", req.path))
            })?;
        if !req.query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(req.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    /// Execute a call: cache lookup, rate gate, authenticated dispatch with
    /// retries, classification, cache store. Returns the parsed response
    /// document.
    pub async fn execute(&self, req: &ApiRequest) -> Result<Value, ScholiaError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(ScholiaError::Config("client has been closed".into()));
        }

        let url = self.url_for(req)?;

        let cache_key = match (&self.inner.cache, req.cache_mode) {
            (Some(_), CacheMode::Use | CacheMode::Refresh) if req.is_idempotent_read() => Some(
                cache::cache_key(&req.method, &url, req.body_fingerprint.as_deref()),
            ),
            _ => None,
        };

        if req.cache_mode == CacheMode::Use
            && let (Some(cache), Some(key)) = (&self.inner.cache, &cache_key)
            && let Some((_, document)) = cache.get(key).await
        {
            tracing::debug!(%url, "cache hit");
            return Ok(document);
        }

        let (status, document) = self.run_attempts(req, &url).await?;

        if let (Some(cache), Some(key)) = (&self.inner.cache, cache_key) {
            cache.insert(key, status, document.clone()).await;
        }

        Ok(document)
    }

    /// Mark the engine closed and drop cached entries. The transport itself
    /// is released when the last clone is dropped; every call made after
    /// this surfaces [`ScholiaError::Config`].
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        if let Some(cache) = &self.inner.cache {
            cache.clear().await;
        }
        tracing::debug!(base_url = %self.inner.base_url, "client closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    async fn run_attempts(
        &self,
        req: &ApiRequest,
        url: &Url,
    ) -> Result<(u16, Value), ScholiaError> {
        let retry = req
            .retry_override
            .as_ref()
            .unwrap_or(&self.inner.settings.retry);
        let max_retries = retry.effective_max_retries();

        let mut attempt: u32 = 0;
        loop {
            self.inner.rate_limits.gate().await;

            match self.attempt_once(req, url, attempt).await {
                Ok(ok) => return Ok(ok),
                Err(err) => {
                    if !is_retryable(&err, retry) || attempt >= max_retries {
                        return Err(err);
                    }

                    // A 429 pause comes from the tracker (Retry-After or the
                    // configured default); everything else backs off
                    // exponentially.
                    let delay = if err.status() == Some(429) {
                        self.inner
                            .rate_limits
                            .pause_remaining()
                            .unwrap_or_else(|| retry.backoff.delay(attempt))
                    } else {
                        retry.backoff.delay(attempt)
                    };

                    tracing::warn!(
                        %url,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt_once(
        &self,
        req: &ApiRequest,
        url: &Url,
        attempt: u32,
    ) -> Result<(u16, Value), ScholiaError> {
        let attempts = attempt + 1;
        let method_name = req.method.as_str().to_string();

        let mut builder = self
            .inner
            .http
            .request(req.method.clone(), url.clone())
            .header(ACCEPT, "application/json");
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let mut request = builder
            .build()
            .map_err(|e| ScholiaError::Validation(format!("failed to build request: {e}")))?;
        *request.timeout_mut() = Some(self.inner.settings.request_timeout);

        self.inner.auth.apply(&mut request).await?;

        if !self.inner.settings.pre_request_hooks.is_empty() {
            let method = request.method().clone();
            let target = request.url().clone();
            let mut ctx = RequestContext::new(&method, &target, request.headers_mut());
            for hook in &self.inner.settings.pre_request_hooks {
                hook.call(&mut ctx)?;
            }
        }

        tracing::debug!(method = %method_name, %url, attempt, "dispatching request");
        let response = match self.inner.http.execute(request).await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Err(ScholiaError::Timeout {
                    method: method_name,
                    url: url.to_string(),
                    attempts,
                });
            }
            Err(e) => {
                return Err(ScholiaError::Network {
                    message: e.to_string(),
                    method: method_name,
                    url: url.to_string(),
                    attempts,
                });
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => {
                return Err(ScholiaError::Timeout {
                    method: method_name,
                    url: url.to_string(),
                    attempts,
                });
            }
            Err(e) => {
                return Err(ScholiaError::Network {
                    message: format!("failed to read response body: {e}"),
                    method: method_name,
                    url: url.to_string(),
                    attempts,
                });
            }
        };

        // Rate headers are observed on every response, success or not.
        self.inner.rate_limits.observe(status.as_u16(), &headers);

        let outcome = if status.is_success() {
            if req.expects_json {
                if body.trim().is_empty() {
                    Ok((status.as_u16(), Value::Object(serde_json::Map::new())))
                } else {
                    serde_json::from_str(&body)
                        .map(|document| (status.as_u16(), document))
                        .map_err(|e| {
                            ScholiaError::Validation(format!(
                                "response body is not valid JSON: {e}"
                            ))
                        })
                }
            } else {
                Ok((status.as_u16(), Value::String(body.clone())))
            }
        } else {
            Err(self.classify_status(status.as_u16(), &method_name, url, &body, attempts))
        };

        if !self.inner.settings.post_response_hooks.is_empty() {
            let ctx = ResponseContext {
                status: status.as_u16(),
                headers: &headers,
                document: outcome.as_ref().ok().map(|(_, document)| document),
                error: outcome.as_ref().err(),
            };
            for hook in &self.inner.settings.post_response_hooks {
                hook.call(&ctx)?;
            }
        }

        outcome
    }

    fn classify_status(
        &self,
        status: u16,
        method: &str,
        url: &Url,
        body: &str,
        attempts: u32,
    ) -> ScholiaError {
        match status {
            401 | 403 => ScholiaError::Auth {
                message: format!("server rejected credentials with status {status}"),
                method: Some(method.to_string()),
                url: Some(url.to_string()),
            },
            404 => ScholiaError::NotFound {
                method: method.to_string(),
                url: url.to_string(),
            },
            429 => ScholiaError::RateLimited {
                method: method.to_string(),
                url: url.to_string(),
                retry_after: self.inner.rate_limits.pause_remaining(),
                attempts,
            },
            _ => ScholiaError::Api {
                status,
                method: method.to_string(),
                url: url.to_string(),
                body_snippet: snippet(body),
                attempts,
            },
        }
    }
}

fn is_retryable(err: &ScholiaError, retry: &RetryConfig) -> bool {
    match err {
        ScholiaError::Network { .. } => retry.retry_on_connect,
        ScholiaError::Timeout { .. } => retry.retry_on_timeout,
        ScholiaError::RateLimited { .. } => retry.should_retry_status(429),
        ScholiaError::Api { status, .. } => retry.should_retry_status(*status),
        _ => false,
    }
}

fn snippet(body: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }
    let mut end = BODY_SNIPPET_MAX.min(body.len());
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    Some(body[..end].to_string())
}

/* ----------------------- Builder ----------------------- */

#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<Url>,
    settings: ClientSettings,
    envelope: Option<Arc<dyn ResponseEnvelope>>,
    auth: Option<Arc<dyn AuthStrategy>>,
}

impl ApiClientBuilder {
    /// The API's base URL; request paths are joined onto it.
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Replace the whole settings bundle.
    pub fn settings(mut self, settings: ClientSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The envelope implementation describing the API's response shape.
    pub fn envelope(mut self, envelope: impl ResponseEnvelope + 'static) -> Self {
        self.envelope = Some(Arc::new(envelope));
        self
    }

    /// Authentication strategy. Defaults to [`NoAuth`].
    pub fn auth(mut self, auth: impl AuthStrategy + 'static) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    /// Override the User-Agent.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.settings.user_agent = ua.into();
        self
    }

    /// Set the per-attempt request timeout.
    pub fn request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.settings.request_timeout = timeout;
        self
    }

    /// Replace the default retry policy.
    pub fn retry_policy(mut self, retry: RetryConfig) -> Self {
        self.settings.retry = retry;
        self
    }

    /// Enable in-memory caching with the given TTL.
    /// If not set, caching is disabled.
    pub fn cache_ttl(mut self, ttl: std::time::Duration) -> Self {
        self.settings.enable_caching = true;
        self.settings.cache_ttl = ttl;
        self
    }

    /// Bound the cache to this many entries.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.settings.cache_capacity = capacity;
        self
    }

    /// Enable or disable proactive rate limiting.
    pub fn rate_limiting(mut self, enabled: bool) -> Self {
        self.settings.enable_rate_limiting = enabled;
        self
    }

    /// Append a pre-request hook; hooks run in registration order.
    pub fn pre_request_hook(mut self, hook: PreRequestHook) -> Self {
        self.settings.pre_request_hooks.push(hook);
        self
    }

    /// Append a post-response hook; hooks run in registration order.
    pub fn post_response_hook(mut self, hook: PostResponseHook) -> Self {
        self.settings.post_response_hooks.push(hook);
        self
    }

    pub fn build(self) -> Result<ApiClient, ScholiaError> {
        let mut base_url = self
            .base_url
            .ok_or_else(|| ScholiaError::Config("a base URL is required".into()))?;
        if base_url.cannot_be_a_base() {
            return Err(ScholiaError::Config(format!(
                "'{base_url}' cannot serve as a base URL"
            )));
        }
        // Joining relative paths needs the trailing slash.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let envelope = self
            .envelope
            .ok_or_else(|| ScholiaError::Config("an envelope implementation is required".into()))?;

        self.settings.validate()?;

        let http = reqwest::Client::builder()
            .user_agent(&self.settings.user_agent)
            .build()
            .map_err(|e| ScholiaError::Config(format!("failed to build HTTP transport: {e}")))?;

        let cache = self
            .settings
            .enable_caching
            .then(|| ResponseCache::new(self.settings.cache_ttl, self.settings.cache_capacity));

        let rate_limits = RateLimitTracker::new(
            self.settings.enable_rate_limiting,
            self.settings.rate_limit_buffer,
            self.settings.retry_after_default,
        );

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                settings: self.settings,
                envelope,
                auth: self.auth.unwrap_or_else(|| Arc::new(NoAuth)),
                cache,
                rate_limits,
                closed: AtomicBool::new(false),
            }),
        })
    }
}
