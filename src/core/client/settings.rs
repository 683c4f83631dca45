//! Engine-owned settings bundle and the request/response hook types.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::HeaderMap;
use serde_json::Value;
use url::Url;

use super::constants::{
    DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, DEFAULT_RATE_LIMIT_BUFFER, DEFAULT_REQUEST_TIMEOUT,
    DEFAULT_RETRY_AFTER, USER_AGENT,
};
use super::retry::RetryConfig;
use crate::core::error::ScholiaError;

/// Boxed error hooks may fail with; surfaced verbatim as the source of
/// [`ScholiaError::Hook`].
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Mutable view of an outbound request handed to pre-request hooks.
///
/// Hooks may inspect the method and URL and rewrite headers. The URL is
/// deliberately read-only so the cache key computed for the call stays
/// valid.
pub struct RequestContext<'a> {
    method: &'a Method,
    url: &'a Url,
    headers: &'a mut HeaderMap,
}

impl<'a> RequestContext<'a> {
    pub(crate) fn new(method: &'a Method, url: &'a Url, headers: &'a mut HeaderMap) -> Self {
        Self {
            method,
            url,
            headers,
        }
    }

    pub fn method(&self) -> &Method {
        self.method
    }

    pub fn url(&self) -> &Url {
        self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &*self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut *self.headers
    }
}

/// Read-only view of a received response handed to post-response hooks.
///
/// Exactly one of `document` and `error` is populated: `document` when the
/// response was successful and parsed, `error` with the classified failure
/// otherwise.
pub struct ResponseContext<'a> {
    pub status: u16,
    pub headers: &'a HeaderMap,
    pub document: Option<&'a Value>,
    pub error: Option<&'a ScholiaError>,
}

/// Named callable invoked with the outbound request just before dispatch.
#[derive(Clone)]
pub struct PreRequestHook {
    name: Arc<str>,
    callback: Arc<dyn Fn(&mut RequestContext<'_>) -> Result<(), HookError> + Send + Sync>,
}

impl PreRequestHook {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut RequestContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        Self {
            name: name.into().into(),
            callback: Arc::new(callback),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, ctx: &mut RequestContext<'_>) -> Result<(), ScholiaError> {
        (self.callback)(ctx).map_err(|source| ScholiaError::Hook {
            name: self.name.to_string(),
            source,
        })
    }
}

/// Named callable invoked with the response just after receive and parse.
#[derive(Clone)]
pub struct PostResponseHook {
    name: Arc<str>,
    callback: Arc<dyn Fn(&ResponseContext<'_>) -> Result<(), HookError> + Send + Sync>,
}

impl PostResponseHook {
    pub fn new<F>(name: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&ResponseContext<'_>) -> Result<(), HookError> + Send + Sync + 'static,
    {
        Self {
            name: name.into().into(),
            callback: Arc::new(callback),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn call(&self, ctx: &ResponseContext<'_>) -> Result<(), ScholiaError> {
        (self.callback)(ctx).map_err(|source| ScholiaError::Hook {
            name: self.name.to_string(),
            source,
        })
    }
}

/// Tunable knobs the engine consumes.
///
/// One value per engine, injected at construction; there is no process-wide
/// state. The builder validates the bundle and rejects invalid combinations
/// with [`ScholiaError::Config`].
#[derive(Clone)]
pub struct ClientSettings {
    /// Per-attempt request timeout.
    pub request_timeout: Duration,
    /// `User-Agent` header stamped on every request.
    pub user_agent: String,
    /// Retry policy; overridable per call.
    pub retry: RetryConfig,
    /// Enables proactive throttling from observed rate-limit headers.
    pub enable_rate_limiting: bool,
    /// Fraction of the limit ceiling treated as the low-water mark, in [0, 1].
    pub rate_limit_buffer: f64,
    /// Wait applied after a 429 without a `Retry-After` header.
    pub retry_after_default: Duration,
    /// Enables the client-side response cache.
    pub enable_caching: bool,
    /// TTL for cached responses.
    pub cache_ttl: Duration,
    /// Maximum number of cached responses.
    pub cache_capacity: usize,
    /// Hooks run in order against every outbound request.
    pub pre_request_hooks: Vec<PreRequestHook>,
    /// Hooks run in order against every received response.
    pub post_response_hooks: Vec<PostResponseHook>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: USER_AGENT.to_string(),
            retry: RetryConfig::default(),
            enable_rate_limiting: true,
            rate_limit_buffer: DEFAULT_RATE_LIMIT_BUFFER,
            retry_after_default: DEFAULT_RETRY_AFTER,
            enable_caching: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            pre_request_hooks: Vec::new(),
            post_response_hooks: Vec::new(),
        }
    }
}

impl ClientSettings {
    pub(crate) fn validate(&self) -> Result<(), ScholiaError> {
        if self.request_timeout.is_zero() {
            return Err(ScholiaError::Config(
                "request_timeout must be positive".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ScholiaError::Config("user_agent must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&self.rate_limit_buffer) {
            return Err(ScholiaError::Config(format!(
                "rate_limit_buffer must be within [0, 1], got {}",
                self.rate_limit_buffer
            )));
        }
        if self.retry_after_default.is_zero() {
            return Err(ScholiaError::Config(
                "retry_after_default must be positive".into(),
            ));
        }
        if self.enable_caching {
            if self.cache_ttl.is_zero() {
                return Err(ScholiaError::Config("cache_ttl must be positive".into()));
            }
            if self.cache_capacity == 0 {
                return Err(ScholiaError::Config(
                    "cache_capacity must be positive".into(),
                ));
            }
        }
        if let super::retry::Backoff::Exponential { base, factor, .. } = &self.retry.backoff {
            if base.is_zero() || *factor <= 0.0 {
                return Err(ScholiaError::Config(
                    "exponential backoff requires a positive base and factor".into(),
                ));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("request_timeout", &self.request_timeout)
            .field("user_agent", &self.user_agent)
            .field("retry", &self.retry)
            .field("enable_rate_limiting", &self.enable_rate_limiting)
            .field("rate_limit_buffer", &self.rate_limit_buffer)
            .field("retry_after_default", &self.retry_after_default)
            .field("enable_caching", &self.enable_caching)
            .field("cache_ttl", &self.cache_ttl)
            .field("cache_capacity", &self.cache_capacity)
            .field(
                "pre_request_hooks",
                &self
                    .pre_request_hooks
                    .iter()
                    .map(PreRequestHook::name)
                    .collect::<Vec<_>>(),
            )
            .field(
                "post_response_hooks",
                &self
                    .post_response_hooks
                    .iter()
                    .map(PostResponseHook::name)
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
