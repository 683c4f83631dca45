use thiserror::Error;

/// The primary error type for the `scholia` crate.
///
/// Every failure the framework can produce is one of these kinds; callers
/// match on the variants they want to handle and treat the rest uniformly.
#[derive(Debug, Error)]
pub enum ScholiaError {
    /// Invalid or missing configuration. Also raised by any call made after
    /// the client was closed. Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// Credential acquisition or injection failed, or the server rejected
    /// credentials with 401/403 after authentication was applied.
    #[error("authentication error: {message}")]
    Auth {
        message: String,
        /// HTTP method of the failing request, when one was in flight.
        method: Option<String>,
        /// URL of the failing request or token endpoint.
        url: Option<String>,
    },

    /// Transport-level failure (connect, DNS, TLS, read/write) after all
    /// retries were exhausted.
    #[error("network error after {attempts} attempt(s) for {method} {url}: {message}")]
    Network {
        message: String,
        method: String,
        url: String,
        attempts: u32,
    },

    /// A request attempt exceeded its time budget after retries.
    #[error("timeout after {attempts} attempt(s) for {method} {url}")]
    Timeout {
        method: String,
        url: String,
        attempts: u32,
    },

    /// A non-success status not covered by a narrower kind.
    #[error("API error {status} for {method} {url}")]
    Api {
        status: u16,
        method: String,
        url: String,
        /// First kilobyte of the response body, when one was received.
        body_snippet: Option<String>,
        attempts: u32,
    },

    /// 404 Not Found, or an entity lookup whose result set was empty.
    #[error("not found: {method} {url}")]
    NotFound { method: String, url: String },

    /// 429 Too Many Requests persisting after retries.
    #[error("rate limited for {method} {url} after {attempts} attempt(s)")]
    RateLimited {
        method: String,
        url: String,
        /// Server-requested pause, when a `Retry-After` header was seen.
        retry_after: Option<std::time::Duration>,
        attempts: u32,
    },

    /// Malformed caller arguments, or a response body that could not be
    /// parsed into the expected shape.
    #[error("validation error: {0}")]
    Validation(String),

    /// A pre-request or post-response hook failed. The hook's own error is
    /// the source and is surfaced unchanged.
    #[error("hook '{name}' failed: {source}")]
    Hook {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ScholiaError {
    /// HTTP status associated with the error, including the 404/429 kinds.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// True for failures reported by the server as a status code, i.e. the
    /// generic API kind plus its not-found and rate-limited refinements.
    pub fn is_api_error(&self) -> bool {
        matches!(
            self,
            Self::Api { .. } | Self::NotFound { .. } | Self::RateLimited { .. }
        )
    }

    /// Cumulative attempt count for errors surfaced out of the retry loop.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::Network { attempts, .. }
            | Self::Timeout { attempts, .. }
            | Self::Api { attempts, .. }
            | Self::RateLimited { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}
