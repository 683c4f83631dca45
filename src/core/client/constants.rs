//! Centralized constants for engine defaults.

use std::time::Duration;

/// Default User-Agent; concrete clients normally override this with their
/// own product string via the builder.
pub(crate) const USER_AGENT: &str = concat!("scholia/", env!("CARGO_PKG_VERSION"));

/// Default per-attempt request timeout.
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait after a 429 when the server sends no `Retry-After`.
pub(crate) const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Fraction of the rate-limit ceiling treated as the low-water mark.
pub(crate) const DEFAULT_RATE_LIMIT_BUFFER: f64 = 0.1;

/// Default TTL for cached responses.
pub(crate) const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Default cache capacity (entries).
pub(crate) const DEFAULT_CACHE_CAPACITY: usize = 128;

/// Timeout for the OAuth2 token-endpoint exchange.
pub(crate) const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// A token this close to expiry is refreshed rather than reused.
pub(crate) const TOKEN_EXPIRY_SKEW: Duration = Duration::from_secs(30);

/// Upper bound on the response-body snippet carried inside errors.
pub(crate) const BODY_SNIPPET_MAX: usize = 1024;

/// Default number of results per page for standard search.
pub(crate) const DEFAULT_PAGE_SIZE: u32 = 20;

/// Default number of results per page for cursor iteration.
pub(crate) const ITERATE_PAGE_SIZE: u32 = 100;

/// Cursor sentinel the first page of an iteration is requested with.
pub(crate) const INITIAL_CURSOR: &str = "*";
