//! scholia: building blocks for async clients of paginated, JSON-over-HTTP
//! scholarly APIs.
//!
//! The crate supplies the cross-cutting machinery every such client needs —
//! retries with backoff, client-side caching, rate-limit awareness,
//! pluggable authentication, cursor/page iteration and a uniform error
//! taxonomy — while a concrete client describes only its API's unique
//! shape: base URL, response envelope, authentication, resources.
//!
//! A client binds an [`ApiClient`] with its [`ResponseEnvelope`]
//! implementation and an auth strategy, then exposes [`Resource`] bindings
//! for the entity collections it serves.

pub mod core;
pub mod resources;

pub use crate::core::client::{
    ApiClient, ApiClientBuilder, ApiRequest, AuthStrategy, Backoff, BearerAuth, CacheMode,
    ClientCredentialsAuth, ClientSettings, HookError, NoAuth, PostResponseHook, PreRequestHook,
    RequestContext, ResponseContext, RetryConfig,
};
pub use crate::core::envelope::ResponseEnvelope;
pub use crate::core::error::ScholiaError;
pub use crate::resources::{
    FilterFields, Filters, IterateQuery, Resource, SearchQuery, SortOrder,
};
