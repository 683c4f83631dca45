//! Typed resource operations layered on top of the engine.
//!
//! A [`Resource`] binds one API path fragment (e.g. `"works"`) to optional
//! typed models and exposes the three read operations every scholarly API
//! client needs: get-by-id, paged search, and cursor iteration.

mod filter;
mod sort;

use std::collections::VecDeque;
use std::marker::PhantomData;

use futures_util::Stream;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::core::client::{
    ApiClient, ApiRequest, DEFAULT_PAGE_SIZE, INITIAL_CURSOR, ITERATE_PAGE_SIZE,
};
use crate::core::error::ScholiaError;

pub use filter::{FilterFields, Filters};
pub use sort::SortOrder;
use sort::validate_sort_by;

/// Parameters for a paged search. Page numbering is 1-based and passed to
/// the API verbatim.
#[derive(Clone, Debug)]
pub struct SearchQuery {
    page: u32,
    page_size: u32,
    sort_by: Option<String>,
    filters: Option<Filters>,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort_by: None,
            filters: None,
        }
    }
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sort expression of the form `"<field> <asc|desc>"`.
    pub fn sort_by(mut self, sort_by: impl Into<String>) -> Self {
        self.sort_by = Some(sort_by.into());
        self
    }

    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = Some(filters);
        self
    }
}

/// Parameters for a cursor iteration.
#[derive(Clone, Debug)]
pub struct IterateQuery {
    page_size: u32,
    sort_by: Option<String>,
    filters: Option<Filters>,
}

impl Default for IterateQuery {
    fn default() -> Self {
        Self {
            page_size: ITERATE_PAGE_SIZE,
            sort_by: None,
            filters: None,
        }
    }
}

impl IterateQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sort expression of the form `"<field> <asc|desc>"`.
    pub fn sort_by(mut self, sort_by: impl Into<String>) -> Self {
        self.sort_by = Some(sort_by.into());
        self
    }

    pub fn filters(mut self, filters: Filters) -> Self {
        self.filters = Some(filters);
        self
    }
}

/// A typed binding of one resource path to the engine.
///
/// `T` is the single-item model used by [`get`](Resource::get) and
/// [`iterate`](Resource::iterate); `S` the search-response model used by
/// [`search`](Resource::search). Both default to [`serde_json::Value`] for
/// clients that want raw documents.
pub struct Resource<T = Value, S = Value> {
    client: ApiClient,
    path: String,
    _models: PhantomData<fn() -> (T, S)>,
}

impl<T, S> Clone for Resource<T, S> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            path: self.path.clone(),
            _models: PhantomData,
        }
    }
}

impl<T, S> std::fmt::Debug for Resource<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource").field("path", &self.path).finish()
    }
}

impl<T, S> Resource<T, S>
where
    T: DeserializeOwned + Send + 'static,
    S: DeserializeOwned,
{
    pub fn new(client: ApiClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
            _models: PhantomData,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Fetch a single entity by id.
    ///
    /// Scholarly APIs commonly lack a direct item endpoint, so this runs a
    /// search filtered by the id with a page size of one. An empty result
    /// set surfaces [`ScholiaError::NotFound`]; a document that fails typed
    /// validation surfaces [`ScholiaError::Validation`].
    pub async fn get(
        &self,
        entity_id: &str,
        extra_filters: Option<Filters>,
    ) -> Result<T, ScholiaError> {
        if entity_id.trim().is_empty() {
            return Err(ScholiaError::Validation(
                "entity id must not be empty".into(),
            ));
        }

        let mut req = ApiRequest::get(self.path.as_str())
            .query_pair("id", entity_id)
            .query_pair("pageSize", "1");
        if let Some(filters) = &extra_filters {
            req = apply_filters(req, filters);
        }

        let doc = self.client.execute(&req).await?;

        if self.client.envelope().results(&doc).is_empty() {
            let url = self.client.url_for(&req)?;
            return Err(ScholiaError::NotFound {
                method: "GET".into(),
                url: url.to_string(),
            });
        }

        let item = self.client.envelope().single(&doc)?;
        serde_json::from_value(item).map_err(|e| {
            ScholiaError::Validation(format!("failed to validate entity '{entity_id}': {e}"))
        })
    }

    /// Run a paged search and return exactly what the server supplied for
    /// the requested page; results are never re-paginated client-side.
    pub async fn search(&self, query: SearchQuery) -> Result<S, ScholiaError> {
        if query.page == 0 {
            return Err(ScholiaError::Validation(
                "page numbering is 1-based; page 0 is not a valid page".into(),
            ));
        }
        if query.page_size == 0 {
            return Err(ScholiaError::Validation("page_size must be positive".into()));
        }
        if let Some(sort_by) = &query.sort_by {
            validate_sort_by(sort_by)?;
        }

        let mut req = ApiRequest::get(self.path.as_str())
            .query_pair("page", query.page.to_string())
            .query_pair("pageSize", query.page_size.to_string());
        if let Some(sort_by) = &query.sort_by {
            req = req.query_pair("sortBy", sort_by.as_str());
        }
        if let Some(filters) = &query.filters {
            req = apply_filters(req, filters);
        }

        let doc = self.client.execute(&req).await?;
        serde_json::from_value(doc).map_err(|e| {
            ScholiaError::Validation(format!("failed to validate search response: {e}"))
        })
    }

    /// Iterate all entities matching the criteria using cursor pagination.
    ///
    /// The returned stream is one-shot and lazy: the first page (cursor
    /// `*`) is fetched on first poll, later pages as the previous page
    /// drains. Iteration terminates when the envelope reports no further
    /// cursor or a page comes back empty; dropping the stream halts it
    /// without further fetches.
    pub fn iterate(
        &self,
        query: IterateQuery,
    ) -> impl Stream<Item = Result<T, ScholiaError>> + Send + 'static {
        struct IterState {
            client: ApiClient,
            path: String,
            query: IterateQuery,
            cursor: Option<String>,
            buffered: VecDeque<Value>,
            exhausted: bool,
        }

        let state = IterState {
            client: self.client.clone(),
            path: self.path.clone(),
            query,
            cursor: Some(INITIAL_CURSOR.to_string()),
            buffered: VecDeque::new(),
            exhausted: false,
        };

        futures_util::stream::try_unfold(state, |mut st| async move {
            loop {
                if let Some(raw) = st.buffered.pop_front() {
                    let typed = serde_json::from_value::<T>(raw).map_err(|e| {
                        ScholiaError::Validation(format!("failed to validate item: {e}"))
                    })?;
                    return Ok(Some((typed, st)));
                }
                if st.exhausted {
                    return Ok(None);
                }
                let Some(cursor) = st.cursor.take() else {
                    return Ok(None);
                };

                if st.query.page_size == 0 {
                    return Err(ScholiaError::Validation("page_size must be positive".into()));
                }
                if let Some(sort_by) = &st.query.sort_by {
                    validate_sort_by(sort_by)?;
                }

                let mut req = ApiRequest::get(st.path.as_str())
                    .query_pair("cursor", cursor.as_str())
                    .query_pair("pageSize", st.query.page_size.to_string());
                if let Some(sort_by) = &st.query.sort_by {
                    req = req.query_pair("sortBy", sort_by.as_str());
                }
                if let Some(filters) = &st.query.filters {
                    req = apply_filters(req, filters);
                }

                let doc = st.client.execute(&req).await?;
                let results = st.client.envelope().results(&doc);
                if results.is_empty() {
                    tracing::debug!(path = %st.path, "empty page, stopping iteration");
                    return Ok(None);
                }
                match st.client.envelope().next_cursor(&doc) {
                    Some(next) => st.cursor = Some(next),
                    None => st.exhausted = true,
                }
                st.buffered.extend(results);
            }
        })
    }

    /// Total result count for the given filters, when the API reports one.
    pub async fn total(&self, filters: Option<Filters>) -> Result<Option<u64>, ScholiaError> {
        let mut req = ApiRequest::get(self.path.as_str())
            .query_pair("page", "1")
            .query_pair("pageSize", "1");
        if let Some(filters) = &filters {
            req = apply_filters(req, filters);
        }
        let doc = self.client.execute(&req).await?;
        Ok(self.client.envelope().total(&doc))
    }
}

fn apply_filters(req: ApiRequest, filters: &Filters) -> ApiRequest {
    let mut query = Vec::new();
    filters.append_to(&mut query);
    req.query_pairs(query)
}
