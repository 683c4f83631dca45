use serde_json::Value;

use crate::core::error::ScholiaError;

/// How to read one API's response envelope.
///
/// A concrete client implements this once for its API's outer JSON shape
/// (where the result list, single items, pagination cursor and total count
/// live). The engine and the resource operations go through this trait and
/// never inspect document structure themselves.
pub trait ResponseEnvelope: Send + Sync {
    /// Extract the list of result items. Empty when the document has none.
    fn results(&self, doc: &Value) -> Vec<Value>;

    /// Extract a single item in object form.
    ///
    /// Returns [`ScholiaError::Validation`] when the document does not
    /// contain one.
    fn single(&self, doc: &Value) -> Result<Value, ScholiaError>;

    /// Extract the opaque token identifying the next page, if any.
    /// `None` terminates cursor iteration.
    fn next_cursor(&self, doc: &Value) -> Option<String>;

    /// Extract the total result count, when the API reports one.
    /// Informational only.
    fn total(&self, doc: &Value) -> Option<u64>;
}
