use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Structured filter set flattened to query parameters.
///
/// Concrete clients implement this on their per-resource filter structs.
/// `None`-valued fields are elided from the outgoing query.
pub trait FilterFields: Send + Sync {
    fn fields(&self) -> Vec<(String, Option<String>)>;
}

/// Filter criteria for a search or iteration: either a structured value
/// flattened through [`FilterFields`], or a raw name→value map.
#[derive(Clone)]
pub enum Filters {
    Structured(Arc<dyn FilterFields>),
    Raw(BTreeMap<String, String>),
}

impl Filters {
    pub fn structured(fields: impl FilterFields + 'static) -> Self {
        Self::Structured(Arc::new(fields))
    }

    pub fn raw(map: BTreeMap<String, String>) -> Self {
        Self::Raw(map)
    }

    pub(crate) fn append_to(&self, query: &mut Vec<(String, String)>) {
        match self {
            Self::Structured(fields) => {
                for (name, value) in fields.fields() {
                    if let Some(value) = value {
                        query.push((name, value));
                    }
                }
            }
            Self::Raw(map) => {
                query.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
    }
}

impl fmt::Debug for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured(fields) => {
                let mut query = Vec::new();
                for (name, value) in fields.fields() {
                    if let Some(value) = value {
                        query.push((name, value));
                    }
                }
                f.debug_tuple("Structured").field(&query).finish()
            }
            Self::Raw(map) => f.debug_tuple("Raw").field(map).finish(),
        }
    }
}

impl From<BTreeMap<String, String>> for Filters {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self::Raw(map)
    }
}
