use crate::core::error::ScholiaError;

/// Sort direction accepted in a `sort_by` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Validate a `"<field> <asc|desc>"` expression.
///
/// Only the syntax is checked; whether the field is sortable is the
/// concrete client's responsibility. The expression is passed to the API
/// verbatim.
pub(crate) fn validate_sort_by(sort_by: &str) -> Result<(), ScholiaError> {
    let mut parts = sort_by.split_whitespace();
    let field = parts.next().unwrap_or_default();
    let direction = parts.next();

    if field.is_empty() {
        return Err(ScholiaError::Validation(
            "sort expression must name a field".into(),
        ));
    }
    let Some(direction) = direction else {
        return Err(ScholiaError::Validation(format!(
            "sort expression '{sort_by}' is missing a direction ('asc' or 'desc')"
        )));
    };
    if SortOrder::parse(direction).is_none() {
        return Err(ScholiaError::Validation(format!(
            "sort direction '{direction}' is not one of 'asc' or 'desc'"
        )));
    }
    if parts.next().is_some() {
        return Err(ScholiaError::Validation(format!(
            "sort expression '{sort_by}' has trailing tokens"
        )));
    }
    Ok(())
}
