//! Search filters and their query-string encoding.

use serde::{Deserialize, Serialize};

use super::page::PageReference;
use super::task::Payload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterOp {
    Eq,
}

/// Equality predicate on a payload field, evaluated by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Filter {
    pub op: FilterOp,
    pub key: String,
    pub value: String,
}

impl Filter {
    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            op: FilterOp::Eq,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Does `payload` satisfy this filter?
    ///
    /// String values compare as-is; other JSON values compare by their JSON
    /// rendering (`42`, `true`).
    pub fn matches(&self, payload: &Payload) -> bool {
        match self.op {
            FilterOp::Eq => match payload.get(&self.key) {
                Some(serde_json::Value::String(s)) => *s == self.value,
                Some(other) => other.to_string() == self.value,
                None => false,
            },
        }
    }
}

/// Encode filters as the `q` query parameter.
///
/// Returns `None` for an empty set. Filters are sorted first so that the same
/// set always yields the same string, whatever order the caller built it in.
pub fn serialize_filters(filters: &[Filter]) -> serde_json::Result<Option<String>> {
    if filters.is_empty() {
        return Ok(None);
    }
    let mut sorted: Vec<&Filter> = filters.iter().collect();
    sorted.sort();
    serde_json::to_string(&sorted).map(Some)
}

/// Query parameters for a listing request, in a stable order: `q`, then `page`.
pub fn page_query(
    filters: &[Filter],
    page: Option<&PageReference>,
) -> serde_json::Result<Vec<(&'static str, String)>> {
    let mut params = Vec::with_capacity(2);
    if let Some(q) = serialize_filters(filters)? {
        params.push(("q", q));
    }
    if let Some(page) = page {
        params.push(("page", page.as_str().to_string()));
    }
    Ok(params)
}
