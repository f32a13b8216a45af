//! Query-related data models.
//!
//! This module defines the request bundles accepted by the repository and the
//! session-tagged envelopes it returns.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Default page size when the caller asks for a non-positive one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Opaque token a caller attaches to each dispatched operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh random token.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Envelope returned by every repository operation.
///
/// `session_id` is echoed unchanged from the request so the caller can tell
/// whether the result has been superseded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResults<T> {
    pub session_id: SessionId,
    pub data: T,
}

impl<T> QueryResults<T> {
    pub fn new(session_id: SessionId, data: T) -> Self {
        Self { session_id, data }
    }
}

impl<T: Default> QueryResults<T> {
    /// The empty/zero shape for an operation.
    pub fn empty(session_id: SessionId) -> Self {
        Self::new(session_id, T::default())
    }
}

/// A page of table rows plus the total row count under the same filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableRows {
    pub columns: Vec<String>,
    pub rows: Vec<serde_json::Map<String, serde_json::Value>>,
    pub count: u64,
}

impl TableRows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Result of a row-count request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowCount {
    pub count: u64,
}

/// How the column listing is ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnSort {
    /// Engine policy: optionally primary keys first, then declaration order or name.
    #[default]
    Default,
    Ascending,
    Descending,
}

impl FromStr for ColumnSort {
    type Err = std::convert::Infallible;

    /// Anything other than `ascending` or `descending` selects the default policy.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "ascending" | "asc" => Self::Ascending,
            "descending" | "desc" => Self::Descending,
            _ => Self::Default,
        })
    }
}

/// Sort key for a value histogram. Value sort takes precedence over count sort;
/// with neither set, values are ordered ascending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueSort {
    pub by_value: Option<bool>,
    pub by_count: Option<bool>,
}

/// Which key a histogram is sorted on, and in which direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramOrder {
    Value { ascending: bool },
    Count { ascending: bool },
}

impl ValueSort {
    pub fn by_value(ascending: bool) -> Self {
        Self {
            by_value: Some(ascending),
            by_count: None,
        }
    }

    pub fn by_count(ascending: bool) -> Self {
        Self {
            by_value: None,
            by_count: Some(ascending),
        }
    }

    pub fn resolve(&self) -> HistogramOrder {
        match (self.by_value, self.by_count) {
            (Some(ascending), _) => HistogramOrder::Value { ascending },
            (None, Some(ascending)) => HistogramOrder::Count { ascending },
            (None, None) => HistogramOrder::Value { ascending: true },
        }
    }
}

/// One `ORDER BY` term of a row request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTerm {
    pub column: String,
    pub ascending: bool,
}

impl OrderTerm {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }
}

/// Offset/limit pair after clamping a page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub offset: u64,
    pub limit: u64,
}

/// Parameters for a paged row request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub order_by_columns: Vec<String>,
    /// Parallel to `order_by_columns`; a missing entry means ascending.
    #[serde(default)]
    pub sort_ascending: Vec<bool>,
    #[serde(default)]
    pub page_index: i64,
    #[serde(default)]
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page_index: i64, page_size: i64) -> Self {
        Self {
            page_index,
            page_size,
            ..Self::default()
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order_by_columns.push(column.into());
        self.sort_ascending.push(ascending);
        self
    }

    /// Page index clamped to at least 1.
    pub fn effective_page_index(&self) -> u64 {
        self.page_index.max(1) as u64
    }

    /// Page size, falling back to `default_size` when non-positive.
    pub fn effective_page_size(&self, default_size: u32) -> u64 {
        if self.page_size <= 0 {
            u64::from(default_size.max(1))
        } else {
            self.page_size as u64
        }
    }

    pub fn window(&self, default_size: u32) -> PageWindow {
        let limit = self.effective_page_size(default_size);
        let offset = (self.effective_page_index() - 1).saturating_mul(limit);
        PageWindow { offset, limit }
    }

    /// Explicit ordering terms, skipping blank column names.
    pub fn order_terms(&self) -> Vec<OrderTerm> {
        self.order_by_columns
            .iter()
            .enumerate()
            .filter(|(_, column)| !column.trim().is_empty())
            .map(|(idx, column)| OrderTerm {
                column: column.clone(),
                ascending: self.sort_ascending.get(idx).copied().unwrap_or(true),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
        assert_eq!(SessionId::from("abc").as_str(), "abc");
    }

    #[test]
    fn test_query_results_serialization() {
        let results = QueryResults::new(SessionId::from("s1"), RowCount { count: 3 });
        let json = serde_json::to_value(&results).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["data"]["count"], 3);
    }

    #[test]
    fn test_query_results_empty() {
        let results: QueryResults<Vec<String>> = QueryResults::empty(SessionId::from("s"));
        assert!(results.data.is_empty());
    }

    #[test]
    fn test_column_sort_parse() {
        assert_eq!("ascending".parse::<ColumnSort>().unwrap(), ColumnSort::Ascending);
        assert_eq!("descending".parse::<ColumnSort>().unwrap(), ColumnSort::Descending);
        assert_eq!("".parse::<ColumnSort>().unwrap(), ColumnSort::Default);
        assert_eq!("whatever".parse::<ColumnSort>().unwrap(), ColumnSort::Default);
    }

    #[test]
    fn test_value_sort_precedence() {
        let both = ValueSort {
            by_value: Some(false),
            by_count: Some(true),
        };
        assert_eq!(both.resolve(), HistogramOrder::Value { ascending: false });
        assert_eq!(
            ValueSort::by_count(false).resolve(),
            HistogramOrder::Count { ascending: false }
        );
        assert_eq!(
            ValueSort::default().resolve(),
            HistogramOrder::Value { ascending: true }
        );
    }

    #[test]
    fn test_page_window() {
        let window = PageRequest::new(3, 20).window(DEFAULT_PAGE_SIZE);
        assert_eq!(window, PageWindow { offset: 40, limit: 20 });
    }

    #[test]
    fn test_page_window_clamps() {
        let window = PageRequest::new(0, 0).window(DEFAULT_PAGE_SIZE);
        assert_eq!(window, PageWindow { offset: 0, limit: 20 });

        let window = PageRequest::new(-4, -1).window(50);
        assert_eq!(window, PageWindow { offset: 0, limit: 50 });
    }

    #[test]
    fn test_order_terms_default_ascending() {
        let mut request = PageRequest::new(1, 20).order_by("a", false);
        request.order_by_columns.push("b".into());
        request.order_by_columns.push("  ".into());
        assert_eq!(
            request.order_terms(),
            vec![OrderTerm::desc("a"), OrderTerm::asc("b")]
        );
    }
}
