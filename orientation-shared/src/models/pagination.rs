/// Bounded limit/offset pagination
///
/// Every list endpoint accepts `limit` and `offset` query parameters. Missing
/// values fall back to the defaults and out-of-range values are clamped
/// rather than rejected.
///
/// # Example
///
/// ```
/// use orientation_shared::models::pagination::Pagination;
///
/// let page = Pagination::new(Some(500), Some(-3));
/// assert_eq!(page.limit, 100);
/// assert_eq!(page.offset, 0);
/// ```

use serde::Serialize;

/// Default page size
pub const DEFAULT_LIMIT: i64 = 25;

/// Largest page size a caller can request
pub const MAX_LIMIT: i64 = 100;

/// Normalized page window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
}

impl Pagination {
    /// Clamps `limit` to `1..=MAX_LIMIT` and `offset` to `>= 0`
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the unpaginated total
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            limit: pagination.limit,
            offset: pagination.offset,
        }
    }

    /// Maps every item, keeping the page window
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Builds an `ILIKE` pattern matching `needle` anywhere, escaping wildcards
///
/// Returns `None` for blank input so callers can skip the filter.
pub fn search_pattern(needle: Option<&str>) -> Option<String> {
    let needle = needle?.trim();
    if needle.is_empty() {
        return None;
    }

    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    Some(escaped)
}
