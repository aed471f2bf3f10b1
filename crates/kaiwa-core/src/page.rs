//! Cursor pagination primitives.
//!
//! Cursors are opaque server tokens: the client round-trips them verbatim and
//! never constructs, parses, or mutates one. `has_more` is derived here in
//! one place so the zero-items guard applies to every collection.

use crate::error::Error;
use crate::http::HttpResponse;

/// How a page fetch merges into the local collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Replace the stored page wholesale. Used when (re-)entering a view so
    /// stale duplicates from unrelated fetches cannot accumulate.
    Reset,
    /// Append to the existing page using the stored cursor ("load more").
    More,
}

/// One fetched page of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Derive a page from wire parts.
    ///
    /// A non-null cursor alongside zero items is treated as exhausted — a
    /// malformed server response must not produce an infinite load-more loop.
    pub fn from_parts(items: Vec<T>, next_cursor: Option<String>) -> Self {
        let has_more = next_cursor.is_some() && !items.is_empty();
        Self {
            items,
            next_cursor,
            has_more,
        }
    }

    /// An empty, exhausted page.
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
            has_more: false,
        }
    }
}

/// Build `base?limit=N[&cursor=C]` with the cursor passed through verbatim
/// (percent-encoded for transport only).
pub fn paged_path(base: &str, limit: usize, cursor: Option<&str>) -> String {
    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("limit", &limit.to_string());
    if let Some(cursor) = cursor {
        query.append_pair("cursor", cursor);
    }
    format!("{}?{}", base, query.finish())
}

/// Map a page-fetch response status to the pagination error policy: HTTP 400
/// on a request that carried a cursor means the cursor was rejected
/// (malformed or expired) and surfaces as [`Error::InvalidCursor`] — never a
/// silent fallback to page 1.
pub fn check_page_response(
    response: HttpResponse,
    had_cursor: bool,
) -> Result<HttpResponse, Error> {
    if response.status == 400 && had_cursor {
        return Err(Error::InvalidCursor);
    }
    response.error_for_status()
}
