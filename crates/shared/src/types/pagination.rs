//! Cursor pagination for append-only listings.
//!
//! Ledger history is ordered by a store-assigned sequence number, so a page
//! is addressed by "everything after sequence N" instead of an offset. A
//! cursor stays valid while new rows are appended.

use serde::{Deserialize, Serialize};

/// Default number of items per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Request parameters for a cursor-paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorRequest {
    /// Return items strictly after this sequence number. `None` starts at the beginning.
    #[serde(default)]
    pub after: Option<i64>,
    /// Maximum number of items to return.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for CursorRequest {
    fn default() -> Self {
        Self {
            after: None,
            limit: default_limit(),
        }
    }
}

impl CursorRequest {
    /// Starts a listing from the beginning with the given page size.
    #[must_use]
    pub const fn first(limit: u32) -> Self {
        Self { after: None, limit }
    }

    /// Continues a listing after the given cursor.
    #[must_use]
    pub const fn after(cursor: i64, limit: u32) -> Self {
        Self {
            after: Some(cursor),
            limit,
        }
    }

    /// Returns the limit for database queries.
    #[must_use]
    pub fn limit(&self) -> u64 {
        u64::from(self.limit)
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorPage<T> {
    /// The items in the current page.
    pub data: Vec<T>,
    /// Cursor to pass as `after` for the next page, `None` when the listing is exhausted.
    pub next_cursor: Option<i64>,
}

impl<T> CursorPage<T> {
    /// Builds a page from items fetched with `limit + 1` lookahead.
    ///
    /// When more than `limit` items were fetched the surplus is dropped and
    /// the cursor of the last kept item is returned.
    #[must_use]
    pub fn from_lookahead(mut items: Vec<T>, limit: u32, cursor_of: impl Fn(&T) -> i64) -> Self {
        let limit = limit as usize;
        if items.len() > limit {
            items.truncate(limit);
            let next_cursor = items.last().map(cursor_of);
            Self {
                data: items,
                next_cursor,
            }
        } else {
            Self {
                data: items,
                next_cursor: None,
            }
        }
    }

    /// An empty, exhausted page.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            next_cursor: None,
        }
    }

    /// Returns true if another page may follow.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
