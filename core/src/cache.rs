//! Commands for the frontend cache.

use crate::change::Change;

/// Directs the frontend to drop or revalidate cached content.
///
/// Commands are outgoing only. They are never read from request headers,
/// but travel as params when the response redirects.
#[derive(Debug)]
pub struct Cache<'a> {
    change: &'a Change,
}

impl<'a> Cache<'a> {
    pub(crate) fn new(change: &'a Change) -> Self {
        Self { change }
    }

    /// Marks cache entries matching the given URL pattern as stale.
    ///
    /// Stale content is still shown instantly, then revalidated against
    /// the server. Later calls overwrite the pattern of earlier calls.
    pub fn expire(&self, pattern: &str) {
        self.change.set_expire_cache(pattern);
    }

    /// Marks the entire cache as stale.
    pub fn expire_all(&self) {
        self.expire("*");
    }

    /// Erases cache entries matching the given URL pattern.
    pub fn evict(&self, pattern: &str) {
        self.change.set_evict_cache(pattern);
    }

    /// Erases the entire cache.
    pub fn evict_all(&self) {
        self.evict("*");
    }

    /// Deprecated alias for [`expire_all`](Self::expire_all).
    pub fn clear(&self) {
        self.change
            .warn_deprecated("cache.clear is deprecated; use cache.expire instead");
        self.expire_all();
    }

    /// Formerly kept the frontend from expiring the cache after a non-GET
    /// request. The frontend no longer does that on its own, so there is
    /// nothing left to keep.
    pub fn keep(&self) {
        self.change
            .warn_deprecated("cache.keep is deprecated and has no effect");
    }
}
