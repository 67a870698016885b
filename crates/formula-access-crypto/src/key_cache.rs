use std::num::NonZeroUsize;

use lru::LruCache;

/// Number of per-page cipher parameter sets kept per handler.
pub(crate) const KEY_CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(5) {
    Some(n) => n,
    None => unreachable!(),
};

/// Small LRU of derived per-page key material.
///
/// Hosts tend to touch the same handful of pages repeatedly (header, usage maps, the current
/// data page), and Office key derivation costs several digest rounds per page.
pub(crate) struct KeyCache<V> {
    entries: LruCache<u32, V>,
}

impl<V> KeyCache<V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: LruCache::new(KEY_CACHE_CAPACITY),
        }
    }

    /// Return the cached value for `page`, computing and inserting it on a miss.
    ///
    /// A hit refreshes the entry; a miss on a full cache evicts the least recently used page.
    pub(crate) fn get_or_compute<F>(&mut self, page: u32, compute: F) -> &V
    where
        F: FnOnce() -> V,
    {
        self.entries.get_or_insert(page, || {
            log::trace!("page key cache miss for page {page}");
            compute()
        })
    }

    #[cfg(test)]
    fn contains(&self, page: u32) -> bool {
        self.entries.contains(&page)
    }
}
