//! Write-through LRU page cache.
//!
//! Reads are served from the cache when possible; writes always reach the inner storage and refresh
//! the cached copy, so dropping the cache never loses data.
use super::{PageId, PageStorage};
use crate::errors::Error;
use std::collections::HashMap;
use tracing::trace;

struct CachedPage {
    data: Box<[u8]>,
    last_used: u64,
}

pub struct CachingStorage<S> {
    inner: S,
    capacity: usize,
    pages: HashMap<PageId, CachedPage>,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl<S: PageStorage> CachingStorage<S> {
    /// Wraps `inner`, keeping at most `capacity` pages (at least one).
    pub fn new(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            capacity: capacity.max(1),
            pages: HashMap::new(),
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remember(&mut self, id: PageId, buf: &[u8]) {
        let last_used = self.touch();
        if let Some(page) = self.pages.get_mut(&id) {
            page.data.copy_from_slice(buf);
            page.last_used = last_used;
            return;
        }
        if self.pages.len() >= self.capacity {
            self.evict();
        }
        self.pages.insert(
            id,
            CachedPage {
                data: buf.to_vec().into_boxed_slice(),
                last_used,
            },
        );
    }

    fn evict(&mut self) {
        let victim = self
            .pages
            .iter()
            .min_by_key(|(_, page)| page.last_used)
            .map(|(id, _)| *id);
        if let Some(id) = victim {
            trace!(page = id, "Evicting cached page");
            self.pages.remove(&id);
        }
    }
}

impl<S: PageStorage> PageStorage for CachingStorage<S> {
    fn create_page(&mut self) -> Result<PageId, Error> {
        self.inner.create_page()
    }

    fn read_page(&mut self, id: PageId, buf: &mut [u8]) -> Result<(), Error> {
        let last_used = self.touch();
        if let Some(page) = self.pages.get_mut(&id) {
            if page.data.len() == buf.len() {
                buf.copy_from_slice(&page.data);
                page.last_used = last_used;
                self.hits += 1;
                return Ok(());
            }
        }
        self.misses += 1;
        self.inner.read_page(id, buf)?;
        self.remember(id, buf);
        Ok(())
    }

    fn write_page(&mut self, id: PageId, buf: &[u8]) -> Result<(), Error> {
        self.inner.write_page(id, buf)?;
        self.remember(id, buf);
        Ok(())
    }

    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    fn page_count(&self) -> usize {
        self.inner.page_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_repeated_reads_hit_cache() -> Result<(), Error> {
        let mut cache = CachingStorage::new(MemoryStorage::new(16), 2);
        let id = cache.create_page()?;
        cache.write_page(id, &[1u8; 16])?;

        let mut buf = vec![0u8; 16];
        cache.read_page(id, &mut buf)?;
        cache.read_page(id, &mut buf)?;
        assert_eq!(buf, vec![1u8; 16]);
        assert_eq!((cache.hits(), cache.misses()), (2, 0));
        assert_eq!(cache.inner().reads(), 0);
        assert_eq!(cache.inner().writes(), 1);
        Ok(())
    }

    #[test]
    fn test_least_recently_used_page_is_evicted() -> Result<(), Error> {
        let mut cache = CachingStorage::new(MemoryStorage::new(8), 2);
        let ids = [cache.create_page()?, cache.create_page()?, cache.create_page()?];
        let mut buf = vec![0u8; 8];

        cache.read_page(ids[0], &mut buf)?;
        cache.read_page(ids[1], &mut buf)?;
        cache.read_page(ids[0], &mut buf)?;
        // Page 1 is now the coldest; reading page 2 pushes it out.
        cache.read_page(ids[2], &mut buf)?;
        cache.read_page(ids[0], &mut buf)?;
        assert_eq!(cache.misses(), 3);
        cache.read_page(ids[1], &mut buf)?;
        assert_eq!(cache.misses(), 4);
        Ok(())
    }
}
