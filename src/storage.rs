//! Page storage: the fixed-page-size block device the tree is built on.
//!
//! The tree treats storage as opaque. It allocates pages with `create_page`, and moves whole pages
//! between its own buffers and the device with `read_page` / `write_page`. Pages are never freed.
//!
//! Three backends are provided:
//! - [`MemoryStorage`]: a vector of pages, for tests and ephemeral trees.
//! - [`FileStorage`]: a single file with a small header frame followed by the pages.
//! - [`CachingStorage`]: a write-through LRU cache wrapping any other storage.
use crate::errors::Error;

pub mod cache;
pub mod file;
pub mod memory;

pub use cache::CachingStorage;
pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Identifier of a page within one storage.
pub type PageId = u32;

/// Sentinel for "no page". Never handed out by `create_page`.
pub const INVALID_PAGE_ID: PageId = PageId::MAX;

/// Page size 4 kilobytes because it’s the same size as a page used in
/// the virtual memory systems of most computer architectures.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Fixed-page-size block device.
///
/// Every buffer passed to `read_page` / `write_page` must be exactly `page_size()` bytes long.
pub trait PageStorage {
    /// Allocates a new zero-filled page and returns its id.
    fn create_page(&mut self) -> Result<PageId, Error>;

    /// Copies page `id` into `buf`.
    fn read_page(&mut self, id: PageId, buf: &mut [u8]) -> Result<(), Error>;

    /// Replaces the content of page `id` with `buf`.
    fn write_page(&mut self, id: PageId, buf: &[u8]) -> Result<(), Error>;

    fn page_size(&self) -> usize;

    /// Number of pages allocated so far.
    fn page_count(&self) -> usize;
}

impl<S: PageStorage + ?Sized> PageStorage for Box<S> {
    fn create_page(&mut self) -> Result<PageId, Error> {
        (**self).create_page()
    }

    fn read_page(&mut self, id: PageId, buf: &mut [u8]) -> Result<(), Error> {
        (**self).read_page(id, buf)
    }

    fn write_page(&mut self, id: PageId, buf: &[u8]) -> Result<(), Error> {
        (**self).write_page(id, buf)
    }

    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    fn page_count(&self) -> usize {
        (**self).page_count()
    }
}

/// Rejects buffers whose length differs from the page size.
pub(crate) fn check_buffer(page_size: usize, len: usize) -> Result<(), Error> {
    if len != page_size {
        return Err(err!(
            Storage,
            "Buffer size mismatch (expected {}, got {})",
            page_size,
            len
        ));
    }
    Ok(())
}

/// Converts a page count into the next page id, refusing to hand out the sentinel.
pub(crate) fn next_page_id(count: usize) -> Result<PageId, Error> {
    match PageId::try_from(count) {
        Ok(id) if id != INVALID_PAGE_ID => Ok(id),
        _ => Err(err!(Storage, "Page id space exhausted at {} pages", count)),
    }
}
