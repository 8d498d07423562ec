//! In-memory page storage.
//! Intended for tests, the stress command and ephemeral trees.
use super::{check_buffer, next_page_id, PageId, PageStorage};
use crate::errors::Error;
use tracing::trace;

/// Pages kept in a vector; page `n` lives at index `n`.
#[derive(Debug)]
pub struct MemoryStorage {
    page_size: usize,
    pages: Vec<Box<[u8]>>,
    reads: u64,
    writes: u64,
}

impl MemoryStorage {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            reads: 0,
            writes: 0,
        }
    }

    /// Number of `read_page` calls served so far.
    pub fn reads(&self) -> u64 {
        self.reads
    }

    /// Number of `write_page` calls served so far.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    fn page(&self, id: PageId) -> Result<&[u8], Error> {
        self.pages
            .get(id as usize)
            .map(|p| &p[..])
            .ok_or_else(|| err!(Storage, "Memory page {} not found.", id))
    }
}

impl PageStorage for MemoryStorage {
    fn create_page(&mut self) -> Result<PageId, Error> {
        let id = next_page_id(self.pages.len())?;
        self.pages.push(vec![0u8; self.page_size].into_boxed_slice());
        trace!(page = id, "Allocated memory page");
        Ok(id)
    }

    fn read_page(&mut self, id: PageId, buf: &mut [u8]) -> Result<(), Error> {
        check_buffer(self.page_size, buf.len())?;
        buf.copy_from_slice(self.page(id)?);
        self.reads += 1;
        Ok(())
    }

    fn write_page(&mut self, id: PageId, buf: &[u8]) -> Result<(), Error> {
        check_buffer(self.page_size, buf.len())?;
        let page = self
            .pages
            .get_mut(id as usize)
            .ok_or_else(|| err!(Storage, "Memory page {} not found.", id))?;
        page.copy_from_slice(buf);
        self.writes += 1;
        Ok(())
    }

    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }
}
