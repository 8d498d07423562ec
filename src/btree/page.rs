//! Reusable page buffers.
use crate::errors::Error;
use crate::storage::{PageId, PageStorage, INVALID_PAGE_ID};
use tracing::trace;

/// One page-sized buffer bound to a page id, with a dirty flag for write-back.
///
/// The tree keeps a handful of these alive for its whole lifetime and rebinds them as the walk
/// moves, so a lookup or insert never allocates a page buffer.
#[derive(Debug, Clone)]
pub struct Page {
    id: PageId,
    data: Vec<u8>,
    dirty: bool,
}

impl Page {
    pub fn new(page_size: usize) -> Self {
        Self {
            id: INVALID_PAGE_ID,
            data: vec![0u8; page_size],
            dirty: false,
        }
    }

    pub fn id(&self) -> PageId {
        self.id
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Reads page `id` from storage into this buffer, discarding the previous binding.
    pub fn load<S: PageStorage + ?Sized>(&mut self, storage: &mut S, id: PageId) -> Result<(), Error> {
        storage.read_page(id, &mut self.data)?;
        trace!(page = id, "Loaded page");
        self.id = id;
        self.dirty = false;
        Ok(())
    }

    /// Binds this buffer to a freshly allocated page, zero-filled and dirty.
    pub fn bind_blank(&mut self, id: PageId) {
        self.data.fill(0);
        self.id = id;
        self.dirty = true;
    }

    /// Writes the buffer back if it was modified since it was loaded.
    pub fn write_back<S: PageStorage + ?Sized>(&mut self, storage: &mut S) -> Result<(), Error> {
        if self.dirty {
            storage.write_page(self.id, &self.data)?;
            trace!(page = self.id, "Wrote page back");
            self.dirty = false;
        }
        Ok(())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable access to the raw bytes; marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.data
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_le_bytes(bytes)
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        self.dirty = true;
    }

    pub fn bytes(&self, offset: usize, len: usize) -> &[u8] {
        &self.data[offset..offset + len]
    }

    pub fn bytes_mut(&mut self, offset: usize, len: usize) -> &mut [u8] {
        self.dirty = true;
        &mut self.data[offset..offset + len]
    }

    /// Moves `len` bytes from `src` to `dest` inside the page; the ranges may overlap.
    pub fn shift(&mut self, src: usize, dest: usize, len: usize) {
        if len > 0 && src != dest {
            self.data.copy_within(src..src + len, dest);
            self.dirty = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn test_write_back_only_when_dirty() -> Result<(), Error> {
        let mut storage = MemoryStorage::new(16);
        let id = storage.create_page()?;
        let mut page = Page::new(16);

        page.load(&mut storage, id)?;
        page.write_back(&mut storage)?;
        assert_eq!(storage.writes(), 0);

        page.write_u32(4, 0xDEAD_BEEF);
        assert!(page.is_dirty());
        page.write_back(&mut storage)?;
        assert_eq!(storage.writes(), 1);

        let mut other = Page::new(16);
        other.load(&mut storage, id)?;
        assert_eq!(other.read_u32(4), 0xDEAD_BEEF);
        Ok(())
    }

    #[test]
    fn test_shift_handles_overlap() {
        let mut page = Page::new(8);
        page.data_mut()[..4].copy_from_slice(&[1, 2, 3, 4]);
        page.shift(0, 2, 4);
        assert_eq!(&page.data()[..6], &[1, 2, 1, 2, 3, 4]);
    }
}
