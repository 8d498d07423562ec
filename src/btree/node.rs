//! Geometry shared by the leaf and interior views of a page.
use super::layout::{NodeKind, NodeLayout};
use super::page::Page;
use crate::errors::Error;
use crate::storage::PageId;
use crate::unboxed::UnboxedComparable;
use std::cmp::Ordering;

/// A typed view over one page buffer holding a sorted array of keys.
///
/// Implemented by [`LeafNodeCursor`](super::leaf::LeafNodeCursor) and
/// [`InteriorNodeCursor`](super::interior::InteriorNodeCursor); the provided methods are the
/// searches and boundary comparisons the walk relies on.
pub trait NodeCursor {
    type Key: UnboxedComparable;

    fn key_strategy(&self) -> &Self::Key;

    fn layout(&self) -> &NodeLayout;

    fn page(&self) -> &Page;

    /// The kind this view interprets the page as.
    fn kind(&self) -> NodeKind;

    /// Serialized key at `index`, `index < count()`.
    fn key_bytes(&self, index: usize) -> &[u8];

    /// Moves the upper part of this full node into the fresh page `right_id`, bound to the
    /// `right` buffer, and writes the separator for it at `separator_offset` in `parent`.
    ///
    /// Both halves stay non-empty and keep this node's parent id.
    ///
    /// # Errors
    /// Returns `Error::Precondition` if the node holds too few keys to split.
    fn split(
        &mut self,
        right: &mut Page,
        right_id: PageId,
        parent: &mut Page,
        separator_offset: usize,
    ) -> Result<(), Error>;

    fn page_id(&self) -> PageId {
        self.page().id()
    }

    fn parent_id(&self) -> PageId {
        self.layout().parent(self.page())
    }

    /// Tests the discriminant stored in the page header.
    fn is_leaf(&self) -> bool {
        matches!(self.layout().kind(self.page()), Ok(NodeKind::Leaf))
    }

    fn count(&self) -> usize {
        self.layout().count(self.page(), self.kind())
    }

    fn capacity(&self) -> usize {
        self.layout().capacity(self.kind())
    }

    fn is_full(&self) -> bool {
        self.count() >= self.capacity()
    }

    /// Compares the key at `index` with `key`.
    ///
    /// Out-of-range indices act as sentinels: `index < 0` always compares `Greater` and
    /// `index >= count()` always compares `Less`, so callers never special-case array ends.
    fn compare(&self, index: isize, key: &[u8]) -> Ordering {
        if index < 0 {
            return Ordering::Greater;
        }
        let index = index as usize;
        if index >= self.count() {
            return Ordering::Less;
        }
        self.key_strategy().compare(self.key_bytes(index), key)
    }

    /// Binary search for the insertion point of `key`: the index of the first key `>= key`, or
    /// `count()` when every key is smaller.
    fn search(&self, key: &[u8]) -> usize {
        let (mut min, mut max) = (0, self.count());
        while min < max {
            let mid = min + (max - min) / 2;
            match self.key_strategy().compare(self.key_bytes(mid), key) {
                Ordering::Less => min = mid + 1,
                Ordering::Equal | Ordering::Greater => max = mid,
            }
        }
        min
    }
}
