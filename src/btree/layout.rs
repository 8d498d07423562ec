//! Byte layout of tree pages and the capacities derived from it.
use super::page::Page;
use crate::errors::Error;
use crate::monoid::UnboxedMonoid;
use crate::storage::PageId;
use crate::unboxed::{Unboxed, UnboxedComparable};
use std::fmt;

/// Represents the type of a B+Tree node.
///
/// | Property           | Interior Node                  | Leaf Node              |
/// |--------------------|--------------------------------|------------------------|
/// | Stores             | keys and pointers to children  | keys and values        |
/// | Number of keys     | up to interior capacity        | up to leaf capacity    |
/// | Number of pointers | number of keys + 1             | none                   |
/// | Number of values   | none                           | number of keys         |
/// | Key purpose        | lower bound of child `i + 1`   | paired with value      |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Leaf,
    Interior,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Leaf => write!(f, "Leaf"),
            NodeKind::Interior => write!(f, "Interior"),
        }
    }
}

// Common Node Header Layout

/// Size of a page id field (4 bytes, little-endian `u32`).
pub const PAGE_ID_SIZE: usize = std::mem::size_of::<PageId>();

/// Offset of the parent pointer field (starts at 0). The root points at itself.
pub const PARENT_OFFSET: usize = 0;

/// Offset of the node kind discriminant word (after the parent pointer).
pub const KIND_OFFSET: usize = PARENT_OFFSET + PAGE_ID_SIZE;

const KIND_SIZE: usize = std::mem::size_of::<u32>();

/// Total size of the common node header.
pub const COMMON_HEADER_SIZE: usize = KIND_OFFSET + KIND_SIZE;

pub const KIND_LEAF: u32 = 0;
pub const KIND_INTERIOR: u32 = 1;

// Leaf Node Header Layout

/// Offset of the left neighbour id. Reserved; written as the invalid page id.
pub const LEAF_LEFT_OFFSET: usize = COMMON_HEADER_SIZE;

/// Offset of the right neighbour id. Reserved; written as the invalid page id.
pub const LEAF_RIGHT_OFFSET: usize = LEAF_LEFT_OFFSET + PAGE_ID_SIZE;

/// Offset of the entry count in a leaf node header.
pub const LEAF_COUNT_OFFSET: usize = LEAF_RIGHT_OFFSET + PAGE_ID_SIZE;

/// Total size of a leaf node header. Entries follow immediately.
pub const LEAF_HEADER_SIZE: usize = LEAF_COUNT_OFFSET + std::mem::size_of::<u32>();

// Interior Node Header Layout

/// Offset of the key count in an interior node header.
pub const INTERIOR_COUNT_OFFSET: usize = COMMON_HEADER_SIZE;

/// Total size of an interior node header. The child id array follows.
pub const INTERIOR_HEADER_SIZE: usize = INTERIOR_COUNT_OFFSET + std::mem::size_of::<u32>();

/// Smallest leaf capacity a tree accepts: a split must leave both halves non-empty.
pub const MIN_LEAF_CAPACITY: usize = 2;

/// Smallest interior capacity a tree accepts: a split must leave a key on both sides of the
/// separator it pushes up.
pub const MIN_INTERIOR_CAPACITY: usize = 3;

/// Geometry of the pages of one tree, fixed at construction from the page size and the widths of
/// the key, value and summary serializations.
///
/// Interior page body:
///
/// ```text
/// | child ids [cap + 1] | child summaries [cap + 1] | keys [cap] |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
    pub page_size: usize,
    pub key_size: usize,
    pub value_size: usize,
    pub summary_size: usize,
    pub leaf_capacity: usize,
    pub interior_capacity: usize,
}

impl NodeLayout {
    pub fn new(
        page_size: usize,
        key_size: usize,
        value_size: usize,
        summary_size: usize,
    ) -> Result<Self, Error> {
        let entry_size = key_size + value_size;
        let leaf_capacity = match page_size.checked_sub(LEAF_HEADER_SIZE) {
            Some(space) if entry_size > 0 => space / entry_size,
            _ => 0,
        };
        let interior_capacity = page_size
            .checked_sub(INTERIOR_HEADER_SIZE + PAGE_ID_SIZE + summary_size)
            .map(|space| space / (key_size + PAGE_ID_SIZE + summary_size))
            .unwrap_or(0);

        if leaf_capacity < MIN_LEAF_CAPACITY {
            return Err(err!(
                Config,
                "Page size {} holds {} leaf entries of {} bytes; at least {} required",
                page_size,
                leaf_capacity,
                entry_size,
                MIN_LEAF_CAPACITY
            ));
        }
        if interior_capacity < MIN_INTERIOR_CAPACITY {
            return Err(err!(
                Config,
                "Page size {} holds {} interior keys; at least {} required",
                page_size,
                interior_capacity,
                MIN_INTERIOR_CAPACITY
            ));
        }
        // Counts and page ids are stored as u32 words.
        if u32::try_from(leaf_capacity.max(interior_capacity)).is_err() {
            return Err(err!(Config, "Page size {} is too large", page_size));
        }

        Ok(Self {
            page_size,
            key_size,
            value_size,
            summary_size,
            leaf_capacity,
            interior_capacity,
        })
    }

    /// Returns the node kind recorded in the page header.
    ///
    /// # Errors
    /// Returns `Error::Corrupt` if the discriminant is neither leaf nor interior.
    pub fn kind(&self, page: &Page) -> Result<NodeKind, Error> {
        match page.read_u32(KIND_OFFSET) {
            KIND_LEAF => Ok(NodeKind::Leaf),
            KIND_INTERIOR => Ok(NodeKind::Interior),
            invalid => Err(err!(
                Corrupt,
                "Invalid node kind {} on page {}",
                invalid,
                page.id()
            )),
        }
    }

    pub fn parent(&self, page: &Page) -> PageId {
        page.read_u32(PARENT_OFFSET)
    }

    pub fn set_parent(&self, page: &mut Page, parent: PageId) {
        page.write_u32(PARENT_OFFSET, parent);
    }

    /// Entry count of a leaf, key count of an interior node.
    pub fn count(&self, page: &Page, kind: NodeKind) -> usize {
        match kind {
            NodeKind::Leaf => page.read_u32(LEAF_COUNT_OFFSET) as usize,
            NodeKind::Interior => page.read_u32(INTERIOR_COUNT_OFFSET) as usize,
        }
    }

    pub fn capacity(&self, kind: NodeKind) -> usize {
        match kind {
            NodeKind::Leaf => self.leaf_capacity,
            NodeKind::Interior => self.interior_capacity,
        }
    }

    pub fn is_full(&self, page: &Page) -> Result<bool, Error> {
        let kind = self.kind(page)?;
        Ok(self.count(page, kind) >= self.capacity(kind))
    }

    // Leaf Node Body Layout

    pub fn leaf_entry_size(&self) -> usize {
        self.key_size + self.value_size
    }

    pub fn leaf_key_offset(&self, slot: usize) -> usize {
        LEAF_HEADER_SIZE + slot * self.leaf_entry_size()
    }

    pub fn leaf_value_offset(&self, slot: usize) -> usize {
        self.leaf_key_offset(slot) + self.key_size
    }

    // Interior Node Body Layout

    pub fn child_id_offset(&self, slot: usize) -> usize {
        INTERIOR_HEADER_SIZE + slot * PAGE_ID_SIZE
    }

    pub fn child_summary_offset(&self, slot: usize) -> usize {
        self.child_id_offset(self.interior_capacity + 1) + slot * self.summary_size
    }

    pub fn interior_key_offset(&self, index: usize) -> usize {
        self.child_summary_offset(self.interior_capacity + 1) + index * self.key_size
    }

    pub fn child_id(&self, page: &Page, slot: usize) -> PageId {
        page.read_u32(self.child_id_offset(slot))
    }
}

/// The strategies of one tree bundled with the geometry they imply.
#[derive(Debug, Clone)]
pub struct TreeSchema<K, V, M> {
    pub key: K,
    pub value: V,
    pub summary: M,
    pub layout: NodeLayout,
}

impl<K, V, M> TreeSchema<K, V, M>
where
    K: UnboxedComparable,
    V: Unboxed,
    M: UnboxedMonoid,
{
    /// # Errors
    /// Returns `Error::Config` if the page size is too small for the widths, or if the summary
    /// cannot measure entries of this key and value width.
    pub fn new(key: K, value: V, summary: M, page_size: usize) -> Result<Self, Error> {
        if !summary.fits(key.size(), value.size()) {
            return Err(err!(
                Config,
                "Summary cannot measure entries with {}-byte keys and {}-byte values",
                key.size(),
                value.size()
            ));
        }
        let layout = NodeLayout::new(page_size, key.size(), value.size(), summary.size())?;
        Ok(Self {
            key,
            value,
            summary,
            layout,
        })
    }

    /// True when the tree carries a non-trivial summary that has to be maintained.
    pub fn has_summary(&self) -> bool {
        self.layout.summary_size > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monoid::{Count, Pair, ValueExtent};
    use crate::unboxed::{U32, U64};

    #[test]
    fn test_capacities_follow_widths() -> Result<(), Error> {
        // 20-byte leaf header + 4 entries of 16 bytes.
        let layout = NodeLayout::new(84, 8, 8, 0)?;
        assert_eq!(layout.leaf_capacity, 4);
        assert_eq!(layout.interior_capacity, (84 - 16) / 12);

        let layout = NodeLayout::new(4096, 8, 8, 17)?;
        assert_eq!(layout.leaf_capacity, (4096 - 20) / 16);
        assert_eq!(layout.interior_capacity, (4096 - 16 - 17) / (8 + 4 + 17));
        Ok(())
    }

    #[test]
    fn test_regions_do_not_overlap() -> Result<(), Error> {
        let layout = NodeLayout::new(512, 8, 8, 9)?;
        let cap = layout.interior_capacity;
        assert_eq!(layout.child_summary_offset(0), layout.child_id_offset(cap + 1));
        assert_eq!(layout.interior_key_offset(0), layout.child_summary_offset(cap + 1));
        assert!(layout.interior_key_offset(cap) <= layout.page_size);
        assert!(layout.leaf_key_offset(layout.leaf_capacity) <= layout.page_size);
        Ok(())
    }

    #[test]
    fn test_tiny_pages_are_rejected() {
        let err = NodeLayout::new(40, 8, 8, 0).map(|_| ()).map_err(|e| e.code());
        assert_eq!(err, Err(5000));
        let err = NodeLayout::new(8, 8, 8, 0).map(|_| ()).map_err(|e| e.code());
        assert_eq!(err, Err(5000));
    }

    #[test]
    fn test_summary_width_must_match_values() {
        let narrow = TreeSchema::new(U64, U64, ValueExtent::new(U32), 512);
        assert_eq!(narrow.map(|_| ()).map_err(|e| e.code()), Err(5000));
        let wide = TreeSchema::new(U64, U32, Pair::new(Count, ValueExtent::new(U64)), 512);
        assert_eq!(wide.map(|_| ()).map_err(|e| e.code()), Err(5000));
        assert!(TreeSchema::new(U64, U32, ValueExtent::new(U32), 512).is_ok());
    }
}
