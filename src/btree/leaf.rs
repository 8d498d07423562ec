//! Leaf view: a page as a sorted array of `(key, value)` entries.
//!
//! ```text
//! +-------------------------+
//! | parent id        (4B)   |
//! | kind = 0         (4B)   |
//! | left neighbour   (4B)   |  reserved
//! | right neighbour  (4B)   |  reserved
//! | entry count      (4B)   |
//! +-------------------------+
//! | key 0 | value 0         |
//! | key 1 | value 1         |
//! | ...                     |
//! +-------------------------+
//! ```
use super::layout::{
    NodeKind, NodeLayout, TreeSchema, KIND_LEAF, KIND_OFFSET, LEAF_COUNT_OFFSET, LEAF_HEADER_SIZE,
    LEAF_LEFT_OFFSET, LEAF_RIGHT_OFFSET, MIN_LEAF_CAPACITY,
};
use super::node::NodeCursor;
use super::page::Page;
use crate::errors::Error;
use crate::monoid::UnboxedMonoid;
use crate::storage::{PageId, INVALID_PAGE_ID};
use crate::unboxed::{Unboxed, UnboxedComparable};

pub struct LeafNodeCursor<'a, K, V, M> {
    schema: &'a TreeSchema<K, V, M>,
    page: &'a mut Page,
}

impl<'a, K, V, M> LeafNodeCursor<'a, K, V, M>
where
    K: UnboxedComparable,
    V: Unboxed,
    M: UnboxedMonoid,
{
    /// Views an already initialized leaf page.
    pub fn bind(schema: &'a TreeSchema<K, V, M>, page: &'a mut Page) -> Self {
        Self { schema, page }
    }

    /// Rebinds `page` to the fresh page `id` and writes an empty leaf header into it.
    pub fn init(
        schema: &'a TreeSchema<K, V, M>,
        page: &'a mut Page,
        id: PageId,
        parent: PageId,
    ) -> Self {
        page.bind_blank(id);
        schema.layout.set_parent(page, parent);
        page.write_u32(KIND_OFFSET, KIND_LEAF);
        page.write_u32(LEAF_LEFT_OFFSET, INVALID_PAGE_ID);
        page.write_u32(LEAF_RIGHT_OFFSET, INVALID_PAGE_ID);
        page.write_u32(LEAF_COUNT_OFFSET, 0);
        Self { schema, page }
    }

    fn set_count(&mut self, count: usize) {
        self.page.write_u32(LEAF_COUNT_OFFSET, count as u32);
    }

    pub fn key_at(&self, slot: usize) -> K::Value {
        self.schema.key.deserialize(self.key_bytes(slot))
    }

    pub fn value_bytes(&self, slot: usize) -> &[u8] {
        let layout = &self.schema.layout;
        self.page
            .bytes(layout.leaf_value_offset(slot), layout.value_size)
    }

    pub fn get_value(&self, slot: usize) -> V::Value {
        self.schema.value.deserialize(self.value_bytes(slot))
    }

    /// Overwrites the value at `slot`, returning the previous one. The page is left dirty.
    pub fn set_value(&mut self, slot: usize, value: &V::Value) -> V::Value {
        let old = self.get_value(slot);
        let layout = self.schema.layout;
        let out = self
            .page
            .bytes_mut(layout.leaf_value_offset(slot), layout.value_size);
        self.schema.value.serialize(value, out);
        old
    }

    /// Inserts a new entry at `slot`, shifting `[slot, count)` one to the right.
    ///
    /// # Errors
    /// Returns `Error::Precondition` if the leaf is full or `slot` lies past the end; the walk
    /// splits full leaves before it gets here.
    pub fn insert_at(&mut self, slot: usize, key: &[u8], value: &V::Value) -> Result<(), Error> {
        let count = self.count();
        if count >= self.capacity() {
            return Err(err!(
                Precondition,
                "Leaf {} is full ({} entries)",
                self.page.id(),
                count
            ));
        }
        if slot > count {
            return Err(err!(
                Precondition,
                "Slot {} is past the end of leaf {} ({} entries)",
                slot,
                self.page.id(),
                count
            ));
        }

        let layout = self.schema.layout;
        let entry_size = layout.leaf_entry_size();
        // Make room for the new cell
        self.page.shift(
            layout.leaf_key_offset(slot),
            layout.leaf_key_offset(slot + 1),
            (count - slot) * entry_size,
        );
        self.page
            .bytes_mut(layout.leaf_key_offset(slot), layout.key_size)
            .copy_from_slice(&key[..layout.key_size]);
        let out = self
            .page
            .bytes_mut(layout.leaf_value_offset(slot), layout.value_size);
        self.schema.value.serialize(value, out);
        self.set_count(count + 1);
        Ok(())
    }

    /// Folds the measures of entries `[from, to)` into `acc`; `item` is scratch of summary width.
    pub fn fold_entries(&self, from: usize, to: usize, acc: &mut [u8], item: &mut [u8]) {
        let summary = &self.schema.summary;
        for slot in from..to.min(self.count()) {
            summary.measure(self.key_bytes(slot), self.value_bytes(slot), item);
            summary.combine(acc, item);
        }
    }

    /// Writes the summary of the whole leaf into `acc`.
    pub fn summarize(&self, acc: &mut [u8], item: &mut [u8]) {
        self.schema.summary.identity(acc);
        self.fold_entries(0, self.count(), acc, item);
    }
}

impl<K, V, M> NodeCursor for LeafNodeCursor<'_, K, V, M>
where
    K: UnboxedComparable,
    V: Unboxed,
    M: UnboxedMonoid,
{
    type Key = K;

    fn key_strategy(&self) -> &K {
        &self.schema.key
    }

    fn layout(&self) -> &NodeLayout {
        &self.schema.layout
    }

    fn page(&self) -> &Page {
        &*self.page
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Leaf
    }

    fn key_bytes(&self, index: usize) -> &[u8] {
        let layout = &self.schema.layout;
        self.page.bytes(layout.leaf_key_offset(index), layout.key_size)
    }

    /// Moves the upper half of the entries (by count) into the fresh leaf `right_id`, bound to
    /// the `right` buffer, and writes the first key of that half at `separator_offset` in the
    /// parent page.
    fn split(
        &mut self,
        right: &mut Page,
        right_id: PageId,
        parent: &mut Page,
        separator_offset: usize,
    ) -> Result<(), Error> {
        let count = self.count();
        if count < MIN_LEAF_CAPACITY {
            return Err(err!(
                Precondition,
                "Leaf {} with {} entries cannot be split",
                self.page.id(),
                count
            ));
        }
        let moved = count / 2;
        let kept = count - moved;
        let layout = self.schema.layout;
        let entry_size = layout.leaf_entry_size();

        let mut sibling = LeafNodeCursor::init(self.schema, right, right_id, self.parent_id());
        sibling
            .page
            .bytes_mut(LEAF_HEADER_SIZE, moved * entry_size)
            .copy_from_slice(self.page.bytes(layout.leaf_key_offset(kept), moved * entry_size));
        sibling.set_count(moved);

        parent
            .bytes_mut(separator_offset, layout.key_size)
            .copy_from_slice(self.key_bytes(kept));
        self.set_count(kept);
        Ok(())
    }
}
