//! Interior view: a page as sorted separator keys with one more child than key.
//!
//! `keys[i]` is the smallest key reachable through `child_ids[i + 1]`; everything under
//! `child_ids[0]` is smaller than `keys[0]`. Next to each child id the page stores that child's
//! serialized summary.
use super::layout::{
    NodeKind, NodeLayout, TreeSchema, INTERIOR_COUNT_OFFSET, KIND_INTERIOR, KIND_OFFSET,
    MIN_INTERIOR_CAPACITY, PAGE_ID_SIZE,
};
use super::node::NodeCursor;
use super::page::Page;
use crate::errors::Error;
use crate::monoid::UnboxedMonoid;
use crate::storage::PageId;
use crate::unboxed::{Unboxed, UnboxedComparable};
use std::cmp::Ordering;

pub struct InteriorNodeCursor<'a, K, V, M> {
    schema: &'a TreeSchema<K, V, M>,
    page: &'a mut Page,
}

impl<'a, K, V, M> InteriorNodeCursor<'a, K, V, M>
where
    K: UnboxedComparable,
    V: Unboxed,
    M: UnboxedMonoid,
{
    pub fn bind(schema: &'a TreeSchema<K, V, M>, page: &'a mut Page) -> Self {
        Self { schema, page }
    }

    /// Rebinds `page` to the fresh page `id` as an interior node with no keys and no children.
    pub fn init(
        schema: &'a TreeSchema<K, V, M>,
        page: &'a mut Page,
        id: PageId,
        parent: PageId,
    ) -> Self {
        page.bind_blank(id);
        schema.layout.set_parent(page, parent);
        page.write_u32(KIND_OFFSET, KIND_INTERIOR);
        page.write_u32(INTERIOR_COUNT_OFFSET, 0);
        Self { schema, page }
    }

    /// Builds a new root at `id` whose only child is `only_child`, the root being split.
    pub fn init_root(
        schema: &'a TreeSchema<K, V, M>,
        page: &'a mut Page,
        id: PageId,
        only_child: PageId,
    ) -> Self {
        let mut root = Self::init(schema, page, id, id);
        root.set_child_id(0, only_child);
        let layout = schema.layout;
        let out = root
            .page
            .bytes_mut(layout.child_summary_offset(0), layout.summary_size);
        schema.summary.identity(out);
        root
    }

    fn set_count(&mut self, count: usize) {
        self.page.write_u32(INTERIOR_COUNT_OFFSET, count as u32);
    }

    pub fn key_at(&self, index: usize) -> K::Value {
        self.schema.key.deserialize(self.key_bytes(index))
    }

    /// Child page id at `slot`, `slot` in `[0, count]`.
    pub fn get_child_id(&self, slot: usize) -> PageId {
        self.schema.layout.child_id(self.page, slot)
    }

    pub fn set_child_id(&mut self, slot: usize, id: PageId) {
        let offset = self.schema.layout.child_id_offset(slot);
        self.page.write_u32(offset, id);
    }

    pub fn child_summary(&self, slot: usize) -> &[u8] {
        let layout = &self.schema.layout;
        self.page
            .bytes(layout.child_summary_offset(slot), layout.summary_size)
    }

    pub fn set_child_summary(&mut self, slot: usize, summary: &[u8]) {
        let layout = self.schema.layout;
        self.page
            .bytes_mut(layout.child_summary_offset(slot), layout.summary_size)
            .copy_from_slice(&summary[..layout.summary_size]);
    }

    /// Index of the child whose subtree may contain `key`.
    pub fn child_slot(&self, key: &[u8]) -> usize {
        let index = self.search(key);
        if self.compare(index as isize, key) == Ordering::Equal {
            index + 1
        } else {
            index
        }
    }

    /// Opens a hole for a new child at `slot` (and for the key in front of it, `slot - 1`).
    ///
    /// Children and summaries at `[slot, count]` and keys at `[slot - 1, count)` shift right by
    /// one. Returns the byte offset of key `slot - 1`, which the caller must fill in, as it must
    /// the child id at `slot`.
    ///
    /// # Errors
    /// Returns `Error::Precondition` if the node is full or `slot` is not in `[1, count + 1]`.
    pub fn insert_new_child_at(&mut self, slot: usize) -> Result<usize, Error> {
        let count = self.count();
        if count >= self.capacity() {
            return Err(err!(
                Precondition,
                "Interior node {} is full ({} keys)",
                self.page.id(),
                count
            ));
        }
        if slot == 0 || slot > count + 1 {
            return Err(err!(
                Precondition,
                "Child slot {} out of range for interior node {} ({} keys)",
                slot,
                self.page.id(),
                count
            ));
        }

        let layout = self.schema.layout;
        let moved_children = count + 1 - slot;
        self.page.shift(
            layout.child_id_offset(slot),
            layout.child_id_offset(slot + 1),
            moved_children * PAGE_ID_SIZE,
        );
        self.page.shift(
            layout.child_summary_offset(slot),
            layout.child_summary_offset(slot + 1),
            moved_children * layout.summary_size,
        );
        self.page.shift(
            layout.interior_key_offset(slot - 1),
            layout.interior_key_offset(slot),
            (count - (slot - 1)) * layout.key_size,
        );
        self.set_count(count + 1);
        Ok(layout.interior_key_offset(slot - 1))
    }

    /// Folds the stored summaries of every child into `acc`.
    pub fn summarize(&self, acc: &mut [u8]) {
        let summary = &self.schema.summary;
        summary.identity(acc);
        for slot in 0..=self.count() {
            summary.combine(acc, self.child_summary(slot));
        }
    }
}

impl<K, V, M> NodeCursor for InteriorNodeCursor<'_, K, V, M>
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
        NodeKind::Interior
    }

    fn key_bytes(&self, index: usize) -> &[u8] {
        let layout = &self.schema.layout;
        self.page
            .bytes(layout.interior_key_offset(index), layout.key_size)
    }

    /// Splits around the middle key: with `n` keys and `mid = n / 2`, `keys[mid]` is written at
    /// `separator_offset` in the parent and is not kept on either side; keys after it and their
    /// children move into the fresh node `right_id`, bound to the `right` buffer.
    ///
    /// Children that move keep their old parent pointer; re-pointing them is the caller's job.
    fn split(
        &mut self,
        right: &mut Page,
        right_id: PageId,
        parent: &mut Page,
        separator_offset: usize,
    ) -> Result<(), Error> {
        let count = self.count();
        if count < MIN_INTERIOR_CAPACITY {
            return Err(err!(
                Precondition,
                "Interior node {} with {} keys cannot be split",
                self.page.id(),
                count
            ));
        }
        let mid = count / 2;
        let moved_keys = count - mid - 1;
        let moved_children = count - mid;
        let layout = self.schema.layout;

        parent
            .bytes_mut(separator_offset, layout.key_size)
            .copy_from_slice(self.key_bytes(mid));

        let mut sibling = InteriorNodeCursor::init(self.schema, right, right_id, self.parent_id());
        sibling
            .page
            .bytes_mut(layout.child_id_offset(0), moved_children * PAGE_ID_SIZE)
            .copy_from_slice(
                self.page
                    .bytes(layout.child_id_offset(mid + 1), moved_children * PAGE_ID_SIZE),
            );
        sibling
            .page
            .bytes_mut(
                layout.child_summary_offset(0),
                moved_children * layout.summary_size,
            )
            .copy_from_slice(self.page.bytes(
                layout.child_summary_offset(mid + 1),
                moved_children * layout.summary_size,
            ));
        sibling
            .page
            .bytes_mut(layout.interior_key_offset(0), moved_keys * layout.key_size)
            .copy_from_slice(
                self.page
                    .bytes(layout.interior_key_offset(mid + 1), moved_keys * layout.key_size),
            );
        sibling.set_count(moved_keys);
        self.set_count(mid);
        Ok(())
    }
}
