//! The tree itself: lookups, inserts with proactive splits, range aggregation and diagnostics.
use super::interior::InteriorNodeCursor;
use super::layout::{NodeKind, TreeSchema};
use super::leaf::LeafNodeCursor;
use super::node::NodeCursor;
use super::page::Page;
use crate::errors::Error;
use crate::monoid::UnboxedMonoid;
use crate::storage::{PageId, PageStorage};
use crate::unboxed::{Unboxed, UnboxedComparable};
use std::cmp::Ordering;
use std::fmt::Debug;
use std::mem;
use std::ops::{Bound, RangeBounds};
use tracing::{debug, info};

/// Shape of a tree as observed by [`BTree::check`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Number of levels, 1 for a tree whose root is a leaf.
    pub depth: usize,
    pub leaf_pages: usize,
    pub interior_pages: usize,
    pub entries: usize,
}

/// A B+Tree over fixed-width keys `K`, values `V` and node summaries `M`, stored in pages of `St`.
///
/// The tree owns three page buffers for its whole lifetime (the page being visited, its parent and
/// a split target) and rebinds them as it walks, so `get` and `put` never allocate.
pub struct BTree<St, K, V, M> {
    storage: St,
    schema: TreeSchema<K, V, M>,
    root: PageId,
    current: Page,
    parent: Page,
    sibling: Page,
    key_buf: Vec<u8>,
    acc: Vec<u8>,
    item: Vec<u8>,
    /// `(interior page, child slot taken)` for every level of the last write descent.
    path: Vec<(PageId, usize)>,
}

impl<St, K, V, M> BTree<St, K, V, M>
where
    St: PageStorage,
    K: UnboxedComparable,
    V: Unboxed,
    M: UnboxedMonoid,
{
    fn with_root(storage: St, schema: TreeSchema<K, V, M>, root: PageId) -> Self {
        let layout = schema.layout;
        Self {
            storage,
            root,
            current: Page::new(layout.page_size),
            parent: Page::new(layout.page_size),
            sibling: Page::new(layout.page_size),
            key_buf: vec![0u8; layout.key_size],
            acc: vec![0u8; layout.summary_size],
            item: vec![0u8; layout.summary_size],
            path: Vec::new(),
            schema,
        }
    }

    /// Creates an empty tree: allocates one page and initializes it as an empty root leaf.
    ///
    /// # Errors
    /// Returns `Error::Config` if the storage page size cannot hold at least two leaf entries and
    /// three interior keys, or any error of the storage.
    pub fn create(mut storage: St, key: K, value: V, summary: M) -> Result<Self, Error> {
        let schema = TreeSchema::new(key, value, summary, storage.page_size())?;
        let root = storage.create_page()?;
        let mut tree = Self::with_root(storage, schema, root);
        LeafNodeCursor::init(&tree.schema, &mut tree.current, root, root);
        tree.current.write_back(&mut tree.storage)?;
        info!(
            root,
            leaf_capacity = tree.schema.layout.leaf_capacity,
            interior_capacity = tree.schema.layout.interior_capacity,
            "Created tree"
        );
        Ok(tree)
    }

    /// Reopens a tree from any page known to belong to it by climbing parent links to the root.
    ///
    /// # Errors
    /// Returns `Error::Corrupt` if a page on the way is not a tree node or the links never reach a
    /// self-parented page.
    pub fn open(
        storage: St,
        key: K,
        value: V,
        summary: M,
        known_page: PageId,
    ) -> Result<Self, Error> {
        let schema = TreeSchema::new(key, value, summary, storage.page_size())?;
        let mut tree = Self::with_root(storage, schema, known_page);
        let mut id = known_page;
        for _ in 0..=tree.storage.page_count() {
            tree.current.load(&mut tree.storage, id)?;
            tree.schema.layout.kind(&tree.current)?;
            let parent = tree.schema.layout.parent(&tree.current);
            if parent == id {
                tree.root = id;
                info!(root = id, from = known_page, "Opened tree");
                return Ok(tree);
            }
            id = parent;
        }
        Err(err!(
            Corrupt,
            "Parent links from page {} never reach a root",
            known_page
        ))
    }

    pub fn root_page_id(&self) -> PageId {
        self.root
    }

    pub fn leaf_capacity(&self) -> usize {
        self.schema.layout.leaf_capacity
    }

    pub fn interior_capacity(&self) -> usize {
        self.schema.layout.interior_capacity
    }

    pub fn schema(&self) -> &TreeSchema<K, V, M> {
        &self.schema
    }

    pub fn storage(&self) -> &St {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut St {
        &mut self.storage
    }

    pub fn into_storage(self) -> St {
        self.storage
    }

    fn serialize_key(&mut self, key: &K::Value) {
        self.schema.key.serialize(key, &mut self.key_buf);
    }

    /// Looks up `key`, returning `Ok(None)` when it is absent.
    pub fn get(&mut self, key: &K::Value) -> Result<Option<V::Value>, Error> {
        self.serialize_key(key);
        self.current.load(&mut self.storage, self.root)?;
        loop {
            match self.schema.layout.kind(&self.current)? {
                NodeKind::Leaf => {
                    let leaf = LeafNodeCursor::bind(&self.schema, &mut self.current);
                    let slot = leaf.search(&self.key_buf);
                    if leaf.compare(slot as isize, &self.key_buf) == Ordering::Equal {
                        return Ok(Some(leaf.get_value(slot)));
                    }
                    return Ok(None);
                }
                NodeKind::Interior => {
                    let node = InteriorNodeCursor::bind(&self.schema, &mut self.current);
                    let child = node.get_child_id(node.child_slot(&self.key_buf));
                    mem::swap(&mut self.current, &mut self.parent);
                    self.current.load(&mut self.storage, child)?;
                }
            }
        }
    }

    /// Inserts or overwrites `key`, returning the previous value if there was one.
    ///
    /// One top-down walk: every full node met on the way down is split before the walk enters it,
    /// and the walk restarts from the root after each split.
    pub fn put(&mut self, key: &K::Value, value: &V::Value) -> Result<Option<V::Value>, Error> {
        self.serialize_key(key);
        'descent: loop {
            self.path.clear();
            self.current.load(&mut self.storage, self.root)?;
            loop {
                if self.schema.layout.is_full(&self.current)? {
                    self.split_current()?;
                    continue 'descent;
                }
                match self.schema.layout.kind(&self.current)? {
                    NodeKind::Leaf => return self.put_in_leaf(value),
                    NodeKind::Interior => {
                        let node = InteriorNodeCursor::bind(&self.schema, &mut self.current);
                        let slot = node.child_slot(&self.key_buf);
                        let child = node.get_child_id(slot);
                        self.path.push((self.current.id(), slot));
                        mem::swap(&mut self.current, &mut self.parent);
                        self.current.load(&mut self.storage, child)?;
                    }
                }
            }
        }
    }

    /// `Some(value)` behaves like [`put`](Self::put); `None` asks for deletion, which is not
    /// supported and fails before any page is touched.
    pub fn update(
        &mut self,
        key: &K::Value,
        value: Option<&V::Value>,
    ) -> Result<Option<V::Value>, Error> {
        match value {
            Some(value) => self.put(key, value),
            None => Err(err!(Unimplemented, "Deleting entries is not supported")),
        }
    }

    fn put_in_leaf(&mut self, value: &V::Value) -> Result<Option<V::Value>, Error> {
        let mut leaf = LeafNodeCursor::bind(&self.schema, &mut self.current);
        let slot = leaf.search(&self.key_buf);
        let previous = if leaf.compare(slot as isize, &self.key_buf) == Ordering::Equal {
            Some(leaf.set_value(slot, value))
        } else {
            leaf.insert_at(slot, &self.key_buf, value)?;
            None
        };
        self.current.write_back(&mut self.storage)?;
        if self.schema.has_summary() {
            self.refresh_path_summaries()?;
        }
        Ok(previous)
    }

    /// Re-folds the summaries along the recorded descent, from the leaf in `current` upwards.
    fn refresh_path_summaries(&mut self) -> Result<(), Error> {
        summarize_page(&self.schema, &mut self.current, &mut self.acc, &mut self.item)?;
        for &(page_id, slot) in self.path.iter().rev() {
            self.parent.load(&mut self.storage, page_id)?;
            let mut node = InteriorNodeCursor::bind(&self.schema, &mut self.parent);
            node.set_child_summary(slot, &self.acc);
            node.summarize(&mut self.acc);
            self.parent.write_back(&mut self.storage)?;
        }
        Ok(())
    }

    /// Splits the full node held in `current` into itself and a fresh right sibling.
    ///
    /// `parent` must hold the node's parent, unless the node is the root, in which case a new root
    /// is built in `parent` with the old root as its only child. Writes back all three pages.
    fn split_current(&mut self) -> Result<(), Error> {
        let layout = self.schema.layout;
        let kind = layout.kind(&self.current)?;
        let current_id = self.current.id();
        let right_id = self.storage.create_page()?;

        let slot = if current_id == self.root {
            let new_root = self.storage.create_page()?;
            layout.set_parent(&mut self.current, new_root);
            InteriorNodeCursor::init_root(&self.schema, &mut self.parent, new_root, current_id);
            debug!(old_root = current_id, new_root, "Growing tree by one level");
            self.root = new_root;
            0
        } else {
            match self.path.last() {
                Some(&(_, slot)) => slot,
                None => {
                    return Err(err!(
                        Corrupt,
                        "Page {} is not the root but has no recorded parent",
                        current_id
                    ))
                }
            }
        };

        let mut parent = InteriorNodeCursor::bind(&self.schema, &mut self.parent);
        let separator_offset = parent.insert_new_child_at(slot + 1)?;
        parent.set_child_id(slot + 1, right_id);
        match kind {
            NodeKind::Leaf => LeafNodeCursor::bind(&self.schema, &mut self.current).split(
                &mut self.sibling,
                right_id,
                &mut self.parent,
                separator_offset,
            )?,
            NodeKind::Interior => InteriorNodeCursor::bind(&self.schema, &mut self.current)
                .split(
                    &mut self.sibling,
                    right_id,
                    &mut self.parent,
                    separator_offset,
                )?,
        }
        debug!(
            kind = %kind,
            page = current_id,
            sibling = right_id,
            parent = self.parent.id(),
            "Split node"
        );

        if self.schema.has_summary() {
            summarize_page(&self.schema, &mut self.current, &mut self.acc, &mut self.item)?;
            InteriorNodeCursor::bind(&self.schema, &mut self.parent)
                .set_child_summary(slot, &self.acc);
            summarize_page(&self.schema, &mut self.sibling, &mut self.acc, &mut self.item)?;
            InteriorNodeCursor::bind(&self.schema, &mut self.parent)
                .set_child_summary(slot + 1, &self.acc);
        }

        self.current.write_back(&mut self.storage)?;
        self.sibling.write_back(&mut self.storage)?;
        self.parent.write_back(&mut self.storage)?;

        if kind == NodeKind::Interior {
            // Children that moved right still point at the left half.
            let moved = layout.count(&self.sibling, NodeKind::Interior);
            for child_slot in 0..=moved {
                let child = layout.child_id(&self.sibling, child_slot);
                self.current.load(&mut self.storage, child)?;
                layout.set_parent(&mut self.current, right_id);
                self.current.write_back(&mut self.storage)?;
            }
        }
        Ok(())
    }

    /// Folds the summaries of every entry whose key lies in `range`.
    ///
    /// Children whose key interval lies entirely inside the range contribute their stored summary
    /// without being read, so only the pages along the two range boundaries are visited.
    pub fn aggregate<R>(&mut self, range: R) -> Result<M::Value, Error>
    where
        R: RangeBounds<K::Value>,
    {
        let lower = self.serialize_bound(range.start_bound());
        let upper = self.serialize_bound(range.end_bound());
        let mut acc = vec![0u8; self.schema.layout.summary_size];
        let mut item = vec![0u8; self.schema.layout.summary_size];
        self.schema.summary.identity(&mut acc);
        aggregate_page(
            &mut self.storage,
            &self.schema,
            self.root,
            (as_slice_bound(&lower), as_slice_bound(&upper)),
            &mut acc,
            &mut item,
        )?;
        Ok(self.schema.summary.deserialize(&acc))
    }

    /// Summary of the whole tree.
    pub fn summary(&mut self) -> Result<M::Value, Error> {
        self.aggregate(..)
    }

    fn serialize_bound(&self, bound: Bound<&K::Value>) -> Bound<Vec<u8>> {
        bound.map(|key| {
            let mut buf = vec![0u8; self.schema.layout.key_size];
            self.schema.key.serialize(key, &mut buf);
            buf
        })
    }

    /// Visits every entry in ascending key order.
    pub fn for_each_entry<F>(&mut self, mut f: F) -> Result<(), Error>
    where
        F: FnMut(K::Value, V::Value),
    {
        visit_entries(&mut self.storage, &self.schema, self.root, &mut f)
    }

    /// Walks the whole tree and verifies its structural invariants: node kinds, capacities,
    /// non-empty non-root nodes, parent links, strictly ascending keys inside the separator
    /// bounds, separators equal to the smallest key of their right subtree, stored child summaries
    /// and uniform leaf depth.
    ///
    /// # Errors
    /// Returns `Error::Corrupt` describing the first violation found.
    pub fn check(&mut self) -> Result<TreeStats, Error> {
        let mut checker = Checker {
            storage: &mut self.storage,
            schema: &self.schema,
            stats: TreeStats::default(),
            leaf_depth: None,
        };
        let mut summary = vec![0u8; self.schema.layout.summary_size];
        checker.visit(self.root, self.root, (None, None), 0, &mut summary)?;
        Ok(checker.stats)
    }

    pub fn first(&mut self) -> Result<Option<(K::Value, V::Value)>, Error> {
        unsupported("first")
    }

    pub fn last(&mut self) -> Result<Option<(K::Value, V::Value)>, Error> {
        unsupported("last")
    }

    pub fn next(&mut self, _key: &K::Value) -> Result<Option<(K::Value, V::Value)>, Error> {
        unsupported("next")
    }

    pub fn prev(&mut self, _key: &K::Value) -> Result<Option<(K::Value, V::Value)>, Error> {
        unsupported("prev")
    }

    pub fn remove(&mut self, _key: &K::Value) -> Result<Option<V::Value>, Error> {
        unsupported("remove")
    }

    pub fn clear(&mut self) -> Result<(), Error> {
        unsupported("clear")
    }

    pub fn size(&mut self) -> Result<usize, Error> {
        unsupported("size")
    }

    pub fn size_before(&mut self, _key: &K::Value) -> Result<usize, Error> {
        unsupported("size_before")
    }

    pub fn size_after(&mut self, _key: &K::Value) -> Result<usize, Error> {
        unsupported("size_after")
    }

    pub fn seek(&mut self, _key: &K::Value) -> Result<Option<(K::Value, V::Value)>, Error> {
        unsupported("seek")
    }

    pub fn ordinal(&mut self, _index: usize) -> Result<Option<(K::Value, V::Value)>, Error> {
        unsupported("ordinal")
    }
}

impl<St, K, V, M> BTree<St, K, V, M>
where
    St: PageStorage,
    K: UnboxedComparable,
    K::Value: Debug,
    V: Unboxed,
    M: UnboxedMonoid,
{
    /// Returns display columns and one row per page, in breadth-first order from the root.
    pub fn describe(&mut self) -> Result<(Vec<String>, Vec<Vec<String>>), Error> {
        let columns = vec![
            "Page".to_string(),
            "Kind".to_string(),
            "Parent".to_string(),
            "Level".to_string(),
            "Count".to_string(),
            "Keys".to_string(),
        ];

        let mut rows = Vec::new();
        let mut level = vec![self.root];
        let mut depth = 0;
        while !level.is_empty() {
            let mut next_level = Vec::new();
            for id in level {
                let mut page = Page::new(self.schema.layout.page_size);
                page.load(&mut self.storage, id)?;
                let kind = self.schema.layout.kind(&page)?;
                let parent = self.schema.layout.parent(&page);
                let keys: Vec<K::Value> = match kind {
                    NodeKind::Leaf => {
                        let leaf = LeafNodeCursor::bind(&self.schema, &mut page);
                        (0..leaf.count()).map(|i| leaf.key_at(i)).collect()
                    }
                    NodeKind::Interior => {
                        let node = InteriorNodeCursor::bind(&self.schema, &mut page);
                        next_level.extend((0..=node.count()).map(|i| node.get_child_id(i)));
                        (0..node.count()).map(|i| node.key_at(i)).collect()
                    }
                };
                rows.push(vec![
                    id.to_string(),
                    kind.to_string(),
                    parent.to_string(),
                    depth.to_string(),
                    keys.len().to_string(),
                    format!("{:?}", keys),
                ]);
            }
            level = next_level;
            depth += 1;
        }
        Ok((columns, rows))
    }
}

fn unsupported<T>(operation: &str) -> Result<T, Error> {
    Err(err!(
        Unimplemented,
        "BTree::{} is not supported",
        operation
    ))
}

fn summarize_page<K, V, M>(
    schema: &TreeSchema<K, V, M>,
    page: &mut Page,
    acc: &mut [u8],
    item: &mut [u8],
) -> Result<(), Error>
where
    K: UnboxedComparable,
    V: Unboxed,
    M: UnboxedMonoid,
{
    match schema.layout.kind(page)? {
        NodeKind::Leaf => LeafNodeCursor::bind(schema, page).summarize(acc, item),
        NodeKind::Interior => InteriorNodeCursor::bind(schema, page).summarize(acc),
    }
    Ok(())
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_slice()),
        Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Index of the first key strictly greater than `key`.
fn upper_slot<C: NodeCursor>(node: &C, key: &[u8]) -> usize {
    let index = node.search(key);
    if node.compare(index as isize, key) == Ordering::Equal {
        index + 1
    } else {
        index
    }
}

/// Key interval `[low, high)` of one child; `None` is unbounded.
type Interval<'a> = (Option<&'a [u8]>, Option<&'a [u8]>);

type Range<'a> = (Bound<&'a [u8]>, Bound<&'a [u8]>);

fn at_most<C: UnboxedComparable>(cmp: &C, a: &[u8], b: &[u8]) -> bool {
    cmp.compare(a, b) != Ordering::Greater
}

/// True when no key of `child` can fall inside `range`.
fn misses<C: UnboxedComparable>(cmp: &C, child: Interval<'_>, range: Range<'_>) -> bool {
    let below = match (range.0, child.1) {
        (Bound::Included(low) | Bound::Excluded(low), Some(high)) => at_most(cmp, high, low),
        _ => false,
    };
    let above = match (range.1, child.0) {
        (Bound::Included(high), Some(low)) => cmp.compare(low, high) == Ordering::Greater,
        (Bound::Excluded(high), Some(low)) => at_most(cmp, high, low),
        _ => false,
    };
    below || above
}

/// True when every key of `child` falls inside `range`.
fn covers<C: UnboxedComparable>(cmp: &C, child: Interval<'_>, range: Range<'_>) -> bool {
    let low_ok = match (range.0, child.0) {
        (Bound::Unbounded, _) => true,
        (Bound::Included(low), Some(child_low)) => at_most(cmp, low, child_low),
        (Bound::Excluded(low), Some(child_low)) => cmp.compare(low, child_low) == Ordering::Less,
        (_, None) => false,
    };
    let high_ok = match (range.1, child.1) {
        (Bound::Unbounded, _) => true,
        (Bound::Included(high) | Bound::Excluded(high), Some(child_high)) => {
            at_most(cmp, child_high, high)
        }
        (_, None) => false,
    };
    low_ok && high_ok
}

fn aggregate_page<St, K, V, M>(
    storage: &mut St,
    schema: &TreeSchema<K, V, M>,
    id: PageId,
    range: Range<'_>,
    acc: &mut [u8],
    item: &mut [u8],
) -> Result<(), Error>
where
    St: PageStorage,
    K: UnboxedComparable,
    V: Unboxed,
    M: UnboxedMonoid,
{
    let mut page = Page::new(schema.layout.page_size);
    page.load(storage, id)?;
    match schema.layout.kind(&page)? {
        NodeKind::Leaf => {
            let leaf = LeafNodeCursor::bind(schema, &mut page);
            let from = match range.0 {
                Bound::Unbounded => 0,
                Bound::Included(low) => leaf.search(low),
                Bound::Excluded(low) => upper_slot(&leaf, low),
            };
            let to = match range.1 {
                Bound::Unbounded => leaf.count(),
                Bound::Included(high) => upper_slot(&leaf, high),
                Bound::Excluded(high) => leaf.search(high),
            };
            if from < to {
                leaf.fold_entries(from, to, acc, item);
            }
        }
        NodeKind::Interior => {
            let node = InteriorNodeCursor::bind(schema, &mut page);
            let count = node.count();
            for slot in 0..=count {
                let low = (slot > 0).then(|| node.key_bytes(slot - 1));
                let high = (slot < count).then(|| node.key_bytes(slot));
                if misses(&schema.key, (low, high), range) {
                    continue;
                }
                if covers(&schema.key, (low, high), range) {
                    schema.summary.combine(acc, node.child_summary(slot));
                } else {
                    aggregate_page(storage, schema, node.get_child_id(slot), range, acc, item)?;
                }
            }
        }
    }
    Ok(())
}

fn visit_entries<St, K, V, M, F>(
    storage: &mut St,
    schema: &TreeSchema<K, V, M>,
    id: PageId,
    f: &mut F,
) -> Result<(), Error>
where
    St: PageStorage,
    K: UnboxedComparable,
    V: Unboxed,
    M: UnboxedMonoid,
    F: FnMut(K::Value, V::Value),
{
    let mut page = Page::new(schema.layout.page_size);
    page.load(storage, id)?;
    match schema.layout.kind(&page)? {
        NodeKind::Leaf => {
            let leaf = LeafNodeCursor::bind(schema, &mut page);
            for slot in 0..leaf.count() {
                f(leaf.key_at(slot), leaf.get_value(slot));
            }
        }
        NodeKind::Interior => {
            let node = InteriorNodeCursor::bind(schema, &mut page);
            for slot in 0..=node.count() {
                visit_entries(storage, schema, node.get_child_id(slot), f)?;
            }
        }
    }
    Ok(())
}

struct Checker<'t, St, K, V, M> {
    storage: &'t mut St,
    schema: &'t TreeSchema<K, V, M>,
    stats: TreeStats,
    leaf_depth: Option<usize>,
}

impl<St, K, V, M> Checker<'_, St, K, V, M>
where
    St: PageStorage,
    K: UnboxedComparable,
    V: Unboxed,
    M: UnboxedMonoid,
{
    /// Checks the subtree at `id`, writes its summary into `summary` and returns its smallest key.
    fn visit(
        &mut self,
        id: PageId,
        parent: PageId,
        bounds: Interval<'_>,
        depth: usize,
        summary: &mut [u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        let schema = self.schema;
        let layout = schema.layout;
        let mut page = Page::new(layout.page_size);
        page.load(&mut *self.storage, id)?;

        let kind = layout.kind(&page)?;
        let count = layout.count(&page, kind);
        if layout.parent(&page) != parent {
            return Err(err!(
                Corrupt,
                "Page {} names {} as parent, expected {}",
                id,
                layout.parent(&page),
                parent
            ));
        }
        if count > layout.capacity(kind) {
            return Err(err!(
                Corrupt,
                "{} page {} holds {} keys, capacity {}",
                kind,
                id,
                count,
                layout.capacity(kind)
            ));
        }
        if count == 0 && (id != parent || kind == NodeKind::Interior) {
            return Err(err!(Corrupt, "{} page {} is empty", kind, id));
        }
        self.stats.depth = self.stats.depth.max(depth + 1);

        match kind {
            NodeKind::Leaf => {
                self.stats.leaf_pages += 1;
                self.stats.entries += count;
                match self.leaf_depth {
                    None => self.leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(err!(
                            Corrupt,
                            "Leaf {} at depth {}, other leaves at depth {}",
                            id,
                            depth,
                            expected
                        ))
                    }
                    Some(_) => {}
                }
                let leaf = LeafNodeCursor::bind(schema, &mut page);
                check_keys(&leaf, bounds)?;
                let mut item = vec![0u8; layout.summary_size];
                leaf.summarize(summary, &mut item);
                Ok((count > 0).then(|| leaf.key_bytes(0).to_vec()))
            }
            NodeKind::Interior => {
                self.stats.interior_pages += 1;
                let node = InteriorNodeCursor::bind(schema, &mut page);
                check_keys(&node, bounds)?;
                schema.summary.identity(summary);
                let mut child_summary = vec![0u8; layout.summary_size];
                let mut smallest = None;
                for slot in 0..=count {
                    let low = if slot == 0 { bounds.0 } else { Some(node.key_bytes(slot - 1)) };
                    let high = if slot == count { bounds.1 } else { Some(node.key_bytes(slot)) };
                    let child = node.get_child_id(slot);
                    let child_min =
                        self.visit(child, id, (low, high), depth + 1, &mut child_summary)?;

                    if slot > 0 {
                        let separator = node.key_bytes(slot - 1);
                        let matches = child_min.as_deref().is_some_and(|min| {
                            schema.key.compare(min, separator) == Ordering::Equal
                        });
                        if !matches {
                            return Err(err!(
                                Corrupt,
                                "Separator {} of page {} is not the smallest key of child {}",
                                slot - 1,
                                id,
                                child
                            ));
                        }
                    } else {
                        smallest = child_min;
                    }
                    if child_summary.as_slice() != node.child_summary(slot) {
                        return Err(err!(
                            Corrupt,
                            "Stored summary of child {} in page {} is stale",
                            child,
                            id
                        ));
                    }
                    schema.summary.combine(summary, &child_summary);
                }
                Ok(smallest)
            }
        }
    }
}

/// Keys strictly ascending and inside `[low, high)`.
fn check_keys<C: NodeCursor>(node: &C, bounds: Interval<'_>) -> Result<(), Error> {
    let cmp = node.key_strategy();
    let count = node.count();
    for index in 0..count {
        let key = node.key_bytes(index);
        let out_of_order = index > 0 && at_most(cmp, key, node.key_bytes(index - 1));
        let below = bounds.0.is_some_and(|low| cmp.compare(key, low) == Ordering::Less);
        let above = bounds.1.is_some_and(|high| at_most(cmp, high, key));
        if out_of_order || below || above {
            return Err(err!(
                Corrupt,
                "Key {} of page {} is out of order",
                index,
                node.page_id()
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monoid::{Count, NoSummary, Pair, ValueExtent};
    use crate::storage::MemoryStorage;
    use crate::unboxed::{I64, U64};

    /// Leaf capacity 4, interior capacity 5.
    const SMALL_PAGE: usize = 84;

    fn small_tree() -> Result<BTree<MemoryStorage, U64, U64, NoSummary>, Error> {
        BTree::create(MemoryStorage::new(SMALL_PAGE), U64, U64, NoSummary)
    }

    fn keys_in_order<St: PageStorage, M: UnboxedMonoid>(
        tree: &mut BTree<St, U64, U64, M>,
    ) -> Result<Vec<u64>, Error> {
        let mut keys = Vec::new();
        tree.for_each_entry(|k, _| keys.push(k))?;
        Ok(keys)
    }

    #[test]
    fn test_empty_tree() -> Result<(), Error> {
        let mut tree = small_tree()?;
        assert_eq!(tree.leaf_capacity(), 4);
        assert_eq!(tree.get(&42)?, None);
        let stats = tree.check()?;
        assert_eq!(stats.depth, 1);
        assert_eq!(stats.entries, 0);
        Ok(())
    }

    #[test]
    fn test_put_returns_previous_value() -> Result<(), Error> {
        let mut tree = small_tree()?;
        assert_eq!(tree.put(&7, &70)?, None);
        assert_eq!(tree.put(&7, &71)?, Some(70));
        assert_eq!(tree.get(&7)?, Some(71));
        Ok(())
    }

    #[test]
    fn test_root_split_creates_interior_root() -> Result<(), Error> {
        let mut tree = small_tree()?;
        let first_root = tree.root_page_id();
        for k in [5u64, 3, 8, 1, 9, 2] {
            tree.put(&k, &k)?;
        }
        assert_ne!(tree.root_page_id(), first_root);
        assert_eq!(tree.get(&8)?, Some(8));
        assert_eq!(tree.get(&7)?, None);
        assert_eq!(keys_in_order(&mut tree)?, vec![1, 2, 3, 5, 8, 9]);

        let stats = tree.check()?;
        assert_eq!(stats.depth, 2);
        assert_eq!(stats.interior_pages, 1);
        assert_eq!(stats.entries, 6);
        Ok(())
    }

    #[test]
    fn test_interior_splits_keep_parents_consistent() -> Result<(), Error> {
        let mut tree = small_tree()?;
        for k in 0..200u64 {
            tree.put(&((k * 37) % 200), &k)?;
        }
        let stats = tree.check()?;
        assert!(stats.depth >= 3);
        assert_eq!(stats.entries, 200);
        assert_eq!(keys_in_order(&mut tree)?, (0..200).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_summaries_follow_inserts_and_overwrites() -> Result<(), Error> {
        let summary = Pair::new(Count, ValueExtent::new(I64));
        let mut tree = BTree::create(MemoryStorage::new(256), U64, I64, summary)?;
        for k in 0..100u64 {
            tree.put(&k, &(k as i64 - 50))?;
        }
        tree.put(&10, &1000)?;

        assert_eq!(tree.summary()?, (100, Some((-50, 1000))));
        assert_eq!(tree.aggregate(20..30)?, (10, Some((-30, -21))));
        assert_eq!(tree.aggregate(5..=10)?, (6, Some((-45, 1000))));
        assert_eq!(tree.aggregate(200..)?, (0, None));
        tree.check()?;
        Ok(())
    }

    #[test]
    fn test_reopen_from_any_page() -> Result<(), Error> {
        let mut tree = small_tree()?;
        for k in 0..50u64 {
            tree.put(&k, &(k * 2))?;
        }
        let root = tree.root_page_id();
        let storage = tree.into_storage();

        let mut reopened = BTree::open(storage, U64, U64, NoSummary, 0)?;
        assert_eq!(reopened.root_page_id(), root);
        assert_eq!(reopened.get(&49)?, Some(98));
        Ok(())
    }

    #[test]
    fn test_deletion_and_unsupported_operations() -> Result<(), Error> {
        let mut tree = small_tree()?;
        tree.put(&1, &1)?;
        let reads = tree.storage().reads();
        let writes = tree.storage().writes();

        let err = tree.update(&1, None).map_err(|e| e.code());
        assert_eq!(err, Err(7000));
        assert_eq!(tree.storage().reads(), reads);
        assert_eq!(tree.storage().writes(), writes);

        assert_eq!(tree.update(&1, Some(&2))?, Some(1));
        assert_eq!(tree.first().map_err(|e| e.code()), Err(7000));
        assert_eq!(tree.remove(&1).map_err(|e| e.code()), Err(7000));
        assert_eq!(tree.size().map_err(|e| e.code()), Err(7000));
        assert_eq!(tree.ordinal(0).map_err(|e| e.code()), Err(7000));
        Ok(())
    }

    #[test]
    fn test_describe_lists_every_page() -> Result<(), Error> {
        let mut tree = small_tree()?;
        for k in 1..=5u64 {
            tree.put(&k, &k)?;
        }
        let (columns, rows) = tree.describe()?;
        assert_eq!(columns.len(), 6);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][1], "Interior");
        assert_eq!(rows[0][5], "[3]");
        assert_eq!(rows[1][5], "[1, 2]");
        assert_eq!(rows[2][5], "[3, 4, 5]");
        Ok(())
    }
}
