//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use pagetree::btree::BTree;
use pagetree::errors::Error;
use pagetree::monoid::{Count, Pair, ValueExtent};
use pagetree::storage::{MemoryStorage, PageStorage};
use pagetree::unboxed::{I64, U64};
use rand::rngs::StdRng;
use rand::Rng;
use std::collections::BTreeMap;
use std::ops::Bound;

/// Page size giving a leaf capacity of 4 for 8-byte keys and values without summaries.
pub const TINY_PAGE: usize = 84;

pub type Summary = Pair<Count, ValueExtent<I64>>;

pub type SummaryTree<St> = BTree<St, U64, I64, Summary>;

pub fn summary() -> Summary {
    Pair::new(Count, ValueExtent::new(I64))
}

pub fn create_summary_tree(page_size: usize) -> Result<SummaryTree<MemoryStorage>, Error> {
    BTree::create(MemoryStorage::new(page_size), U64, I64, summary())
}

/// Count and value extent of `entries`, the way the summary monoid folds them.
pub fn fold_reference<'a, I>(entries: I) -> (u64, Option<(i64, i64)>)
where
    I: IntoIterator<Item = (&'a u64, &'a i64)>,
{
    entries
        .into_iter()
        .fold((0, None), |(count, extent), (_, &v)| {
            let extent = match extent {
                None => Some((v, v)),
                Some((min, max)) => Some((min.min(v), max.max(v))),
            };
            (count + 1, extent)
        })
}

pub fn random_bound(rng: &mut StdRng, key_space: u64) -> Bound<u64> {
    let key = rng.random_range(0..key_space);
    match rng.random_range(0..3) {
        0 => Bound::Included(key),
        1 => Bound::Excluded(key),
        _ => Bound::Unbounded,
    }
}

/// Applies `ops` random puts to `tree` and `reference` alike, checking every returned value.
pub fn random_puts<St: PageStorage>(
    tree: &mut SummaryTree<St>,
    reference: &mut BTreeMap<u64, i64>,
    rng: &mut StdRng,
    ops: usize,
    key_space: u64,
) -> Result<(), Error> {
    for _ in 0..ops {
        let key = rng.random_range(0..key_space);
        let value = rng.random_range(-10_000..10_000i64);
        assert_eq!(tree.put(&key, &value)?, reference.insert(key, value), "put({})", key);
    }
    Ok(())
}

pub fn entries<St: PageStorage>(tree: &mut SummaryTree<St>) -> Result<Vec<(u64, i64)>, Error> {
    let mut out = Vec::new();
    tree.for_each_entry(|k, v| out.push((k, v)))?;
    Ok(out)
}
