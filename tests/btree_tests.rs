mod common;

use common::{
    create_summary_tree, entries, fold_reference, random_bound, random_puts, summary, TINY_PAGE,
};
use pagetree::btree::BTree;
use pagetree::errors::Error;
use pagetree::monoid::{NoSummary, ValueExtent};
use pagetree::storage::{CachingStorage, FileStorage, MemoryStorage};
use pagetree::unboxed::{FixedBytes, I64, U32, U64};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::ops::RangeBounds;

#[test]
fn small_leaves_example() -> Result<(), Error> {
    let mut tree = BTree::create(MemoryStorage::new(TINY_PAGE), U64, U64, NoSummary)?;
    assert_eq!(tree.leaf_capacity(), 4);

    for k in [5u64, 3, 8, 1, 9, 2] {
        assert_eq!(tree.put(&k, &k)?, None);
    }
    assert_eq!(tree.get(&8)?, Some(8));
    assert_eq!(tree.get(&7)?, None);

    let mut keys = Vec::new();
    tree.for_each_entry(|k, v| {
        assert_eq!(k, v);
        keys.push(k);
    })?;
    assert_eq!(keys, vec![1, 2, 3, 5, 8, 9]);
    tree.check()?;
    Ok(())
}

#[test]
fn stress_agrees_with_btreemap() -> Result<(), Error> {
    for (page_size, seed) in [(200, 1u64), (512, 2), (4096, 3)] {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tree = create_summary_tree(page_size)?;
        let mut reference = BTreeMap::new();

        for op in 0..5_000 {
            let key = rng.random_range(0..2_000u64);
            if rng.random_bool(0.6) {
                let value = rng.random_range(-1_000..1_000i64);
                assert_eq!(
                    tree.put(&key, &value)?,
                    reference.insert(key, value),
                    "op {} put({})",
                    op,
                    key
                );
            } else {
                assert_eq!(
                    tree.get(&key)?,
                    reference.get(&key).copied(),
                    "op {} get({})",
                    op,
                    key
                );
            }
        }

        let stats = tree.check()?;
        assert_eq!(stats.entries, reference.len());
        let expected: Vec<(u64, i64)> = reference.iter().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(entries(&mut tree)?, expected);
        assert_eq!(tree.summary()?, fold_reference(&reference));
    }
    Ok(())
}

#[test]
fn ascending_and_descending_inserts_stay_balanced() -> Result<(), Error> {
    let mut ascending = BTree::create(MemoryStorage::new(TINY_PAGE), U64, U64, NoSummary)?;
    let mut descending = BTree::create(MemoryStorage::new(TINY_PAGE), U64, U64, NoSummary)?;
    for k in 0..1_000u64 {
        ascending.put(&k, &k)?;
        descending.put(&(999 - k), &k)?;
    }

    for tree in [&mut ascending, &mut descending] {
        let stats = tree.check()?;
        assert_eq!(stats.entries, 1_000);
        assert!(stats.depth >= 4);
        assert!(stats.leaf_pages >= 1_000 / tree.leaf_capacity());
        assert!(tree.get(&500)?.is_some());
        assert_eq!(tree.get(&1_000)?, None);
    }
    Ok(())
}

#[test]
fn aggregates_match_brute_force() -> Result<(), Error> {
    let mut rng = StdRng::seed_from_u64(7);
    let mut tree = create_summary_tree(256)?;
    let mut reference = BTreeMap::new();
    random_puts(&mut tree, &mut reference, &mut rng, 3_000, 1_500)?;

    for _ in 0..500 {
        let range = (random_bound(&mut rng, 1_600), random_bound(&mut rng, 1_600));
        let expected = fold_reference(reference.iter().filter(|(k, _)| range.contains(*k)));
        assert_eq!(tree.aggregate(range)?, expected, "range {:?}", range);
    }

    assert_eq!(tree.aggregate((Unbounded::<u64>, Unbounded::<u64>))?, fold_reference(&reference));
    assert_eq!(tree.aggregate((Included(10), Excluded(10)))?, (0, None));
    assert_eq!(tree.aggregate(2_000..)?, (0, None));
    Ok(())
}

#[test]
fn aggregates_on_empty_tree() -> Result<(), Error> {
    let mut tree = create_summary_tree(4096)?;
    assert_eq!(tree.summary()?, (0, None));
    assert_eq!(tree.aggregate(1..=5)?, (0, None));
    Ok(())
}

#[test]
fn signed_and_byte_string_keys_keep_their_order() -> Result<(), Error> {
    let mut signed = BTree::create(MemoryStorage::new(TINY_PAGE), I64, U64, NoSummary)?;
    for (i, k) in [3i64, -7, 0, i64::MIN, 42, -1, i64::MAX].iter().enumerate() {
        signed.put(k, &(i as u64))?;
    }
    let mut keys = Vec::new();
    signed.for_each_entry(|k, _| keys.push(k))?;
    assert_eq!(keys, vec![i64::MIN, -7, -1, 0, 3, 42, i64::MAX]);
    assert_eq!(signed.get(&-7)?, Some(1));

    let mut names = BTree::create(MemoryStorage::new(128), FixedBytes::new(6), U64, NoSummary)?;
    for (i, name) in ["pear", "apple", "fig", "banana", "kiwi", "cherry"].iter().enumerate() {
        names.put(&name.as_bytes().to_vec(), &(i as u64))?;
    }
    assert_eq!(names.get(&b"fig".to_vec())?, Some(2));
    assert_eq!(names.get(&b"grape".to_vec())?, None);
    let mut keys = Vec::new();
    names.for_each_entry(|k, _| {
        let end = k.iter().position(|&b| b == 0).unwrap_or(k.len());
        keys.push(String::from_utf8_lossy(&k[..end]).into_owned());
    })?;
    assert_eq!(keys, vec!["apple", "banana", "cherry", "fig", "kiwi", "pear"]);
    names.check()?;
    Ok(())
}

#[test]
fn file_backed_tree_reopens_with_identical_contents() -> Result<(), Error> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tree.db");
    let mut rng = StdRng::seed_from_u64(11);
    let mut reference = BTreeMap::new();

    let root = {
        let storage = FileStorage::create(&path, 512)?;
        let mut tree = BTree::create(storage, U64, I64, summary())?;
        random_puts(&mut tree, &mut reference, &mut rng, 2_000, 5_000)?;
        let root = tree.root_page_id();
        tree.into_storage().flush()?;
        root
    };

    let storage = FileStorage::open(&path)?;
    let mut tree = BTree::open(storage, U64, I64, summary(), 0)?;
    assert_eq!(tree.root_page_id(), root);
    let expected: Vec<(u64, i64)> = reference.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(entries(&mut tree)?, expected);
    assert_eq!(tree.summary()?, fold_reference(&reference));
    tree.check()?;

    // Writes after reopening land in the same file.
    tree.put(&u64::MAX, &1)?;
    drop(tree);
    let mut tree = BTree::open(FileStorage::open(&path)?, U64, I64, summary(), root)?;
    assert_eq!(tree.get(&u64::MAX)?, Some(1));
    Ok(())
}

#[test]
fn cache_serves_repeated_reads() -> Result<(), Error> {
    let storage = CachingStorage::new(MemoryStorage::new(4096), 16);
    let mut tree = BTree::create(storage, U64, U64, NoSummary)?;
    for k in 0..100u64 {
        tree.put(&k, &(k * 3))?;
    }

    let inner_reads = tree.storage().inner().reads();
    let hits = tree.storage().hits();
    for k in 0..100u64 {
        assert_eq!(tree.get(&k)?, Some(k * 3));
    }
    assert_eq!(tree.storage().inner().reads(), inner_reads);
    assert!(tree.storage().hits() >= hits + 100);
    Ok(())
}

#[test]
fn undersized_pages_are_rejected() {
    let result = BTree::create(MemoryStorage::new(40), U64, U64, NoSummary);
    assert_eq!(result.map(|_| ()).map_err(|e| e.code()), Err(5000));
}

#[test]
fn extent_over_mismatched_value_width_is_rejected() -> Result<(), Error> {
    let narrow = BTree::create(MemoryStorage::new(512), U64, U64, ValueExtent::new(U32));
    assert_eq!(narrow.map(|_| ()).map_err(|e| e.code()), Err(5000));
    let wide = BTree::create(MemoryStorage::new(512), U64, U32, ValueExtent::new(U64));
    assert_eq!(wide.map(|_| ()).map_err(|e| e.code()), Err(5000));

    let mut tree = BTree::create(MemoryStorage::new(512), U64, U32, ValueExtent::new(U32))?;
    tree.put(&1, &5)?;
    tree.put(&2, &7)?;
    assert_eq!(tree.summary()?, Some((5, 7)));
    Ok(())
}

#[test]
fn deletion_is_refused() -> Result<(), Error> {
    let mut tree = create_summary_tree(4096)?;
    tree.put(&1, &10)?;
    let err = tree.update(&1, None).map(|_| ()).map_err(|e| e.code());
    assert_eq!(err, Err(7000));
    assert_eq!(tree.get(&1)?, Some(10));

    assert_eq!(tree.last().map_err(|e| e.code()), Err(7000));
    assert_eq!(tree.next(&1).map_err(|e| e.code()), Err(7000));
    assert_eq!(tree.prev(&1).map_err(|e| e.code()), Err(7000));
    assert_eq!(tree.clear().map_err(|e| e.code()), Err(7000));
    assert_eq!(tree.size_before(&1).map_err(|e| e.code()), Err(7000));
    assert_eq!(tree.size_after(&1).map_err(|e| e.code()), Err(7000));
    assert_eq!(tree.seek(&1).map_err(|e| e.code()), Err(7000));
    Ok(())
}
