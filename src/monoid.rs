//! Monoid annotations folded over the tree.
//!
//! Every node conceptually carries a summary value: a leaf's summary is the product of its
//! entries' measures, an interior node's summary the product of its children's summaries.
//! Interior pages store one serialized summary per child so that a range aggregate only has to
//! descend along the two boundaries of the range.
use crate::unboxed::{Unboxed, UnboxedComparable};
use std::cmp::Ordering;

/// Serialized monoid used as a per-node summary.
///
/// `combine` must be associative and insensitive to operand order; the tree folds children and
/// entries in whatever order is convenient.
pub trait UnboxedMonoid: Unboxed {
    /// Writes the neutral element into `out[..size()]`.
    fn identity(&self, out: &mut [u8]);

    /// `acc <- acc . other`, in place.
    fn combine(&self, acc: &mut [u8], other: &[u8]);

    /// Derives the summary of a single entry from its serialized key and value.
    fn measure(&self, key: &[u8], value: &[u8], out: &mut [u8]);

    /// Whether `measure` can read entries whose key and value serialize to these widths.
    fn fits(&self, _key_size: usize, _value_size: usize) -> bool {
        true
    }
}

/// Zero-width summary for trees that never aggregate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSummary;

impl Unboxed for NoSummary {
    type Value = ();

    fn size(&self) -> usize {
        0
    }

    fn serialize(&self, _value: &(), _out: &mut [u8]) {}

    fn deserialize(&self, _buf: &[u8]) {}
}

impl UnboxedMonoid for NoSummary {
    fn identity(&self, _out: &mut [u8]) {}

    fn combine(&self, _acc: &mut [u8], _other: &[u8]) {}

    fn measure(&self, _key: &[u8], _value: &[u8], _out: &mut [u8]) {}
}

/// Number of entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl Count {
    fn read(buf: &[u8]) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buf[..8]);
        u64::from_le_bytes(bytes)
    }
}

impl Unboxed for Count {
    type Value = u64;

    fn size(&self) -> usize {
        8
    }

    fn serialize(&self, value: &u64, out: &mut [u8]) {
        out[..8].copy_from_slice(&value.to_le_bytes());
    }

    fn deserialize(&self, buf: &[u8]) -> u64 {
        Self::read(buf)
    }
}

impl UnboxedMonoid for Count {
    fn identity(&self, out: &mut [u8]) {
        self.serialize(&0, out);
    }

    fn combine(&self, acc: &mut [u8], other: &[u8]) {
        let sum = Self::read(acc).saturating_add(Self::read(other));
        self.serialize(&sum, acc);
    }

    fn measure(&self, _key: &[u8], _value: &[u8], out: &mut [u8]) {
        self.serialize(&1, out);
    }
}

/// Minimum and maximum value, compared on serialized bytes with the value strategy.
///
/// Layout: one presence byte, then the serialized minimum, then the serialized maximum. An empty
/// range aggregates to `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueExtent<U> {
    values: U,
}

impl<U: UnboxedComparable> ValueExtent<U> {
    pub fn new(values: U) -> Self {
        Self { values }
    }

    fn min_range(&self) -> std::ops::Range<usize> {
        1..1 + self.values.size()
    }

    fn max_range(&self) -> std::ops::Range<usize> {
        let n = self.values.size();
        1 + n..1 + 2 * n
    }
}

impl<U: UnboxedComparable> Unboxed for ValueExtent<U> {
    type Value = Option<(U::Value, U::Value)>;

    fn size(&self) -> usize {
        1 + 2 * self.values.size()
    }

    fn serialize(&self, value: &Self::Value, out: &mut [u8]) {
        match value {
            None => out[..self.size()].fill(0),
            Some((min, max)) => {
                out[0] = 1;
                self.values.serialize(min, &mut out[self.min_range()]);
                self.values.serialize(max, &mut out[self.max_range()]);
            }
        }
    }

    fn deserialize(&self, buf: &[u8]) -> Self::Value {
        if buf[0] == 0 {
            return None;
        }
        Some((
            self.values.deserialize(&buf[self.min_range()]),
            self.values.deserialize(&buf[self.max_range()]),
        ))
    }
}

impl<U: UnboxedComparable> UnboxedMonoid for ValueExtent<U> {
    fn identity(&self, out: &mut [u8]) {
        out[..self.size()].fill(0);
    }

    fn combine(&self, acc: &mut [u8], other: &[u8]) {
        if other[0] == 0 {
            return;
        }
        if acc[0] == 0 {
            acc[..self.size()].copy_from_slice(&other[..self.size()]);
            return;
        }
        let (min, max) = (self.min_range(), self.max_range());
        if self.values.compare(&other[min.clone()], &acc[min.clone()]) == Ordering::Less {
            acc[min.clone()].copy_from_slice(&other[min]);
        }
        if self.values.compare(&other[max.clone()], &acc[max.clone()]) == Ordering::Greater {
            acc[max.clone()].copy_from_slice(&other[max]);
        }
    }

    fn measure(&self, _key: &[u8], value: &[u8], out: &mut [u8]) {
        let n = self.values.size();
        out[0] = 1;
        out[self.min_range()].copy_from_slice(&value[..n]);
        out[self.max_range()].copy_from_slice(&value[..n]);
    }

    fn fits(&self, _key_size: usize, value_size: usize) -> bool {
        value_size == self.values.size()
    }
}

/// Product of two monoids, laid out back to back.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pair<A, B> {
    pub first: A,
    pub second: B,
}

impl<A: UnboxedMonoid, B: UnboxedMonoid> Pair<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: UnboxedMonoid, B: UnboxedMonoid> Unboxed for Pair<A, B> {
    type Value = (A::Value, B::Value);

    fn size(&self) -> usize {
        self.first.size() + self.second.size()
    }

    fn serialize(&self, value: &Self::Value, out: &mut [u8]) {
        let (head, tail) = out.split_at_mut(self.first.size());
        self.first.serialize(&value.0, head);
        self.second.serialize(&value.1, tail);
    }

    fn deserialize(&self, buf: &[u8]) -> Self::Value {
        let (head, tail) = buf.split_at(self.first.size());
        (self.first.deserialize(head), self.second.deserialize(tail))
    }
}

impl<A: UnboxedMonoid, B: UnboxedMonoid> UnboxedMonoid for Pair<A, B> {
    fn identity(&self, out: &mut [u8]) {
        let (head, tail) = out.split_at_mut(self.first.size());
        self.first.identity(head);
        self.second.identity(tail);
    }

    fn combine(&self, acc: &mut [u8], other: &[u8]) {
        let split = self.first.size();
        let (acc_head, acc_tail) = acc.split_at_mut(split);
        let (other_head, other_tail) = other.split_at(split);
        self.first.combine(acc_head, other_head);
        self.second.combine(acc_tail, other_tail);
    }

    fn measure(&self, key: &[u8], value: &[u8], out: &mut [u8]) {
        let (head, tail) = out.split_at_mut(self.first.size());
        self.first.measure(key, value, head);
        self.second.measure(key, value, tail);
    }

    fn fits(&self, key_size: usize, value_size: usize) -> bool {
        self.first.fits(key_size, value_size) && self.second.fits(key_size, value_size)
    }
}
