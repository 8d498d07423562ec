//! Fixed-width ("unboxed") serialization strategies.
//!
//! A strategy converts a typed value to and from a byte range of a fixed width without touching
//! the heap, so the tree can move keys and values around inside page buffers with plain copies.
//! Keys additionally compare on their serialized bytes, which is what the tree walk does for every
//! comparison.
//!
//! Every method works on the leading `size()` bytes of the slice it is handed. Callers that hold a
//! `(buf, offset)` pair pass `&buf[offset..]`; an undersized slice panics on the bounds check rather
//! than reading out of range.
use std::cmp::Ordering;

/// Fixed-width serialization of `Self::Value`.
pub trait Unboxed {
    type Value;

    /// Serialized width in bytes. Never changes for a given strategy instance.
    fn size(&self) -> usize;

    /// Writes exactly `size()` bytes into `out[..size()]`.
    fn serialize(&self, value: &Self::Value, out: &mut [u8]);

    /// Reads a value back from `buf[..size()]`.
    fn deserialize(&self, buf: &[u8]) -> Self::Value;
}

/// A serialization whose byte order can be compared without deserializing.
pub trait UnboxedComparable: Unboxed {
    /// Compares two serialized values. Must be a strict total order consistent with the ordering
    /// of the deserialized values.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

macro_rules! unboxed_unsigned {
    ($name:ident, $ty:ty) => {
        #[doc = concat!("Big-endian `", stringify!($ty), "`; byte order equals numeric order.")]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Unboxed for $name {
            type Value = $ty;

            fn size(&self) -> usize {
                std::mem::size_of::<$ty>()
            }

            fn serialize(&self, value: &$ty, out: &mut [u8]) {
                out[..std::mem::size_of::<$ty>()].copy_from_slice(&value.to_be_bytes());
            }

            fn deserialize(&self, buf: &[u8]) -> $ty {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                bytes.copy_from_slice(&buf[..std::mem::size_of::<$ty>()]);
                <$ty>::from_be_bytes(bytes)
            }
        }

        impl UnboxedComparable for $name {
            fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
                let n = std::mem::size_of::<$ty>();
                a[..n].cmp(&b[..n])
            }
        }
    };
}

macro_rules! unboxed_signed {
    ($name:ident, $ty:ty, $uty:ty) => {
        #[doc = concat!(
            "Big-endian `", stringify!($ty),
            "` with the sign bit flipped, so negative values sort before positive ones bytewise."
        )]
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl $name {
            const SIGN: $uty = 1 << (<$uty>::BITS - 1);
        }

        impl Unboxed for $name {
            type Value = $ty;

            fn size(&self) -> usize {
                std::mem::size_of::<$ty>()
            }

            fn serialize(&self, value: &$ty, out: &mut [u8]) {
                let biased = (*value as $uty) ^ Self::SIGN;
                out[..std::mem::size_of::<$ty>()].copy_from_slice(&biased.to_be_bytes());
            }

            fn deserialize(&self, buf: &[u8]) -> $ty {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                bytes.copy_from_slice(&buf[..std::mem::size_of::<$ty>()]);
                (<$uty>::from_be_bytes(bytes) ^ Self::SIGN) as $ty
            }
        }

        impl UnboxedComparable for $name {
            fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
                let n = std::mem::size_of::<$ty>();
                a[..n].cmp(&b[..n])
            }
        }
    };
}

unboxed_unsigned!(U32, u32);
unboxed_unsigned!(U64, u64);
unboxed_signed!(I32, i32, u32);
unboxed_signed!(I64, i64, u64);

/// `f64` in IEEE-754 total order: `-NaN < -inf < ... < -0.0 < 0.0 < ... < inf < NaN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct F64;

impl F64 {
    const SIGN: u64 = 1 << 63;
}

impl Unboxed for F64 {
    type Value = f64;

    fn size(&self) -> usize {
        8
    }

    fn serialize(&self, value: &f64, out: &mut [u8]) {
        let bits = value.to_bits();
        let ordered = if bits & Self::SIGN != 0 {
            !bits
        } else {
            bits ^ Self::SIGN
        };
        out[..8].copy_from_slice(&ordered.to_be_bytes());
    }

    fn deserialize(&self, buf: &[u8]) -> f64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buf[..8]);
        let ordered = u64::from_be_bytes(bytes);
        let bits = if ordered & Self::SIGN != 0 {
            ordered ^ Self::SIGN
        } else {
            !ordered
        };
        f64::from_bits(bits)
    }
}

impl UnboxedComparable for F64 {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a[..8].cmp(&b[..8])
    }
}

/// Byte strings of a fixed length, compared lexicographically.
///
/// Shorter inputs are zero-padded and longer ones truncated, so `b"ab"` and `b"ab\0"` serialize
/// to the same key.
#[derive(Debug, Clone, Copy)]
pub struct FixedBytes {
    pub len: usize,
}

impl FixedBytes {
    pub fn new(len: usize) -> Self {
        Self { len }
    }
}

impl Unboxed for FixedBytes {
    type Value = Vec<u8>;

    fn size(&self) -> usize {
        self.len
    }

    fn serialize(&self, value: &Vec<u8>, out: &mut [u8]) {
        let n = value.len().min(self.len);
        out[..n].copy_from_slice(&value[..n]);
        out[n..self.len].fill(0);
    }

    fn deserialize(&self, buf: &[u8]) -> Vec<u8> {
        buf[..self.len].to_vec()
    }
}

impl UnboxedComparable for FixedBytes {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a[..self.len].cmp(&b[..self.len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode<U: Unboxed>(strategy: &U, value: &U::Value) -> Vec<u8> {
        let mut buf = vec![0u8; strategy.size()];
        strategy.serialize(value, &mut buf);
        buf
    }

    #[test]
    fn test_signed_byte_order_matches_numeric_order() {
        let values = [i64::MIN, -1_000, -1, 0, 1, 42, i64::MAX];
        for pair in values.windows(2) {
            let a = encode(&I64, &pair[0]);
            let b = encode(&I64, &pair[1]);
            assert_eq!(I64.compare(&a, &b), Ordering::Less, "{} vs {}", pair[0], pair[1]);
        }
        assert_eq!(I64.deserialize(&encode(&I64, &-1_000)), -1_000);
        assert_eq!(I32.deserialize(&encode(&I32, &i32::MIN)), i32::MIN);
    }

    #[test]
    fn test_float_total_order() {
        let values = [f64::NEG_INFINITY, -2.5, -0.0, 0.0, 1e-300, 3.75, f64::INFINITY];
        for pair in values.windows(2) {
            let a = encode(&F64, &pair[0]);
            let b = encode(&F64, &pair[1]);
            assert_eq!(F64.compare(&a, &b), Ordering::Less, "{} vs {}", pair[0], pair[1]);
        }
        assert_eq!(F64.deserialize(&encode(&F64, &-2.5)), -2.5);
    }

    #[test]
    fn test_serialize_at_offset_leaves_neighbours_alone() {
        let mut page = vec![0xAAu8; 16];
        U32.serialize(&0x0102_0304, &mut page[6..]);
        assert_eq!(&page[6..10], &[1, 2, 3, 4]);
        assert_eq!(page[5], 0xAA);
        assert_eq!(page[10], 0xAA);
        assert_eq!(U32.deserialize(&page[6..]), 0x0102_0304);
    }

    #[test]
    fn test_fixed_bytes_pads_and_truncates() {
        let strategy = FixedBytes::new(4);
        assert_eq!(encode(&strategy, &b"ab".to_vec()), vec![b'a', b'b', 0, 0]);
        assert_eq!(encode(&strategy, &b"abcdef".to_vec()), b"abcd".to_vec());
        let a = encode(&strategy, &b"abc".to_vec());
        let b = encode(&strategy, &b"abd".to_vec());
        assert_eq!(strategy.compare(&a, &b), Ordering::Less);
    }

    #[test]
    #[should_panic]
    fn test_undersized_buffer_panics() {
        let mut buf = [0u8; 3];
        U64.serialize(&7, &mut buf);
    }
}
