//! Typed interpretation of raw tag bytes
//!
//! Tag values and item ids are stored as little-endian byte strings. A
//! [`DataType`] tells the comparer and the condition evaluator how to read them.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

// =============================================================================
// Data Type
// =============================================================================

/// Encoding of a tag value or item id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DataType {
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    /// Minutes-resolution timestamp stored as an i32
    SmallDateTime,
    /// Tick-resolution timestamp stored as an i64
    DateTime,
    /// UTF-8 text, variable length
    String,
    Byte,
    Float,
    Double,
    /// Opaque bytes, variable length
    #[default]
    ByteArray,
}

impl DataType {
    /// Encoded width in bytes, or `None` for variable-length types
    pub fn size(&self) -> Option<usize> {
        match self {
            DataType::Byte => Some(1),
            DataType::UInt16 | DataType::Int16 => Some(2),
            DataType::UInt32 | DataType::Int32 | DataType::SmallDateTime | DataType::Float => {
                Some(4)
            }
            DataType::UInt64 | DataType::Int64 | DataType::DateTime | DataType::Double => Some(8),
            DataType::String | DataType::ByteArray => None,
        }
    }

    /// Returns true for fixed-width types
    pub fn is_fixed(&self) -> bool {
        self.size().is_some()
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// =============================================================================
// Typed Comparison
// =============================================================================

macro_rules! read_le {
    ($ty:ty, $buf:expr, $at:expr) => {{
        const N: usize = std::mem::size_of::<$ty>();
        let mut raw = [0u8; N];
        raw.copy_from_slice(&$buf[$at..$at + N]);
        <$ty>::from_le_bytes(raw)
    }};
}

fn float_order<T: PartialOrd>(a: T, b: T, a_nan: bool, b_nan: bool) -> Ordering {
    // NaN sorts below every number and equal to itself
    a.partial_cmp(&b).unwrap_or_else(|| b_nan.cmp(&a_nan))
}

/// Compares the values of `data_type` found at `*at1` in `a` and `*at2` in `b`,
/// advancing both offsets past the compared value.
///
/// Variable-length types consume the rest of both buffers. If either buffer is
/// too short for a fixed-width type, the remaining bytes are compared
/// lexicographically instead.
pub fn compare_typed(
    a: &[u8],
    b: &[u8],
    at1: &mut usize,
    at2: &mut usize,
    data_type: DataType,
) -> Ordering {
    let size = match data_type.size() {
        Some(size) if a.len() >= *at1 + size && b.len() >= *at2 + size => size,
        _ => {
            let rest1 = a.get(*at1..).unwrap_or_default();
            let rest2 = b.get(*at2..).unwrap_or_default();
            *at1 = a.len();
            *at2 = b.len();
            return rest1.cmp(rest2);
        }
    };

    let (i, j) = (*at1, *at2);
    let order = match data_type {
        DataType::UInt16 => read_le!(u16, a, i).cmp(&read_le!(u16, b, j)),
        DataType::Int16 => read_le!(i16, a, i).cmp(&read_le!(i16, b, j)),
        DataType::UInt32 => read_le!(u32, a, i).cmp(&read_le!(u32, b, j)),
        DataType::Int32 | DataType::SmallDateTime => {
            read_le!(i32, a, i).cmp(&read_le!(i32, b, j))
        }
        DataType::UInt64 => read_le!(u64, a, i).cmp(&read_le!(u64, b, j)),
        DataType::Int64 | DataType::DateTime => read_le!(i64, a, i).cmp(&read_le!(i64, b, j)),
        DataType::Byte => a[i].cmp(&b[j]),
        DataType::Float => {
            let (x, y) = (read_le!(f32, a, i), read_le!(f32, b, j));
            float_order(x, y, x.is_nan(), y.is_nan())
        }
        DataType::Double => {
            let (x, y) = (read_le!(f64, a, i), read_le!(f64, b, j));
            float_order(x, y, x.is_nan(), y.is_nan())
        }
        DataType::String | DataType::ByteArray => Ordering::Equal,
    };
    *at1 += size;
    *at2 += size;
    order
}

/// Reads an integer-valued field as i64 for bitwise evaluation.
///
/// Returns `None` for non-integral types or a short buffer.
pub fn read_integral(value: &[u8], data_type: DataType) -> Option<i64> {
    let size = data_type.size()?;
    if value.len() < size {
        return None;
    }
    let v = match data_type {
        DataType::UInt16 => read_le!(u16, value, 0) as i64,
        DataType::Int16 => read_le!(i16, value, 0) as i64,
        DataType::UInt32 => read_le!(u32, value, 0) as i64,
        DataType::Int32 | DataType::SmallDateTime => read_le!(i32, value, 0) as i64,
        DataType::UInt64 => read_le!(u64, value, 0) as i64,
        DataType::Int64 | DataType::DateTime => read_le!(i64, value, 0),
        DataType::Byte => value[0] as i64,
        _ => return None,
    };
    Some(v)
}

/// Bit mask covering the encoded width of an integral type
pub fn width_mask(data_type: DataType) -> i64 {
    match data_type.size() {
        Some(8) | None => -1,
        Some(n) => (1i64 << (n * 8)) - 1,
    }
}
