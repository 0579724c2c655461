//! Stable hashing and key derivation
//!
//! Tag names and string-hashed tag values are interned as 32-bit codes
//! produced by [`string_hash`]. The function must stay bit-stable: the codes
//! are persisted inside serialized index records.

const SEED: i32 = 352_654_597;
const MULTIPLIER: i32 = 1_566_083_941;

/// Reads the munge word at `offset`: an i32 when four bytes remain, a
/// sign-extended i16 when two remain, a single byte when one remains.
fn power_at(bytes: &[u8], offset: usize) -> i32 {
    match bytes.len().saturating_sub(offset) {
        0 => 0,
        1 => bytes[offset] as i32,
        2 | 3 => i16::from_le_bytes([bytes[offset], bytes[offset + 1]]) as i32,
        _ => i32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]),
    }
}

#[inline]
fn munge(acc: i32, power: i32) -> i32 {
    (acc.wrapping_shl(5).wrapping_add(acc).wrapping_add(acc >> 27)) ^ power
}

/// Stable 32-bit hash of a string.
///
/// The loop runs once per four UTF-16 code units of `name` while consuming
/// eight bytes of its UTF-8 encoding per round. An empty string hashes to 0.
pub fn string_hash(name: &str) -> i32 {
    let bytes = name.as_bytes();
    if bytes.is_empty() {
        return 0;
    }

    let mut first = SEED;
    let mut second = SEED;
    let mut remaining = name.encode_utf16().count() as i64;
    let mut round = 0usize;
    while remaining > 0 {
        let offset = round * 8;
        first = munge(first, power_at(bytes, offset));
        if remaining <= 2 {
            break;
        }
        second = munge(second, power_at(bytes, offset + 4));
        remaining -= 4;
        round += 1;
    }

    first.wrapping_add(second.wrapping_mul(MULTIPLIER))
}

/// Derives the numeric partition and lock key of an index id.
///
/// Empty ids map to 1. Ids of four or more bytes use the absolute value of
/// their leading little-endian i32, shorter ids their first byte.
pub fn generate_primary_id(index_id: &[u8]) -> i32 {
    if index_id.is_empty() {
        return 1;
    }
    if index_id.len() >= 4 {
        let head = i32::from_le_bytes([index_id[0], index_id[1], index_id[2], index_id[3]]);
        return head.checked_abs().unwrap_or(1);
    }
    index_id[0] as i32
}

/// Storage key of one physical index: the index id followed by the low byte
/// of the index definition's suffix.
pub fn form_extended_id(index_id: &[u8], suffix: i16) -> Vec<u8> {
    let mut extended = Vec::with_capacity(index_id.len() + 1);
    extended.extend_from_slice(index_id);
    extended.push(suffix as u8);
    extended
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_hash_is_stable() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("date"), string_hash("date"));
        assert_ne!(string_hash("date"), string_hash("Date"));
        assert_ne!(string_hash("a"), string_hash("ab"));
    }

    #[test]
    fn test_string_hash_single_char() {
        // one round: first = munge(SEED, 'a'), second untouched
        let expected = munge(SEED, b'a' as i32).wrapping_add(SEED.wrapping_mul(MULTIPLIER));
        assert_eq!(string_hash("a"), expected);
    }

    #[test]
    fn test_string_hash_long_names() {
        let long = "a_fairly_long_tag_name_for_hashing";
        assert_eq!(string_hash(long), string_hash(long));
        assert_ne!(string_hash(long), string_hash("a_fairly_long_tag_name_for_hashinG"));
    }

    #[test]
    fn test_primary_id() {
        assert_eq!(generate_primary_id(&[]), 1);
        assert_eq!(generate_primary_id(&[7]), 7);
        assert_eq!(generate_primary_id(&[200, 1]), 200);
        assert_eq!(generate_primary_id(&5i32.to_le_bytes()), 5);
        assert_eq!(generate_primary_id(&(-5i32).to_le_bytes()), 5);
        assert_eq!(generate_primary_id(&i32::MIN.to_le_bytes()), 1);
        assert_eq!(generate_primary_id(&[1, 0, 0, 0, 9, 9]), 1);
    }

    #[test]
    fn test_extended_id() {
        assert_eq!(form_extended_id(&[1, 2], 3), vec![1, 2, 3]);
        assert_eq!(form_extended_id(&[1], 0x0105), vec![1, 5]);
    }
}
