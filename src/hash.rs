// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Key hashing shared by the table builder and remote readers
//!
//! Both sides must agree bit-for-bit: changing the hash function invalidates
//! every serialized image, because clients derive the home bucket themselves.

/// Jenkins one-at-a-time hash.
#[must_use]
pub fn jenkins_one_at_a_time(key: &[u8]) -> u32 {
    let mut hash: u32 = 0;

    for &byte in key {
        hash = hash.wrapping_add(u32::from(byte));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }

    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);

    hash
}

/// Returns the home bucket of a key in a table of `2^exponent` buckets.
///
/// Only the first `key_length` bytes of `key` participate in the hash.
#[must_use]
pub fn home_index(key: &[u8], key_length: usize, exponent: u8) -> usize {
    let key = key.get(..key_length).unwrap_or(key);
    let mask = (1u64 << exponent) - 1;

    #[expect(
        clippy::cast_possible_truncation,
        reason = "exponent is at most 31, so the index fits any supported usize"
    )]
    let index = (u64::from(jenkins_one_at_a_time(key)) & mask) as usize;

    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn jenkins_known_values() {
        // NOTE: Values need to be consistent across machines and compilations
        assert_eq!(0, jenkins_one_at_a_time(b""));
        assert_eq!(0xca2e_9442, jenkins_one_at_a_time(b"a"));
        assert_eq!(
            0x519e_91f5,
            jenkins_one_at_a_time(b"The quick brown fox jumps over the lazy dog")
        );
    }

    #[test]
    fn home_index_masks_to_capacity() {
        for exponent in [1, 4, 10, 21] {
            for x in 0u32..1_000 {
                let key = x.to_be_bytes();
                let idx = home_index(&key, key.len(), exponent);
                assert!(idx < (1 << exponent));
            }
        }
    }

    #[test]
    fn home_index_ignores_bytes_past_key_length() {
        let a = home_index(b"abcdXXXX", 4, 12);
        let b = home_index(b"abcdYYYY", 4, 12);
        let c = home_index(b"abcd", 4, 12);
        assert_eq!(a, b);
        assert_eq!(a, c);
    }
}
