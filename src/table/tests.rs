// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::*;
use crate::hash::home_index;
use rand::{Rng, SeedableRng};
use test_log::test;

/// Returns `count` distinct 4-byte keys whose home is `home` in a table of `2^exponent` buckets
fn keys_homed_at(home: usize, exponent: u8, count: usize) -> Vec<[u8; 4]> {
    (0u32..)
        .map(u32::to_be_bytes)
        .filter(|key| home_index(key, 4, exponent) == home)
        .take(count)
        .collect()
}

#[expect(clippy::unwrap_used)]
fn small_table(exponent: u8, neighborhood: u8) -> HopscotchTable {
    Config::new(4, 8)
        .exponent(exponent)
        .neighborhood(neighborhood)
        .max_exponent(16)
        .build()
        .unwrap()
}

/// Checks that every set hop bit points at an occupied slot whose key is homed at that bucket
fn assert_neighborhood_invariant(table: &HopscotchTable) {
    let h = usize::from(table.neighborhood());
    let mut claimed = 0;

    for (home, bucket) in table.buckets().iter().enumerate() {
        for offset in bucket.offsets() {
            assert!(offset < h, "offset {offset} out of neighborhood at {home}");

            let key = table
                .buckets()
                .get(home + offset)
                .and_then(|b| b.slot.key())
                .unwrap_or_else(|| panic!("bit {offset} of {home} points at vacant slot"));

            assert_eq!(home, table.home_index(key));
            claimed += 1;
        }
    }

    let occupied = table
        .buckets()
        .iter()
        .filter(|b| !b.slot.is_vacant())
        .count();

    assert_eq!(occupied, claimed, "every occupied slot is claimed exactly once");
    assert_eq!(occupied, table.len());
}

#[test]
fn table_insert_then_lookup() -> crate::Result<()> {
    let mut table = small_table(8, 32);

    table.insert(*b"abcd", "value")?;

    assert_eq!(Some(b"value".into()), table.lookup(b"abcd")?);
    assert_eq!(None, table.lookup(b"abce")?);
    assert_eq!(1, table.len());
    assert!(table.contains_key(b"abcd")?);

    Ok(())
}

#[test]
fn table_lookup_empty_table() -> crate::Result<()> {
    let table = small_table(4, 4);

    for x in 0u32..100 {
        assert_eq!(None, table.lookup(&x.to_be_bytes())?);
    }

    Ok(())
}

#[test]
fn table_duplicate_key_leaves_table_unchanged() -> crate::Result<()> {
    let mut table = small_table(8, 32);

    table.insert(*b"abcd", "first")?;
    let before = table.buckets().to_vec();

    assert!(matches!(
        table.insert(*b"abcd", "second"),
        Err(Error::DuplicateKey)
    ));

    assert_eq!(before, table.buckets());
    assert_eq!(Some(b"first".into()), table.lookup(b"abcd")?);
    assert_eq!(1, table.len());

    Ok(())
}

#[test]
fn table_remove() -> crate::Result<()> {
    let mut table = small_table(8, 32);

    table.insert(*b"abcd", "value")?;
    assert_eq!(Some(b"value".into()), table.remove(b"abcd")?);
    assert_eq!(None, table.lookup(b"abcd")?);
    assert_eq!(None, table.remove(b"abcd")?);
    assert!(table.is_empty());

    let home = table.home_index(b"abcd");
    assert!(!table.buckets().get(home).is_some_and(Bucket::is_home));

    // Can be inserted again
    table.insert(*b"abcd", "again")?;
    assert_eq!(Some(b"again".into()), table.lookup(b"abcd")?);

    Ok(())
}

#[test]
fn table_key_and_value_length_checked() {
    let mut table = small_table(4, 4);

    assert!(matches!(
        table.insert(*b"abc", "v"),
        Err(Error::KeyLength {
            expected: 4,
            got: 3
        })
    ));
    assert!(matches!(
        table.insert(*b"abcd", "123456789"),
        Err(Error::ValueTooLarge { max: 8, got: 9 })
    ));
    assert!(matches!(
        table.lookup(b"abcde"),
        Err(Error::KeyLength { .. })
    ));
    assert!(matches!(table.remove(b""), Err(Error::KeyLength { .. })));
    assert!(table.is_empty());
}

#[test]
fn table_relocation_chain() -> crate::Result<()> {
    let mut table = small_table(4, 4);

    let a = keys_homed_at(2, 4, 1)[0];
    let b = keys_homed_at(3, 4, 1)[0];
    let zeros = keys_homed_at(0, 4, 3);

    table.insert(a, "a")?;
    table.insert(b, "b")?;
    for key in &zeros {
        table.insert(*key, *key)?;
    }

    // The third key homed at 0 found bucket 4 first, which is out of range,
    // so `b` was pushed from 3 to 4 to make room.
    assert_eq!(0b1011, table.buckets()[0].hop_info);
    assert_eq!(0b0001, table.buckets()[2].hop_info);
    assert_eq!(0b0010, table.buckets()[3].hop_info);
    assert_eq!(Some(&UserKey::from(zeros[2])), table.buckets()[3].slot.key());
    assert_eq!(Some(&UserKey::from(b)), table.buckets()[4].slot.key());

    assert_eq!(Some(b"a".into()), table.lookup(&a)?);
    assert_eq!(Some(b"b".into()), table.lookup(&b)?);
    for key in &zeros {
        assert_eq!(Some(key.into()), table.lookup(key)?);
    }

    assert_neighborhood_invariant(&table);

    Ok(())
}

#[test]
fn table_failed_insert_reverts_relocations() -> crate::Result<()> {
    let mut table = small_table(4, 4);

    let zeros = keys_homed_at(0, 4, 5);
    let four = keys_homed_at(4, 4, 1)[0];

    for key in zeros.iter().take(4) {
        table.insert(*key, *key)?;
    }
    table.insert(four, "4")?;

    let before = table.buckets().to_vec();

    // Bucket 5 is free, the entry of home 4 is shifted into it, then
    // nothing can be moved into bucket 4, so that shift is reverted.
    #[expect(clippy::indexing_slicing)]
    let result = table.insert(zeros[4], "x");

    assert!(matches!(result, Err(Error::CapacityExhausted)));
    assert_eq!(before, table.buckets());
    assert_eq!(0b0001, table.buckets()[4].hop_info);
    assert_eq!(Some(&UserKey::from(four)), table.buckets()[4].slot.key());
    assert_eq!(5, table.len());

    assert_neighborhood_invariant(&table);

    Ok(())
}

#[test]
fn table_twelve_keys_then_saturated_neighborhood() -> crate::Result<()> {
    let mut table = small_table(4, 4);

    let clustered = keys_homed_at(0, 4, 5);
    let spread = (4..12)
        .map(|home| keys_homed_at(home, 4, 1)[0])
        .collect::<Vec<_>>();

    for key in clustered.iter().take(4).chain(&spread) {
        table.insert(*key, *key)?;
    }
    assert_eq!(12, table.len());

    for key in clustered.iter().take(4).chain(&spread) {
        assert_eq!(Some(key.into()), table.lookup(key)?);
    }

    // Bucket 12 is free, but nothing can be shifted into the neighborhood of bucket 0
    let before = table.buckets().to_vec();

    #[expect(clippy::indexing_slicing)]
    let result = table.insert(clustered[4], "x");

    assert!(matches!(result, Err(Error::CapacityExhausted)));
    assert_eq!(before, table.buckets(), "failed insert must not move entries");
    assert_eq!(12, table.len());

    assert_neighborhood_invariant(&table);

    Ok(())
}

#[test]
fn table_probe_does_not_wrap_around() -> crate::Result<()> {
    let mut table = small_table(4, 4);
    let last = keys_homed_at(15, 4, 2);

    table.insert(last[0], "a")?;

    // Buckets 0..15 are all vacant, but probing stops at the end of the array
    assert!(matches!(
        table.insert(last[1], "b"),
        Err(Error::CapacityExhausted)
    ));
    assert_eq!(1, table.len());

    Ok(())
}

#[test]
fn table_no_aliasing_random_keys() -> crate::Result<()> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(4_242);
    let mut table = small_table(12, 32);
    let mut inserted = vec![];

    while inserted.len() < 2_500 {
        let key: [u8; 4] = rng.random();
        let value: [u8; 8] = rng.random();

        match table.insert(key, value) {
            Ok(()) => inserted.push((key, value)),
            Err(Error::DuplicateKey | Error::CapacityExhausted) => {}
            Err(e) => return Err(e),
        }
    }

    for (key, value) in &inserted {
        assert_eq!(Some(value.into()), table.lookup(key)?);
    }

    assert_neighborhood_invariant(&table);

    Ok(())
}

#[test]
fn table_remove_keeps_invariant() -> crate::Result<()> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    let mut table = small_table(10, 8);
    let mut inserted = vec![];

    for x in 0u32..600 {
        let key = x.to_le_bytes();
        match table.insert(key, key) {
            Ok(()) => inserted.push(key),
            Err(Error::CapacityExhausted) => {}
            Err(e) => return Err(e),
        }
    }

    let (removed, kept): (Vec<[u8; 4]>, Vec<[u8; 4]>) =
        inserted.into_iter().partition(|_| rng.random_bool(0.5));

    for key in &removed {
        assert_eq!(Some(key.into()), table.remove(key)?);
    }
    for key in &removed {
        assert_eq!(None, table.lookup(key)?);
    }
    for key in &kept {
        assert_eq!(Some(key.into()), table.lookup(key)?);
    }

    assert_eq!(kept.len(), table.len());
    assert_neighborhood_invariant(&table);

    Ok(())
}

#[test]
fn table_resize_keeps_entries() -> crate::Result<()> {
    let mut table = small_table(6, 8);
    let mut inserted = vec![];

    for x in 0u32..1_000 {
        let key = x.to_be_bytes();
        match table.insert(key, x.to_le_bytes()) {
            Ok(()) => inserted.push(x),
            Err(Error::CapacityExhausted) => {}
            Err(e) => return Err(e),
        }
        if inserted.len() == 44 {
            break;
        }
    }
    assert!(table.load_factor() > 0.6);

    table.resize(1)?;

    assert_eq!(7, table.exponent());
    assert_eq!(128, table.capacity());
    assert_eq!(inserted.len(), table.len());

    for x in &inserted {
        assert_eq!(Some(x.to_le_bytes().into()), table.lookup(&x.to_be_bytes())?);
    }

    assert_neighborhood_invariant(&table);

    Ok(())
}

#[test]
fn table_resize_over_limit_keeps_table() -> crate::Result<()> {
    let mut table = Config::new(4, 8)
        .exponent(4)
        .neighborhood(4)
        .max_exponent(4)
        .build()?;

    table.insert(*b"abcd", "v")?;
    let before = table.buckets().to_vec();

    assert!(matches!(table.resize(1), Err(Error::ResizeFailed)));
    assert_eq!(4, table.exponent());
    assert_eq!(before, table.buckets());
    assert_eq!(Some(b"v".into()), table.lookup(b"abcd")?);

    // No-op
    table.resize(0)?;
    assert_eq!(4, table.exponent());

    Ok(())
}

#[test]
fn table_resize_reinsert_failure_restores_table() -> crate::Result<()> {
    let mut table = small_table(5, 4);

    for x in 0u32..20 {
        match table.insert(x.to_be_bytes(), x.to_le_bytes()) {
            Ok(()) | Err(Error::CapacityExhausted) => {}
            Err(e) => return Err(e),
        }
    }
    assert!(table.len() > 5);

    let before = table.buckets().to_vec();
    let len = table.len();

    // Place a few entries into the grown table, then fail
    let mut placed = 0;
    let result = table.rebuild(6, |table, key, value| {
        if placed == 5 {
            return Err(Error::CapacityExhausted);
        }
        placed += 1;
        table.insert(key.clone(), value.clone())
    });

    assert!(matches!(result, Err(Error::ResizeFailed)));
    assert_eq!(5, placed);
    assert_eq!(5, table.exponent());
    assert_eq!(32, table.capacity());
    assert_eq!(len, table.len());
    assert_eq!(before, table.buckets());
    assert_neighborhood_invariant(&table);

    for x in 0u32..20 {
        let key = x.to_be_bytes();
        let stored = before.iter().any(|b| b.slot.key().is_some_and(|k| **k == key));
        assert_eq!(stored, table.contains_key(&key)?);
    }

    // The table keeps working after the failed resize
    table.resize(1)?;
    assert_eq!(6, table.exponent());
    assert_eq!(len, table.len());
    assert_neighborhood_invariant(&table);

    Ok(())
}

#[test]
fn table_insert_or_grow() -> crate::Result<()> {
    let mut table = small_table(2, 2);

    for x in 0u32..500 {
        table.insert_or_grow(x.to_be_bytes(), x.to_le_bytes())?;
    }

    assert_eq!(500, table.len());
    assert!(table.exponent() > 2);

    for x in 0u32..500 {
        assert_eq!(Some(x.to_le_bytes().into()), table.lookup(&x.to_be_bytes())?);
    }

    assert!(matches!(
        table.insert_or_grow(7u32.to_be_bytes(), "dup"),
        Err(Error::DuplicateKey)
    ));

    assert_neighborhood_invariant(&table);

    Ok(())
}

#[test]
fn table_iter_in_bucket_order() -> crate::Result<()> {
    let mut table = small_table(8, 32);

    for x in 0u32..50 {
        table.insert(x.to_be_bytes(), x.to_be_bytes())?;
    }

    let entries = table.iter().collect::<Vec<_>>();
    assert_eq!(50, entries.len());

    for (key, value) in &entries {
        assert_eq!(key, value);
    }

    let homes = entries
        .iter()
        .map(|(key, _)| table.home_index(key))
        .collect::<Vec<_>>();

    // Entries are displaced forward only, so bucket order is close to home order
    assert!(homes.windows(2).all(|w| w[0] <= w[1] + 31));

    assert_eq!(50, (&table).into_iter().count());

    Ok(())
}
