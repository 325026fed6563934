// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{UserKey, UserValue};

/// Physical contents of a bucket
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Slot {
    /// No entry is stored here
    #[default]
    Vacant,

    /// Holds an entry, which is not necessarily homed at this bucket
    Occupied {
        /// Fixed-length key
        key: UserKey,

        /// Value
        value: UserValue,
    },
}

impl Slot {
    /// Returns `true` if no entry is stored in this slot.
    #[must_use]
    pub fn is_vacant(&self) -> bool {
        matches!(self, Self::Vacant)
    }

    /// Returns the stored key, if any.
    #[must_use]
    pub fn key(&self) -> Option<&UserKey> {
        match self {
            Self::Vacant => None,
            Self::Occupied { key, .. } => Some(key),
        }
    }

    /// Returns the stored value, if any.
    #[must_use]
    pub fn value(&self) -> Option<&UserValue> {
        match self {
            Self::Vacant => None,
            Self::Occupied { value, .. } => Some(value),
        }
    }
}

/// A table bucket
///
/// A bucket plays two roles at once: it is the home of every entry whose
/// key hashes to its index (tracked by `hop_info`), and it is a physical
/// slot that holds at most one entry (which may be homed somewhere else).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Bucket {
    /// Bit `i` is set if the entry homed here is stored at `index + i`
    pub hop_info: u32,

    /// Physical slot
    pub slot: Slot,
}

impl Bucket {
    pub(crate) fn alloc(count: usize) -> Box<[Self]> {
        (0..count).map(|_| Self::default()).collect()
    }

    /// Returns `true` if at least one entry is homed at this bucket.
    #[must_use]
    pub fn is_home(&self) -> bool {
        self.hop_info != 0
    }

    /// Marks `offset` in the hop bitmap.
    ///
    /// Offsets outside of the neighborhood are rejected instead of being truncated.
    pub(crate) fn mark(&mut self, offset: usize, neighborhood: u8) -> crate::Result<()> {
        if offset >= usize::from(neighborhood) {
            return Err(crate::Error::NeighborhoodOverflow(offset));
        }
        self.hop_info |= 1 << offset;
        Ok(())
    }

    pub(crate) fn unmark(&mut self, offset: usize) {
        if let Some(bit) = 1u32.checked_shl(offset as u32) {
            self.hop_info &= !bit;
        }
    }

    /// Iterates the offsets marked in the hop bitmap, lowest first.
    pub fn offsets(&self) -> Offsets {
        Offsets(self.hop_info)
    }
}

/// Iterator over the set bits of a hop bitmap
pub struct Offsets(u32);

impl Offsets {
    /// Iterates the set bits of a raw bitmap.
    #[must_use]
    pub fn new(hop_info: u32) -> Self {
        Self(hop_info)
    }
}

impl Iterator for Offsets {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        if self.0 == 0 {
            return None;
        }

        let offset = self.0.trailing_zeros();

        // Clear lowest set bit
        self.0 &= self.0 - 1;

        Some(offset as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn bucket_offsets_ascending() {
        let bucket = Bucket {
            hop_info: 0b1000_0000_0000_0000_0000_0000_0010_0101,
            slot: Slot::Vacant,
        };
        assert_eq!(vec![0, 2, 5, 31], bucket.offsets().collect::<Vec<_>>());
    }

    #[test]
    fn bucket_mark_rejects_overflow() {
        let mut bucket = Bucket::default();

        assert!(bucket.mark(3, 4).is_ok());
        assert_eq!(0b1000, bucket.hop_info);

        assert!(matches!(
            bucket.mark(4, 4),
            Err(crate::Error::NeighborhoodOverflow(4))
        ));
        assert!(matches!(
            bucket.mark(32, 32),
            Err(crate::Error::NeighborhoodOverflow(32))
        ));
        assert_eq!(0b1000, bucket.hop_info);

        bucket.unmark(3);
        assert!(!bucket.is_home());
    }

    #[test]
    fn bucket_mark_highest_bit() -> crate::Result<()> {
        let mut bucket = Bucket::default();
        bucket.mark(31, 32)?;
        assert_eq!(1 << 31, bucket.hop_info);
        assert_eq!(vec![31], bucket.offsets().collect::<Vec<_>>());
        Ok(())
    }
}
