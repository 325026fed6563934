// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod bucket;
mod iter;

#[cfg(test)]
mod tests;

pub use bucket::{Bucket, Offsets, Slot};
pub use iter::Iter;

use crate::{hash::home_index, Config, Error, UserKey, UserValue};

/// A single relocation step of an insert
///
/// The entry homed at `home` moves from `home + from` to `home + to`.
#[derive(Copy, Clone, Debug)]
struct Displacement {
    home: usize,
    from: usize,
    to: usize,
}

/// A fixed-capacity hopscotch hash table over fixed-length keys
///
/// The table is built by a single writer (all mutation takes `&mut self`),
/// then frozen into an [`Image`](crate::Image) that remote clients read
/// without any server-side computation.
///
/// Probing never wraps around the end of the bucket array, so the last
/// `H - 1` home buckets have smaller effective neighborhoods.
#[derive(Clone, Debug)]
pub struct HopscotchTable {
    config: Config,
    exponent: u8,
    buckets: Box<[Bucket]>,
    len: usize,
}

impl HopscotchTable {
    pub(crate) fn from_config(config: Config) -> Self {
        let exponent = config.exponent;

        log::debug!(
            "Creating hopscotch table with 2^{exponent} buckets, H={}, key_length={}",
            config.neighborhood,
            config.key_length,
        );

        Self {
            buckets: Bucket::alloc(1 << exponent),
            exponent,
            config,
            len: 0,
        }
    }

    /// Returns the configuration the table was built with.
    ///
    /// `config().exponent` is the *initial* exponent, see [`HopscotchTable::exponent`].
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the current capacity exponent.
    #[must_use]
    pub fn exponent(&self) -> u8 {
        self.exponent
    }

    /// Returns the number of buckets.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the table holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the ratio of occupied buckets.
    #[must_use]
    #[expect(clippy::cast_precision_loss)]
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.capacity() as f64
    }

    /// Returns the fixed key length.
    #[must_use]
    pub fn key_length(&self) -> usize {
        self.config.key_length as usize
    }

    /// Returns the neighborhood size.
    #[must_use]
    pub fn neighborhood(&self) -> u8 {
        self.config.neighborhood
    }

    /// Gives read access to the bucket array, in index order.
    #[must_use]
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    /// Iterates over all entries in bucket order.
    #[must_use]
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.buckets)
    }

    /// Returns the home bucket of a key.
    #[must_use]
    pub fn home_index(&self, key: &[u8]) -> usize {
        home_index(key, self.key_length(), self.exponent)
    }

    fn check_key(&self, key: &[u8]) -> crate::Result<()> {
        if key.len() == self.key_length() {
            Ok(())
        } else {
            Err(Error::KeyLength {
                expected: self.key_length(),
                got: key.len(),
            })
        }
    }

    fn check_value(&self, value: &[u8]) -> crate::Result<()> {
        let max = self.config.value_length as usize;

        if value.len() <= max {
            Ok(())
        } else {
            Err(Error::ValueTooLarge {
                max,
                got: value.len(),
            })
        }
    }

    /// Returns (home, offset) of the entry with the given key.
    fn find(&self, key: &[u8]) -> Option<(usize, usize)> {
        let home = self.home_index(key);
        let bucket = self.buckets.get(home)?;

        // NOTE: An empty bitmap means nothing is homed here, never scan
        if !bucket.is_home() {
            return None;
        }

        bucket
            .offsets()
            .find(|&offset| {
                self.buckets
                    .get(home + offset)
                    .and_then(|b| b.slot.key())
                    .is_some_and(|k| &**k == key)
            })
            .map(|offset| (home, offset))
    }

    /// Looks up the value stored for `key`.
    ///
    /// Returns `Ok(None)` if the key is not in the table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyLength`] if the key does not have the configured length.
    pub fn lookup(&self, key: &[u8]) -> crate::Result<Option<UserValue>> {
        self.check_key(key)?;

        Ok(self.find(key).and_then(|(home, offset)| {
            self.buckets
                .get(home + offset)
                .and_then(|b| b.slot.value())
                .cloned()
        }))
    }

    /// Returns `true` if the table contains `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyLength`] if the key does not have the configured length.
    pub fn contains_key(&self, key: &[u8]) -> crate::Result<bool> {
        self.check_key(key)?;
        Ok(self.find(key).is_some())
    }

    /// Returns the index of the first vacant bucket at or after `home`.
    fn probe_vacant(&self, home: usize) -> Option<usize> {
        self.buckets
            .get(home..)?
            .iter()
            .position(|b| b.slot.is_vacant())
            .map(|distance| home + distance)
    }

    /// Finds an entry that can be moved into the vacant bucket `free`
    /// without leaving its home's neighborhood.
    ///
    /// Candidate homes are scanned from `free - 1` down to `free - (H - 1)`,
    /// moving the earliest entry of the first home whose earliest entry
    /// sits before `free`.
    fn find_displacement(&self, free: usize) -> Option<Displacement> {
        let h = usize::from(self.neighborhood());

        for distance in 1..h {
            let Some(home) = free.checked_sub(distance) else {
                continue;
            };

            #[expect(clippy::indexing_slicing, reason = "home < free < capacity")]
            let bucket = &self.buckets[home];

            let Some(offset) = bucket.offsets().next() else {
                continue;
            };

            if offset < distance {
                return Some(Displacement {
                    home,
                    from: offset,
                    to: distance,
                });
            }
        }

        None
    }

    fn apply(&mut self, d: Displacement) -> crate::Result<()> {
        let h = self.neighborhood();

        #[expect(clippy::indexing_slicing, reason = "displacements stay below free < capacity")]
        {
            let slot = std::mem::take(&mut self.buckets[d.home + d.from].slot);
            debug_assert!(self.buckets[d.home + d.to].slot.is_vacant());
            self.buckets[d.home + d.to].slot = slot;

            let home = &mut self.buckets[d.home];
            home.unmark(d.from);
            home.mark(d.to, h)?;
        }

        Ok(())
    }

    fn revert(&mut self, d: Displacement) {
        let h = self.neighborhood();

        #[expect(clippy::indexing_slicing, reason = "displacement was applied before")]
        {
            let slot = std::mem::take(&mut self.buckets[d.home + d.to].slot);
            self.buckets[d.home + d.from].slot = slot;

            let home = &mut self.buckets[d.home];
            home.unmark(d.to);

            // NOTE: `from` was a valid offset when the displacement was found
            let restored = home.mark(d.from, h);
            debug_assert!(restored.is_ok(), "reverted offset left the neighborhood");
        }
    }

    fn rollback(&mut self, moves: Vec<Displacement>) {
        for d in moves.into_iter().rev() {
            self.revert(d);
        }
    }

    /// Inserts a key-value pair.
    ///
    /// Keys are never overwritten. If no relocation chain can bring a vacant
    /// bucket into the key's neighborhood, all relocations done so far are
    /// reverted and the table is left unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateKey`] if the key is already present
    /// - [`Error::CapacityExhausted`] if the neighborhood is saturated
    /// - [`Error::KeyLength`] / [`Error::ValueTooLarge`] for malformed input
    pub fn insert<K: Into<UserKey>, V: Into<UserValue>>(
        &mut self,
        key: K,
        value: V,
    ) -> crate::Result<()> {
        let key = key.into();
        let value = value.into();

        self.check_key(&key)?;
        self.check_value(&value)?;

        if self.find(&key).is_some() {
            return Err(Error::DuplicateKey);
        }

        let home = self.home_index(&key);
        let h = usize::from(self.neighborhood());

        let Some(mut free) = self.probe_vacant(home) else {
            log::trace!("No vacant bucket after home {home}");
            return Err(Error::CapacityExhausted);
        };

        let mut moves = vec![];

        while free - home >= h {
            let Some(d) = self.find_displacement(free) else {
                log::trace!(
                    "No relocation chain for home {home}, stuck at {free} after {} moves",
                    moves.len(),
                );
                self.rollback(moves);
                return Err(Error::CapacityExhausted);
            };

            if let Err(e) = self.apply(d) {
                self.rollback(moves);
                return Err(e);
            }

            moves.push(d);
            free = d.home + d.from;
        }

        #[expect(clippy::indexing_slicing, reason = "home <= free < capacity")]
        {
            if let Err(e) = self.buckets[home].mark(free - home, self.config.neighborhood) {
                self.rollback(moves);
                return Err(e);
            }
            self.buckets[free].slot = Slot::Occupied { key, value };
        }

        self.len += 1;

        Ok(())
    }

    /// Inserts a key-value pair, growing the table as needed.
    ///
    /// On [`Error::CapacityExhausted`] the table is resized and the insert retried,
    /// until [`Config::max_exponent`] is reached.
    ///
    /// # Errors
    ///
    /// Same as [`HopscotchTable::insert`], plus [`Error::ResizeFailed`] if no
    /// larger table could hold all entries.
    pub fn insert_or_grow<K: Into<UserKey>, V: Into<UserValue>>(
        &mut self,
        key: K,
        value: V,
    ) -> crate::Result<()> {
        let key = key.into();
        let value = value.into();

        loop {
            match self.insert(key.clone(), value.clone()) {
                Err(Error::CapacityExhausted) if self.exponent < self.config.max_exponent => {
                    self.grow()?;
                }
                result => return result,
            }
        }
    }

    fn grow(&mut self) -> crate::Result<()> {
        for delta in 1..=self.config.max_exponent.saturating_sub(self.exponent) {
            if self.resize(delta).is_ok() {
                return Ok(());
            }
        }
        Err(Error::ResizeFailed)
    }

    /// Removes `key`, returning its value.
    ///
    /// The bucket is vacated in place, no entries are moved back.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyLength`] if the key does not have the configured length.
    pub fn remove(&mut self, key: &[u8]) -> crate::Result<Option<UserValue>> {
        self.check_key(key)?;

        let Some((home, offset)) = self.find(key) else {
            return Ok(None);
        };

        #[expect(clippy::indexing_slicing, reason = "find only returns valid positions")]
        let slot = {
            self.buckets[home].unmark(offset);
            std::mem::take(&mut self.buckets[home + offset].slot)
        };

        self.len -= 1;

        match slot {
            Slot::Occupied { value, .. } => Ok(Some(value)),
            Slot::Vacant => Ok(None),
        }
    }

    /// Grows the table to `2^(exponent + delta)` buckets, reinserting every entry.
    ///
    /// The resize is all-or-nothing: if any entry cannot be placed, the
    /// previous buckets are restored unchanged.
    ///
    /// Must not be used on a table whose image is being served, publish a
    /// new image instead.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResizeFailed`] if the new exponent exceeds
    /// [`Config::max_exponent`] or reinsertion fails.
    pub fn resize(&mut self, delta: u8) -> crate::Result<()> {
        if delta == 0 {
            return Ok(());
        }

        let new_exponent = self
            .exponent
            .checked_add(delta)
            .filter(|&e| e <= self.config.max_exponent)
            .ok_or(Error::ResizeFailed)?;

        self.rebuild(new_exponent, |table, key, value| {
            table.insert(key.clone(), value.clone())
        })
    }

    /// Swaps in `2^new_exponent` empty buckets and places every old entry
    /// with `place`, restoring the old buckets if any placement fails.
    fn rebuild<F>(&mut self, new_exponent: u8, mut place: F) -> crate::Result<()>
    where
        F: FnMut(&mut Self, &UserKey, &UserValue) -> crate::Result<()>,
    {
        log::debug!(
            "Resizing table from 2^{} to 2^{new_exponent} buckets ({} entries)",
            self.exponent,
            self.len,
        );

        let old_buckets = std::mem::replace(&mut self.buckets, Bucket::alloc(1 << new_exponent));
        let old_exponent = std::mem::replace(&mut self.exponent, new_exponent);
        let old_len = std::mem::replace(&mut self.len, 0);

        let result = Iter::new(&old_buckets).try_for_each(|(key, value)| place(self, key, value));

        if let Err(e) = result {
            log::warn!("Resize to 2^{new_exponent} buckets failed: {e:?}, keeping old table");

            self.buckets = old_buckets;
            self.exponent = old_exponent;
            self.len = old_len;

            return Err(Error::ResizeFailed);
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a HopscotchTable {
    type Item = (&'a UserKey, &'a UserValue);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
