// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{lookup_in_window, read_exact, Handshake, RegionDescriptor, Transport, Usage, WindowCache};
use crate::image::{RecordLayout, TableDescriptor};
use crate::{Error, Slice, UserValue};
use std::sync::Arc;

/// Outcome counts of a batch of lookups
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct BatchStats {
    /// Keys that were found
    pub found: u64,

    /// Keys that were not found
    pub missing: u64,
}

impl BatchStats {
    /// Total number of lookups.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.found + self.missing
    }
}

impl std::ops::Add for BatchStats {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            found: self.found + rhs.found,
            missing: self.missing + rhs.missing,
        }
    }
}

impl std::iter::Sum for BatchStats {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), std::ops::Add::add)
    }
}

/// Read-only view of a published image, queried over a [`Transport`]
///
/// Every lookup costs exactly one remote read of the key's neighborhood
/// window (unless served from a [`WindowCache`]).
pub struct RemoteTable<T: Transport> {
    transport: T,
    region: RegionDescriptor,
    descriptor: TableDescriptor,
    layout: RecordLayout,
    cache: Option<Arc<WindowCache>>,
}

impl<T: Transport> RemoteTable<T> {
    /// Connects to a published image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`] if the region cannot hold the image
    /// the handshake describes or is not readable by peers.
    pub fn connect(transport: T, handshake: &Handshake) -> crate::Result<Self> {
        let Handshake { region, table } = *handshake;

        if region.usage != Usage::ReadSource || region.len < table.image_len() {
            return Err(Error::InvalidHeader("Handshake"));
        }

        log::debug!(
            "Connected to region {} with 2^{} buckets, H={}, record size {}",
            region.id,
            table.exponent,
            table.neighborhood,
            table.record_size,
        );

        Ok(Self {
            transport,
            region,
            layout: table.layout(),
            descriptor: table,
            cache: None,
        })
    }

    /// Caches fetched windows.
    #[must_use]
    pub fn use_cache(mut self, cache: Arc<WindowCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Returns the metadata of the remote image.
    #[must_use]
    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    fn check_key(&self, key: &[u8]) -> crate::Result<()> {
        let expected = self.layout.key_length();

        if key.len() == expected {
            Ok(())
        } else {
            Err(Error::KeyLength {
                expected,
                got: key.len(),
            })
        }
    }

    /// Fetches the neighborhood window of a home bucket in one read.
    fn fetch_window(&self, home: usize) -> crate::Result<Slice> {
        if let Some(window) = self.cache.as_ref().and_then(|c| c.get(&self.descriptor, home)) {
            return Ok(window);
        }

        let range = self.descriptor.window(home);

        let len = usize::try_from(range.end - range.start)
            .map_err(|_| Error::MalformedWindow("window does not fit into memory"))?;

        let mut buf = vec![0; len];
        read_exact(&self.transport, &self.region, range.start, &mut buf)?;

        let window = Slice::from(buf);

        if let Some(cache) = &self.cache {
            cache.insert(&self.descriptor, home, window.clone());
        }

        Ok(window)
    }

    /// Looks up a key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the read fails, or a decode error if
    /// the fetched window is malformed. A failed read never yields a value.
    pub fn get(&self, key: &[u8]) -> crate::Result<Option<UserValue>> {
        self.check_key(key)?;

        let home = self.descriptor.home_index(key);
        let window = self.fetch_window(home)?;

        lookup_in_window(&self.layout, &window, key)
    }

    /// Returns `true` if the remote image contains `key`.
    ///
    /// # Errors
    ///
    /// Same as [`RemoteTable::get`].
    pub fn contains_key(&self, key: &[u8]) -> crate::Result<bool> {
        self.get(key).map(|v| v.is_some())
    }

    fn lookup_range<K: AsRef<[u8]>>(&self, keys: &[K]) -> crate::Result<BatchStats> {
        let mut stats = BatchStats::default();

        for key in keys {
            if self.contains_key(key.as_ref())? {
                stats.found += 1;
            } else {
                stats.missing += 1;
            }
        }

        Ok(stats)
    }
}

impl<T: Transport + Sync> RemoteTable<T> {
    /// Looks up every key, spreading contiguous key ranges over `workers` threads.
    ///
    /// Each worker counts locally, the counts are summed after all workers
    /// have finished.
    ///
    /// # Errors
    ///
    /// Returns the first error any worker ran into.
    pub fn lookup_batch<K: AsRef<[u8]> + Sync>(
        &self,
        keys: &[K],
        workers: usize,
    ) -> crate::Result<BatchStats> {
        if keys.is_empty() {
            return Ok(BatchStats::default());
        }

        let workers = workers.clamp(1, keys.len());
        let chunk_size = keys.len().div_ceil(workers);

        log::debug!(
            "Looking up {} keys with {workers} workers ({chunk_size} keys each)",
            keys.len(),
        );

        std::thread::scope(|scope| {
            let handles = keys
                .chunks(chunk_size)
                .map(|chunk| scope.spawn(move || self.lookup_range(chunk)))
                .collect::<Vec<_>>();

            let mut total = BatchStats::default();

            for handle in handles {
                match handle.join() {
                    Ok(stats) => total = total + stats?,
                    Err(panic) => std::panic::resume_unwind(panic),
                }
            }

            Ok(total)
        })
    }
}
