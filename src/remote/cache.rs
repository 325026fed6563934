// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::image::TableDescriptor;
use crate::Slice;
use quick_cache::{sync::Cache as QuickCache, Equivalent, Weighter};

/// Image checksum, record size, neighborhood size, home index
#[derive(Eq, std::hash::Hash, PartialEq)]
struct CacheKey(u128, u32, u8, u64);

impl Equivalent<CacheKey> for (u128, u32, u8, u64) {
    fn equivalent(&self, key: &CacheKey) -> bool {
        self.0 == key.0 && self.1 == key.1 && self.2 == key.2 && self.3 == key.3
    }
}

impl From<(u128, u32, u8, u64)> for CacheKey {
    fn from((image, record_size, neighborhood, home): (u128, u32, u8, u64)) -> Self {
        Self(image, record_size, neighborhood, home)
    }
}

fn cache_key(descriptor: &TableDescriptor, home: usize) -> CacheKey {
    (
        descriptor.checksum.into_u128(),
        descriptor.record_size,
        descriptor.neighborhood,
        home as u64,
    )
        .into()
}

#[derive(Clone)]
struct WindowWeighter;

impl Weighter<CacheKey, Slice> for WindowWeighter {
    fn weight(&self, _: &CacheKey, window: &Slice) -> u64 {
        window.len() as u64
    }
}

/// Cache of fetched neighborhood windows
///
/// Windows are keyed by the image they were read from and their home
/// index, so one cache can be shared between clients of different images.
/// Published images never change, so a cached window never goes stale.
///
/// # Examples
///
/// ```
/// # use hopscotch_image::{Config, Image, remote::{MemoryTransport, RemoteTable, WindowCache}};
/// # use std::sync::Arc;
/// #
/// # let mut table = Config::new(4, 4).exponent(8).build()?;
/// # table.insert(*b"abcd", "1234")?;
/// # let image = Image::from_table(&table)?;
/// let transport = MemoryTransport::new();
/// let handshake = transport.publish(&image);
///
/// // Provide 1 MB of cache capacity
/// let cache = Arc::new(WindowCache::with_capacity_bytes(1_000_000));
/// let client = RemoteTable::connect(&transport, &handshake)?.use_cache(cache.clone());
/// let other = RemoteTable::connect(&transport, &handshake)?.use_cache(cache.clone());
///
/// assert!(client.contains_key(b"abcd")?);
/// assert!(other.contains_key(b"abcd")?);
/// assert_eq!(1, cache.len());
/// #
/// # Ok::<(), hopscotch_image::Error>(())
/// ```
pub struct WindowCache {
    // NOTE: rustc_hash performed best for integer keys
    data: QuickCache<CacheKey, Slice, WindowWeighter, rustc_hash::FxBuildHasher>,

    /// Capacity in bytes
    capacity: u64,
}

impl WindowCache {
    /// Creates a new window cache with roughly `n` bytes of capacity.
    #[must_use]
    pub fn with_capacity_bytes(bytes: u64) -> Self {
        use quick_cache::sync::DefaultLifecycle;

        #[allow(clippy::default_trait_access)]
        let quick_cache = QuickCache::with(
            100_000,
            bytes,
            WindowWeighter,
            Default::default(),
            DefaultLifecycle::default(),
        );

        Self {
            data: quick_cache,
            capacity: bytes,
        }
    }

    /// Returns the amount of cached bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.weight()
    }

    /// Returns the cache capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the number of cached windows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if there are no cached windows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn get(&self, descriptor: &TableDescriptor, home: usize) -> Option<Slice> {
        self.data.get(&cache_key(descriptor, home))
    }

    pub(crate) fn insert(&self, descriptor: &TableDescriptor, home: usize, window: Slice) {
        if self.capacity > 0 {
            self.data.insert(cache_key(descriptor, home), window);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn descriptor(value: &str) -> crate::Result<TableDescriptor> {
        let mut table = crate::Config::new(4, 4).exponent(4).build()?;
        table.insert(*b"kkkk", value)?;
        Ok(*crate::Image::from_table(&table)?.descriptor())
    }

    #[test]
    fn window_cache_weighs_bytes() -> crate::Result<()> {
        let descriptor = descriptor("AAAA")?;

        let cache = WindowCache::with_capacity_bytes(1_000);
        assert!(cache.is_empty());

        cache.insert(&descriptor, 3, Slice::from(&[0u8; 100]));
        cache.insert(&descriptor, 4, Slice::from(&[0u8; 50]));

        assert_eq!(2, cache.len());
        assert_eq!(150, cache.size());
        assert_eq!(Some(100), cache.get(&descriptor, 3).map(|w| w.len()));
        assert_eq!(None, cache.get(&descriptor, 5));

        Ok(())
    }

    #[test]
    fn window_cache_separates_images() -> crate::Result<()> {
        let a = descriptor("AAAA")?;
        let b = descriptor("BBBB")?;
        assert_ne!(a.checksum, b.checksum);

        let cache = WindowCache::with_capacity_bytes(1_000);
        cache.insert(&a, 0, Slice::from("a"));

        assert_eq!(Some(Slice::from("a")), cache.get(&a, 0));
        assert_eq!(None, cache.get(&b, 0));

        cache.insert(&b, 0, Slice::from("b"));
        assert_eq!(Some(Slice::from("a")), cache.get(&a, 0));
        assert_eq!(Some(Slice::from("b")), cache.get(&b, 0));

        Ok(())
    }

    #[test]
    fn window_cache_zero_capacity() -> crate::Result<()> {
        let descriptor = descriptor("AAAA")?;

        let cache = WindowCache::with_capacity_bytes(0);
        cache.insert(&descriptor, 0, Slice::from("a"));
        assert!(cache.is_empty());

        Ok(())
    }
}
