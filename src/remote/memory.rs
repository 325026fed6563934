// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{
    check_bounds, Completion, Handshake, RegionDescriptor, Transport, TransportError, Usage,
};
use crate::{Image, Slice};
use rustc_hash::FxHashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    PoisonError, RwLock,
};

/// A registered buffer
#[derive(Clone, Debug)]
pub struct LocalRegion {
    descriptor: RegionDescriptor,
    bytes: Slice,
}

impl LocalRegion {
    /// Returns the descriptor to hand to peers.
    #[must_use]
    pub fn descriptor(&self) -> RegionDescriptor {
        self.descriptor
    }

    /// Returns the registered bytes.
    #[must_use]
    pub fn bytes(&self) -> &Slice {
        &self.bytes
    }
}

/// In-process transport over a map of registered regions
///
/// Reads are served by copying out of the registered buffers, so any number
/// of client threads can share one transport.
#[derive(Default)]
pub struct MemoryTransport {
    regions: RwLock<FxHashMap<u64, LocalRegion>>,
    next_id: AtomicU64,
}

impl MemoryTransport {
    /// Creates a transport without any registered region.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a buffer.
    pub fn register(&self, bytes: Slice, usage: Usage) -> LocalRegion {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let region = LocalRegion {
            descriptor: RegionDescriptor {
                id,
                len: bytes.len() as u64,
                usage,
            },
            bytes,
        };

        log::trace!("Registered region {id} ({} bytes, {usage:?})", region.bytes.len());

        self.regions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, region.clone());

        region
    }

    /// Removes a region, returning `true` if it was registered.
    pub fn deregister(&self, region: &RegionDescriptor) -> bool {
        self.regions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&region.id)
            .is_some()
    }

    /// Registers an image for remote reads and returns the handshake for clients.
    pub fn publish(&self, image: &Image) -> Handshake {
        let region = self.register(image.bytes().clone(), Usage::ReadSource);

        Handshake {
            region: region.descriptor(),
            table: *image.descriptor(),
        }
    }
}

impl Transport for MemoryTransport {
    fn read(
        &self,
        remote: &RegionDescriptor,
        offset: u64,
        dst: &mut [u8],
    ) -> Result<Completion, TransportError> {
        // Every map update is a single insert or remove, so a poisoned map is still consistent
        let regions = self.regions.read().unwrap_or_else(PoisonError::into_inner);

        let region = regions
            .get(&remote.id)
            .ok_or(TransportError::UnknownRegion(remote.id))?;

        if region.descriptor.usage != Usage::ReadSource {
            return Err(TransportError::NotReadable(remote.id));
        }

        check_bounds(&region.descriptor, offset, dst.len())?;

        #[expect(clippy::cast_possible_truncation, reason = "offset is within an in-memory buffer")]
        let start = offset as usize;

        let src = region
            .bytes
            .get(start..start + dst.len())
            .ok_or(TransportError::OutOfBounds {
                offset,
                len: dst.len(),
                region_len: region.descriptor.len,
            })?;

        dst.copy_from_slice(src);

        Ok(Completion::success(dst.len()))
    }
}
