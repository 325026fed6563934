// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Client side of a published image
//!
//! A server registers an [`Image`](crate::Image) with a [`Transport`] and
//! hands the resulting [`Handshake`] to clients out-of-band. Clients then
//! answer lookups by fetching one neighborhood window per key and decoding
//! it locally, without any computation on the server.

mod cache;
mod client;
mod memory;
mod protocol;

pub use cache::WindowCache;
pub use client::{BatchStats, RemoteTable};
pub use memory::{LocalRegion, MemoryTransport};
pub use protocol::lookup_in_window;

use crate::coding::{Decode, Encode};
use crate::image::TableDescriptor;
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::{Read, Write};
use std::sync::Arc;

/// How a registered region may be accessed
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Usage {
    /// Peers read from this region (remote-visible)
    ReadSource,

    /// Local reads land in this region
    ReadDestination,

    /// Local writes are sourced from this region
    WriteSource,

    /// Peers write into this region (remote-visible)
    WriteDestination,
}

impl Usage {
    /// Returns `true` if peers can access the region.
    #[must_use]
    pub fn is_remote_visible(self) -> bool {
        matches!(self, Self::ReadSource | Self::WriteDestination)
    }
}

impl From<Usage> for u8 {
    fn from(value: Usage) -> Self {
        match value {
            Usage::ReadSource => 0,
            Usage::ReadDestination => 1,
            Usage::WriteSource => 2,
            Usage::WriteDestination => 3,
        }
    }
}

impl TryFrom<u8> for Usage {
    type Error = crate::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ReadSource),
            1 => Ok(Self::ReadDestination),
            2 => Ok(Self::WriteSource),
            3 => Ok(Self::WriteDestination),
            _ => Err(crate::Error::InvalidTag(("Usage", value))),
        }
    }
}

/// Opaque handle of a registered region, handed to peers out-of-band
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RegionDescriptor {
    /// Transport-assigned region ID
    pub id: u64,

    /// Length of the region in bytes
    pub len: u64,

    /// Allowed access
    pub usage: Usage,
}

impl Encode for RegionDescriptor {
    fn encode_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        writer.write_u8(self.usage.into())?;
        writer.write_u64::<LE>(self.id)?;
        writer.write_u64::<LE>(self.len)?;
        Ok(())
    }
}

impl Decode for RegionDescriptor {
    fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let usage = Usage::try_from(reader.read_u8()?)?;
        let id = reader.read_u64::<LE>()?;
        let len = reader.read_u64::<LE>()?;
        Ok(Self { id, len, usage })
    }
}

/// Final state of a remote operation
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompletionStatus {
    /// Operation finished
    Success,

    /// The remote side rejected the access
    RemoteAccessError,

    /// The local buffer did not match the operation
    LocalLengthError,

    /// The operation was flushed before it could finish
    Flushed,
}

/// Completion signalled for an issued read
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Completion {
    /// Final status
    pub status: CompletionStatus,

    /// Number of bytes transferred
    pub byte_count: usize,
}

impl Completion {
    /// A successful completion of `byte_count` bytes.
    #[must_use]
    pub fn success(byte_count: usize) -> Self {
        Self {
            status: CompletionStatus::Success,
            byte_count,
        }
    }
}

/// Errors of a remote read
#[derive(Debug)]
pub enum TransportError {
    /// No region with that ID is registered
    UnknownRegion(u64),

    /// The region may not be read by peers
    NotReadable(u64),

    /// The read exceeds the region (offset, len, region length)
    OutOfBounds {
        /// Requested offset
        offset: u64,

        /// Requested length
        len: usize,

        /// Length of the region
        region_len: u64,
    },

    /// The read completed with an error status
    Failed(CompletionStatus),

    /// The read completed with fewer bytes than requested
    ShortRead {
        /// Requested bytes
        expected: usize,

        /// Transferred bytes
        got: usize,
    },

    /// I/O error of the underlying medium
    Io(std::io::Error),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransportError: {self:?}")
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// One-sided read access to remote memory
///
/// Implementations issue a read of `dst.len()` bytes at `offset` of the remote
/// region and return once the read has completed. Callers must check the
/// returned [`Completion`] before trusting `dst`.
pub trait Transport {
    /// Reads remote bytes into `dst`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if the read could not be issued at all.
    fn read(
        &self,
        remote: &RegionDescriptor,
        offset: u64,
        dst: &mut [u8],
    ) -> Result<Completion, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn read(
        &self,
        remote: &RegionDescriptor,
        offset: u64,
        dst: &mut [u8],
    ) -> Result<Completion, TransportError> {
        (**self).read(remote, offset, dst)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn read(
        &self,
        remote: &RegionDescriptor,
        offset: u64,
        dst: &mut [u8],
    ) -> Result<Completion, TransportError> {
        (**self).read(remote, offset, dst)
    }
}

/// Issues a read and only returns `Ok` if it completed in full.
pub(crate) fn read_exact<T: Transport + ?Sized>(
    transport: &T,
    remote: &RegionDescriptor,
    offset: u64,
    dst: &mut [u8],
) -> Result<(), TransportError> {
    let completion = transport.read(remote, offset, dst)?;

    if completion.status != CompletionStatus::Success {
        return Err(TransportError::Failed(completion.status));
    }

    if completion.byte_count != dst.len() {
        return Err(TransportError::ShortRead {
            expected: dst.len(),
            got: completion.byte_count,
        });
    }

    Ok(())
}

/// Checks that a read stays within a region.
pub(crate) fn check_bounds(
    region: &RegionDescriptor,
    offset: u64,
    len: usize,
) -> Result<(), TransportError> {
    let in_bounds = offset
        .checked_add(len as u64)
        .is_some_and(|end| end <= region.len);

    if in_bounds {
        Ok(())
    } else {
        Err(TransportError::OutOfBounds {
            offset,
            len,
            region_len: region.len,
        })
    }
}

/// Connection private data a server hands to a client
///
/// Bundles the region to read from and the metadata needed to interpret it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Handshake {
    /// Registered image region
    pub region: RegionDescriptor,

    /// Table metadata
    pub table: TableDescriptor,
}

impl Encode for Handshake {
    fn encode_into<W: Write>(&self, writer: &mut W) -> crate::Result<()> {
        self.region.encode_into(writer)?;
        self.table.encode_into(writer)?;
        Ok(())
    }
}

impl Decode for Handshake {
    fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let region = RegionDescriptor::decode_from(reader)?;
        let table = TableDescriptor::decode_from(reader)?;
        Ok(Self { region, table })
    }
}
