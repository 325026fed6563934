// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Flat, remote-readable images of a [`HopscotchTable`]
//!
//! An image is the concatenation of one fixed-size record per bucket, in
//! bucket order, so the record of bucket `i` starts at `i * record_size`.
//! Images are written once and never change, which is what allows clients
//! to read them with plain byte-range fetches.
//!
//! Persisted image files additionally carry an encoded [`TableDescriptor`]
//! as their trailer.

mod descriptor;
mod file;
mod layout;
mod writer;

pub use descriptor::TableDescriptor;
pub use file::ImageFile;
pub use layout::{RecordLayout, RecordView, FLAG_HOME, FLAG_OCCUPIED};

use crate::coding::Encode;
use crate::{HopscotchTable, Slice};
use std::path::Path;

/// Immutable serialized table
///
/// Cloning is cheap, the record bytes are shared.
#[derive(Clone, Debug)]
pub struct Image {
    descriptor: TableDescriptor,
    bytes: Slice,
}

impl Image {
    /// Serializes a table into a new image.
    ///
    /// The table is not needed anymore afterwards.
    ///
    /// # Errors
    ///
    /// Will return `Err` if a bucket cannot be encoded.
    pub fn from_table(table: &HopscotchTable) -> crate::Result<Self> {
        let record_size = RecordLayout::new(
            table.config().key_length,
            table.config().value_length,
            table.config().record_alignment,
        )
        .record_size();

        let mut bytes = Vec::with_capacity(table.capacity() * record_size);
        let descriptor = writer::write_records(table, &mut bytes)?;

        Ok(Self {
            descriptor,
            bytes: bytes.into(),
        })
    }

    /// Assembles an image from a descriptor and its record region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHeader`](crate::Error::InvalidHeader) if the
    /// region does not have the size the descriptor announces.
    pub fn from_parts(descriptor: TableDescriptor, bytes: Slice) -> crate::Result<Self> {
        if descriptor.image_len() != bytes.len() as u64 {
            return Err(crate::Error::InvalidHeader("Image"));
        }
        Ok(Self { descriptor, bytes })
    }

    /// Returns the image metadata.
    #[must_use]
    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    /// Returns the record region.
    #[must_use]
    pub fn bytes(&self) -> &Slice {
        &self.bytes
    }

    /// Size of the record region in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the record region is empty (never for a valid image).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decodes the record of a bucket.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the index is out of range or the record is malformed.
    pub fn record(&self, index: usize) -> crate::Result<RecordView<'_>> {
        self.descriptor.layout().record_at(&self.bytes, index)
    }

    /// Returns the neighborhood window of a home bucket, as a client would fetch it.
    #[must_use]
    pub fn window(&self, home: usize) -> Option<Slice> {
        let range = self.descriptor.window(home);
        let start = usize::try_from(range.start).ok()?;
        let end = usize::try_from(range.end).ok()?;

        if start >= end || end > self.bytes.len() {
            return None;
        }

        Some(self.bytes.slice(start..end))
    }

    /// Checks the record region against the checksum in the descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChecksumMismatch`](crate::Error::ChecksumMismatch) on corruption.
    pub fn verify(&self) -> crate::Result<()> {
        crate::Checksum::of(&self.bytes).check(self.descriptor.checksum)
    }

    /// Atomically writes the image to a file, with the descriptor as trailer.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();

        log::debug!(
            "Persisting image ({} bytes) to {}",
            self.bytes.len(),
            path.display(),
        );

        crate::file::rewrite_atomic(path, |writer| {
            writer.write_all(&self.bytes)?;
            writer.write_all(&self.descriptor.encode_into_vec())?;
            Ok(())
        })
    }
}
