// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::RecordLayout;
use crate::checksum::{ChecksummedReader, ChecksummedWriter};
use crate::coding::{Decode, Encode};
use crate::config::{MAX_EXPONENT, MAX_NEIGHBORHOOD};
use crate::file::MAGIC_BYTES;
use crate::hash::home_index;
use crate::{Checksum, FormatVersion};
use byteorder::{ReadBytesExt, WriteBytesExt, LE};
use std::io::{Read, Write};
use std::ops::Range;

/// Metadata a client needs to interpret a table image
///
/// Handed to clients out-of-band (see [`Handshake`](crate::remote::Handshake)),
/// and stored as the trailer of image files.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TableDescriptor {
    /// Format version of the record layout
    pub version: FormatVersion,

    /// The table holds `2^exponent` buckets
    pub exponent: u8,

    /// Neighborhood size (H)
    pub neighborhood: u8,

    /// Fixed key length
    pub key_length: u32,

    /// Size of the value field
    pub value_length: u32,

    /// Records are padded to a multiple of this
    pub record_alignment: u32,

    /// Size of one record
    pub record_size: u32,

    /// Number of stored entries
    pub entry_count: u64,

    /// Checksum over the whole record region
    pub checksum: Checksum,
}

impl TableDescriptor {
    /// Size of the encoded descriptor.
    #[must_use]
    pub const fn serialized_len() -> usize {
        MAGIC_BYTES.len()
            // Version
            + std::mem::size_of::<u8>()
            // Exponent
            + std::mem::size_of::<u8>()
            // Neighborhood
            + std::mem::size_of::<u8>()
            // Key length
            + std::mem::size_of::<u32>()
            // Value length
            + std::mem::size_of::<u32>()
            // Record alignment
            + std::mem::size_of::<u32>()
            // Record size
            + std::mem::size_of::<u32>()
            // Entry count
            + std::mem::size_of::<u64>()
            // Image checksum
            + std::mem::size_of::<u128>()
            // Header checksum
            + std::mem::size_of::<u32>()
    }

    /// Number of buckets (and records).
    #[must_use]
    pub fn capacity(&self) -> usize {
        1 << self.exponent
    }

    /// Record geometry described by this descriptor.
    #[must_use]
    pub fn layout(&self) -> RecordLayout {
        RecordLayout::new(self.key_length, self.value_length, self.record_alignment)
    }

    /// Size of the record region in bytes.
    #[must_use]
    pub fn image_len(&self) -> u64 {
        (self.capacity() as u64) * u64::from(self.record_size)
    }

    /// Home bucket of a key.
    #[must_use]
    pub fn home_index(&self, key: &[u8]) -> usize {
        home_index(key, self.key_length as usize, self.exponent)
    }

    /// Byte range of the neighborhood window of `home`.
    ///
    /// The window always covers the full neighborhood, cut off at the end of
    /// the bucket array.
    #[must_use]
    pub fn window(&self, home: usize) -> Range<u64> {
        let records = usize::from(self.neighborhood).min(self.capacity().saturating_sub(home));
        let record_size = u64::from(self.record_size);

        let start = (home as u64) * record_size;
        start..start + (records as u64) * record_size
    }

    fn validate(&self) -> crate::Result<()> {
        let valid = (1..=MAX_NEIGHBORHOOD).contains(&self.neighborhood)
            && self.exponent <= MAX_EXPONENT
            && self.key_length > 0
            && self.record_alignment.is_power_of_two()
            && self.layout().record_size() == self.record_size as usize;

        if valid {
            Ok(())
        } else {
            Err(crate::Error::InvalidHeader("TableDescriptor"))
        }
    }
}

impl Encode for TableDescriptor {
    fn encode_into<W: Write>(&self, mut writer: &mut W) -> crate::Result<()> {
        let checksum = {
            let mut writer = ChecksummedWriter::new(&mut writer);

            writer.write_all(&MAGIC_BYTES)?;
            writer.write_u8(self.version.into())?;
            writer.write_u8(self.exponent)?;
            writer.write_u8(self.neighborhood)?;
            writer.write_u32::<LE>(self.key_length)?;
            writer.write_u32::<LE>(self.value_length)?;
            writer.write_u32::<LE>(self.record_alignment)?;
            writer.write_u32::<LE>(self.record_size)?;
            writer.write_u64::<LE>(self.entry_count)?;
            writer.write_u128::<LE>(self.checksum.into_u128())?;

            writer.checksum()
        };

        #[expect(
            clippy::cast_possible_truncation,
            reason = "we purposefully only use the lower 4 bytes as checksum"
        )]
        writer.write_u32::<LE>(checksum.into_u128() as u32)?;

        Ok(())
    }
}

impl Decode for TableDescriptor {
    fn decode_from<R: Read>(reader: &mut R) -> crate::Result<Self> {
        let mut protected_reader = ChecksummedReader::new(reader);

        let mut magic = [0u8; MAGIC_BYTES.len()];
        protected_reader.read_exact(&mut magic)?;

        if magic != MAGIC_BYTES {
            return Err(crate::Error::InvalidHeader("TableDescriptor"));
        }

        let version = FormatVersion::try_from(protected_reader.read_u8()?)?;
        let exponent = protected_reader.read_u8()?;
        let neighborhood = protected_reader.read_u8()?;
        let key_length = protected_reader.read_u32::<LE>()?;
        let value_length = protected_reader.read_u32::<LE>()?;
        let record_alignment = protected_reader.read_u32::<LE>()?;
        let record_size = protected_reader.read_u32::<LE>()?;
        let entry_count = protected_reader.read_u64::<LE>()?;
        let checksum = protected_reader.read_u128::<LE>()?;

        #[expect(
            clippy::cast_possible_truncation,
            reason = "we purposefully only use the lower 4 bytes as checksum"
        )]
        let got_checksum = protected_reader.checksum().into_u128() as u32;
        let got_checksum = Checksum::from_raw(u128::from(got_checksum));

        let reader = protected_reader.into_inner();

        let header_checksum = Checksum::from_raw(reader.read_u32::<LE>()?.into());
        got_checksum.check(header_checksum)?;

        let descriptor = Self {
            version,
            exponent,
            neighborhood,
            key_length,
            value_length,
            record_alignment,
            record_size,
            entry_count,
            checksum: Checksum::from_raw(checksum),
        };
        descriptor.validate()?;

        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn descriptor() -> TableDescriptor {
        TableDescriptor {
            version: FormatVersion::V1,
            exponent: 4,
            neighborhood: 4,
            key_length: 24,
            value_length: 27,
            record_alignment: 64,
            record_size: 64,
            entry_count: 12,
            checksum: Checksum::from_raw(5),
        }
    }

    #[test]
    fn table_descriptor_serde_roundtrip() -> crate::Result<()> {
        let d = descriptor();
        let bytes = d.encode_into_vec();

        assert_eq!(bytes.len(), TableDescriptor::serialized_len());
        assert_eq!(d, TableDescriptor::decode_from(&mut &bytes[..])?);

        Ok(())
    }

    #[test]
    #[expect(clippy::indexing_slicing)]
    fn table_descriptor_detect_corruption() {
        let mut bytes = descriptor().encode_into_vec();

        // Flip a bit in the entry count
        bytes[24] ^= 1;

        assert!(matches!(
            TableDescriptor::decode_from(&mut &bytes[..]),
            Err(crate::Error::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn table_descriptor_bad_magic() {
        let mut bytes = descriptor().encode_into_vec();
        bytes[0] = b'X';

        assert!(matches!(
            TableDescriptor::decode_from(&mut &bytes[..]),
            Err(crate::Error::InvalidHeader("TableDescriptor"))
        ));
    }

    #[test]
    fn table_descriptor_inconsistent_record_size() {
        let d = TableDescriptor {
            record_size: 60,
            ..descriptor()
        };
        let bytes = d.encode_into_vec();

        assert!(matches!(
            TableDescriptor::decode_from(&mut &bytes[..]),
            Err(crate::Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn table_descriptor_window() {
        let d = descriptor();

        assert_eq!(16, d.capacity());
        assert_eq!(1_024, d.image_len());
        assert_eq!(0..256, d.window(0));
        assert_eq!(640..896, d.window(10));

        // Cut off at the end of the array
        assert_eq!(832..1_024, d.window(13));
        assert_eq!(960..1_024, d.window(15));
    }
}
