// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Fixed-size bucket records
//!
//! ```text
//! offset      size  field
//! 0           1     flags (bit 0: slot occupied, bit 1: bucket is a home)
//! 1           4     hop info, u32 LE
//! 5           K     key, zero-filled if vacant
//! 5+K         4     value length, u32 LE
//! 9+K         V     value, zero-padded
//! 9+K+V       pad   zero padding up to the record alignment
//! ```

use crate::table::{Bucket, Offsets, Slot};
use crate::Error;
use byteorder::{ByteOrder, WriteBytesExt, LE};
use std::io::Write;

/// The slot holds an entry
pub const FLAG_OCCUPIED: u8 = 0b01;

/// At least one entry is homed at this bucket
pub const FLAG_HOME: u8 = 0b10;

const FLAGS_LEN: usize = std::mem::size_of::<u8>();
const HOP_INFO_LEN: usize = std::mem::size_of::<u32>();
const VALUE_LEN_LEN: usize = std::mem::size_of::<u32>();

/// Geometry of a bucket record
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RecordLayout {
    key_length: usize,
    value_length: usize,
    record_size: usize,
}

impl RecordLayout {
    /// Creates a layout, `alignment` must be a power of two.
    #[must_use]
    pub fn new(key_length: u32, value_length: u32, alignment: u32) -> Self {
        let key_length = key_length as usize;
        let value_length = value_length as usize;
        let unpadded = FLAGS_LEN + HOP_INFO_LEN + key_length + VALUE_LEN_LEN + value_length;

        let alignment = alignment.max(1) as usize;
        let record_size = unpadded.next_multiple_of(alignment);

        Self {
            key_length,
            value_length,
            record_size,
        }
    }

    /// Size of one record in bytes.
    #[must_use]
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Fixed key length.
    #[must_use]
    pub fn key_length(&self) -> usize {
        self.key_length
    }

    /// Size of the value field.
    #[must_use]
    pub fn value_length(&self) -> usize {
        self.value_length
    }

    /// Byte offset of the record of bucket `index`.
    #[must_use]
    pub fn record_offset(&self, index: usize) -> u64 {
        (index as u64) * (self.record_size as u64)
    }

    fn key_offset(&self) -> usize {
        FLAGS_LEN + HOP_INFO_LEN
    }

    fn value_len_offset(&self) -> usize {
        self.key_offset() + self.key_length
    }

    fn value_offset(&self) -> usize {
        self.value_len_offset() + VALUE_LEN_LEN
    }

    /// Writes the record of a bucket.
    ///
    /// The caller is responsible for keys and values having valid lengths,
    /// which the table enforces on insert.
    pub fn encode_into<W: Write>(&self, writer: &mut W, bucket: &Bucket) -> crate::Result<()> {
        let mut flags = 0;
        if !bucket.slot.is_vacant() {
            flags |= FLAG_OCCUPIED;
        }
        if bucket.is_home() {
            flags |= FLAG_HOME;
        }

        writer.write_u8(flags)?;
        writer.write_u32::<LE>(bucket.hop_info)?;

        let (key, value): (&[u8], &[u8]) = match &bucket.slot {
            Slot::Vacant => (&[], &[]),
            Slot::Occupied { key, value } => (key, value),
        };

        debug_assert!(key.is_empty() || key.len() == self.key_length);
        debug_assert!(value.len() <= self.value_length);

        writer.write_all(key)?;
        write_zeroes(writer, self.key_length.saturating_sub(key.len()))?;

        #[expect(clippy::cast_possible_truncation, reason = "value length is a u32 config")]
        writer.write_u32::<LE>(value.len() as u32)?;

        writer.write_all(value)?;
        write_zeroes(writer, self.value_length.saturating_sub(value.len()))?;

        write_zeroes(writer, self.record_size - self.value_offset() - self.value_length)?;

        Ok(())
    }

    /// Encodes a bucket into a new buffer.
    #[must_use]
    pub fn encode_into_vec(&self, bucket: &Bucket) -> Vec<u8> {
        let mut v = Vec::with_capacity(self.record_size);

        #[expect(clippy::expect_used, reason = "writing into a Vec cannot fail")]
        self.encode_into(&mut v, bucket).expect("cannot fail");

        v
    }

    /// Parses the record at `index` inside a window of consecutive records.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedWindow`] if the window is too short, or
    /// [`Error::InvalidTag`] if the flags byte has unknown bits set.
    pub fn record_at<'a>(&self, window: &'a [u8], index: usize) -> crate::Result<RecordView<'a>> {
        let start = index * self.record_size;

        let bytes = window
            .get(start..start + self.record_size)
            .ok_or(Error::MalformedWindow("record out of window"))?;

        RecordView::parse(self, bytes)
    }
}

fn write_zeroes<W: Write>(writer: &mut W, mut n: usize) -> std::io::Result<()> {
    const ZEROES: [u8; 64] = [0; 64];

    while n > 0 {
        let chunk = n.min(ZEROES.len());

        #[expect(clippy::indexing_slicing, reason = "chunk <= ZEROES.len()")]
        writer.write_all(&ZEROES[..chunk])?;

        n -= chunk;
    }

    Ok(())
}

/// Decoded view into a single serialized record
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RecordView<'a> {
    flags: u8,
    hop_info: u32,
    key: &'a [u8],
    value: &'a [u8],
    value_offset: usize,
}

impl<'a> RecordView<'a> {
    /// Parses exactly one record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedWindow`] if the record is truncated or its
    /// fields are inconsistent, [`Error::InvalidTag`] for unknown flag bits.
    pub fn parse(layout: &RecordLayout, bytes: &'a [u8]) -> crate::Result<Self> {
        if bytes.len() < layout.record_size {
            return Err(Error::MalformedWindow("truncated record"));
        }

        let flags = *bytes.first().ok_or(Error::MalformedWindow("truncated record"))?;
        if flags & !(FLAG_OCCUPIED | FLAG_HOME) != 0 {
            return Err(Error::InvalidTag(("RecordFlags", flags)));
        }

        let hop_info = bytes
            .get(FLAGS_LEN..FLAGS_LEN + HOP_INFO_LEN)
            .map(LE::read_u32)
            .ok_or(Error::MalformedWindow("truncated record"))?;

        if (flags & FLAG_HOME != 0) != (hop_info != 0) {
            return Err(Error::MalformedWindow("home flag disagrees with hop info"));
        }

        let key = bytes
            .get(layout.key_offset()..layout.value_len_offset())
            .ok_or(Error::MalformedWindow("truncated record"))?;

        let value_len = bytes
            .get(layout.value_len_offset()..layout.value_offset())
            .map(LE::read_u32)
            .ok_or(Error::MalformedWindow("truncated record"))? as usize;

        if value_len > layout.value_length {
            return Err(Error::MalformedWindow("value length exceeds value field"));
        }

        let value_offset = layout.value_offset();
        let value = bytes
            .get(value_offset..value_offset + value_len)
            .ok_or(Error::MalformedWindow("truncated record"))?;

        Ok(Self {
            flags,
            hop_info,
            key,
            value,
            value_offset,
        })
    }

    /// Returns `true` if the record holds an entry.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.flags & FLAG_OCCUPIED != 0
    }

    /// Returns `true` if at least one entry is homed at this record's bucket.
    #[must_use]
    pub fn is_home(&self) -> bool {
        self.flags & FLAG_HOME != 0
    }

    /// Raw hop bitmap.
    #[must_use]
    pub fn hop_info(&self) -> u32 {
        self.hop_info
    }

    /// Iterates the offsets marked in the hop bitmap.
    #[must_use]
    pub fn offsets(&self) -> Offsets {
        Offsets::new(self.hop_info)
    }

    /// Key field (zeroes if vacant).
    #[must_use]
    pub fn key(&self) -> &'a [u8] {
        self.key
    }

    /// Value bytes, without padding.
    #[must_use]
    pub fn value(&self) -> &'a [u8] {
        self.value
    }

    /// Position of the value inside the record.
    #[must_use]
    pub fn value_range(&self) -> std::ops::Range<usize> {
        self.value_offset..self.value_offset + self.value.len()
    }
}
