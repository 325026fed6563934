// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::HopscotchTable;

/// Largest supported neighborhood, bounded by the width of the hop bitmap
pub const MAX_NEIGHBORHOOD: u8 = u32::BITS as u8;

/// Largest supported capacity exponent
///
/// Home indexes are derived from a 32-bit hash, so anything above
/// `2^31` buckets would leave buckets unreachable on 32-bit targets.
pub const MAX_EXPONENT: u8 = 31;

/// Table configuration builder
///
/// # Examples
///
/// ```
/// # use hopscotch_image::Config;
/// let mut table = Config::new(8, 16)
///     .exponent(10)
///     .neighborhood(32)
///     .build()?;
///
/// table.insert(*b"user0001", "hello")?;
/// assert_eq!(Some("hello".into()), table.lookup(b"user0001")?);
/// #
/// # Ok::<(), hopscotch_image::Error>(())
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// Fixed length of every key in bytes
    pub key_length: u32,

    /// Size of the value field in bytes
    ///
    /// Values may be shorter, their exact length is stored next to the value field.
    pub value_length: u32,

    /// Initial capacity exponent, the table starts with `2^exponent` buckets
    pub exponent: u8,

    /// Neighborhood size (`H`), an entry is stored at most `H - 1` slots after its home bucket
    pub neighborhood: u8,

    /// Records in the serialized image are padded to a multiple of this
    pub record_alignment: u32,

    /// Upper bound for the capacity exponent when growing the table
    pub max_exponent: u8,
}

impl Config {
    /// Initializes a new config
    #[must_use]
    pub fn new(key_length: u32, value_length: u32) -> Self {
        Self {
            key_length,
            value_length,
            exponent: 16,
            neighborhood: MAX_NEIGHBORHOOD,
            record_alignment: 1,
            max_exponent: MAX_EXPONENT,
        }
    }

    /// Sets the initial capacity exponent.
    ///
    /// Default = 16 (65536 buckets)
    #[must_use]
    pub fn exponent(mut self, exponent: u8) -> Self {
        self.exponent = exponent;
        self
    }

    /// Sets the neighborhood size.
    ///
    /// Larger neighborhoods allow higher load factors, at the cost of
    /// larger remote reads, because a client fetches the whole neighborhood
    /// of a home bucket in one go.
    ///
    /// Default = 32
    #[must_use]
    pub fn neighborhood(mut self, neighborhood: u8) -> Self {
        self.neighborhood = neighborhood;
        self
    }

    /// Sets the record alignment of the serialized image.
    ///
    /// Must be a power of two. Setting this to 64 makes every record
    /// start on its own cache line if the key and value fit.
    ///
    /// Default = 1 (no padding)
    #[must_use]
    pub fn record_alignment(mut self, alignment: u32) -> Self {
        self.record_alignment = alignment;
        self
    }

    /// Sets the upper bound for the capacity exponent when growing.
    ///
    /// Default = 31
    #[must_use]
    pub fn max_exponent(mut self, exponent: u8) -> Self {
        self.max_exponent = exponent;
        self
    }

    pub(crate) fn validate(&self) -> crate::Result<()> {
        use crate::Error::InvalidConfig;

        if self.key_length == 0 {
            return Err(InvalidConfig("key length may not be zero"));
        }
        if self.neighborhood == 0 || self.neighborhood > MAX_NEIGHBORHOOD {
            return Err(InvalidConfig("neighborhood must be in 1..=32"));
        }
        if self.exponent == 0 || self.exponent > MAX_EXPONENT {
            return Err(InvalidConfig("exponent must be in 1..=31"));
        }
        if self.max_exponent < self.exponent || self.max_exponent > MAX_EXPONENT {
            return Err(InvalidConfig("max exponent must be in exponent..=31"));
        }
        if !self.record_alignment.is_power_of_two() {
            return Err(InvalidConfig("record alignment must be a power of two"));
        }

        Ok(())
    }

    /// Creates an empty table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidConfig`] if the configuration is out of range.
    pub fn build(self) -> crate::Result<HopscotchTable> {
        self.validate()?;
        Ok(HopscotchTable::from_config(self))
    }
}
