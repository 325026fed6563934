// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{remote::TransportError, Checksum};

/// Represents errors that can occur while building, serializing or querying a table
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// The key is already present in the table
    DuplicateKey,

    /// No relocation chain could bring a free slot into the key's neighborhood
    ///
    /// Recoverable by growing the table and retrying.
    CapacityExhausted,

    /// Rebuilding the table at a larger capacity failed, the old table is kept
    ResizeFailed,

    /// A key does not have the configured fixed length (expected, got)
    KeyLength {
        /// Configured key length
        expected: usize,

        /// Length of the offending key
        got: usize,
    },

    /// A value is longer than the configured value field (max, got)
    ValueTooLarge {
        /// Configured value length
        max: usize,

        /// Length of the offending value
        got: usize,
    },

    /// A displacement would not fit into the neighborhood bitmap
    NeighborhoodOverflow(usize),

    /// Invalid table configuration
    InvalidConfig(&'static str),

    /// Invalid or unparseable data format version
    InvalidVersion(u8),

    /// Invalid enum tag
    InvalidTag((&'static str, u8)),

    /// Invalid magic bytes or header
    InvalidHeader(&'static str),

    /// A fetched neighborhood window does not decode into a consistent neighborhood
    MalformedWindow(&'static str),

    /// Checksum mismatch
    ChecksumMismatch {
        /// Checksum of the data that was read
        got: Checksum,

        /// Checksum that was stored
        expected: Checksum,
    },

    /// A trace line has no key column (1-based line number)
    InvalidTrace(usize),

    /// A remote read did not complete successfully
    Transport(TransportError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HopscotchError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<TransportError> for Error {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

/// Table result
pub type Result<T> = std::result::Result<T, Error>;
