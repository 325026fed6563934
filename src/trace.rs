// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Loading keys from YCSB-style workload traces
//!
//! Every non-empty line has the form `<COMMAND> <key> [...]`, for example
//! `INSERT user6284781860667377211`. Only the key column is used.

use crate::{Error, Slice, UserKey};
use std::io::BufRead;

/// Extracts the key column of every non-empty line.
///
/// # Errors
///
/// Returns [`Error::InvalidTrace`] for a line without a key column, or
/// [`Error::Io`] if reading fails.
pub fn parse_trace<R: BufRead>(reader: R) -> crate::Result<Vec<Slice>> {
    let mut keys = vec![];

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let mut columns = line.split_whitespace();

        if columns.next().is_none() {
            continue;
        }

        let key = columns.next().ok_or(Error::InvalidTrace(idx + 1))?;
        keys.push(Slice::from(key));
    }

    log::debug!("Parsed {} keys from trace", keys.len());

    Ok(keys)
}

/// Zero-pads a key to the fixed key length.
///
/// # Errors
///
/// Returns [`Error::KeyLength`] if the key is longer than `key_length`.
pub fn pad_key(key: &[u8], key_length: usize) -> crate::Result<UserKey> {
    if key.len() > key_length {
        return Err(Error::KeyLength {
            expected: key_length,
            got: key.len(),
        });
    }

    Ok(key
        .iter()
        .copied()
        .chain(std::iter::repeat(0))
        .take(key_length)
        .collect())
}
