// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::image::RecordLayout;
use crate::{Error, Slice, UserValue};

/// Answers a lookup from a fetched neighborhood window alone.
///
/// `window` must start at the record of the key's home bucket and contain
/// whole records. Only records claimed by the home's hop bitmap are looked at.
///
/// Returns `Ok(None)` if the key is not stored in this neighborhood. The
/// returned value shares the window's buffer.
///
/// # Errors
///
/// Returns [`Error::MalformedWindow`] or [`Error::InvalidTag`] if the window
/// does not decode into a consistent neighborhood: bits pointing outside the
/// window, claimed records that are vacant, oversized value lengths or
/// unknown flags. Malformed bytes are never returned as a value.
pub fn lookup_in_window(
    layout: &RecordLayout,
    window: &Slice,
    key: &[u8],
) -> crate::Result<Option<UserValue>> {
    if key.len() != layout.key_length() {
        return Err(Error::KeyLength {
            expected: layout.key_length(),
            got: key.len(),
        });
    }

    let record_size = layout.record_size();

    if window.is_empty() || window.len() % record_size != 0 {
        return Err(Error::MalformedWindow("window is not made of whole records"));
    }

    let records = window.len() / record_size;
    let home = layout.record_at(window, 0)?;

    if !home.is_home() {
        return Ok(None);
    }

    for offset in home.offsets() {
        if offset >= records {
            return Err(Error::MalformedWindow("hop bit points outside of window"));
        }

        let record = layout.record_at(window, offset)?;

        if !record.is_occupied() {
            return Err(Error::MalformedWindow("claimed record is vacant"));
        }

        if record.key() == key {
            let range = record.value_range();
            let start = offset * record_size;

            log::trace!("Found key at offset {offset} of window");

            return Ok(Some(window.slice(start + range.start..start + range.end)));
        }
    }

    Ok(None)
}
