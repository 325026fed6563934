// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::TableDescriptor;
use crate::checksum::ChecksummedWriter;
use crate::{FormatVersion, HopscotchTable};
use std::io::Write;

/// Writes one record per bucket, in index order, and returns the
/// descriptor of the written region
pub fn write_records<W: Write>(table: &HopscotchTable, writer: W) -> crate::Result<TableDescriptor> {
    let config = table.config();
    let layout = super::RecordLayout::new(
        config.key_length,
        config.value_length,
        config.record_alignment,
    );

    log::debug!(
        "Serializing {} buckets ({} entries) with record size {}",
        table.capacity(),
        table.len(),
        layout.record_size(),
    );

    let mut writer = ChecksummedWriter::new(writer);

    for bucket in table.buckets() {
        layout.encode_into(&mut writer, bucket)?;
    }

    writer.flush()?;

    #[expect(clippy::cast_possible_truncation, reason = "record size is bounded by u32 config fields")]
    let record_size = layout.record_size() as u32;

    Ok(TableDescriptor {
        version: FormatVersion::V1,
        exponent: table.exponent(),
        neighborhood: table.neighborhood(),
        key_length: config.key_length,
        value_length: config.value_length,
        record_alignment: config.record_alignment,
        record_size,
        entry_count: table.len() as u64,
        checksum: writer.checksum(),
    })
}
