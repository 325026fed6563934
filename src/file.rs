// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::{
    io::{BufWriter, Write},
    path::Path,
};

pub const MAGIC_BYTES: [u8; 4] = [b'H', b'O', b'P', 1];

/// Atomically rewrites a file, streaming its content through `f`
pub fn rewrite_atomic<F>(path: &Path, f: F) -> crate::Result<()>
where
    F: FnOnce(&mut dyn Write) -> crate::Result<()>,
{
    let folder = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut temp_file = tempfile::NamedTempFile::new_in(folder)?;

    {
        let mut writer = BufWriter::new(temp_file.as_file_mut());
        f(&mut writer)?;
        writer.flush()?;
    }

    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    #[cfg(not(target_os = "windows"))]
    fsync_directory(folder)?;

    Ok(())
}

#[cfg(not(target_os = "windows"))]
pub fn fsync_directory(path: &Path) -> std::io::Result<()> {
    let file = std::fs::File::open(path)?;
    debug_assert!(file.metadata()?.is_dir());
    file.sync_all()
}
