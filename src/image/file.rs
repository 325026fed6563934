// Copyright (c) 2025-present, hopscotch-image
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Image, TableDescriptor};
use crate::coding::Decode;
use crate::remote::{
    check_bounds, Completion, Handshake, RegionDescriptor, Transport, TransportError, Usage,
};
use crate::{Checksum, Slice};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Region ID under which an image file serves its records
const FILE_REGION_ID: u64 = 0;

fn read_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        return file.read_at(buf, offset);
    }

    #[cfg(windows)]
    {
        use std::os::windows::fs::FileExt;
        return file.seek_read(buf, offset);
    }

    #[cfg(not(any(unix, windows)))]
    {
        compile_error!("unsupported OS");
        unimplemented!();
    }
}

fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<usize> {
    let mut total = 0;

    while !buf.is_empty() {
        let n = read_at(file, buf, offset)?;
        if n == 0 {
            break;
        }

        buf = std::mem::take(&mut buf).get_mut(n..).unwrap_or_default();
        offset += n as u64;
        total += n;
    }

    Ok(total)
}

/// A persisted image, served with positional reads
///
/// The file holds the record region followed by an encoded
/// [`TableDescriptor`]. Reads never touch the trailer.
pub struct ImageFile {
    path: PathBuf,
    file: File,
    descriptor: TableDescriptor,
}

impl ImageFile {
    /// Opens an image file written by [`Image::persist`].
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs, or the trailer is missing,
    /// corrupted or does not match the file size.
    pub fn open<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let trailer_len = TableDescriptor::serialized_len() as u64;

        let Some(trailer_offset) = file_len.checked_sub(trailer_len) else {
            return Err(crate::Error::InvalidHeader("ImageFile"));
        };

        let mut trailer = [0; TableDescriptor::serialized_len()];
        if read_exact_at(&file, &mut trailer, trailer_offset)? != trailer.len() {
            return Err(crate::Error::InvalidHeader("ImageFile"));
        }

        let descriptor = TableDescriptor::decode_from(&mut &trailer[..])?;

        if descriptor.image_len() != trailer_offset {
            return Err(crate::Error::InvalidHeader("ImageFile"));
        }

        log::debug!(
            "Opened image file {} with 2^{} buckets ({} entries)",
            path.display(),
            descriptor.exponent,
            descriptor.entry_count,
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            descriptor,
        })
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the image metadata.
    #[must_use]
    pub fn descriptor(&self) -> &TableDescriptor {
        &self.descriptor
    }

    /// Returns the region under which the records are served.
    #[must_use]
    pub fn region(&self) -> RegionDescriptor {
        RegionDescriptor {
            id: FILE_REGION_ID,
            len: self.descriptor.image_len(),
            usage: Usage::ReadSource,
        }
    }

    /// Returns the handshake a client needs to read this file.
    #[must_use]
    pub fn handshake(&self) -> Handshake {
        Handshake {
            region: self.region(),
            table: self.descriptor,
        }
    }

    /// Reads the whole record region into memory and checks it.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs or the checksum does not match.
    pub fn load(&self) -> crate::Result<Image> {
        let len = usize::try_from(self.descriptor.image_len())
            .map_err(|_| crate::Error::InvalidHeader("ImageFile"))?;

        let mut bytes = vec![0; len];
        if read_exact_at(&self.file, &mut bytes, 0)? != len {
            return Err(crate::Error::InvalidHeader("ImageFile"));
        }

        let image = Image::from_parts(self.descriptor, Slice::from(bytes))?;
        image.verify()?;

        Ok(image)
    }

    /// Checks the record region against the stored checksum without
    /// loading it into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChecksumMismatch`](crate::Error::ChecksumMismatch) on corruption.
    pub fn verify(&self) -> crate::Result<()> {
        use std::io::{Read, Seek};

        let mut reader = BufReader::new(&self.file);
        reader.rewind()?;

        let mut reader =
            crate::checksum::ChecksummedReader::new(reader.take(self.descriptor.image_len()));

        let copied = std::io::copy(&mut reader, &mut std::io::sink())?;
        if copied != self.descriptor.image_len() {
            return Err(crate::Error::InvalidHeader("ImageFile"));
        }

        reader.checksum().check(self.descriptor.checksum)
    }

    /// Checksum stored in the trailer.
    #[must_use]
    pub fn checksum(&self) -> Checksum {
        self.descriptor.checksum
    }
}

impl Transport for ImageFile {
    fn read(
        &self,
        remote: &RegionDescriptor,
        offset: u64,
        dst: &mut [u8],
    ) -> Result<Completion, TransportError> {
        if remote.id != FILE_REGION_ID {
            return Err(TransportError::UnknownRegion(remote.id));
        }

        check_bounds(&self.region(), offset, dst.len())?;

        let byte_count = read_exact_at(&self.file, dst, offset)?;

        Ok(Completion::success(byte_count))
    }
}
