// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Validate the FDT header and expose the structure/strings blocks.
// Author: Lukas Bower

use core::ops::Range;

use crate::cursor::StructureCursor;
use crate::node::Nodes;
use crate::{read_be_u32, FdtError};

/// `0xd00dfeed`, big-endian at offset 0.
pub const FDT_MAGIC: u32 = 0xD00D_FEED;
/// Length of the v17 header in bytes.
pub const FDT_HEADER_LEN: usize = 10 * core::mem::size_of::<u32>();

const FDT_MIN_VERSION: u32 = 17;
const FDT_LAST_SUPPORTED_VERSION: u32 = 17;

/// Parsed fields of a validated header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdtHeader {
    totalsize: u32,
    off_dt_struct: u32,
    off_dt_strings: u32,
    off_mem_rsvmap: u32,
    version: u32,
    last_comp_version: u32,
    boot_cpuid_phys: u32,
    size_dt_strings: u32,
    size_dt_struct: u32,
}

impl FdtHeader {
    /// Total length of the blob in bytes.
    #[must_use]
    pub fn totalsize(&self) -> usize {
        self.totalsize as usize
    }

    /// Byte offset of the structure block.
    #[must_use]
    pub fn structure_offset(&self) -> usize {
        self.off_dt_struct as usize
    }

    /// Byte offset of the strings block.
    #[must_use]
    pub fn strings_offset(&self) -> usize {
        self.off_dt_strings as usize
    }

    /// Byte offset of the memory reservation map.
    #[must_use]
    pub fn reservation_map_offset(&self) -> usize {
        self.off_mem_rsvmap as usize
    }

    /// Layout version of the blob.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Oldest layout version the blob is backwards compatible with.
    #[must_use]
    pub fn last_compatible_version(&self) -> u32 {
        self.last_comp_version
    }

    /// Physical id of the boot CPU.
    #[must_use]
    pub fn boot_cpuid(&self) -> u32 {
        self.boot_cpuid_phys
    }
}

/// A device tree blob whose header has been validated.
///
/// Cheap to copy; it only borrows the blob.
#[derive(Debug, Clone, Copy)]
pub struct Fdt<'a> {
    header: FdtHeader,
    blob: &'a [u8],
    structure: &'a [u8],
    strings: &'a [u8],
}

impl<'a> Fdt<'a> {
    /// Validates the header of `blob`.
    ///
    /// Trailing bytes beyond `totalsize` are ignored, so a buffer larger than
    /// the tree (for example a whole handoff region) is accepted.
    ///
    /// Requires `version >= 17` and `last_comp_version <= 17`.
    pub fn new(blob: &'a [u8]) -> Result<Self, FdtError> {
        if blob.len() < FDT_HEADER_LEN {
            return Err(FdtError::TooShort);
        }

        let magic = read_be_u32(blob, 0)?;
        if magic != FDT_MAGIC {
            return Err(FdtError::BadMagic(magic));
        }

        let header = FdtHeader {
            totalsize: read_be_u32(blob, 4)?,
            off_dt_struct: read_be_u32(blob, 8)?,
            off_dt_strings: read_be_u32(blob, 12)?,
            off_mem_rsvmap: read_be_u32(blob, 16)?,
            version: read_be_u32(blob, 20)?,
            last_comp_version: read_be_u32(blob, 24)?,
            boot_cpuid_phys: read_be_u32(blob, 28)?,
            size_dt_strings: read_be_u32(blob, 32)?,
            size_dt_struct: read_be_u32(blob, 36)?,
        };

        if header.version < FDT_MIN_VERSION
            || header.last_comp_version > FDT_LAST_SUPPORTED_VERSION
        {
            return Err(FdtError::UnsupportedVersion {
                version: header.version,
                last_compatible: header.last_comp_version,
            });
        }

        let blob_len = header.totalsize();
        if blob_len < FDT_HEADER_LEN || blob_len > blob.len() {
            return Err(FdtError::Bounds);
        }

        let structure_range = bounded_range(blob_len, header.off_dt_struct, header.size_dt_struct)?;
        let strings_range = bounded_range(blob_len, header.off_dt_strings, header.size_dt_strings)?;
        if structure_range.start < FDT_HEADER_LEN {
            return Err(FdtError::Bounds);
        }

        let blob = &blob[..blob_len];
        Ok(Self {
            header,
            blob,
            structure: &blob[structure_range],
            strings: &blob[strings_range],
        })
    }

    /// Returns the validated header.
    #[must_use]
    pub fn header(&self) -> FdtHeader {
        self.header
    }

    /// The blob truncated to `totalsize`.
    #[must_use]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.blob
    }

    /// Returns the structure block slice.
    #[must_use]
    pub fn structure_block(&self) -> &'a [u8] {
        self.structure
    }

    /// Returns the strings block slice.
    #[must_use]
    pub fn strings_block(&self) -> &'a [u8] {
        self.strings
    }

    /// Token-level cursor over the structure block.
    #[must_use]
    pub fn structure_cursor(&self) -> StructureCursor<'a> {
        StructureCursor::new(self.structure, self.strings)
    }

    /// Depth-first iterator over every node, starting at the root.
    ///
    /// Each call starts a fresh walk.
    #[must_use]
    pub fn nodes(&self) -> Nodes<'a> {
        Nodes::new(self.structure_cursor())
    }
}

fn bounded_range(len: usize, offset: u32, size: u32) -> Result<Range<usize>, FdtError> {
    let start = usize::try_from(offset).map_err(|_| FdtError::Bounds)?;
    let span = usize::try_from(size).map_err(|_| FdtError::Bounds)?;
    let end = start.checked_add(span).ok_or(FdtError::Bounds)?;
    if end > len {
        return Err(FdtError::Bounds);
    }
    Ok(start..end)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::vec;
    use std::vec::Vec;

    fn write_be(word: u32, target: &mut [u8], offset: usize) {
        target[offset..offset + 4].copy_from_slice(&word.to_be_bytes());
    }

    fn header_fixture() -> Vec<u8> {
        let totalsize = 64u32;
        let mut blob = vec![0u8; totalsize as usize];
        write_be(FDT_MAGIC, &mut blob, 0);
        write_be(totalsize, &mut blob, 4);
        write_be(40, &mut blob, 8); // off_dt_struct
        write_be(56, &mut blob, 12); // off_dt_strings
        write_be(40, &mut blob, 16); // off_mem_rsvmap
        write_be(17, &mut blob, 20);
        write_be(16, &mut blob, 24);
        write_be(8, &mut blob, 32); // size_dt_strings
        write_be(16, &mut blob, 36); // size_dt_struct
        blob
    }

    #[test]
    fn parses_valid_header() {
        let blob = header_fixture();
        let fdt = Fdt::new(&blob).expect("valid header");
        let header = fdt.header();

        assert_eq!(header.totalsize(), 64);
        assert_eq!(header.structure_offset(), 40);
        assert_eq!(header.strings_offset(), 56);
        assert_eq!(header.version(), 17);
        assert_eq!(fdt.structure_block(), &blob[40..56]);
        assert_eq!(fdt.strings_block(), &blob[56..64]);
    }

    #[test]
    fn ignores_trailing_bytes() {
        let mut blob = header_fixture();
        blob.extend_from_slice(&[0xAA; 32]);
        let fdt = Fdt::new(&blob).expect("valid header");
        assert_eq!(fdt.as_bytes().len(), 64);
    }

    #[test]
    fn rejects_short_blob() {
        assert_eq!(Fdt::new(&[0u8; 8]).unwrap_err(), FdtError::TooShort);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut blob = header_fixture();
        write_be(0xFEED_D00D, &mut blob, 0);
        assert_eq!(Fdt::new(&blob).unwrap_err(), FdtError::BadMagic(0xFEED_D00D));
    }

    #[test]
    fn rejects_old_layout() {
        let mut blob = header_fixture();
        write_be(16, &mut blob, 20);
        assert!(matches!(
            Fdt::new(&blob),
            Err(FdtError::UnsupportedVersion { version: 16, .. })
        ));
    }

    #[test]
    fn rejects_newer_incompatible_layout() {
        let mut blob = header_fixture();
        write_be(18, &mut blob, 20);
        assert!(Fdt::new(&blob).is_ok());
        write_be(18, &mut blob, 24);
        assert_eq!(
            Fdt::new(&blob).unwrap_err(),
            FdtError::UnsupportedVersion {
                version: 18,
                last_compatible: 18,
            }
        );
    }

    #[test]
    fn rejects_totalsize_past_buffer() {
        let mut blob = header_fixture();
        write_be(128, &mut blob, 4);
        assert_eq!(Fdt::new(&blob).unwrap_err(), FdtError::Bounds);
    }

    #[test]
    fn rejects_out_of_bounds_sections() {
        let mut blob = header_fixture();
        write_be(32, &mut blob, 32); // strings overflow totalsize
        assert_eq!(Fdt::new(&blob).unwrap_err(), FdtError::Bounds);
    }
}
