// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Provide a validated, allocation-free view over flattened device tree blobs.
// Author: Lukas Bower
#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![no_std]

//! Flattened device tree (FDT/DTB) walker.
//!
//! [`Fdt::new`] validates the blob header before anything else touches the
//! buffer. Once validated, [`Fdt::nodes`] yields every node of the tree in
//! depth-first order together with its depth, and [`Node::property`] gives
//! access to the raw property payloads of a single node. Nothing in the walk
//! path allocates; all returned values borrow from the original blob.
//!
//! Only the v17 layout is read. Blobs that declare an older `version` are
//! rejected with [`FdtError::UnsupportedVersion`] even when their
//! `last_comp_version` would allow it: pre-v17 headers lack
//! `size_dt_struct`, and every bound check here relies on it.

#[cfg(feature = "builder")]
extern crate alloc;

#[cfg(test)]
extern crate std;

#[cfg(feature = "builder")]
pub mod builder;
mod cursor;
mod header;
mod node;

pub use cursor::{StructureCursor, Token};
pub use header::{Fdt, FdtHeader, FDT_HEADER_LEN, FDT_MAGIC};
pub use node::{Node, Nodes, Properties, Property};

/// Upper bound on a single property payload.
pub const FDT_PROP_MAX_LEN: usize = 4 << 20;

/// Errors raised while validating or walking a device tree blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FdtError {
    /// The blob was shorter than the fixed header.
    #[error("device tree shorter than header")]
    TooShort,
    /// The blob did not start with `0xd00dfeed`.
    #[error("device tree magic mismatch (found 0x{0:08x})")]
    BadMagic(u32),
    /// A declared offset or size points outside the blob.
    #[error("device tree section exceeds bounds")]
    Bounds,
    /// The blob advertises a layout version this walker cannot read.
    #[error("unsupported device tree version {version} (last compatible {last_compatible})")]
    UnsupportedVersion {
        /// `version` header field.
        version: u32,
        /// `last_comp_version` header field.
        last_compatible: u32,
    },
    /// The structure block ended in the middle of a token.
    #[error("device tree structure truncated")]
    Truncated,
    /// A node name or property name had no terminating NUL.
    #[error("device tree string missing terminator")]
    UnterminatedString,
    /// A node name or property name was not valid UTF-8.
    #[error("device tree string is not valid UTF-8")]
    BadString,
    /// A property declared a payload above [`FDT_PROP_MAX_LEN`].
    #[error("device tree property too large ({0} bytes)")]
    PropertyTooLarge(usize),
    /// An unknown structure token was found.
    #[error("device tree token 0x{0:08x} invalid")]
    InvalidToken(u32),
    /// Node nesting did not balance before `FDT_END`.
    #[error("device tree structure ended prematurely")]
    UnexpectedEnd,
}

pub(crate) fn read_be_u32(blob: &[u8], offset: usize) -> Result<u32, FdtError> {
    let end = offset
        .checked_add(core::mem::size_of::<u32>())
        .ok_or(FdtError::Bounds)?;
    let bytes = blob.get(offset..end).ok_or(FdtError::TooShort)?;
    let mut word = [0u8; 4];
    word.copy_from_slice(bytes);
    Ok(u32::from_be_bytes(word))
}

pub(crate) fn align_up(value: usize, align: usize) -> Result<usize, FdtError> {
    debug_assert!(align.is_power_of_two());
    let mask = align - 1;
    value
        .checked_add(mask)
        .map(|aligned| aligned & !mask)
        .ok_or(FdtError::Bounds)
}
