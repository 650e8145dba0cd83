// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Emit FDT v17 blobs for fixtures and host tooling.
// Author: Lukas Bower

//! Minimal device tree writer.
//!
//! ```
//! use fdt_walk::{builder::FdtBuilder, Fdt};
//!
//! let mut builder = FdtBuilder::new();
//! builder.begin_node("").property_str("model", "virt").end_node();
//! let blob = builder.finish();
//! let fdt = Fdt::new(&blob).unwrap();
//! assert_eq!(fdt.nodes().count(), 1);
//! ```

use alloc::vec::Vec;

use crate::{FDT_HEADER_LEN, FDT_MAGIC};

const FDT_BEGIN_NODE: u32 = 0x0000_0001;
const FDT_END_NODE: u32 = 0x0000_0002;
const FDT_PROP: u32 = 0x0000_0003;
const FDT_NOP: u32 = 0x0000_0004;
const FDT_END: u32 = 0x0000_0009;
const RSVMAP_LEN: usize = 16;

/// Incremental writer for the structure and strings blocks.
#[derive(Debug, Default, Clone)]
pub struct FdtBuilder {
    structure: Vec<u8>,
    strings: Vec<u8>,
    open: usize,
}

impl FdtBuilder {
    /// Starts an empty tree. The first node begun is the root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a child of the current node (or the root).
    pub fn begin_node(&mut self, name: &str) -> &mut Self {
        self.push_u32(FDT_BEGIN_NODE);
        self.structure.extend_from_slice(name.as_bytes());
        self.structure.push(0);
        self.pad();
        self.open += 1;
        self
    }

    /// Closes the innermost open node.
    pub fn end_node(&mut self) -> &mut Self {
        debug_assert!(self.open > 0, "end_node without begin_node");
        self.push_u32(FDT_END_NODE);
        self.open = self.open.saturating_sub(1);
        self
    }

    /// Adds a property with a raw payload, stored exactly as given.
    pub fn property(&mut self, name: &str, value: &[u8]) -> &mut Self {
        let nameoff = self.intern(name);
        self.push_u32(FDT_PROP);
        self.push_u32(value.len() as u32);
        self.push_u32(nameoff);
        self.structure.extend_from_slice(value);
        self.pad();
        self
    }

    /// Adds a NUL-terminated string property.
    pub fn property_str(&mut self, name: &str, value: &str) -> &mut Self {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        self.property(name, &bytes)
    }

    /// Adds a big-endian `u32` cell.
    pub fn property_u32(&mut self, name: &str, value: u32) -> &mut Self {
        self.property(name, &value.to_be_bytes())
    }

    /// Inserts an `FDT_NOP` token.
    pub fn nop(&mut self) -> &mut Self {
        self.push_u32(FDT_NOP);
        self
    }

    /// Closes any nodes still open and serialises the blob.
    #[must_use]
    pub fn finish(mut self) -> Vec<u8> {
        while self.open > 0 {
            self.end_node();
        }
        self.push_u32(FDT_END);

        let off_mem_rsvmap = FDT_HEADER_LEN;
        let off_dt_struct = off_mem_rsvmap + RSVMAP_LEN;
        let off_dt_strings = off_dt_struct + self.structure.len();
        let totalsize = off_dt_strings + self.strings.len();

        let mut blob = Vec::with_capacity(totalsize);
        for word in [
            FDT_MAGIC,
            totalsize as u32,
            off_dt_struct as u32,
            off_dt_strings as u32,
            off_mem_rsvmap as u32,
            17,
            16,
            0,
            self.strings.len() as u32,
            self.structure.len() as u32,
        ] {
            blob.extend_from_slice(&word.to_be_bytes());
        }
        blob.resize(blob.len() + RSVMAP_LEN, 0);
        blob.extend_from_slice(&self.structure);
        blob.extend_from_slice(&self.strings);
        blob
    }

    fn intern(&mut self, name: &str) -> u32 {
        let needle = name.as_bytes();
        let mut offset = 0;
        for entry in self.strings.split(|&byte| byte == 0) {
            if entry == needle && offset < self.strings.len() {
                return offset as u32;
            }
            offset += entry.len() + 1;
        }
        let offset = self.strings.len();
        self.strings.extend_from_slice(needle);
        self.strings.push(0);
        offset as u32
    }

    fn push_u32(&mut self, value: u32) {
        self.structure.extend_from_slice(&value.to_be_bytes());
    }

    fn pad(&mut self) {
        while self.structure.len() % 4 != 0 {
            self.structure.push(0);
        }
    }
}
