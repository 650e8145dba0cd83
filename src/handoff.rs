// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Lookup of boot handoff blobs by tag.
// Author: Lukas Bower

//! The previous boot stage hands over a list of tagged blobs. The driver only
//! needs one of them, the flattened device tree.

use crate::guid::Guid;

/// Universal payload tag of the device tree blob,
/// `6784b889-b13c-4c3b-ae4b-0f0a2e320ea3`.
pub const DEVICE_TREE_TAG: Guid = Guid::from_fields(
    0x6784_b889,
    0xb13c,
    0x4c3b,
    [0xae, 0x4b, 0x0f, 0x0a, 0x2e, 0x32, 0x0e, 0xa3],
);

/// Source of tagged handoff blobs.
pub trait HandoffLookup {
    /// First blob carrying `tag`, if any.
    fn find(&self, tag: &Guid) -> Option<&[u8]>;
}

/// Handoff list held in memory, in the order it was handed over.
#[derive(Debug, Clone, Default)]
pub struct HandoffTable {
    entries: Vec<(Guid, Vec<u8>)>,
}

impl HandoffTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: Guid, blob: impl Into<Vec<u8>>) -> &mut Self {
        self.entries.push((tag, blob.into()));
        self
    }

    /// Table holding only a device tree blob.
    #[must_use]
    pub fn with_device_tree(blob: impl Into<Vec<u8>>) -> Self {
        let mut table = Self::new();
        table.push(DEVICE_TREE_TAG, blob);
        table
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HandoffLookup for HandoffTable {
    fn find(&self, tag: &Guid) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(entry_tag, _)| entry_tag == tag)
            .map(|(_, blob)| blob.as_slice())
    }
}
