// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Owned variable records cached from the device tree.
// Author: Lukas Bower

use std::collections::TryReserveError;
use std::fmt;

use bitflags::bitflags;
use serde::Serialize;

use crate::guid::Guid;

bitflags! {
    /// Firmware variable attribute bits.
    ///
    /// Bits outside the named set are retained as-is; the cache is a
    /// transport and does not judge attribute legality.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VariableAttributes: u32 {
        const NON_VOLATILE = 0x0000_0001;
        const BOOTSERVICE_ACCESS = 0x0000_0002;
        const RUNTIME_ACCESS = 0x0000_0004;
        const HARDWARE_ERROR_RECORD = 0x0000_0008;
        const AUTHENTICATED_WRITE_ACCESS = 0x0000_0010;
        const TIME_BASED_AUTHENTICATED_WRITE_ACCESS = 0x0000_0020;
        const APPEND_WRITE = 0x0000_0040;
        const ENHANCED_AUTHENTICATED_ACCESS = 0x0000_0080;
        const _ = !0;
    }
}

impl VariableAttributes {
    /// Host-order value decoded from the big-endian tree cell.
    #[must_use]
    pub fn from_be_cell(cell: [u8; 4]) -> Self {
        Self::from_bits_retain(u32::from_be_bytes(cell))
    }
}

/// Variable name in the firmware's UCS-2 form, always NUL-terminated.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableName(Vec<u16>);

impl VariableName {
    /// Widens an ASCII name, stopping at the first NUL.
    ///
    /// The result is a fresh allocation; nothing borrows from `ascii`.
    pub fn from_ascii(ascii: &[u8]) -> Result<Self, TryReserveError> {
        let text = crate::terminate::until_nul(ascii);
        let mut units = Vec::new();
        units.try_reserve_exact(text.len() + 1)?;
        units.extend(text.iter().map(|&byte| u16::from(byte)));
        units.push(0);
        Ok(Self(units))
    }

    /// Code units without the terminator.
    #[must_use]
    pub fn as_ucs2(&self) -> &[u16] {
        &self.0[..self.0.len() - 1]
    }

    /// Code units including the terminator.
    #[must_use]
    pub fn as_ucs2_with_nul(&self) -> &[u16] {
        &self.0
    }

    /// Size in bytes of the terminated UCS-2 name.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.0.len() * core::mem::size_of::<u16>()
    }

    /// Number of characters, excluding the terminator.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len() - 1
    }

    /// True for the empty name.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for VariableName {
    fn from(value: &str) -> Self {
        let mut units: Vec<u16> = value.encode_utf16().take_while(|&unit| unit != 0).collect();
        units.push(0);
        Self(units)
    }
}

impl fmt::Display for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in char::decode_utf16(self.as_ucs2().iter().copied()) {
            write!(f, "{}", ch.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl fmt::Debug for VariableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_string())
    }
}

impl Serialize for VariableName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A fully owned record ready to be written into the runtime store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableRecord {
    pub name: VariableName,
    pub scope: Guid,
    pub attributes: VariableAttributes,
    pub data: Vec<u8>,
}

impl VariableRecord {
    /// Summary suitable for logs and JSON output.
    #[must_use]
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            name: self.name.to_string(),
            scope: self.scope,
            attributes: self.attributes.bits(),
            size: self.data.len(),
            data: hex::encode(&self.data),
        }
    }
}

impl fmt::Display for VariableRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) attr=0x{:x} size={}",
            self.name,
            self.scope,
            self.attributes.bits(),
            self.data.len()
        )
    }
}

/// Serializable view of a [`VariableRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub name: String,
    pub scope: Guid,
    pub attributes: u32,
    pub size: usize,
    /// Payload as lower-case hex.
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_widening_stops_at_terminator() {
        let name = VariableName::from_ascii(b"Boot0001\0junk").unwrap();
        assert_eq!(name.to_string(), "Boot0001");
        assert_eq!(name.as_ucs2_with_nul().last(), Some(&0));
        assert_eq!(name.size_in_bytes(), 18);
    }

    #[test]
    fn empty_name_is_just_terminator() {
        let name = VariableName::from_ascii(b"\0").unwrap();
        assert!(name.is_empty());
        assert_eq!(name.as_ucs2_with_nul(), &[0]);
    }

    #[test]
    fn high_bytes_widen_without_loss() {
        let name = VariableName::from_ascii(&[b'A', 0xE9]).unwrap();
        assert_eq!(name.as_ucs2(), &[0x41, 0xE9]);
        assert_eq!(name.to_string(), "Aé");
    }

    #[test]
    fn attributes_decode_big_endian_and_keep_unknown_bits() {
        let attrs = VariableAttributes::from_be_cell([0x80, 0x00, 0x00, 0x07]);
        assert!(attrs.contains(
            VariableAttributes::NON_VOLATILE
                | VariableAttributes::BOOTSERVICE_ACCESS
                | VariableAttributes::RUNTIME_ACCESS
        ));
        assert_eq!(attrs.bits(), 0x8000_0007);
    }

    #[test]
    fn summary_hex_encodes_payload() {
        let record = VariableRecord {
            name: "BootOrder".into(),
            scope: Guid::NIL,
            attributes: VariableAttributes::NON_VOLATILE,
            data: vec![0x01, 0x00, 0x02, 0x00],
        };
        let summary = record.summary();
        assert_eq!(summary.data, "01000200");
        assert_eq!(summary.size, 4);
        assert_eq!(
            record.to_string(),
            "BootOrder (00000000-0000-0000-0000-000000000000) attr=0x1 size=4"
        );
    }
}
