// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: 128-bit scope identifiers and their canonical text form.
// Author: Lukas Bower

//! Firmware GUIDs.
//!
//! The canonical text form is `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` (36
//! characters, hex digits of either case). The binary layout matches the
//! firmware one: the first three groups are little-endian integers, the last
//! eight bytes are stored in text order.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of the canonical text form.
pub const GUID_TEXT_LEN: usize = 36;

const HYPHENS: [usize; 4] = [8, 13, 18, 23];

/// Rejection reasons for the text form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GuidParseError {
    /// Not exactly 36 characters.
    #[error("guid text must be {GUID_TEXT_LEN} characters, got {0}")]
    Length(usize),
    /// A hyphen was missing or misplaced.
    #[error("guid text has no hyphen at offset {0}")]
    Hyphen(usize),
    /// A non-hex character where a digit was expected.
    #[error("guid text has a non-hex digit at offset {0}")]
    Digit(usize),
}

/// A 128-bit namespace identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Guid {
    data1: u32,
    data2: u16,
    data3: u16,
    data4: [u8; 8],
}

impl Guid {
    /// The all-zero identifier.
    pub const NIL: Guid = Guid::from_fields(0, 0, 0, [0; 8]);

    /// Builds a GUID from its four fields.
    #[must_use]
    pub const fn from_fields(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    /// Parses the canonical 36-character text form.
    pub fn parse_ascii(text: &[u8]) -> Result<Self, GuidParseError> {
        if text.len() != GUID_TEXT_LEN {
            return Err(GuidParseError::Length(text.len()));
        }
        for offset in HYPHENS {
            if text[offset] != b'-' {
                return Err(GuidParseError::Hyphen(offset));
            }
        }

        let mut raw = [0u8; 16];
        let groups: [(usize, usize, usize); 5] = [
            (0, 8, 0),
            (9, 13, 4),
            (14, 18, 6),
            (19, 23, 8),
            (24, 36, 10),
        ];
        for (start, end, dest) in groups {
            let digits = &text[start..end];
            if let Some(bad) = digits.iter().position(|byte| !byte.is_ascii_hexdigit()) {
                return Err(GuidParseError::Digit(start + bad));
            }
            let width = (end - start) / 2;
            hex::decode_to_slice(digits, &mut raw[dest..dest + width])
                .map_err(|_| GuidParseError::Digit(start))?;
        }

        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&raw[8..]);
        Ok(Self {
            data1: u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]),
            data2: u16::from_be_bytes([raw[4], raw[5]]),
            data3: u16::from_be_bytes([raw[6], raw[7]]),
            data4,
        })
    }

    /// Firmware in-memory layout.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..4].copy_from_slice(&self.data1.to_le_bytes());
        out[4..6].copy_from_slice(&self.data2.to_le_bytes());
        out[6..8].copy_from_slice(&self.data3.to_le_bytes());
        out[8..].copy_from_slice(&self.data4);
        out
    }

    /// Inverse of [`Guid::to_bytes`].
    #[must_use]
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        let mut data4 = [0u8; 8];
        data4.copy_from_slice(&bytes[8..]);
        Self {
            data1: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            data2: u16::from_le_bytes([bytes[4], bytes[5]]),
            data3: u16::from_le_bytes([bytes[6], bytes[7]]),
            data4,
        }
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = &self.data4;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1, self.data2, self.data3, d[0], d[1], d[2], d[3], d[4], d[5], d[6], d[7]
        )
    }
}

impl FromStr for Guid {
    type Err = GuidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_ascii(s.as_bytes())
    }
}

impl Serialize for Guid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Guid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
