// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Turn tagged device tree nodes into owned variable records.
// Author: Lukas Bower

//! Record parser.
//!
//! A record node looks like this (every value is a raw property, none is
//! guaranteed to be NUL-terminated):
//!
//! ```text
//! var@0 {
//!     magic = "u-root-efivar-v1";
//!     name = "BootOrder";
//!     guid = "8be4df61-93ca-11d2-aa0d-00e098032b8c";
//!     attributes = <0x00000007>;
//!     data = [01 00 02 00];
//! };
//! ```

use fdt_walk::Node;
use log::debug;

use crate::guid::{Guid, GuidParseError, GUID_TEXT_LEN};
use crate::record::{VariableAttributes, VariableName, VariableRecord};
use crate::terminate;

/// Tag carried by every record node.
pub const DEFAULT_RECORD_MAGIC: &str = "u-root-efivar-v1";

/// Property holding the record tag.
pub const MAGIC_PROPERTY: &str = "magic";
/// ASCII variable name, terminator optional.
pub const NAME_PROPERTY: &str = "name";
/// Scope GUID in its 36-character text form.
pub const GUID_PROPERTY: &str = "guid";
/// One big-endian `u32` cell of attribute bits.
pub const ATTRIBUTES_PROPERTY: &str = "attributes";
/// Raw payload, possibly empty.
pub const DATA_PROPERTY: &str = "data";

/// Error classes used when reporting a dropped node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    InvalidParameter,
    OutOfResources,
}

/// Why a tagged node could not become a record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("missing '{0}' property")]
    MissingProperty(&'static str),
    #[error("invalid guid {text:?}: {source}")]
    BadGuid {
        text: String,
        #[source]
        source: GuidParseError,
    },
    #[error("'attributes' must be a 4-byte cell, got {0} bytes")]
    BadAttributes(usize),
    #[error("out of resources allocating {0}")]
    OutOfResources(&'static str),
}

impl RecordError {
    #[must_use]
    pub fn status(&self) -> RecordStatus {
        match self {
            Self::OutOfResources(_) => RecordStatus::OutOfResources,
            _ => RecordStatus::InvalidParameter,
        }
    }
}

/// Result of looking at one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Found(VariableRecord),
    /// The node is not a record. Expected for almost every node.
    NotTagged,
    Malformed(RecordError),
}

/// Parser bound to a record tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordParser {
    tag: Vec<u8>,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new(DEFAULT_RECORD_MAGIC)
    }
}

impl RecordParser {
    /// Parser recognising nodes whose `magic` is `tag`.
    pub fn new(tag: impl AsRef<[u8]>) -> Self {
        Self {
            tag: tag.as_ref().to_vec(),
        }
    }

    /// The tag this parser accepts.
    #[must_use]
    pub fn tag(&self) -> &[u8] {
        &self.tag
    }

    /// Tag test alone, without touching any other property.
    ///
    /// The stored tag may be exactly the literal or the literal plus one
    /// trailing byte (usually its NUL). Any other length or content is an
    /// ordinary node.
    #[must_use]
    pub fn is_tagged(&self, node: &Node<'_>) -> bool {
        node.property(MAGIC_PROPERTY)
            .is_some_and(|value| self.matches_tag(value))
    }

    fn matches_tag(&self, value: &[u8]) -> bool {
        let len = self.tag.len();
        (value.len() == len || value.len() == len + 1) && value[..len] == self.tag[..]
    }

    /// Classifies `node` and, for record nodes, builds the owned record.
    pub fn parse(&self, node: &Node<'_>) -> ParseOutcome {
        if !self.is_tagged(node) {
            return ParseOutcome::NotTagged;
        }
        match parse_record(node) {
            Ok(record) => {
                debug!("cached variable {record}");
                ParseOutcome::Found(record)
            }
            Err(err) => ParseOutcome::Malformed(err),
        }
    }
}

fn parse_record(node: &Node<'_>) -> Result<VariableRecord, RecordError> {
    let raw_name = node
        .property(NAME_PROPERTY)
        .ok_or(RecordError::MissingProperty(NAME_PROPERTY))?;
    let name = {
        let text = terminate::terminated(raw_name)
            .map_err(|_| RecordError::OutOfResources("name scratch buffer"))?;
        VariableName::from_ascii(&text).map_err(|_| RecordError::OutOfResources("variable name"))?
    };

    let raw_guid = node
        .property(GUID_PROPERTY)
        .ok_or(RecordError::MissingProperty(GUID_PROPERTY))?;
    let mut scratch = [0u8; GUID_TEXT_LEN + 1];
    let text = terminate::until_nul(terminate::terminated_fixed(raw_guid, &mut scratch));
    let scope = Guid::parse_ascii(text).map_err(|source| RecordError::BadGuid {
        text: String::from_utf8_lossy(text).into_owned(),
        source,
    })?;

    let raw_attributes = node
        .property(ATTRIBUTES_PROPERTY)
        .ok_or(RecordError::MissingProperty(ATTRIBUTES_PROPERTY))?;
    // Exactly one cell; longer values are malformed, not cut to the first cell.
    let cell: [u8; 4] = raw_attributes
        .try_into()
        .map_err(|_| RecordError::BadAttributes(raw_attributes.len()))?;
    let attributes = VariableAttributes::from_be_cell(cell);

    let raw_data = node
        .property(DATA_PROPERTY)
        .ok_or(RecordError::MissingProperty(DATA_PROPERTY))?;
    let mut data = Vec::new();
    data.try_reserve_exact(raw_data.len())
        .map_err(|_| RecordError::OutOfResources("variable data"))?;
    data.extend_from_slice(raw_data);

    Ok(VariableRecord {
        name,
        scope,
        attributes,
        data,
    })
}
