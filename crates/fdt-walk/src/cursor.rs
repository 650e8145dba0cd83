// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Token-level cursor over the FDT structure block.
// Author: Lukas Bower

use core::mem::size_of;
use core::str;

use crate::{align_up, read_be_u32, FdtError, FDT_PROP_MAX_LEN};

const FDT_BEGIN_NODE: u32 = 0x0000_0001;
const FDT_END_NODE: u32 = 0x0000_0002;
const FDT_PROP: u32 = 0x0000_0003;
const FDT_NOP: u32 = 0x0000_0004;
const FDT_END: u32 = 0x0000_0009;

const ALIGNMENT: usize = 4;

/// Items yielded by [`StructureCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    /// A node begins. The root node has an empty name.
    BeginNode(&'a str),
    /// The innermost open node ends.
    EndNode,
    /// A property of the innermost open node.
    Property {
        /// Name resolved through the strings block.
        name: &'a str,
        /// Raw payload, exactly as long as the declared length.
        value: &'a [u8],
    },
}

/// Reads structure tokens one at a time, skipping `FDT_NOP`.
#[derive(Debug, Clone)]
pub struct StructureCursor<'a> {
    structure: &'a [u8],
    strings: &'a [u8],
    offset: usize,
    depth: usize,
    finished: bool,
}

impl<'a> StructureCursor<'a> {
    pub(crate) fn new(structure: &'a [u8], strings: &'a [u8]) -> Self {
        Self::at(structure, strings, 0, 0)
    }

    pub(crate) fn at(structure: &'a [u8], strings: &'a [u8], offset: usize, depth: usize) -> Self {
        Self {
            structure,
            strings,
            offset,
            depth,
            finished: false,
        }
    }

    /// Offset of the next token within the structure block.
    #[must_use]
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Number of nodes currently open.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn strings(&self) -> &'a [u8] {
        self.strings
    }

    pub(crate) fn structure(&self) -> &'a [u8] {
        self.structure
    }

    /// Returns the next token, or `None` once `FDT_END` has been consumed.
    pub fn next_token(&mut self) -> Result<Option<Token<'a>>, FdtError> {
        loop {
            if self.finished {
                return Ok(None);
            }
            let token = self.read_u32(self.offset)?;
            self.offset = self
                .offset
                .checked_add(size_of::<u32>())
                .ok_or(FdtError::Bounds)?;

            return match token {
                FDT_BEGIN_NODE => self.begin_node().map(Some),
                FDT_END_NODE => self.end_node().map(Some),
                FDT_PROP => self.property().map(Some),
                FDT_NOP => continue,
                FDT_END => self.end().map(|()| None),
                other => Err(FdtError::InvalidToken(other)),
            };
        }
    }

    /// Peeks whether the next non-NOP token is a property, without consuming it.
    pub(crate) fn at_property(&self) -> Result<bool, FdtError> {
        let mut offset = self.offset;
        loop {
            match self.read_u32(offset)? {
                FDT_NOP => offset += size_of::<u32>(),
                FDT_PROP => return Ok(true),
                _ => return Ok(false),
            }
        }
    }

    fn read_u32(&self, offset: usize) -> Result<u32, FdtError> {
        match read_be_u32(self.structure, offset) {
            Err(FdtError::TooShort) => Err(FdtError::Truncated),
            other => other,
        }
    }

    fn align_to(&mut self, value: usize) -> Result<(), FdtError> {
        self.offset = align_up(value, ALIGNMENT)?;
        if self.offset > self.structure.len() {
            return Err(FdtError::Truncated);
        }
        Ok(())
    }

    fn begin_node(&mut self) -> Result<Token<'a>, FdtError> {
        let start = self.offset;
        let tail = self.structure.get(start..).ok_or(FdtError::Truncated)?;
        let len = tail
            .iter()
            .position(|&byte| byte == 0)
            .ok_or(FdtError::UnterminatedString)?;
        let name = str::from_utf8(&tail[..len]).map_err(|_| FdtError::BadString)?;
        self.align_to(start + len + 1)?;
        self.depth = self.depth.checked_add(1).ok_or(FdtError::Bounds)?;
        Ok(Token::BeginNode(name))
    }

    fn end_node(&mut self) -> Result<Token<'a>, FdtError> {
        if self.depth == 0 {
            return Err(FdtError::UnexpectedEnd);
        }
        self.depth -= 1;
        Ok(Token::EndNode)
    }

    fn property(&mut self) -> Result<Token<'a>, FdtError> {
        let base = self.offset;
        let len = self.read_u32(base)? as usize;
        let nameoff = self.read_u32(base + size_of::<u32>())? as usize;
        if len > FDT_PROP_MAX_LEN {
            return Err(FdtError::PropertyTooLarge(len));
        }

        let data_start = base + 2 * size_of::<u32>();
        let data_end = data_start.checked_add(len).ok_or(FdtError::Bounds)?;
        let value = self
            .structure
            .get(data_start..data_end)
            .ok_or(FdtError::Truncated)?;
        let name = read_cstr(self.strings, nameoff)?;
        self.align_to(data_end)?;
        Ok(Token::Property { name, value })
    }

    fn end(&mut self) -> Result<(), FdtError> {
        if self.depth != 0 {
            return Err(FdtError::UnexpectedEnd);
        }
        self.finished = true;
        Ok(())
    }
}

fn read_cstr(blob: &[u8], offset: usize) -> Result<&str, FdtError> {
    let tail = blob.get(offset..).ok_or(FdtError::Bounds)?;
    if tail.is_empty() {
        return Err(FdtError::Bounds);
    }
    let len = tail
        .iter()
        .position(|&byte| byte == 0)
        .ok_or(FdtError::UnterminatedString)?;
    str::from_utf8(&tail[..len]).map_err(|_| FdtError::BadString)
}
