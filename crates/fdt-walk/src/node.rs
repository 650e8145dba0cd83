// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Depth-first node iteration and per-node property lookup.
// Author: Lukas Bower

use core::iter::FusedIterator;

use crate::cursor::{StructureCursor, Token};
use crate::FdtError;

/// Borrowed handle to one node of the tree.
///
/// Holds no state beyond offsets into the blob; valid for as long as the
/// blob is.
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    name: &'a str,
    depth: usize,
    offset: usize,
    structure: &'a [u8],
    strings: &'a [u8],
}

impl<'a> Node<'a> {
    /// Unit name of the node (empty for the root).
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Nesting depth; the root node is at depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Offset within the structure block of the node's first property token.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Iterates over this node's own properties, in blob order.
    #[must_use]
    pub fn properties(&self) -> Properties<'a> {
        Properties {
            cursor: StructureCursor::at(self.structure, self.strings, self.offset, 1),
            done: false,
        }
    }

    /// Raw payload of the first property called `name`.
    ///
    /// Returns `None` when the node has no such property. A corrupted
    /// property list ends the search early; the node walk reports that
    /// corruption separately.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&'a [u8]> {
        self.properties()
            .map_while(Result::ok)
            .find(|property| property.name == name)
            .map(|property| property.value)
    }
}

/// A single `name = value` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Property<'a> {
    /// Property name.
    pub name: &'a str,
    /// Raw, unterminated payload.
    pub value: &'a [u8],
}

/// Iterator over the properties of one node. See [`Node::properties`].
#[derive(Debug, Clone)]
pub struct Properties<'a> {
    cursor: StructureCursor<'a>,
    done: bool,
}

impl<'a> Iterator for Properties<'a> {
    type Item = Result<Property<'a>, FdtError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = match self.cursor.at_property() {
            Ok(true) => match self.cursor.next_token() {
                Ok(Some(Token::Property { name, value })) => {
                    return Some(Ok(Property { name, value }));
                }
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            },
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        };
        self.done = true;
        item
    }
}

impl FusedIterator for Properties<'_> {}

/// Depth-first iterator over every node of a tree. See [`crate::Fdt::nodes`].
///
/// Structural corruption is reported once as an `Err` item, after which the
/// iterator is exhausted.
#[derive(Debug, Clone)]
pub struct Nodes<'a> {
    cursor: StructureCursor<'a>,
    done: bool,
}

impl<'a> Nodes<'a> {
    pub(crate) fn new(cursor: StructureCursor<'a>) -> Self {
        Self {
            cursor,
            done: false,
        }
    }
}

impl<'a> Iterator for Nodes<'a> {
    type Item = Result<Node<'a>, FdtError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            match self.cursor.next_token() {
                Ok(Some(Token::BeginNode(name))) => {
                    return Some(Ok(Node {
                        name,
                        depth: self.cursor.depth() - 1,
                        offset: self.cursor.position(),
                        structure: self.cursor.structure(),
                        strings: self.cursor.strings(),
                    }));
                }
                Ok(Some(_)) => {}
                Ok(None) => self.done = true,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

impl FusedIterator for Nodes<'_> {}
