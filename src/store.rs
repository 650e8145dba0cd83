// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Runtime variable store seam and an in-memory implementation.
// Author: Lukas Bower

use std::collections::{BTreeMap, BTreeSet};

use crate::guid::Guid;
use crate::record::{VariableAttributes, VariableName};

/// Failures reported by a runtime store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("variable not found")]
    NotFound,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("store is write protected")]
    WriteProtected,
    #[error("store out of resources")]
    OutOfResources,
    #[error("device error: {0}")]
    Device(String),
}

/// Persistent key/value service addressed by `(name, scope)`.
pub trait RuntimeStore {
    /// Attributes of the existing entry, or `None` when there is none.
    fn attributes(
        &mut self,
        name: &VariableName,
        scope: &Guid,
    ) -> Result<Option<VariableAttributes>, StoreError>;

    /// Creates, replaces, appends to or deletes an entry.
    fn set(
        &mut self,
        name: &VariableName,
        scope: &Guid,
        attributes: VariableAttributes,
        data: &[u8],
    ) -> Result<(), StoreError>;

    /// Removes an entry. Defaults to the firmware idiom of an empty write.
    fn delete(&mut self, name: &VariableName, scope: &Guid) -> Result<(), StoreError> {
        self.set(name, scope, VariableAttributes::empty(), &[])
    }
}

/// An entry held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVariable {
    pub attributes: VariableAttributes,
    pub data: Vec<u8>,
}

/// Operations observed by [`MemoryStore`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Probe { name: String, scope: Guid },
    Set { name: String, scope: Guid, attributes: u32, size: usize },
}

/// Map-backed store following firmware variable rules.
///
/// * a write with no attributes, or with zero-length data and no
///   `APPEND_WRITE`, deletes the entry;
/// * `APPEND_WRITE` appends to an existing entry;
/// * changing the attributes of an existing entry is rejected with
///   [`StoreError::InvalidParameter`] unless `allow_attribute_change` is set.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<(VariableName, Guid), StoredVariable>,
    ops: Vec<StoreOp>,
    failing: BTreeSet<String>,
    write_protected: bool,
    allow_attribute_change: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an entry without recording an operation.
    pub fn insert(
        &mut self,
        name: impl Into<VariableName>,
        scope: Guid,
        attributes: VariableAttributes,
        data: impl Into<Vec<u8>>,
    ) {
        self.entries.insert(
            (name.into(), scope),
            StoredVariable {
                attributes,
                data: data.into(),
            },
        );
    }

    #[must_use]
    pub fn get(&self, name: &str, scope: &Guid) -> Option<&StoredVariable> {
        self.entries.get(&(VariableName::from(name), *scope))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn ops(&self) -> &[StoreOp] {
        &self.ops
    }

    /// Number of `set` calls seen so far (deletes included).
    #[must_use]
    pub fn set_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, StoreOp::Set { .. }))
            .count()
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    /// Makes every non-delete write to `name` fail with a device error.
    pub fn fail_writes_to(&mut self, name: &str) {
        self.failing.insert(name.to_owned());
    }

    pub fn set_write_protected(&mut self, protected: bool) {
        self.write_protected = protected;
    }

    pub fn set_allow_attribute_change(&mut self, allow: bool) {
        self.allow_attribute_change = allow;
    }
}

impl RuntimeStore for MemoryStore {
    fn attributes(
        &mut self,
        name: &VariableName,
        scope: &Guid,
    ) -> Result<Option<VariableAttributes>, StoreError> {
        self.ops.push(StoreOp::Probe {
            name: name.to_string(),
            scope: *scope,
        });
        Ok(self
            .entries
            .get(&(name.clone(), *scope))
            .map(|entry| entry.attributes))
    }

    fn set(
        &mut self,
        name: &VariableName,
        scope: &Guid,
        attributes: VariableAttributes,
        data: &[u8],
    ) -> Result<(), StoreError> {
        self.ops.push(StoreOp::Set {
            name: name.to_string(),
            scope: *scope,
            attributes: attributes.bits(),
            size: data.len(),
        });
        if self.write_protected {
            return Err(StoreError::WriteProtected);
        }

        let key = (name.clone(), *scope);
        let append = attributes.contains(VariableAttributes::APPEND_WRITE);
        let deleting = attributes.is_empty() || (data.is_empty() && !append);
        if deleting {
            return match self.entries.remove(&key) {
                Some(_) => Ok(()),
                None => Err(StoreError::NotFound),
            };
        }

        if self.failing.contains(&name.to_string()) {
            return Err(StoreError::Device(format!("injected failure for {name}")));
        }
        if name.is_empty() {
            return Err(StoreError::InvalidParameter);
        }

        let stored_attributes = attributes.difference(VariableAttributes::APPEND_WRITE);
        match self.entries.get_mut(&key) {
            Some(existing) => {
                if existing.attributes != stored_attributes && !self.allow_attribute_change {
                    return Err(StoreError::InvalidParameter);
                }
                existing.attributes = stored_attributes;
                if append {
                    existing.data.extend_from_slice(data);
                } else {
                    existing.data = data.to_vec();
                }
            }
            None => {
                self.entries.insert(
                    key,
                    StoredVariable {
                        attributes: stored_attributes,
                        data: data.to_vec(),
                    },
                );
            }
        }
        Ok(())
    }
}
