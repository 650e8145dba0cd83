// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Two-pass cache of variable records lifted out of the device tree.
// Author: Lukas Bower

//! Record cache.
//!
//! Built once, before the device tree buffer may be reclaimed:
//!
//! 1. count pass: tag test only, no allocation;
//! 2. one exact-capacity reservation for the counted records;
//! 3. fill pass: full parse, bounded by that capacity.
//!
//! After [`RecordCache::build`] returns, nothing in the cache refers to the
//! blob.

use fdt_walk::{Fdt, FdtError, Node};
use log::{debug, info, warn};

use crate::parser::{ParseOutcome, RecordParser};
use crate::record::VariableRecord;

/// Reasons the cache could not be built at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    /// The blob header failed validation; nothing was walked.
    #[error("invalid device tree: {0}")]
    InvalidSourceBuffer(#[source] FdtError),
    /// The record store itself could not be reserved.
    #[error("out of resources reserving {records} cached records")]
    OutOfResources { records: usize },
}

/// Counters gathered while building.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheBuildStats {
    /// Nodes passing the tag test in the count pass.
    pub tagged: usize,
    /// Records stored.
    pub cached: usize,
    /// Tagged nodes dropped as malformed.
    pub malformed: usize,
    /// Valid records dropped because the store was already full.
    pub dropped: usize,
}

/// Immutable, fixed-capacity sequence of owned records in tree order.
#[derive(Debug, Clone, Default)]
pub struct RecordCache {
    records: Vec<VariableRecord>,
    stats: CacheBuildStats,
}

impl RecordCache {
    /// The empty cache; restoring it is a no-op.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Cache holding exactly `records`, in the given order.
    #[must_use]
    pub fn from_records(records: Vec<VariableRecord>) -> Self {
        let count = records.len();
        Self {
            records,
            stats: CacheBuildStats {
                tagged: count,
                cached: count,
                ..CacheBuildStats::default()
            },
        }
    }

    /// Validates `blob` and builds the cache from it.
    pub fn from_blob(blob: &[u8], parser: &RecordParser) -> Result<Self, CacheError> {
        let fdt = Fdt::new(blob).map_err(CacheError::InvalidSourceBuffer)?;
        Self::build(&fdt, parser)
    }

    /// Runs the count, reserve and fill passes over `fdt`.
    ///
    /// Structural corruption ends either pass early; records seen before it
    /// are kept.
    pub fn build(fdt: &Fdt<'_>, parser: &RecordParser) -> Result<Self, CacheError> {
        Self::build_counting(fdt, parser, |node| parser.is_tagged(node))
    }

    fn build_counting(
        fdt: &Fdt<'_>,
        parser: &RecordParser,
        counts: impl Fn(&Node<'_>) -> bool,
    ) -> Result<Self, CacheError> {
        info!(
            "scanning device tree ({} bytes) for variable records",
            fdt.header().totalsize()
        );

        let mut tagged = 0;
        for node in fdt.nodes() {
            match node {
                Ok(node) if counts(&node) => tagged += 1,
                Ok(_) => {}
                Err(err) => {
                    warn!("device tree walk stopped during count pass: {err}");
                    break;
                }
            }
        }

        if tagged == 0 {
            info!("no variable records found in device tree");
            return Ok(Self::empty());
        }
        info!("found {tagged} variable record nodes");

        let mut records = Vec::new();
        records
            .try_reserve_exact(tagged)
            .map_err(|_| CacheError::OutOfResources { records: tagged })?;
        let capacity = tagged;

        let mut stats = CacheBuildStats {
            tagged,
            ..CacheBuildStats::default()
        };
        for node in fdt.nodes() {
            let node = match node {
                Ok(node) => node,
                Err(err) => {
                    warn!("device tree walk stopped during fill pass: {err}");
                    break;
                }
            };
            match parser.parse(&node) {
                ParseOutcome::Found(record) if records.len() < capacity => records.push(record),
                ParseOutcome::Found(record) => {
                    debug!("cache full ({capacity}), dropping {record}");
                    stats.dropped += 1;
                }
                ParseOutcome::Malformed(err) => {
                    warn!(
                        "skipping variable node '{}' ({:?}): {err}",
                        node.name(),
                        err.status()
                    );
                    stats.malformed += 1;
                }
                ParseOutcome::NotTagged => {}
            }
        }

        stats.cached = records.len();
        info!("cached {} variables from device tree", stats.cached);
        Ok(Self { records, stats })
    }

    #[must_use]
    pub fn records(&self) -> &[VariableRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VariableRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Slots reserved by the count pass.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.stats.tagged
    }

    #[must_use]
    pub fn stats(&self) -> CacheBuildStats {
        self.stats
    }
}

impl<'a> IntoIterator for &'a RecordCache {
    type Item = &'a VariableRecord;
    type IntoIter = std::slice::Iter<'a, VariableRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
