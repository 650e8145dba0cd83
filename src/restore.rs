// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: One-shot replay of cached variables into the runtime store.
// Author: Lukas Bower

//! Restore engine.
//!
//! `Armed -> Restoring -> Done`. The state is checked before any store
//! access, so a second delivery of the trigger performs no store operation.
//! Each record gets exactly one write attempt, in cache order.

use log::{debug, error, info};
use serde::Serialize;

use crate::cache::RecordCache;
use crate::guid::Guid;
use crate::lifecycle::{
    LifecycleChannel, LifecycleError, LifecycleEvent, SubscriptionId, TaskPriority,
};
use crate::record::{VariableAttributes, VariableRecord};
use crate::store::{RuntimeStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RestoreState {
    Armed,
    Restoring,
    Done,
}

/// A record the store refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreFailure {
    pub name: String,
    pub scope: Guid,
    pub attributes: u32,
    pub size: usize,
    pub error: String,
}

/// Tally of one restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RestoreReport {
    pub total: usize,
    pub restored: usize,
    pub failed: usize,
    /// Existing entries deleted because their attributes conflicted.
    pub conflicts_deleted: usize,
    pub failures: Vec<RestoreFailure>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Completed(RestoreReport),
    /// The engine had already run; nothing was touched.
    AlreadyDone,
}

#[derive(Debug)]
pub struct RestoreEngine {
    state: RestoreState,
    subscription: Option<SubscriptionId>,
    report: Option<RestoreReport>,
}

impl Default for RestoreEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RestoreEngine {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RestoreState::Armed,
            subscription: None,
            report: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> RestoreState {
        self.state
    }

    #[must_use]
    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Report of the completed pass, once `Done`.
    #[must_use]
    pub fn report(&self) -> Option<&RestoreReport> {
        self.report.as_ref()
    }

    /// Subscribes the engine to exit-boot-services.
    pub fn arm(&mut self, channel: &mut LifecycleChannel) -> Result<SubscriptionId, LifecycleError> {
        if let Some(id) = self.subscription {
            return Ok(id);
        }
        let id = channel.subscribe(LifecycleEvent::ExitBootServices, TaskPriority::Callback)?;
        self.subscription = Some(id);
        Ok(id)
    }

    /// Trigger handler.
    pub fn on_exit_boot_services(
        &mut self,
        cache: &RecordCache,
        store: &mut dyn RuntimeStore,
        channel: &mut LifecycleChannel,
    ) -> RestoreOutcome {
        if self.state == RestoreState::Done {
            info!("variable restoration already done");
            return RestoreOutcome::AlreadyDone;
        }

        self.state = RestoreState::Restoring;
        info!(
            "exit-boot-services: restoring {} cached variables",
            cache.len()
        );
        let report = restore_all(cache, store);
        info!(
            "variable restoration completed: {}/{} successful",
            report.restored, report.total
        );

        self.state = RestoreState::Done;
        self.report = Some(report.clone());
        if let Some(id) = self.subscription.take() {
            channel.close(id);
        }
        RestoreOutcome::Completed(report)
    }
}

fn restore_all(cache: &RecordCache, store: &mut dyn RuntimeStore) -> RestoreReport {
    let mut report = RestoreReport {
        total: cache.len(),
        ..RestoreReport::default()
    };
    if cache.is_empty() {
        info!("no cached variables to restore");
        return report;
    }

    for record in cache {
        if resolve_conflict(record, store) {
            report.conflicts_deleted += 1;
        }
        match store.set(&record.name, &record.scope, record.attributes, &record.data) {
            Ok(()) => {
                report.restored += 1;
                info!("restored variable {record}");
            }
            Err(err) => {
                report.failed += 1;
                error!("failed to set variable {record}: {err}");
                report.failures.push(failure(record, &err));
            }
        }
    }
    report
}

/// Deletes an existing entry whose attributes the incoming record would
/// change. Returns whether a delete was issued.
///
/// Only the cached side is masked with `APPEND_WRITE`; a record with no
/// attributes at all never triggers a delete.
fn resolve_conflict(record: &VariableRecord, store: &mut dyn RuntimeStore) -> bool {
    let existing = match store.attributes(&record.name, &record.scope) {
        Ok(Some(existing)) => existing,
        Ok(None) => return false,
        Err(err) => {
            debug!("probe of {} failed: {err}", record.name);
            return false;
        }
    };

    let incoming = record
        .attributes
        .difference(VariableAttributes::APPEND_WRITE);
    if record.attributes.is_empty() || incoming == existing {
        return false;
    }

    info!(
        "variable {} exists with different attributes (0x{:x} vs 0x{:x}), deleting first",
        record.name,
        existing.bits(),
        record.attributes.bits()
    );
    if let Err(err) = store.delete(&record.name, &record.scope) {
        debug!("delete of {} failed: {err}", record.name);
    }
    true
}

fn failure(record: &VariableRecord, err: &StoreError) -> RestoreFailure {
    RestoreFailure {
        name: record.name.to_string(),
        scope: record.scope,
        attributes: record.attributes.bits(),
        size: record.data.len(),
        error: err.to_string(),
    }
}
