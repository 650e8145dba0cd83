// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Driver state tying the cache to the one-shot restore.
// Author: Lukas Bower

//! Variable restore driver.
//!
//! [`VariableRestoreDriver::init`] runs while boot-time memory is still
//! valid: it finds the device tree in the handoff list, caches every record
//! and arms the restore on the lifecycle channel. Cache problems degrade to
//! an empty cache; only a failure to arm reaches the caller.

use log::{info, warn};

use crate::cache::RecordCache;
use crate::config::RestoreConfig;
use crate::handoff::{HandoffLookup, DEVICE_TREE_TAG};
use crate::lifecycle::{LifecycleChannel, LifecycleError, LifecycleEvent};
use crate::restore::{RestoreEngine, RestoreOutcome};
use crate::store::RuntimeStore;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DriverError {
    #[error("failed to arm variable restore: {0}")]
    Arm(#[from] LifecycleError),
}

#[derive(Debug)]
pub struct VariableRestoreDriver {
    cache: RecordCache,
    engine: RestoreEngine,
}

impl VariableRestoreDriver {
    pub fn init(
        config: &RestoreConfig,
        handoff: &dyn HandoffLookup,
        channel: &mut LifecycleChannel,
    ) -> Result<Self, DriverError> {
        info!("variable restore driver starting");
        let cache = if config.enabled {
            cache_from_handoff(config, handoff)
        } else {
            info!("variable restore disabled by configuration");
            RecordCache::empty()
        };

        let mut engine = RestoreEngine::new();
        engine.arm(channel)?;
        info!(
            "variable restore armed with {} cached variables",
            cache.len()
        );
        Ok(Self { cache, engine })
    }

    #[must_use]
    pub fn cache(&self) -> &RecordCache {
        &self.cache
    }

    #[must_use]
    pub fn engine(&self) -> &RestoreEngine {
        &self.engine
    }

    /// Signals `event` and runs the restore if this driver is among the
    /// subscribers it is delivered to.
    pub fn dispatch(
        &mut self,
        event: LifecycleEvent,
        channel: &mut LifecycleChannel,
        store: &mut dyn RuntimeStore,
    ) -> Option<RestoreOutcome> {
        let own = self.engine.subscription();
        let deliveries = channel.signal(event);
        let mut outcome = None;
        for id in deliveries {
            if Some(id) == own {
                outcome = Some(self.on_exit_boot_services(channel, store));
            }
        }
        outcome
    }

    /// Exit-boot-services handler. Safe to call more than once.
    pub fn on_exit_boot_services(
        &mut self,
        channel: &mut LifecycleChannel,
        store: &mut dyn RuntimeStore,
    ) -> RestoreOutcome {
        self.engine
            .on_exit_boot_services(&self.cache, store, channel)
    }
}

fn cache_from_handoff(config: &RestoreConfig, handoff: &dyn HandoffLookup) -> RecordCache {
    let Some(blob) = handoff.find(&DEVICE_TREE_TAG) else {
        info!("no device tree in handoff list, nothing to cache");
        return RecordCache::empty();
    };
    match RecordCache::from_blob(blob, &config.parser()) {
        Ok(cache) => cache,
        Err(err) => {
            warn!("failed to cache variables from device tree: {err}");
            RecordCache::empty()
        }
    }
}
