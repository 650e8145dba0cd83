// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Crate root for the device tree variable cache and restore driver.
// Author: Lukas Bower

//! Firmware variables handed over in a flattened device tree are cached
//! while boot-time memory is valid and written back into the runtime
//! variable store once, when boot services end.
//!
//! ```no_run
//! use efivar_restore::{
//!     HandoffTable, LifecycleChannel, LifecycleEvent, MemoryStore, RestoreConfig,
//!     VariableRestoreDriver,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let blob = std::fs::read("board.dtb")?;
//! let handoff = HandoffTable::with_device_tree(blob);
//! let mut channel = LifecycleChannel::new();
//! let mut driver = VariableRestoreDriver::init(&RestoreConfig::load_active(), &handoff, &mut channel)?;
//!
//! let mut store = MemoryStore::new();
//! driver.dispatch(LifecycleEvent::ExitBootServices, &mut channel, &mut store);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod driver;
pub mod guid;
pub mod handoff;
pub mod lifecycle;
pub mod parser;
pub mod record;
pub mod restore;
pub mod store;
pub mod terminate;

pub use cache::{CacheBuildStats, CacheError, RecordCache};
pub use config::{ConfigError, RestoreConfig};
pub use driver::{DriverError, VariableRestoreDriver};
pub use guid::Guid;
pub use handoff::{HandoffLookup, HandoffTable, DEVICE_TREE_TAG};
pub use lifecycle::{LifecycleChannel, LifecycleError, LifecycleEvent, SubscriptionId, TaskPriority};
pub use parser::{ParseOutcome, RecordError, RecordParser, DEFAULT_RECORD_MAGIC};
pub use record::{RecordSummary, VariableAttributes, VariableName, VariableRecord};
pub use restore::{RestoreEngine, RestoreOutcome, RestoreReport, RestoreState};
pub use store::{MemoryStore, RuntimeStore, StoreError};
