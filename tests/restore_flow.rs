// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: End-to-end cache and restore through the driver.
// Author: Lukas Bower

use efivar_restore::store::StoreOp;
use efivar_restore::{
    Guid, HandoffTable, LifecycleChannel, LifecycleEvent, MemoryStore, RestoreConfig,
    RestoreOutcome, RestoreState, VariableAttributes, VariableRestoreDriver, DEFAULT_RECORD_MAGIC,
};
use fdt_walk::builder::FdtBuilder;

const GLOBAL: &str = "8be4df61-93ca-11d2-aa0d-00e098032b8c";

fn global() -> Guid {
    GLOBAL.parse().unwrap()
}

fn board_tree() -> Vec<u8> {
    let mut builder = FdtBuilder::new();
    builder
        .begin_node("")
        .property_str("compatible", "acme,board")
        .begin_node("chosen")
        .property_str("bootargs", "console=ttyS0")
        .end_node()
        .begin_node("efivars");

    builder
        .begin_node("var@0")
        .property_str("magic", DEFAULT_RECORD_MAGIC)
        .property_str("name", "BootOrder")
        .property_str("guid", GLOBAL)
        .property_u32("attributes", 0x7)
        .property("data", &[0x01, 0x00, 0x02, 0x00])
        .end_node();

    builder
        .begin_node("var@1")
        .property_str("magic", DEFAULT_RECORD_MAGIC)
        .property_str("name", "Orphan")
        .property_str("guid", GLOBAL)
        .property_u32("attributes", 0x7)
        .end_node();

    builder.finish()
}

fn init(blob: Vec<u8>, channel: &mut LifecycleChannel) -> VariableRestoreDriver {
    let handoff = HandoffTable::with_device_tree(blob);
    VariableRestoreDriver::init(&RestoreConfig::default(), &handoff, channel).unwrap()
}

#[test]
fn boot_order_is_restored_once() {
    let mut channel = LifecycleChannel::new();
    let mut driver = init(board_tree(), &mut channel);

    let stats = driver.cache().stats();
    assert_eq!((stats.tagged, stats.cached, stats.malformed), (2, 1, 1));

    let mut store = MemoryStore::new();
    let outcome = driver.dispatch(LifecycleEvent::ExitBootServices, &mut channel, &mut store);
    let Some(RestoreOutcome::Completed(report)) = outcome else {
        panic!("restore did not run: {outcome:?}");
    };
    assert_eq!((report.total, report.restored, report.failed), (1, 1, 0));
    assert_eq!(store.set_count(), 1);

    let entry = store.get("BootOrder", &global()).unwrap();
    assert_eq!(entry.data, vec![0x01, 0x00, 0x02, 0x00]);
    assert_eq!(
        entry.attributes,
        VariableAttributes::NON_VOLATILE
            | VariableAttributes::BOOTSERVICE_ACCESS
            | VariableAttributes::RUNTIME_ACCESS
    );
}

#[test]
fn repeated_trigger_performs_no_store_operation() {
    let mut channel = LifecycleChannel::new();
    let mut driver = init(board_tree(), &mut channel);
    let mut store = MemoryStore::new();

    driver.dispatch(LifecycleEvent::ExitBootServices, &mut channel, &mut store);
    assert_eq!(driver.engine().state(), RestoreState::Done);
    store.clear_ops();

    // Subscription is closed, so a second signal reaches nobody.
    assert!(driver
        .dispatch(LifecycleEvent::ExitBootServices, &mut channel, &mut store)
        .is_none());
    // A direct call is refused by the state guard.
    assert_eq!(
        driver.on_exit_boot_services(&mut channel, &mut store),
        RestoreOutcome::AlreadyDone
    );
    assert!(store.ops().is_empty());
}

#[test]
fn conflicting_entry_is_deleted_before_write() {
    let mut channel = LifecycleChannel::new();
    let mut driver = init(board_tree(), &mut channel);
    let mut store = MemoryStore::new();
    store.insert(
        "BootOrder",
        global(),
        VariableAttributes::BOOTSERVICE_ACCESS,
        vec![0x09, 0x00],
    );

    driver.dispatch(LifecycleEvent::ExitBootServices, &mut channel, &mut store);

    let sets: Vec<u32> = store
        .ops()
        .iter()
        .filter_map(|op| match op {
            StoreOp::Set { attributes, .. } => Some(*attributes),
            StoreOp::Probe { .. } => None,
        })
        .collect();
    assert_eq!(sets, [0, 0x7]);
    assert_eq!(
        store.get("BootOrder", &global()).unwrap().data,
        vec![0x01, 0x00, 0x02, 0x00]
    );
}

#[test]
fn tree_without_records_restores_nothing() {
    let mut builder = FdtBuilder::new();
    builder.begin_node("").begin_node("cpus").property_u32("#address-cells", 1);
    let mut channel = LifecycleChannel::new();
    let mut driver = init(builder.finish(), &mut channel);
    assert!(driver.cache().is_empty());

    let mut store = MemoryStore::new();
    let outcome = driver.dispatch(LifecycleEvent::ExitBootServices, &mut channel, &mut store);
    assert!(matches!(outcome, Some(RestoreOutcome::Completed(ref r)) if r.total == 0));
    assert!(store.ops().is_empty());
    assert_eq!(driver.engine().state(), RestoreState::Done);
}

#[test]
fn corrupt_first_token_restores_nothing() {
    let mut blob = board_tree();
    let off = u32::from_be_bytes(blob[8..12].try_into().unwrap()) as usize;
    blob[off..off + 4].copy_from_slice(&0xdead_beef_u32.to_be_bytes());

    let mut channel = LifecycleChannel::new();
    let mut driver = init(blob, &mut channel);
    assert!(driver.cache().is_empty());

    let mut store = MemoryStore::new();
    driver.dispatch(LifecycleEvent::ExitBootServices, &mut channel, &mut store);
    assert!(store.ops().is_empty());
    assert_eq!(driver.engine().state(), RestoreState::Done);
}

#[test]
fn corruption_after_a_record_still_restores_it() {
    let mut blob = board_tree();
    let word = |at: usize| u32::from_be_bytes(blob[at..at + 4].try_into().unwrap()) as usize;
    let struct_end = word(8) + word(36);
    blob[struct_end - 4..struct_end].copy_from_slice(&0xdead_beef_u32.to_be_bytes());

    let mut channel = LifecycleChannel::new();
    let mut driver = init(blob, &mut channel);
    assert_eq!(driver.cache().len(), 1);

    let mut store = MemoryStore::new();
    let outcome = driver.dispatch(LifecycleEvent::ExitBootServices, &mut channel, &mut store);
    assert!(matches!(outcome, Some(RestoreOutcome::Completed(ref r)) if r.restored == 1));
    assert_eq!(
        store.get("BootOrder", &global()).unwrap().data,
        vec![0x01, 0x00, 0x02, 0x00]
    );
}
