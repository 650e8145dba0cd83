// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Validate depth-first node order, property lookup and restartable walks.
// Author: Lukas Bower
#![forbid(unsafe_code)]

use fdt_walk::builder::FdtBuilder;
use fdt_walk::{Fdt, FdtError};
use proptest::prelude::*;

fn sample_tree() -> Vec<u8> {
    let mut builder = FdtBuilder::new();
    builder
        .begin_node("")
        .property_str("compatible", "linux,dummy-virt")
        .begin_node("chosen")
        .property_str("bootargs", "console=ttyAMA0")
        .end_node()
        .begin_node("efivars")
        .begin_node("var@0")
        .property_str("name", "BootOrder")
        .nop()
        .property_u32("attributes", 7)
        .end_node()
        .begin_node("var@1")
        .property("data", &[])
        .end_node()
        .end_node()
        .begin_node("memory@40000000")
        .end_node()
        .end_node();
    builder.finish()
}

#[test]
fn nodes_are_depth_first_with_depth() {
    let blob = sample_tree();
    let fdt = Fdt::new(&blob).expect("valid tree");
    let nodes: Vec<(String, usize)> = fdt
        .nodes()
        .map(|node| {
            let node = node.expect("walk ok");
            (node.name().to_owned(), node.depth())
        })
        .collect();

    assert_eq!(
        nodes,
        vec![
            (String::new(), 0),
            ("chosen".to_owned(), 1),
            ("efivars".to_owned(), 1),
            ("var@0".to_owned(), 2),
            ("var@1".to_owned(), 2),
            ("memory@40000000".to_owned(), 1),
        ]
    );
}

#[test]
fn walk_restarts_from_root() {
    let blob = sample_tree();
    let fdt = Fdt::new(&blob).expect("valid tree");
    let first = fdt.nodes().count();
    let second = fdt.nodes().count();
    assert_eq!(first, 6);
    assert_eq!(first, second);
}

#[test]
fn property_lookup_is_scoped_to_node() {
    let blob = sample_tree();
    let fdt = Fdt::new(&blob).expect("valid tree");
    let nodes: Vec<_> = fdt.nodes().collect::<Result<_, _>>().expect("walk ok");

    let efivars = &nodes[2];
    assert_eq!(efivars.property("name"), None);

    let var0 = &nodes[3];
    assert_eq!(var0.property("name"), Some(&b"BootOrder\0"[..]));
    assert_eq!(var0.property("attributes"), Some(&7u32.to_be_bytes()[..]));
    assert_eq!(var0.properties().count(), 2);

    let var1 = &nodes[4];
    assert_eq!(var1.property("data"), Some(&[][..]));
    assert_eq!(var1.property("name"), None);
}

#[test]
fn corruption_is_reported_once_then_fused() {
    let mut blob = sample_tree();
    let fdt = Fdt::new(&blob).expect("valid tree");
    let struct_off = fdt.header().structure_offset();
    let struct_len = fdt.structure_block().len();
    // Replace the final FDT_END token with garbage.
    let end = struct_off + struct_len - 4;
    blob[end..end + 4].copy_from_slice(&0xDEAD_BEEFu32.to_be_bytes());

    let fdt = Fdt::new(&blob).expect("header still valid");
    let mut nodes = fdt.nodes();
    let mut seen = 0;
    let err = loop {
        match nodes.next().expect("error before exhaustion") {
            Ok(_) => seen += 1,
            Err(err) => break err,
        }
    };
    assert_eq!(seen, 6);
    assert_eq!(err, FdtError::InvalidToken(0xDEAD_BEEF));
    assert!(nodes.next().is_none());
}

#[test]
fn empty_root_has_single_node() {
    let mut builder = FdtBuilder::new();
    builder.begin_node("");
    let blob = builder.finish();
    let fdt = Fdt::new(&blob).expect("valid tree");
    assert_eq!(fdt.nodes().count(), 1);
}

proptest! {
    #[test]
    fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        if let Ok(fdt) = Fdt::new(&bytes) {
            for node in fdt.nodes() {
                if let Ok(node) = node {
                    let _ = node.properties().count();
                }
            }
        }
    }

    #[test]
    fn property_payload_survives_verbatim(payload in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut builder = FdtBuilder::new();
        builder.begin_node("").begin_node("n").property("blob", &payload);
        let blob = builder.finish();
        let fdt = Fdt::new(&blob).expect("valid tree");
        let node = fdt.nodes().nth(1).expect("child").expect("walk ok");
        prop_assert_eq!(node.property("blob"), Some(payload.as_slice()));
    }
}
