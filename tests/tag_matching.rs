// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Property tests for record tag matching and node classification.
// Author: Lukas Bower

use efivar_restore::{ParseOutcome, RecordCache, RecordParser, DEFAULT_RECORD_MAGIC};
use fdt_walk::builder::FdtBuilder;
use fdt_walk::Fdt;
use proptest::prelude::*;

const GLOBAL: &str = "8be4df61-93ca-11d2-aa0d-00e098032b8c";

fn tagged_node(magic: &[u8]) -> Vec<u8> {
    let mut builder = FdtBuilder::new();
    builder
        .begin_node("")
        .begin_node("var")
        .property("magic", magic)
        .property_str("name", "Timeout")
        .property_str("guid", GLOBAL)
        .property_u32("attributes", 7)
        .property("data", &[1]);
    builder.finish()
}

fn classify(blob: &[u8]) -> ParseOutcome {
    let fdt = Fdt::new(blob).unwrap();
    let node = fdt.nodes().nth(1).unwrap().unwrap();
    RecordParser::default().parse(&node)
}

proptest! {
    #[test]
    fn literal_plus_any_one_byte_is_accepted(extra in any::<u8>()) {
        let mut magic = DEFAULT_RECORD_MAGIC.as_bytes().to_vec();
        magic.push(extra);
        let is_found = matches!(classify(&tagged_node(&magic)), ParseOutcome::Found(_));
        prop_assert!(is_found);
    }

    #[test]
    fn other_lengths_are_not_tagged(len in 0usize..40) {
        let n = DEFAULT_RECORD_MAGIC.len();
        prop_assume!(len != n && len != n + 1);
        let magic: Vec<u8> = DEFAULT_RECORD_MAGIC
            .bytes()
            .chain(std::iter::repeat(0))
            .take(len)
            .collect();
        prop_assert_eq!(classify(&tagged_node(&magic)), ParseOutcome::NotTagged);
    }

    #[test]
    fn any_differing_byte_is_not_tagged(index in 0usize..16, flip in 1u8..=255) {
        let mut magic = DEFAULT_RECORD_MAGIC.as_bytes().to_vec();
        magic[index] ^= flip;
        prop_assert_eq!(classify(&tagged_node(&magic)), ParseOutcome::NotTagged);
    }

    #[test]
    fn untagged_nodes_never_become_records(
        names in proptest::collection::vec("[a-z]{1,8}", 0..12),
    ) {
        let mut builder = FdtBuilder::new();
        builder.begin_node("");
        for name in &names {
            builder
                .begin_node(name)
                .property_str("name", name)
                .property_str("guid", GLOBAL)
                .property_u32("attributes", 7)
                .property("data", name.as_bytes())
                .end_node();
        }
        let cache = RecordCache::from_blob(&builder.finish(), &RecordParser::default()).unwrap();
        prop_assert!(cache.is_empty());
        prop_assert_eq!(cache.capacity(), 0);
    }
}

#[test]
fn exact_literal_is_accepted() {
    assert!(matches!(
        classify(&tagged_node(DEFAULT_RECORD_MAGIC.as_bytes())),
        ParseOutcome::Found(_)
    ));
}

#[test]
fn malformed_node_does_not_hide_later_records() {
    let mut builder = FdtBuilder::new();
    builder.begin_node("");
    for (node, with_guid) in [("a", true), ("b", false), ("c", true)] {
        builder
            .begin_node(node)
            .property_str("magic", DEFAULT_RECORD_MAGIC)
            .property_str("name", node);
        if with_guid {
            builder.property_str("guid", GLOBAL);
        }
        builder
            .property_u32("attributes", 7)
            .property("data", &[])
            .end_node();
    }
    let cache = RecordCache::from_blob(&builder.finish(), &RecordParser::default()).unwrap();
    let names: Vec<String> = cache.iter().map(|r| r.name.to_string()).collect();
    assert_eq!(names, ["a", "c"]);
    assert_eq!(cache.stats().malformed, 1);
    assert!(cache.iter().all(|r| r.data.is_empty()));
}
