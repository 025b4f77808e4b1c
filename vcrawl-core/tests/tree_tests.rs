// Tests for link tree reconstruction

use vcrawl_client::LinkRecord;
use vcrawl_core::tree::{build_forest, find_node, forest_size};

const SEED: &str = "https://example.com/";

fn link(href: &str, parent: &str, depth: u32) -> LinkRecord {
    LinkRecord::new(href, href).with_parent(parent, depth)
}

fn root_hrefs(records: &[LinkRecord], seed: &str) -> Vec<String> {
    build_forest(records, seed)
        .iter()
        .map(|n| n.href().to_string())
        .collect()
}

// ============================================================================
// Root Selection Tests
// ============================================================================

#[test]
fn test_orphan_parent_becomes_root() {
    let records = vec![link("A", "", 0), link("B", "A", 1), link("C", "Z", 1)];
    let forest = build_forest(&records, SEED);

    let roots: Vec<&str> = forest.iter().map(|n| n.href()).collect();
    assert_eq!(roots, vec!["A", "C"]);
    assert_eq!(forest[0].children.len(), 1);
    assert_eq!(forest[0].children[0].href(), "B");
    assert!(forest[1].children.is_empty());
}

#[test]
fn test_seed_parent_is_root_even_when_seed_is_a_record() {
    let records = vec![
        link(SEED, "", 0),
        link("https://example.com/a", SEED, 1),
        link("https://example.com/b", SEED, 1),
    ];

    let roots = root_hrefs(&records, SEED);
    assert_eq!(roots.len(), 3);
    assert_eq!(roots[0], SEED);
}

#[test]
fn test_flat_result_is_single_level_in_order() {
    let records: Vec<LinkRecord> = (0..5)
        .map(|i| LinkRecord::new(format!("https://example.com/{}", i), "x"))
        .collect();

    let forest = build_forest(&records, SEED);
    assert_eq!(forest.len(), 5);
    assert!(forest.iter().all(|n| n.children.is_empty()));
    for (node, record) in forest.iter().zip(&records) {
        assert_eq!(node.href(), record.href);
    }
}

#[test]
fn test_empty_input() {
    assert!(build_forest(&[], SEED).is_empty());
}

// ============================================================================
// Structure Tests
// ============================================================================

#[test]
fn test_children_keep_encounter_order() {
    let records = vec![
        link("https://example.com/docs", "", 0),
        link("https://example.com/docs/b", "https://example.com/docs", 1),
        link("https://example.com/docs/a", "https://example.com/docs", 1),
        link("https://example.com/docs/c", "https://example.com/docs", 1),
    ];

    let forest = build_forest(&records, SEED);
    let children: Vec<&str> = forest[0].children.iter().map(|n| n.href()).collect();
    assert_eq!(
        children,
        vec![
            "https://example.com/docs/b",
            "https://example.com/docs/a",
            "https://example.com/docs/c",
        ]
    );
}

#[test]
fn test_deep_chain() {
    let records = vec![
        link("L0", "", 0),
        link("L1", "L0", 1),
        link("L2", "L1", 2),
        link("L3", "L2", 3),
    ];

    let forest = build_forest(&records, SEED);
    assert_eq!(forest.len(), 1);
    assert_eq!(forest[0].node_count(), 4);
    assert_eq!(forest[0].hrefs(), vec!["L0", "L1", "L2", "L3"]);
    assert_eq!(find_node(&forest, "L2").map(|n| n.children.len()), Some(1));
}

#[test]
fn test_duplicate_hrefs_are_one_node() {
    let records = vec![
        link("A", "", 0),
        link("B", "A", 1),
        link("B", "A", 1),
        link("C", "B", 2),
    ];

    let forest = build_forest(&records, SEED);
    assert_eq!(forest_size(&forest), 3);
}

// ============================================================================
// Completeness Tests
// ============================================================================

#[test]
fn test_every_record_placed_exactly_once() {
    // Mix of roots, seed children, orphans and nested links
    let records = vec![
        link("https://example.com/", "", 0),
        link("https://example.com/a", SEED, 1),
        link("https://example.com/a/1", "https://example.com/a", 2),
        link("https://example.com/a/2", "https://example.com/a", 2),
        link("https://example.com/a/2/x", "https://example.com/a/2", 3),
        link("https://example.com/b", "https://gone.example.com/", 1),
        link("https://example.com/b/1", "https://example.com/b", 2),
        link("https://other.com/", "", 0),
    ];

    let forest = build_forest(&records, SEED);
    assert_eq!(forest_size(&forest), records.len());

    let mut seen: Vec<String> = forest.iter().flat_map(|n| n.hrefs()).collect();
    seen.sort();
    let mut expected: Vec<String> = records.iter().map(|r| r.href.clone()).collect();
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn test_cyclic_parents_are_still_placed() {
    let records = vec![link("A", "", 0), link("B", "C", 1), link("C", "B", 1)];

    let forest = build_forest(&records, SEED);
    assert_eq!(forest_size(&forest), 3);
    assert_eq!(forest[0].href(), "A");
}

#[test]
fn test_self_parent_is_placed() {
    let records = vec![link("A", "A", 1)];
    let forest = build_forest(&records, SEED);
    assert_eq!(forest_size(&forest), 1);
}
