//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv6Addr};

use holo_decision::route::MplsRoute;
use holo_utils::mpls::Label;

use super::*;

fn labeled_square() -> TestTopology {
    square("1")
        .label("s", 100)
        .label("a", 101)
        .label("b", 102)
        .label("d", 103)
}

#[test]
fn node_labels() {
    let topologies = topologies([labeled_square()]);
    let prefix_state = PrefixState::default();

    let (route_db, _) = build(config("s"), &topologies, &prefix_state);
    let route_db = route_db.unwrap();
    assert_eq!(route_db.mpls.len(), 4);

    // Local label.
    assert_eq!(
        route_db.mpls[&Label::new(100)],
        MplsRoute::new(
            Label::new(100),
            BTreeSet::from([Nexthop::new(
                IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                None,
                0,
                Some(MplsAction::PopAndLookup),
                false,
                Some("1".to_owned()),
            )])
        )
    );

    // Neighbor label.
    assert_eq!(
        route_db.mpls[&Label::new(101)].nexthops,
        BTreeSet::from([nexthop(
            "s",
            "a",
            false,
            10,
            Some(MplsAction::Php),
            false,
            "1"
        )])
    );

    // Remote label.
    let swap = Some(MplsAction::Swap(Label::new(103)));
    assert_eq!(
        route_db.mpls[&Label::new(103)].nexthops,
        BTreeSet::from([
            nexthop("s", "a", false, 20, swap.clone(), false, "1"),
            nexthop("s", "b", false, 20, swap, false, "1"),
        ])
    );
}

#[test]
fn node_label_collision() {
    let topologies = topologies([TestTopology::new("1")
        .link("s", "a", 10)
        .link("s", "c", 10)
        .label("a", 100)
        .label("c", 100)]);
    let prefix_state = PrefixState::default();

    // The greatest node name wins.
    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    let route_db = route_db.unwrap();
    assert_eq!(
        route_db.mpls[&Label::new(100)].nexthops,
        BTreeSet::from([nexthop(
            "s",
            "c",
            false,
            10,
            Some(MplsAction::Php),
            false,
            "1"
        )])
    );
    assert_eq!(stats.duplicate_node_label, 1);
}

#[test]
fn invalid_node_label() {
    let topologies = topologies([square("1").label("a", 5).label("b", 1 << 20)]);
    let prefix_state = PrefixState::default();

    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    assert!(route_db.unwrap().mpls.is_empty());
    assert_eq!(stats.skipped_mpls_route, 2);
}

#[test]
fn node_label_collision_unreachable_winner() {
    let topologies = topologies([TestTopology::new("1")
        .link("s", "a", 10)
        .node("z")
        .label("a", 100)
        .label("z", 100)]);
    let prefix_state = PrefixState::default();

    // The label keeps routing toward the reachable node.
    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    let route_db = route_db.unwrap();
    assert_eq!(
        route_db.mpls[&Label::new(100)].nexthops,
        BTreeSet::from([nexthop(
            "s",
            "a",
            false,
            10,
            Some(MplsAction::Php),
            false,
            "1"
        )])
    );
    assert_eq!(stats.duplicate_node_label, 1);
    assert_eq!(stats.no_route_to_label, 1);
}

#[test]
fn out_of_range_labels_accepted_by_topology() {
    let topologies = topologies([square("1")
        .any_label_valid()
        .label("a", 1 << 21)
        .adj_label("s", "b", 1 << 22)]);
    let prefix_state = PrefixState::default();

    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    assert!(route_db.unwrap().mpls.is_empty());
    assert_eq!(stats.skipped_mpls_route, 2);
}

#[test]
fn unreachable_node_label() {
    let topologies = topologies([square("1").node("z").label("z", 200)]);
    let prefix_state = PrefixState::default();

    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    assert!(route_db.unwrap().mpls.is_empty());
    assert_eq!(stats.no_route_to_label, 1);
}

#[test]
fn adjacency_labels() {
    let topologies = topologies([labeled_square()
        .adj_label("s", "a", 50001)
        .adj_label("s", "b", 103)
        .adj_label("a", "d", 50002)]);
    let prefix_state = PrefixState::default();

    let (route_db, _) = build(config("s"), &topologies, &prefix_state);
    let route_db = route_db.unwrap();
    assert_eq!(
        route_db.mpls[&Label::new(50001)].nexthops,
        BTreeSet::from([nexthop(
            "s",
            "a",
            false,
            10,
            Some(MplsAction::Php),
            false,
            "1"
        )])
    );

    // Node labels take precedence.
    assert_eq!(route_db.mpls[&Label::new(103)].nexthops.len(), 2);

    // Only local adjacencies are programmed.
    assert!(!route_db.mpls.contains_key(&Label::new(50002)));
}
