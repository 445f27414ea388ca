//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use super::*;

// s --10-- a --10-- b --10-- c
fn chain() -> TestTopology {
    TestTopology::new("1")
        .link("s", "a", 10)
        .link("a", "b", 10)
        .link("b", "c", 10)
}

fn harness() -> Harness {
    let mut config = config("s");
    config.enable_ordered_fib = true;
    let mut harness = Harness::with_topology(config, chain());
    harness.decision.fib_time_update("b", Duration::from_millis(50));
    harness
}

#[test]
fn link_up_held_by_distance() {
    let mut harness = harness();
    let runs = harness.decision.stats().route_build_runs;

    harness
        .decision
        .topology_update("1", "c", TopologyChange::LINK_UP, None);
    let hold = harness.decision.holds().get("c").unwrap();
    assert_eq!(hold.ttl, 3);
    assert_eq!(hold.change, TopologyChange::LINK_UP);
    assert_eq!(harness.decision.debouncer().state(), debounce::State::Idle);
    assert!(!harness.decision.pending().needs_route_update());
    assert!(harness.decision.fib_hold_remaining().is_some());

    harness.fire(ProtocolMsg::FibHoldTimer);
    harness.fire(ProtocolMsg::FibHoldTimer);
    assert_eq!(harness.decision.holds().get("c").unwrap().ttl, 1);
    assert_eq!(harness.decision.stats().route_build_runs, runs);

    // The last decrement releases the change, which is applied right away.
    harness.fire(ProtocolMsg::FibHoldTimer);
    assert!(harness.decision.holds().is_empty());
    assert!(harness.decision.fib_hold_remaining().is_none());
    assert_eq!(harness.decision.stats().route_build_runs, runs + 1);
}

#[test]
fn link_down_held_farthest_first() {
    let mut harness = harness();

    // The farthest node from "a" is "c", two hops away.
    harness
        .decision
        .topology_update("1", "a", TopologyChange::LINK_DOWN, None);
    assert_eq!(harness.decision.holds().get("a").unwrap().ttl, 1);

    // The local node is the farthest from "c", so nothing is held.
    harness
        .decision
        .topology_update("1", "c", TopologyChange::LINK_DOWN, None);
    assert!(harness.decision.holds().get("c").is_none());
    assert!(harness.decision.pending().needs_full_rebuild());

    harness.fire(ProtocolMsg::FibHoldTimer);
    assert!(harness.decision.holds().is_empty());
}

#[test]
fn held_changes_merge() {
    let mut harness = harness();

    harness
        .decision
        .topology_update("1", "b", TopologyChange::LINK_UP, None);
    harness
        .decision
        .topology_update("1", "b", TopologyChange::LINK_DOWN, None);
    let hold = harness.decision.holds().get("b").unwrap();
    assert_eq!(hold.ttl, 2);
    assert_eq!(hold.change, TopologyChange::LINK_UP | TopologyChange::LINK_DOWN);
}

#[test]
fn local_and_attribute_changes_not_held() {
    let mut harness = harness();

    harness
        .decision
        .topology_update("1", "s", TopologyChange::LINK_UP, None);
    assert!(harness.decision.holds().is_empty());
    assert_eq!(harness.decision.debouncer().state(), debounce::State::Pending);
    harness.fire(ProtocolMsg::DebounceTimer);

    // Attribute changes of remote nodes don't affect local routes.
    harness
        .decision
        .topology_update("1", "c", TopologyChange::LINK_ATTRIBUTES, None);
    assert!(harness.decision.holds().is_empty());
    assert_eq!(harness.decision.pending().count(), 1);
    assert!(!harness.decision.pending().needs_route_update());
}

#[test]
fn held_link_unused_until_released() {
    // s --10-- a --10-- b --10-- c
    //          |                 |
    //          +--------5--------+ (down)
    let mut topology = chain().link("a", "c", 5);
    topology.set_link_up("a", "c", false);
    let mut config = config("s");
    config.enable_ordered_fib = true;
    let mut harness = Harness::with_topology(config, topology);
    let p1 = net!("10.0.3.0/24");
    harness.advertise("c", vec![entry(p1)]);
    harness.fire(ProtocolMsg::DebounceTimer);
    harness.updates();
    let via_b = BTreeSet::from([nexthop("s", "a", true, 30, None, false, "1")]);
    assert_eq!(harness.decision.route_db().unicast[&p1].nexthops, via_b);

    if let Some(topology) = harness.decision.topology_mut("1") {
        topology.set_link_up("a", "c", true);
    }
    harness
        .decision
        .topology_update("1", "c", TopologyChange::LINK_UP, None);
    assert_eq!(harness.decision.holds().get("c").unwrap().ttl, 3);

    // Unrelated rebuilds still use the topology from before the change.
    let p2 = net!("10.0.2.0/24");
    harness.advertise("b", vec![entry(p2)]);
    harness.fire(ProtocolMsg::DebounceTimer);
    let updates = harness.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].unicast_update.len(), 1);
    assert_eq!(updates[0].unicast_update[0].prefix, p2);
    assert_eq!(harness.decision.route_db().unicast[&p1].nexthops, via_b);

    for _ in 0..3 {
        harness.fire(ProtocolMsg::FibHoldTimer);
    }
    assert!(harness.decision.holds().is_empty());
    assert_eq!(
        harness.decision.route_db().unicast[&p1].nexthops,
        BTreeSet::from([nexthop("s", "a", true, 15, None, false, "1")])
    );
}
