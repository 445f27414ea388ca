//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::net::IpAddr;

use const_addrs::net;
use holo_decision::metric_vector::{CompareType, MetricEntity, MetricVector};

use super::*;

fn prefix_state_with_loopbacks(nodes: &[&str]) -> PrefixState {
    let mut prefix_state = PrefixState::default();
    for node in nodes {
        advertise(&mut prefix_state, node, "1", vec![loopback_entry(node)]);
    }
    prefix_state
}

#[test]
fn lower_metric_wins_with_negated_payload() {
    let topologies = topologies([square("1")]);
    let prefix = net!("10.0.1.0/24");
    let mut prefix_state = prefix_state_with_loopbacks(&["a", "b"]);
    prefix_state.update(
        "a",
        "1",
        PrefixUpdate::Incremental {
            add: vec![bgp_entry(prefix, -100)],
            withdraw: vec![],
        },
    );
    prefix_state.update(
        "b",
        "1",
        PrefixUpdate::Incremental {
            add: vec![bgp_entry(prefix, -50)],
            withdraw: vec![],
        },
    );

    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    let route_db = route_db.unwrap();
    let route = &route_db.unicast[&prefix];
    assert_eq!(
        route.nexthops,
        BTreeSet::from([nexthop("s", "b", true, 10, None, false, "1")])
    );
    assert_eq!(route.best_prefix_entry, bgp_entry(prefix, -50));
    assert_eq!(
        route.best_nexthop,
        Some(Nexthop::new(
            IpAddr::V4(loopback_v4("b")),
            None,
            0,
            None,
            false,
            None
        ))
    );
    assert!(!route.do_not_install);
    assert_eq!(stats.best_path_errors, 0);
}

#[test]
fn tie_installs_nothing() {
    let topologies = topologies([square("1")]);
    let prefix = net!("10.0.1.0/24");
    let mut prefix_state = PrefixState::default();
    advertise(
        &mut prefix_state,
        "a",
        "1",
        vec![loopback_entry("a"), bgp_entry(prefix, 100)],
    );
    advertise(
        &mut prefix_state,
        "b",
        "1",
        vec![loopback_entry("b"), bgp_entry(prefix, 100)],
    );

    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    assert!(!route_db.unwrap().unicast.contains_key(&prefix));
    assert_eq!(stats.best_path_errors, 1);
}

#[test]
fn version_mismatch_installs_nothing() {
    let topologies = topologies([square("1")]);
    let prefix = net!("10.0.1.0/24");
    let mut other = bgp_entry(prefix, 50);
    if let Some(mv) = &mut other.metric_vector {
        mv.version = 2;
    }
    let mut prefix_state = PrefixState::default();
    advertise(
        &mut prefix_state,
        "a",
        "1",
        vec![loopback_entry("a"), bgp_entry(prefix, 100)],
    );
    advertise(
        &mut prefix_state,
        "b",
        "1",
        vec![loopback_entry("b"), other],
    );

    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    assert!(!route_db.unwrap().unicast.contains_key(&prefix));
    assert_eq!(stats.best_path_errors, 1);
}

#[test]
fn igp_metric_breaks_tie() {
    let topologies = topologies([TestTopology::new("1")
        .link("s", "a", 10)
        .link("s", "b", 20)]);
    let prefix = net!("10.0.1.0/24");
    let mut prefix_state = PrefixState::default();
    advertise(
        &mut prefix_state,
        "a",
        "1",
        vec![loopback_entry("a"), bgp_entry(prefix, 100)],
    );
    advertise(
        &mut prefix_state,
        "b",
        "1",
        vec![loopback_entry("b"), bgp_entry(prefix, 100)],
    );

    let mut config = config("s");
    config.bgp_use_igp_metric = true;
    let (route_db, _) = build(config, &topologies, &prefix_state);
    let route_db = route_db.unwrap();
    let route = &route_db.unicast[&prefix];
    assert_eq!(
        route.nexthops,
        BTreeSet::from([nexthop("s", "a", true, 10, None, false, "1")])
    );
    assert_eq!(route.best_nexthop.as_ref().map(|nh| nh.metric), Some(10));
}

#[test]
fn local_node_wins() {
    let topologies = topologies([square("1")]);
    let prefix = net!("10.0.1.0/24");
    let mut prefix_state = prefix_state_with_loopbacks(&["s", "a"]);
    advertise(
        &mut prefix_state,
        "s",
        "1",
        vec![loopback_entry("s"), bgp_entry(prefix, 200)],
    );
    advertise(
        &mut prefix_state,
        "a",
        "1",
        vec![loopback_entry("a"), bgp_entry(prefix, 100)],
    );

    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    assert!(!route_db.unwrap().unicast.contains_key(&prefix));
    assert_eq!(stats.best_path_errors, 0);
}

#[test]
fn missing_loopback() {
    let topologies = topologies([square("1")]);
    let prefix = net!("10.0.1.0/24");
    let mut prefix_state = PrefixState::default();
    advertise(&mut prefix_state, "a", "1", vec![bgp_entry(prefix, 100)]);

    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    assert!(route_db.unwrap().unicast.is_empty());
    assert_eq!(stats.missing_loopback_addr, 1);
}

#[test]
fn unreachable_advertiser() {
    let topologies = topologies([square("1").node("z")]);
    let prefix = net!("10.0.1.0/24");
    let mut prefix_state = PrefixState::default();
    advertise(&mut prefix_state, "z", "1", vec![bgp_entry(prefix, 100)]);

    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    assert!(route_db.unwrap().unicast.is_empty());
    assert_eq!(stats.no_route_to_prefix, 1);
    assert_eq!(stats.best_path_errors, 0);
}

#[test]
fn missing_metric_vector() {
    let topologies = topologies([square("1")]);
    let prefix = net!("10.0.1.0/24");
    let mut prefix_state = PrefixState::default();
    advertise(
        &mut prefix_state,
        "a",
        "1",
        vec![PrefixEntry::new(prefix, PrefixType::Bgp)],
    );

    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    assert!(route_db.unwrap().unicast.is_empty());
    assert_eq!(stats.skipped_unicast_route, 1);
}

#[test]
fn igp_cost_entity_rejected() {
    let topologies = topologies([square("1")]);
    let prefix = net!("10.0.1.0/24");
    let mut prefix_entry = bgp_entry(prefix, 100);
    prefix_entry.metric_vector = Some(MetricVector::new(
        1,
        vec![MetricEntity::new(
            MetricVector::IGP_COST_TYPE,
            MetricVector::IGP_COST_PRIORITY,
            CompareType::WinIfNotPresent,
            false,
            vec![-10],
        )],
    ));
    let mut prefix_state = PrefixState::default();
    advertise(
        &mut prefix_state,
        "a",
        "1",
        vec![loopback_entry("a"), prefix_entry],
    );

    let (route_db, stats) = build(config("s"), &topologies, &prefix_state);
    assert!(!route_db.unwrap().unicast.contains_key(&prefix));
    assert_eq!(stats.best_path_errors, 1);
}

#[test]
fn dry_run() {
    let topologies = topologies([square("1")]);
    let prefix = net!("10.0.1.0/24");
    let mut prefix_state = PrefixState::default();
    advertise(
        &mut prefix_state,
        "d",
        "1",
        vec![loopback_entry("d"), bgp_entry(prefix, 100)],
    );

    let mut config = config("s");
    config.bgp_dry_run = true;
    let (route_db, _) = build(config, &topologies, &prefix_state);
    let route_db = route_db.unwrap();
    let route = &route_db.unicast[&prefix];
    assert!(route.do_not_install);
    assert_eq!(route.nexthops.len(), 2);
    // The IGP distance isn't tracked unless it takes part in the selection.
    assert_eq!(route.best_nexthop.as_ref().map(|nh| nh.metric), Some(0));
}
