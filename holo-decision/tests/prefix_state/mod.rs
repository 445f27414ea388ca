//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//


use std::collections::BTreeSet;
use std::net::IpAddr;

use const_addrs::{ip4, net};
use holo_decision::prefix::PrefixDatabase;
use holo_utils::ip::AddressFamily;

use super::*;

#[test]
fn changed_prefixes() {
    let mut prefix_state = PrefixState::default();
    let p1 = net!("10.0.1.0/24");
    let p2 = net!("10.0.2.0/24");

    let changed = prefix_state.update(
        "a",
        "1",
        PrefixUpdate::Full(vec![entry(p1), entry(p2)]),
    );
    assert_eq!(changed, BTreeSet::from([p1, p2]));

    // Applying the same advertisement twice changes nothing.
    let changed = prefix_state.update(
        "a",
        "1",
        PrefixUpdate::Full(vec![entry(p1), entry(p2)]),
    );
    assert!(changed.is_empty());

    // Attribute changes are reported.
    let mut modified = entry(p2);
    modified.min_nexthop = Some(2);
    let changed = prefix_state.update(
        "a",
        "1",
        PrefixUpdate::Full(vec![entry(p1), modified.clone()]),
    );
    assert_eq!(changed, BTreeSet::from([p2]));
    assert_eq!(prefix_state.prefixes()[&p2]["a"]["1"], modified);
}

#[test]
fn full_withdrawal() {
    let mut prefix_state = PrefixState::default();
    let p1 = net!("10.0.1.0/24");
    let p2 = net!("10.0.2.0/24");
    advertise(&mut prefix_state, "a", "1", vec![entry(p1), entry(p2)]);
    advertise(&mut prefix_state, "b", "1", vec![entry(p1)]);

    let changed = prefix_state.update("a", "1", PrefixUpdate::Full(vec![]));
    assert_eq!(changed, BTreeSet::from([p1, p2]));

    // The prefix stays while other nodes advertise it.
    let prefixes = prefix_state.prefixes();
    assert!(!prefixes.contains_key(&p2));
    assert_eq!(
        prefixes[&p1].keys().collect::<Vec<_>>(),
        vec![&"b".to_owned()]
    );

    let changed = prefix_state.update("b", "1", PrefixUpdate::Full(vec![]));
    assert_eq!(changed, BTreeSet::from([p1]));
    assert!(prefix_state.prefixes().is_empty());
    assert!(prefix_state.prefix_databases().is_empty());
}

#[test]
fn withdrawal_per_area() {
    let mut prefix_state = PrefixState::default();
    let p1 = net!("10.0.1.0/24");
    advertise(&mut prefix_state, "a", "1", vec![entry(p1)]);
    advertise(&mut prefix_state, "a", "2", vec![entry(p1)]);

    let changed = prefix_state.update("a", "2", PrefixUpdate::Full(vec![]));
    assert_eq!(changed, BTreeSet::from([p1]));
    assert_eq!(
        prefix_state.prefixes()[&p1]["a"].keys().collect::<Vec<_>>(),
        vec![&"1".to_owned()]
    );
}

#[test]
fn incremental_update() {
    let mut prefix_state = PrefixState::default();
    let p1 = net!("10.0.1.0/24");
    let p2 = net!("10.0.2.0/24");
    let p3 = net!("10.0.3.0/24");
    advertise(&mut prefix_state, "a", "1", vec![entry(p1), entry(p2)]);

    let changed = prefix_state.update(
        "a",
        "1",
        PrefixUpdate::Incremental {
            add: vec![entry(p3)],
            withdraw: vec![p1],
        },
    );
    assert_eq!(changed, BTreeSet::from([p1, p3]));
    assert_eq!(
        prefix_state.prefixes().keys().copied().collect::<Vec<_>>(),
        vec![p2, p3]
    );

    // Withdrawing an unknown prefix is a no-op.
    let changed = prefix_state.update(
        "a",
        "1",
        PrefixUpdate::Incremental {
            add: vec![],
            withdraw: vec![net!("10.0.9.0/24")],
        },
    );
    assert!(changed.is_empty());
}

#[test]
fn loopback_index() {
    let mut prefix_state = PrefixState::default();
    let lo4 = net!("192.168.0.1/32");
    let lo6 = net!("2001:db8::1/128");
    let not_host = net!("192.168.1.0/24");
    advertise(
        &mut prefix_state,
        "a",
        "1",
        vec![
            PrefixEntry::new(lo4, PrefixType::Loopback),
            PrefixEntry::new(lo6, PrefixType::Loopback),
            PrefixEntry::new(not_host, PrefixType::Loopback),
        ],
    );
    assert_eq!(
        prefix_state.loopbacks(AddressFamily::Ipv4).get("a"),
        Some(&IpAddr::V4(ip4!("192.168.0.1")))
    );
    assert_eq!(prefix_state.loopbacks(AddressFamily::Ipv6).len(), 1);

    let vias = prefix_state.loopback_vias(
        [&"a".to_owned(), &"b".to_owned()],
        AddressFamily::Ipv4,
        Some(15),
    );
    assert_eq!(
        vias,
        vec![Nexthop::new(
            IpAddr::V4(ip4!("192.168.0.1")),
            None,
            15,
            None,
            false,
            None
        )]
    );

    // Changing the prefix type drops the loopback.
    advertise(
        &mut prefix_state,
        "a",
        "1",
        vec![
            PrefixEntry::new(lo4, PrefixType::Default),
            PrefixEntry::new(lo6, PrefixType::Loopback),
        ],
    );
    assert!(prefix_state.loopbacks(AddressFamily::Ipv4).is_empty());

    // Withdrawing the prefix drops the loopback.
    advertise(&mut prefix_state, "a", "1", vec![]);
    assert!(prefix_state.loopbacks(AddressFamily::Ipv6).is_empty());
}

#[test]
fn loopback_in_multiple_areas() {
    let mut prefix_state = PrefixState::default();
    let lo4 = net!("192.168.0.1/32");
    let loopback = || PrefixEntry::new(lo4, PrefixType::Loopback);
    let addr = IpAddr::V4(ip4!("192.168.0.1"));
    advertise(&mut prefix_state, "a", "1", vec![loopback()]);
    advertise(&mut prefix_state, "a", "2", vec![loopback()]);

    // The loopback is kept while any area still advertises it.
    advertise(&mut prefix_state, "a", "1", vec![]);
    assert_eq!(
        prefix_state.loopbacks(AddressFamily::Ipv4).get("a"),
        Some(&addr)
    );
    advertise(&mut prefix_state, "a", "1", vec![loopback()]);
    advertise(
        &mut prefix_state,
        "a",
        "2",
        vec![PrefixEntry::new(lo4, PrefixType::Default)],
    );
    assert_eq!(
        prefix_state.loopbacks(AddressFamily::Ipv4).get("a"),
        Some(&addr)
    );

    advertise(&mut prefix_state, "a", "1", vec![]);
    assert!(prefix_state.loopbacks(AddressFamily::Ipv4).is_empty());
}

#[test]
fn prefix_databases() {
    let mut prefix_state = PrefixState::default();
    let p1 = net!("10.0.1.0/24");
    let p2 = net!("10.0.2.0/24");
    advertise(&mut prefix_state, "a", "1", vec![entry(p1), entry(p2)]);
    advertise(&mut prefix_state, "b", "2", vec![entry(p1)]);

    assert_eq!(
        prefix_state.prefix_databases(),
        vec![
            PrefixDatabase {
                node: "a".to_owned(),
                area: "1".to_owned(),
                entries: vec![entry(p1), entry(p2)],
            },
            PrefixDatabase {
                node: "b".to_owned(),
                area: "2".to_owned(),
                entries: vec![entry(p1)],
            },
        ]
    );
}
