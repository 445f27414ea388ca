//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod prefix_state;
mod route;

use std::net::IpAddr;

use holo_decision::config::DecisionCfg;
use holo_decision::metric_vector::{CompareType, MetricEntity, MetricVector};
use holo_decision::prefix::{
    PrefixEntry, PrefixState, PrefixType, PrefixUpdate,
};
use holo_decision::route::{MplsAction, Nexthop};
use holo_decision::topology::{Metric, Topologies, Topology};
use ipnetwork::IpNetwork;

use crate::topology::{TestTopology, addr, ifname, loopback_v4};

//
// Helper functions.
//

fn config(node: &str) -> DecisionCfg {
    DecisionCfg {
        node_name: node.to_owned(),
        ..Default::default()
    }
}

fn topologies(
    topologies: impl IntoIterator<Item = TestTopology>,
) -> Topologies<TestTopology> {
    topologies
        .into_iter()
        .map(|topology| (topology.area().to_owned(), topology))
        .collect()
}

// Square topology:
//
//   s --10-- a
//   |        |
//   10       10
//   |        |
//   b --10-- d
fn square(area: &str) -> TestTopology {
    TestTopology::new(area)
        .link("s", "a", 10)
        .link("s", "b", 10)
        .link("a", "d", 10)
        .link("b", "d", 10)
}

fn entry(prefix: IpNetwork) -> PrefixEntry {
    PrefixEntry::new(prefix, PrefixType::Default)
}

// BGP advertisement with a single-entity metric vector. Higher payloads are
// preferred.
fn bgp_entry(prefix: IpNetwork, payload: i64) -> PrefixEntry {
    let mut entry = PrefixEntry::new(prefix, PrefixType::Bgp);
    entry.metric_vector = Some(MetricVector::new(
        1,
        vec![MetricEntity::new(
            1,
            100,
            CompareType::WinIfPresent,
            false,
            vec![payload],
        )],
    ));
    entry
}

fn loopback_entry(node: &str) -> PrefixEntry {
    let prefix = IpNetwork::new(IpAddr::V4(loopback_v4(node)), 32).unwrap();
    PrefixEntry::new(prefix, PrefixType::Loopback)
}

fn advertise(
    prefix_state: &mut PrefixState,
    node: &str,
    area: &str,
    entries: Vec<PrefixEntry>,
) {
    prefix_state.update(node, area, PrefixUpdate::Full(entries));
}

// Expected next-hop over the link between two nodes.
fn nexthop(
    from: &str,
    to: &str,
    v4: bool,
    metric: Metric,
    mpls_action: Option<MplsAction>,
    non_shortest: bool,
    area: &str,
) -> Nexthop {
    Nexthop::new(
        addr(to, v4),
        Some(ifname(from, to)),
        metric,
        mpls_action,
        non_shortest,
        Some(area.to_owned()),
    )
}
