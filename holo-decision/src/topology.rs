//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use derive_new::new;
use holo_utils::ip::AddressFamily;
use holo_utils::mpls::Label;
use serde::{Deserialize, Serialize};

pub type Metric = u64;

// Shortest-path results from a given source, indexed by destination node.
pub type SpfResult = BTreeMap<String, SpfNode>;

// Ordered sequence of directed links from a source node.
pub type Path = Vec<Link>;

// Link-state databases, indexed by area.
pub type Topologies<T> = BTreeMap<String, T>;

// Shortest-path information for a single destination.
#[derive(Clone, Debug, Default, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SpfNode {
    // Total cost from the source.
    pub metric: Metric,
    // First-hop neighbors used by the equal-cost shortest paths.
    pub nexthops: BTreeSet<String>,
}

// Directed link, as seen from its local end.
#[derive(Clone, Debug, Eq, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct Link {
    pub area: String,
    pub local_node: String,
    pub remote_node: String,
    // Local interface name.
    pub ifname: String,
    pub metric: Metric,
    // Addresses of the remote end, used as forwarding next-hops.
    pub nexthop_v4: Option<Ipv4Addr>,
    pub nexthop_v6: Option<Ipv6Addr>,
    // Adjacency segment advertised for this link, if any.
    pub adj_label: Option<u32>,
    pub up: bool,
}

// Read-only view of a single area's link-state database.
//
// Shortest-path caching and path search are up to the implementer.
pub trait Topology {
    // Name of the area described by this topology.
    fn area(&self) -> &str;

    // Returns whether the node has an adjacency database in this area.
    fn has_node(&self, node: &str) -> bool;

    // Returns the names of all nodes with an adjacency database.
    fn nodes(&self) -> Vec<String>;

    // Returns the equal-cost shortest paths from the given source.
    fn spf_result(&self, source: &str) -> Arc<SpfResult>;

    // Returns the k-th edge-disjoint shortest paths between two nodes.
    fn kth_paths(&self, source: &str, dest: &str, k: usize) -> Vec<Path>;

    // Returns the raw node segment label advertised by the node.
    fn node_label(&self, node: &str) -> Option<u32>;

    // Returns whether the node is drained (overloaded).
    fn is_node_overloaded(&self, node: &str) -> bool;

    // Returns all links originating from the given node.
    fn links_from(&self, node: &str) -> Vec<Link>;

    // Returns the number of hops between two nodes.
    fn hops_between(&self, a: &str, b: &str) -> Option<u64>;

    // Returns the largest hop distance from any node to the given node.
    fn max_hops_to(&self, node: &str) -> u64;

    // Returns whether a raw label value can be used for forwarding.
    fn is_label_valid(&self, label: u32) -> bool {
        Label::is_valid_raw(label)
    }

    // Converts a raw label value into a label usable for forwarding.
    fn valid_label(&self, label: u32) -> Option<Label> {
        self.is_label_valid(label)
            .then(|| Label::from_raw(label))
            .flatten()
    }

    // Returns the node segment label of the node, if usable for forwarding.
    fn valid_node_label(&self, node: &str) -> Option<Label> {
        self.node_label(node).and_then(|label| self.valid_label(label))
    }

    // Returns the shortest-path cost between two nodes.
    fn metric_between(&self, a: &str, b: &str) -> Option<Metric> {
        self.spf_result(a).get(b).map(|node| node.metric)
    }
}

// ===== impl Link =====

impl Link {
    // Returns the remote address to use as next-hop for the given address
    // family.
    pub fn nexthop(&self, af: AddressFamily) -> Option<IpAddr> {
        match af {
            AddressFamily::Ipv4 => self.nexthop_v4.map(IpAddr::V4),
            AddressFamily::Ipv6 => self.nexthop_v6.map(IpAddr::V6),
        }
    }
}

// ===== global functions =====

// Returns true if the given node is drained in any of the areas.
pub fn is_node_overloaded<T: Topology>(
    topologies: &Topologies<T>,
    node: &str,
) -> bool {
    topologies
        .values()
        .any(|topology| topology.is_node_overloaded(node))
}

// Returns true if the local node is part of at least one area.
pub fn has_node<T: Topology>(topologies: &Topologies<T>, node: &str) -> bool {
    topologies.values().any(|topology| topology.has_node(node))
}
