//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};

use holo_utils::ip::AddressFamily;
use holo_utils::mpls::Label;
use itertools::Itertools;

use crate::route::{MplsAction, Nexthop};
use crate::topology::{Metric, SpfResult, Topologies, Topology};

// Neighbor (and optionally destination) usable as first hop, along with the
// remaining distance from that neighbor.
pub type NexthopNodes = BTreeMap<NexthopKey, Metric>;

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct NexthopKey {
    pub neighbor: String,
    // Set when next-hops are computed per destination.
    pub dest: Option<String>,
}

// ===== global functions =====

// Computes the first-hop neighbors toward the closest of the given
// destinations.
//
// Returns the shortest distance along with each usable neighbor's remaining
// distance. When LFA is enabled, loop-free alternate neighbors are included
// as well.
pub fn nexthops_with_metric<T: Topology>(
    local_node: &str,
    dst_nodes: &BTreeSet<String>,
    per_destination: bool,
    compute_lfa: bool,
    topologies: &Topologies<T>,
) -> (Metric, NexthopNodes) {
    let mut shortest_metric = Metric::MAX;
    let mut nexthop_nodes = NexthopNodes::new();

    for topology in topologies.values() {
        let spf = topology.spf_result(local_node);

        // Find the closest destinations in this area.
        let (min_metric, min_nodes) = min_cost_nodes(&spf, dst_nodes);
        if shortest_metric < min_metric {
            continue;
        }
        if shortest_metric > min_metric {
            shortest_metric = min_metric;
            nexthop_nodes.clear();
        }
        if min_nodes.is_empty() {
            continue;
        }

        for dst in &min_nodes {
            let Some(spf_dst) = spf.get(dst) else {
                continue;
            };
            for neighbor in &spf_dst.nexthops {
                let Some(local_metric) =
                    topology.metric_between(local_node, neighbor)
                else {
                    continue;
                };
                let key = NexthopKey {
                    neighbor: neighbor.clone(),
                    dest: per_destination.then(|| dst.clone()),
                };
                nexthop_nodes
                    .insert(key, shortest_metric.saturating_sub(local_metric));
            }
        }

        if compute_lfa {
            lfa_nexthops(
                local_node,
                dst_nodes,
                per_destination,
                shortest_metric,
                topology,
                &mut nexthop_nodes,
            );
        }
    }

    (shortest_metric, nexthop_nodes)
}

// Turns neighbor-level next-hops into concrete forwarding next-hops over the
// local links.
//
// Only links in the given areas are considered. Unless LFA is enabled, only
// links that are part of a shortest path are used.
pub fn materialize_nexthops<T: Topology>(
    local_node: &str,
    dst_nodes: &BTreeSet<String>,
    af: AddressFamily,
    per_destination: bool,
    min_metric: Metric,
    nexthop_nodes: &NexthopNodes,
    swap_label: Option<Label>,
    compute_lfa: bool,
    areas: &BTreeSet<String>,
    topologies: &Topologies<T>,
) -> BTreeSet<Nexthop> {
    assert!(!nexthop_nodes.is_empty(), "empty next-hop candidate set");

    let dests = match per_destination {
        true => dst_nodes.iter().map(Some).collect::<Vec<_>>(),
        false => vec![None],
    };

    let mut nexthops = BTreeSet::new();
    for (area, topology) in topologies {
        if !areas.contains(area) {
            continue;
        }

        for link in topology.links_from(local_node) {
            if !link.up {
                continue;
            }
            let neighbor = &link.remote_node;

            for dest in &dests {
                let key = NexthopKey {
                    neighbor: neighbor.clone(),
                    dest: dest.cloned(),
                };
                let Some(residual) = nexthop_nodes.get(&key) else {
                    continue;
                };

                // Per-destination next-hops never transit another
                // destination.
                if let Some(dest) = dest
                    && dst_nodes.contains(neighbor)
                    && neighbor != *dest
                {
                    continue;
                }

                let distance = link.metric.saturating_add(*residual);
                if !compute_lfa && distance != min_metric {
                    continue;
                }

                let mut mpls_action = None;
                if let Some(swap_label) = swap_label {
                    mpls_action = match dst_nodes.contains(neighbor) {
                        true => Some(MplsAction::Php),
                        false => Some(MplsAction::Swap(swap_label)),
                    };
                }
                if let Some(dest) = dest
                    && *dest != neighbor
                {
                    let Some(label) = topology.valid_node_label(dest) else {
                        continue;
                    };
                    assert!(mpls_action.is_none());
                    mpls_action = Some(MplsAction::Push(vec![label]));
                }

                if let Some(nexthop) = Nexthop::from_link(
                    &link,
                    af,
                    distance,
                    mpls_action,
                    distance != min_metric,
                ) {
                    nexthops.insert(nexthop);
                }
            }
        }
    }

    nexthops
}

// ===== helper functions =====

fn min_cost_nodes(
    spf: &SpfResult,
    dst_nodes: &BTreeSet<String>,
) -> (Metric, BTreeSet<String>) {
    let min_nodes = dst_nodes
        .iter()
        .filter_map(|node| spf.get(node).map(|spf_node| (node, spf_node.metric)))
        .min_set_by_key(|(_, metric)| *metric);
    let metric = min_nodes
        .first()
        .map(|(_, metric)| *metric)
        .unwrap_or(Metric::MAX);
    let nodes = min_nodes
        .into_iter()
        .map(|(node, _)| node.clone())
        .collect();
    (metric, nodes)
}

// Adds loop-free alternate neighbors (RFC 5286).
//
// A neighbor qualifies when its distance to a destination is strictly lower
// than going back through the local node.
fn lfa_nexthops<T: Topology>(
    local_node: &str,
    dst_nodes: &BTreeSet<String>,
    per_destination: bool,
    shortest_metric: Metric,
    topology: &T,
    nexthop_nodes: &mut NexthopNodes,
) {
    for link in topology.links_from(local_node) {
        if !link.up {
            continue;
        }
        let neighbor = &link.remote_node;
        let spf_neighbor = topology.spf_result(neighbor);
        let Some(neighbor_to_local) =
            spf_neighbor.get(local_node).map(|node| node.metric)
        else {
            continue;
        };

        for dst in dst_nodes {
            let Some(distance) = spf_neighbor.get(dst).map(|node| node.metric)
            else {
                continue;
            };
            if distance >= shortest_metric.saturating_add(neighbor_to_local) {
                continue;
            }
            let key = NexthopKey {
                neighbor: neighbor.clone(),
                dest: per_destination.then(|| dst.clone()),
            };
            nexthop_nodes
                .entry(key)
                .and_modify(|metric| *metric = (*metric).min(distance))
                .or_insert(distance);
        }
    }
}
