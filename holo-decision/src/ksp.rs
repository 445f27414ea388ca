//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeSet, VecDeque};

use holo_utils::ip::{AddressFamily, IpNetworkExt};
use holo_utils::mpls::Label;
use ipnetwork::IpNetwork;
use tracing::debug;

use crate::bestpath::BestPaths;
use crate::error::Error;
use crate::prefix::{ForwardingAlgorithm, PrefixEntries, PrefixState};
use crate::route::{MplsAction, Nexthop, UnicastRoute};
use crate::solver::Statistics;
use crate::static_route::StaticRoutes;
use crate::topology::{Path, Topologies, Topology};

// ===== global functions =====

// Builds a source-routed route over the two shortest edge-disjoint paths
// toward each winning node.
pub(crate) fn build_ksp2_route<T: Topology>(
    local_node: &str,
    prefix: &IpNetwork,
    entries: &PrefixEntries,
    bp: &BestPaths,
    has_bgp: bool,
    algorithm: ForwardingAlgorithm,
    bgp_dry_run: bool,
    topologies: &Topologies<T>,
    prefix_state: &PrefixState,
    static_routes: &StaticRoutes,
    stats: &mut Statistics,
) -> Option<UnicastRoute> {
    let (best_node, best_area) = bp.best.as_ref()?;
    let af = prefix.address_family();

    // Collect the candidate paths.
    let mut paths: Vec<Path> = vec![];
    let mut local_included = false;
    for topology in topologies.values() {
        for node in &bp.nodes {
            if node == local_node {
                local_included = true;
                continue;
            }
            paths.extend(topology.kth_paths(local_node, node, 1));
        }

        if algorithm == ForwardingAlgorithm::Ksp2EdEcmp {
            // Second shortest paths are discarded when they contain one of
            // the shortest paths, which happens for anycast destinations.
            let first_count = paths.len();
            for node in bp.nodes.iter().filter(|node| *node != local_node) {
                for path in topology.kth_paths(local_node, node, 2) {
                    if !paths[..first_count]
                        .iter()
                        .any(|first| path_contains(&path, first))
                    {
                        paths.push(path);
                    }
                }
            }
        }
    }
    if paths.is_empty() {
        Error::NoRouteToPrefix(*prefix).log();
        stats.no_route_to_prefix += 1;
        return None;
    }

    let mut nexthops = BTreeSet::new();
    for path in &paths {
        if let Some(nexthop) = path_nexthop(path, af, entries, topologies) {
            nexthops.insert(nexthop);
        }
    }
    let dynamic_count = nexthops.len();

    // The local node forwards anycast traffic using the static next-hops
    // bound to its prepend label.
    if local_included
        && let Some((area, entry)) = entries
            .get(local_node)
            .and_then(|areas| areas.iter().next())
        && let Some(label) = entry.prepend_label.and_then(Label::from_raw)
    {
        match static_routes.mpls.get(&label) {
            Some(static_nexthops) => {
                for nexthop in static_nexthops {
                    let mut nexthop = nexthop.clone();
                    nexthop.non_shortest = true;
                    nexthop.area = Some(area.clone());
                    nexthops.insert(nexthop);
                }
            }
            None => {
                Error::MissingStaticNexthops(*prefix, label).log();
            }
        }
    }

    // Enforce the minimum number of dynamic next-hops.
    let min_nexthop = bp
        .nodes
        .iter()
        .filter_map(|node| entries.get(node))
        .flat_map(|areas| areas.values())
        .filter_map(|entry| entry.min_nexthop)
        .max();
    if let Some(min_nexthop) = min_nexthop
        && min_nexthop > dynamic_count as u64
    {
        Error::MinNexthopUnmet(*prefix, dynamic_count, min_nexthop).log();
        stats.min_nexthop_unmet += 1;
        return None;
    }

    if nexthops.is_empty() {
        return None;
    }

    let best_entry = entries.get(best_node)?.get(best_area)?.clone();
    let mut route =
        UnicastRoute::new(*prefix, nexthops, best_entry, best_area.clone());
    if has_bgp {
        let mut vias = prefix_state.loopback_vias(
            [best_node],
            af,
            bp.best_igp_metric,
        );
        if vias.len() == 1 {
            route.best_nexthop = vias.pop();
        }
        route.do_not_install = bgp_dry_run;
    }

    Some(route)
}

// ===== helper functions =====

// Builds the next-hop corresponding to a source-routed path.
//
// The first hop's label is omitted, so the first hop doesn't need a valid
// label. The destination's prepend label, if any, goes at the bottom of the
// stack.
fn path_nexthop<T: Topology>(
    path: &Path,
    af: AddressFamily,
    entries: &PrefixEntries,
    topologies: &Topologies<T>,
) -> Option<Nexthop> {
    let first = path.first()?;
    let topology = topologies.get(&first.area)?;

    let mut labels = VecDeque::new();
    let mut cost = 0;
    for (hop, link) in path.iter().enumerate() {
        cost += link.metric;

        // The first hop's label is popped by the local node.
        if hop == 0 {
            continue;
        }
        let node = &link.remote_node;
        let Some(label) = topology.valid_node_label(node) else {
            debug!(%node, "skipping path through node without valid label");
            return None;
        };
        labels.push_front(label);
    }

    let dest = &path.last()?.remote_node;
    if let Some(label) = entries
        .get(dest)
        .and_then(|areas| areas.get(&first.area))
        .and_then(|entry| entry.prepend_label)
        .and_then(Label::from_raw)
    {
        labels.push_front(label);
    }

    let mpls_action = (!labels.is_empty())
        .then(|| MplsAction::Push(labels.into_iter().collect()));
    Nexthop::from_link(first, af, cost, mpls_action, true)
}

// Returns true if `path` contains `other` as a contiguous sub-path.
pub(crate) fn path_contains(path: &Path, other: &Path) -> bool {
    if other.is_empty() || other.len() > path.len() {
        return false;
    }
    path.windows(other.len()).any(|window| window == other.as_slice())
}

// ===== unit tests =====
