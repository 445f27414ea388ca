//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use holo_utils::ip::{AddressFamily, IpNetworkExt};
use holo_utils::mpls::Label;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::bestpath::{BestPaths, select_best_paths};
use crate::config::DecisionCfg;
use crate::debug::Debug;
use crate::error::Error;
use crate::ksp::build_ksp2_route;
use crate::nexthop::{materialize_nexthops, nexthops_with_metric};
use crate::prefix::{
    ForwardingAlgorithm, ForwardingType, PrefixEntries, PrefixState,
    PrefixType,
};
use crate::route::{MplsAction, MplsRoute, Nexthop, RouteDb, UnicastRoute};
use crate::static_route::{StaticRouteStore, StaticRoutes};
use crate::topology::{Topologies, Topology, has_node};

// Route computation engine.
#[derive(Debug)]
pub struct SpfSolver {
    config: DecisionCfg,
    static_routes: StaticRouteStore,
    pub stats: Statistics,
}

// Route computation method used for a prefix.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum RouteFamily {
    // Link-state equal-cost multipath.
    Native,
    // Metric-vector best path selection with equal-cost multipath.
    Bgp,
    // Segment-routed k-shortest paths.
    Ksp2,
}

// Route computation statistics.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Statistics {
    pub discontinuity_time: DateTime<Utc>,
    pub route_build_runs: u64,
    pub last_build_duration: Option<Duration>,
    pub skipped_unicast_route: u64,
    pub skipped_mpls_route: u64,
    pub duplicate_node_label: u64,
    pub no_route_to_prefix: u64,
    pub no_route_to_label: u64,
    pub missing_loopback_addr: u64,
    pub incompatible_forwarding_type: u64,
    pub min_nexthop_unmet: u64,
    pub best_path_errors: u64,
    pub adj_db_update: u64,
    pub prefix_db_update: u64,
}

// ===== impl SpfSolver =====

impl SpfSolver {
    pub fn new(config: DecisionCfg) -> SpfSolver {
        SpfSolver {
            config,
            static_routes: Default::default(),
            stats: Default::default(),
        }
    }

    pub fn config(&self) -> &DecisionCfg {
        &self.config
    }

    pub fn static_routes(&self) -> &StaticRoutes {
        self.static_routes.routes()
    }

    pub fn static_routes_store_mut(&mut self) -> &mut StaticRouteStore {
        &mut self.static_routes
    }

    // Computes the full route database of the given node.
    //
    // Returns `None` if the node isn't part of any area.
    pub fn build_route_db<T: Topology>(
        &mut self,
        local_node: &str,
        topologies: &Topologies<T>,
        prefix_state: &PrefixState,
    ) -> Option<RouteDb> {
        if !has_node(topologies, local_node) {
            return None;
        }

        Debug::RouteBuildStart(local_node).log();
        let start = Instant::now();
        let mut route_db = RouteDb::default();

        // Unicast routes.
        for (prefix, entries) in prefix_state.prefixes() {
            if let Some(route) = self.build_unicast_route(
                local_node,
                prefix,
                entries,
                topologies,
                prefix_state,
            ) {
                route_db.unicast.insert(*prefix, route);
            }
        }

        // MPLS routes.
        self.build_node_label_routes(local_node, topologies, &mut route_db);
        self.build_adj_label_routes(local_node, topologies, &mut route_db);

        let elapsed = start.elapsed();
        self.stats.route_build_runs += 1;
        self.stats.last_build_duration = Some(elapsed);
        Debug::RouteBuildFinish(&route_db, elapsed).log();

        Some(route_db)
    }

    fn build_unicast_route<T: Topology>(
        &mut self,
        local_node: &str,
        prefix: &IpNetwork,
        entries: &PrefixEntries,
        topologies: &Topologies<T>,
        prefix_state: &PrefixState,
    ) -> Option<UnicastRoute> {
        // Classify the advertisements.
        let mut has_bgp = false;
        let mut has_non_bgp = false;
        let mut missing_mv = None;
        for (node, areas) in entries {
            for (area, entry) in areas {
                let is_bgp = entry.prefix_type == PrefixType::Bgp;
                has_bgp |= is_bgp;
                has_non_bgp |= !is_bgp;
                if is_bgp && entry.metric_vector.is_none() {
                    missing_mv = Some((node, area));
                }
            }
        }
        if has_bgp && has_non_bgp {
            Error::MixedPrefixTypes(*prefix).log();
            self.stats.skipped_unicast_route += 1;
            return None;
        }
        if let Some((node, area)) = missing_mv {
            Error::MissingMetricVector(*prefix, node.clone(), area.clone())
                .log();
            self.stats.skipped_unicast_route += 1;
            return None;
        }

        // Locally originated prefixes don't need routes.
        if entries.contains_key(local_node) && !has_bgp {
            return None;
        }

        if prefix.address_family() == AddressFamily::Ipv4
            && !self.config.enable_v4
        {
            Error::Ipv4Disabled(*prefix).log();
            self.stats.skipped_unicast_route += 1;
            return None;
        }

        // The lowest common denominator of the advertised forwarding
        // parameters is used.
        let forwarding_type = entries
            .values()
            .flat_map(|areas| areas.values())
            .map(|entry| entry.forwarding_type)
            .min()
            .unwrap_or_default();
        let algorithm = entries
            .values()
            .flat_map(|areas| areas.values())
            .map(|entry| entry.forwarding_algorithm)
            .min()
            .unwrap_or_default();

        // Segment-routed prefixes always use source-routed paths, the
        // algorithm only selecting how many paths are used per destination.
        let family = match (forwarding_type, algorithm) {
            (ForwardingType::SrMpls, _) => RouteFamily::Ksp2,
            (ForwardingType::Ip, ForwardingAlgorithm::Ksp2EdEcmp) => {
                Error::IncompatibleForwardingType(*prefix).log();
                self.stats.incompatible_forwarding_type += 1;
                return None;
            }
            (ForwardingType::Ip, ForwardingAlgorithm::SpEcmp) if has_bgp => {
                RouteFamily::Bgp
            }
            (ForwardingType::Ip, ForwardingAlgorithm::SpEcmp) => {
                RouteFamily::Native
            }
        };

        match family {
            RouteFamily::Native => {
                self.build_ecmp_route(local_node, prefix, entries, topologies)
            }
            RouteFamily::Bgp => self.build_ecmp_bgp_route(
                local_node,
                prefix,
                entries,
                topologies,
                prefix_state,
            ),
            RouteFamily::Ksp2 => {
                let bp = select_best_paths(
                    local_node,
                    prefix,
                    entries,
                    has_bgp,
                    true,
                    self.config.bgp_use_igp_metric,
                    topologies,
                    &mut self.stats,
                )?;
                if bp.nodes.is_empty() {
                    Error::NoRouteToPrefix(*prefix).log();
                    self.stats.no_route_to_prefix += 1;
                    return None;
                }
                build_ksp2_route(
                    local_node,
                    prefix,
                    entries,
                    &bp,
                    has_bgp,
                    algorithm,
                    self.config.bgp_dry_run,
                    topologies,
                    prefix_state,
                    self.static_routes.routes(),
                    &mut self.stats,
                )
            }
        }
    }

    // Builds an equal-cost multipath route toward the closest advertisers.
    fn build_ecmp_route<T: Topology>(
        &mut self,
        local_node: &str,
        prefix: &IpNetwork,
        entries: &PrefixEntries,
        topologies: &Topologies<T>,
    ) -> Option<UnicastRoute> {
        let bp = select_best_paths(
            local_node,
            prefix,
            entries,
            false,
            false,
            false,
            topologies,
            &mut self.stats,
        )?;
        let Some((best_node, best_area)) = bp.best.clone() else {
            Error::NoRouteToPrefix(*prefix).log();
            self.stats.no_route_to_prefix += 1;
            return None;
        };

        let nexthops =
            self.ecmp_nexthops(local_node, prefix, &bp, topologies)?;

        let best_entry = entries.get(&best_node)?.get(&best_area)?.clone();
        Some(UnicastRoute::new(*prefix, nexthops, best_entry, best_area))
    }

    // Builds an equal-cost multipath route toward the best BGP advertisers.
    fn build_ecmp_bgp_route<T: Topology>(
        &mut self,
        local_node: &str,
        prefix: &IpNetwork,
        entries: &PrefixEntries,
        topologies: &Topologies<T>,
        prefix_state: &PrefixState,
    ) -> Option<UnicastRoute> {
        let bp = select_best_paths(
            local_node,
            prefix,
            entries,
            true,
            false,
            self.config.bgp_use_igp_metric,
            topologies,
            &mut self.stats,
        )?;
        let (best_node, best_area) = bp.best.clone()?;

        let mut vias = prefix_state.loopback_vias(
            [&best_node],
            prefix.address_family(),
            bp.best_igp_metric,
        );
        if vias.len() != 1 {
            Error::MissingLoopbackAddr(*prefix, best_node).log();
            self.stats.missing_loopback_addr += 1;
            return None;
        }

        let nexthops =
            self.ecmp_nexthops(local_node, prefix, &bp, topologies)?;

        let best_entry = entries.get(&best_node)?.get(&best_area)?.clone();
        let mut route =
            UnicastRoute::new(*prefix, nexthops, best_entry, best_area);
        route.best_nexthop = vias.pop();
        route.do_not_install = self.config.bgp_dry_run;
        Some(route)
    }

    fn ecmp_nexthops<T: Topology>(
        &mut self,
        local_node: &str,
        prefix: &IpNetwork,
        bp: &BestPaths,
        topologies: &Topologies<T>,
    ) -> Option<BTreeSet<Nexthop>> {
        let lfa = self.config.compute_lfa_paths;
        let (min_metric, nexthop_nodes) = nexthops_with_metric(
            local_node,
            &bp.nodes,
            false,
            lfa,
            topologies,
        );
        if nexthop_nodes.is_empty() {
            Error::NoRouteToPrefix(*prefix).log();
            self.stats.no_route_to_prefix += 1;
            return None;
        }

        let nexthops = materialize_nexthops(
            local_node,
            &bp.nodes,
            prefix.address_family(),
            false,
            min_metric,
            &nexthop_nodes,
            None,
            lfa,
            &bp.areas,
            topologies,
        );
        (!nexthops.is_empty()).then_some(nexthops)
    }

    // Builds one route per node segment label.
    //
    // When several nodes advertise the same label, the node with the
    // greatest name wins. A label keeps its previous route when the winner
    // can't be reached.
    fn build_node_label_routes<T: Topology>(
        &mut self,
        local_node: &str,
        topologies: &Topologies<T>,
        route_db: &mut RouteDb,
    ) {
        let mut label_routes = BTreeMap::<Label, (String, MplsRoute)>::new();

        for (area, topology) in topologies {
            for node in topology.nodes() {
                let Some(raw_label) = topology.node_label(&node) else {
                    continue;
                };
                if raw_label == 0 {
                    continue;
                }
                let Some(label) = topology.valid_label(raw_label) else {
                    Error::InvalidNodeLabel(node.clone(), raw_label).log();
                    self.stats.skipped_mpls_route += 1;
                    continue;
                };

                // Resolve label collisions.
                if let Some((owner, _)) = label_routes.get(&label)
                    && *owner != node
                {
                    self.stats.duplicate_node_label += 1;
                    if *owner > node {
                        Error::DuplicateNodeLabel(label, owner.clone(), node)
                            .log();
                        continue;
                    }
                    Error::DuplicateNodeLabel(label, node.clone(), owner.clone())
                        .log();
                }

                // Labels terminating on the local node.
                if node == local_node {
                    let nexthops = [Nexthop::pop_and_lookup(area)].into();
                    let route = MplsRoute::new(label, nexthops);
                    label_routes.insert(label, (node, route));
                    continue;
                }

                let dst_nodes = BTreeSet::from([node.clone()]);
                let (min_metric, nexthop_nodes) = nexthops_with_metric(
                    local_node,
                    &dst_nodes,
                    false,
                    self.config.compute_lfa_paths,
                    topologies,
                );
                let nexthops = match nexthop_nodes.is_empty() {
                    true => BTreeSet::new(),
                    false => materialize_nexthops(
                        local_node,
                        &dst_nodes,
                        AddressFamily::Ipv6,
                        false,
                        min_metric,
                        &nexthop_nodes,
                        Some(label),
                        self.config.compute_lfa_paths,
                        &BTreeSet::from([area.clone()]),
                        topologies,
                    ),
                };
                if nexthops.is_empty() {
                    Error::NoRouteToLabel(label, node.clone()).log();
                    self.stats.no_route_to_label += 1;
                    continue;
                }
                let route = MplsRoute::new(label, nexthops);
                label_routes.insert(label, (node, route));
            }
        }

        route_db.mpls.extend(
            label_routes
                .into_iter()
                .map(|(label, (_, route))| (label, route)),
        );
    }

    // Builds one penultimate-hop-popping route per local adjacency label.
    fn build_adj_label_routes<T: Topology>(
        &mut self,
        local_node: &str,
        topologies: &Topologies<T>,
        route_db: &mut RouteDb,
    ) {
        for topology in topologies.values() {
            for link in topology.links_from(local_node) {
                let Some(label) = link.adj_label else {
                    continue;
                };
                if label == 0 {
                    continue;
                }
                let Some(label) = topology.valid_label(label) else {
                    Error::InvalidAdjacencyLabel(link.ifname.clone(), label)
                        .log();
                    self.stats.skipped_mpls_route += 1;
                    continue;
                };

                let Some(nexthop) = Nexthop::from_link(
                    &link,
                    AddressFamily::Ipv6,
                    link.metric,
                    Some(MplsAction::Php),
                    false,
                ) else {
                    continue;
                };
                route_db
                    .mpls
                    .entry(label)
                    .or_insert_with(|| MplsRoute::new(label, [nexthop].into()));
            }
        }
    }
}

// ===== impl Statistics =====

impl Default for Statistics {
    fn default() -> Statistics {
        Statistics {
            discontinuity_time: Utc::now(),
            route_build_runs: 0,
            last_build_duration: None,
            skipped_unicast_route: 0,
            skipped_mpls_route: 0,
            duplicate_node_label: 0,
            no_route_to_prefix: 0,
            no_route_to_label: 0,
            missing_loopback_addr: 0,
            incompatible_forwarding_type: 0,
            min_nexthop_unmet: 0,
            best_path_errors: 0,
            adj_db_update: 0,
            prefix_db_update: 0,
        }
    }
}
