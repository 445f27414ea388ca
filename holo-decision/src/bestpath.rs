//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use ipnetwork::IpNetwork;

use crate::error::Error;
use crate::metric_vector::{CompareResult, MetricVector};
use crate::prefix::PrefixEntries;
use crate::solver::Statistics;
use crate::topology::{Topologies, Topology, is_node_overloaded};

// Outcome of best path selection for a prefix.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BestPaths {
    // Nodes announcing the best advertisement.
    pub nodes: BTreeSet<String>,
    pub areas: BTreeSet<String>,
    // Representative (node, area) of the winning set.
    pub best: Option<(String, String)>,
    pub best_vector: Option<MetricVector>,
    // Smallest IGP distance to a winning node, only tracked when the IGP
    // metric takes part in the selection.
    pub best_igp_metric: Option<i64>,
}

// ===== impl BestPaths =====

impl BestPaths {
    pub fn best_node(&self) -> Option<&str> {
        self.best.as_ref().map(|(node, _)| node.as_str())
    }

    pub fn best_area(&self) -> Option<&str> {
        self.best.as_ref().map(|(_, area)| area.as_str())
    }
}

// ===== global functions =====

// Selects the nodes whose advertisements of the prefix should be used for
// forwarding.
//
// Returns `None` when no route should be built for the prefix, either
// because the local node originates it or because selection failed.
pub(crate) fn select_best_paths<T: Topology>(
    local_node: &str,
    prefix: &IpNetwork,
    entries: &PrefixEntries,
    has_bgp: bool,
    use_ksp2: bool,
    use_igp_metric: bool,
    topologies: &Topologies<T>,
    stats: &mut Statistics,
) -> Option<BestPaths> {
    if !has_bgp {
        // Locally originated prefixes don't need routes.
        if entries.contains_key(local_node) {
            return None;
        }
        let bp = select_native(local_node, entries, topologies);
        return Some(filter_drained(bp, topologies));
    }

    let bp = match select_bgp(
        local_node,
        prefix,
        entries,
        use_igp_metric,
        topologies,
    ) {
        Ok(bp) => bp,
        Err(error) => {
            error.log();
            stats.best_path_errors += 1;
            return None;
        }
    };
    if bp.nodes.is_empty() {
        Error::NoRouteToPrefix(*prefix).log();
        stats.no_route_to_prefix += 1;
        return None;
    }

    if !use_ksp2 {
        // The local node won, so the prefix is reached locally.
        if bp.nodes.contains(local_node) {
            return None;
        }
        return Some(filter_drained(bp, topologies));
    }

    // With KSP2, the local node may take part in anycast forwarding as long
    // as it advertises a label to prepend.
    let local_label = entries.get(local_node).is_some_and(|areas| {
        areas.values().any(|entry| entry.prepend_label.is_some())
    });
    if !bp.nodes.contains(local_node) || (bp.nodes.len() > 1 && local_label) {
        return Some(filter_drained(bp, topologies));
    }

    None
}

// Removes drained nodes from the winning set.
//
// If every winner is drained, the set is left untouched so that traffic can
// still be delivered.
pub(crate) fn filter_drained<T: Topology>(
    mut bp: BestPaths,
    topologies: &Topologies<T>,
) -> BestPaths {
    let filtered = bp
        .nodes
        .iter()
        .filter(|node| !is_node_overloaded(topologies, node))
        .cloned()
        .collect::<BTreeSet<_>>();
    if !filtered.is_empty() {
        bp.nodes = filtered;
    }
    bp
}

// ===== helper functions =====

// Native advertisements are equal-preference: every reachable advertiser is
// a winner.
fn select_native<T: Topology>(
    local_node: &str,
    entries: &PrefixEntries,
    topologies: &Topologies<T>,
) -> BestPaths {
    let mut bp = BestPaths::default();
    for (node, areas) in entries {
        for area in areas.keys() {
            let Some(topology) = topologies.get(area) else {
                continue;
            };
            if !topology.spf_result(local_node).contains_key(node) {
                continue;
            }
            if bp.best.is_none() {
                bp.best = Some((node.clone(), area.clone()));
            }
            bp.nodes.insert(node.clone());
            bp.areas.insert(area.clone());
        }
    }
    bp
}

// Picks the advertisements with the best metric vector.
fn select_bgp<T: Topology>(
    local_node: &str,
    prefix: &IpNetwork,
    entries: &PrefixEntries,
    use_igp_metric: bool,
    topologies: &Topologies<T>,
) -> Result<BestPaths, Error> {
    let mut bp = BestPaths::default();

    for (node, areas) in entries {
        for (area, entry) in areas {
            let Some(topology) = topologies.get(area) else {
                continue;
            };
            let spf = topology.spf_result(local_node);
            let Some(spf_node) = spf.get(node) else {
                continue;
            };
            let Some(mv) = &entry.metric_vector else {
                return Err(Error::MissingMetricVector(
                    *prefix,
                    node.clone(),
                    area.clone(),
                ));
            };
            if mv.has_entity_type(MetricVector::IGP_COST_TYPE) {
                return Err(Error::UnexpectedIgpCostEntity(
                    *prefix,
                    node.clone(),
                ));
            }

            let igp_metric = spf_node.metric as i64;
            let mv = match use_igp_metric {
                true => mv.with_igp_cost(igp_metric),
                false => mv.clone(),
            };

            let result = match &bp.best_vector {
                Some(best_vector) => mv.compare(best_vector),
                None => CompareResult::Winner,
            };
            match result {
                CompareResult::Winner => {
                    bp.nodes.clear();
                    bp.areas.clear();
                    bp.best = Some((node.clone(), area.clone()));
                    bp.best_vector = Some(mv);
                    bp.best_igp_metric = use_igp_metric.then_some(igp_metric);
                    bp.nodes.insert(node.clone());
                    bp.areas.insert(area.clone());
                }
                CompareResult::TieWinner => {
                    bp.best = Some((node.clone(), area.clone()));
                    bp.best_vector = Some(mv);
                    if use_igp_metric {
                        bp.best_igp_metric =
                            min_igp(bp.best_igp_metric, igp_metric);
                    }
                    bp.nodes.insert(node.clone());
                    bp.areas.insert(area.clone());
                }
                CompareResult::TieLoser => {
                    if use_igp_metric {
                        bp.best_igp_metric =
                            min_igp(bp.best_igp_metric, igp_metric);
                    }
                    bp.nodes.insert(node.clone());
                    bp.areas.insert(area.clone());
                }
                CompareResult::Tie => {
                    return Err(Error::BestPathTie(*prefix));
                }
                CompareResult::Error => {
                    return Err(Error::BestPathError(*prefix));
                }
                CompareResult::Loser => {}
            }
        }
    }

    Ok(bp)
}

fn min_igp(current: Option<i64>, igp_metric: i64) -> Option<i64> {
    Some(current.map_or(igp_metric, |current| current.min(igp_metric)))
}
