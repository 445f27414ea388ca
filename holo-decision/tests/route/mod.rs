//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod bgp;
mod mpls;

use holo_decision::config::DecisionCfg;
use holo_decision::route::RouteDb;
use holo_decision::solver::{SpfSolver, Statistics};

use super::*;

fn build(
    config: DecisionCfg,
    topologies: &Topologies<TestTopology>,
    prefix_state: &PrefixState,
) -> (Option<RouteDb>, Statistics) {
    let local_node = config.node_name.clone();
    let mut solver = SpfSolver::new(config);
    let route_db =
        solver.build_route_db(&local_node, topologies, prefix_state);
    (route_db, solver.stats)
}
