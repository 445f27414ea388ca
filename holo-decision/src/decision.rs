//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use derive_new::new;
use holo_utils::UnboundedSender;
use holo_utils::task::TimeoutTask;
use tracing::{debug, warn};

use crate::config::DecisionCfg;
use crate::debounce::{self, Debouncer};
use crate::debug::Debug;
use crate::error::Error;
use crate::holds::{FibHolds, hold_interval};
use crate::pending::{PendingUpdates, PerfEvent, TopologyChange};
use crate::policy::RibPolicy;
use crate::prefix::{
    PrefixDatabase, PrefixDbMsg, PrefixDbStore, PrefixState, PrefixUpdate,
};
use crate::route::{MplsRoute, RouteDb};
use crate::solver::{SpfSolver, Statistics};
use crate::static_route::{StaticRoutes, StaticRoutesDelta};
use crate::tasks;
use crate::tasks::messages::input::ProtocolMsg;
use crate::tasks::messages::{ProtocolInputMsg, ProtocolOutputMsg};
use crate::topology::{Topologies, Topology};

// Route computation controller.
//
// Owns the inputs of the route computation and decides when routes are
// rebuilt. Timer expirations are delivered through the protocol input
// channel and must be fed back to `process_protocol_msg`.
#[derive(Debug)]
pub struct Decision<T: Topology> {
    config: DecisionCfg,
    topologies: Topologies<T>,
    // Topologies used for route computation. An area's copy isn't updated
    // while ordered FIB holds defer changes in it.
    route_topologies: Topologies<T>,
    prefix_state: PrefixState,
    prefix_dbs: PrefixDbStore,
    solver: SpfSolver,
    // Last route database sent downstream.
    route_db: RouteDb,
    pending: PendingUpdates,
    holds: FibHolds,
    // FIB programming time reported by each node.
    fib_times: BTreeMap<String, Duration>,
    rib_policy: Option<RibPolicy>,
    debouncer: Debouncer,
    cold_start_timer: Option<TimeoutTask>,
    fib_hold_timer: Option<TimeoutTask>,
    rib_policy_timer: Option<TimeoutTask>,
    tx: DecisionChannelsTx,
}

#[derive(Clone, Debug, new)]
pub struct DecisionChannelsTx {
    // Timer expirations.
    pub protocol_input: UnboundedSender<ProtocolInputMsg>,
    // Route updates for the forwarding plane.
    pub route_update: UnboundedSender<ProtocolOutputMsg>,
}

// ===== impl Decision =====

impl<T: Topology + Clone> Decision<T> {
    pub fn new(config: DecisionCfg, tx: DecisionChannelsTx) -> Decision<T> {
        // Routes aren't programmed until the initial synchronization period
        // expires.
        let cold_start_timer = config
            .eor_time()
            .map(|timeout| tasks::cold_start_timer(timeout, &tx.protocol_input));

        Decision {
            debouncer: Debouncer::new(
                config.debounce_min(),
                config.debounce_max(),
            ),
            solver: SpfSolver::new(config.clone()),
            config,
            topologies: Default::default(),
            route_topologies: Default::default(),
            prefix_state: Default::default(),
            prefix_dbs: Default::default(),
            route_db: Default::default(),
            pending: Default::default(),
            holds: Default::default(),
            fib_times: Default::default(),
            rib_policy: None,
            cold_start_timer,
            fib_hold_timer: None,
            rib_policy_timer: None,
            tx,
        }
    }

    // ===== inputs =====

    // Adds (or replaces) the link-state database of an area.
    pub fn topology_add(&mut self, topology: T) {
        let area = topology.area().to_owned();
        self.route_topologies.insert(area.clone(), topology.clone());
        self.topologies.insert(area, topology);
        self.pending.set_needs_full_rebuild();
        self.schedule_rebuild();
    }

    pub fn topology_remove(&mut self, area: &str) -> Option<T> {
        let topology = self.topologies.remove(area)?;
        self.route_topologies.remove(area);
        self.pending.set_needs_full_rebuild();
        self.schedule_rebuild();
        Some(topology)
    }

    // Returns the area's link-state database for in-place updates. Changes
    // must be reported with `topology_update`, which decides when they are
    // used for route computation.
    pub fn topology_mut(&mut self, area: &str) -> Option<&mut T> {
        self.topologies.get_mut(area)
    }

    // Processes a change of a node's adjacency database.
    pub fn topology_update(
        &mut self,
        area: &str,
        node: &str,
        change: TopologyChange,
        perf_events: Option<Vec<PerfEvent>>,
    ) {
        let Some(topology) = self.topologies.get(area) else {
            debug!(%area, %node, "ignoring change in unknown area");
            return;
        };
        self.solver.stats.adj_db_update += 1;
        Debug::TopologyChange(node, area, change).log();

        // Sequence link state changes across the network. Hop distances are
        // taken from the topology as it was before the change.
        let pre_change = self.route_topologies.get(area).unwrap_or(topology);
        if self.config.enable_ordered_fib
            && change.is_topology_change()
            && self
                .holds
                .hold(&self.config.node_name, node, change, pre_change)
        {
            if self.fib_hold_timer.is_none() {
                let interval = hold_interval(self.fib_times.values());
                let timer =
                    tasks::fib_hold_timer(interval, &self.tx.protocol_input);
                self.fib_hold_timer = Some(timer);
            }
            return;
        }

        self.sync_route_topology(area);
        self.pending.apply_topology_change(
            &self.config.node_name,
            node,
            change,
            perf_events,
        );
        self.schedule_rebuild();
    }

    // Processes a prefix advertisement of a node in an area.
    pub fn prefix_update(
        &mut self,
        area: &str,
        node: &str,
        msg: PrefixDbMsg,
        perf_events: Option<Vec<PerfEvent>>,
    ) {
        let local_areas = self.topologies.keys().cloned().collect::<BTreeSet<_>>();
        let Some(entries) = self.prefix_dbs.update(
            &self.config.node_name,
            &local_areas,
            node,
            area,
            msg,
        ) else {
            return;
        };
        self.solver.stats.prefix_db_update += 1;

        let changed =
            self.prefix_state
                .update(node, area, PrefixUpdate::Full(entries));
        Debug::PrefixDbUpdate(node, area, changed.len()).log();
        if changed.is_empty() {
            return;
        }

        self.pending.apply_prefix_change(changed, perf_events);
        self.schedule_rebuild();
    }

    // Queues a batch of static route changes.
    pub fn static_routes_update(&mut self, delta: StaticRoutesDelta) {
        Debug::StaticRoutesQueued(delta.mpls_update.len(), delta.mpls_delete.len())
            .log();
        self.solver.static_routes_store_mut().push(delta);
        self.schedule_rebuild();
    }

    // Records the FIB programming time reported by a node.
    pub fn fib_time_update(&mut self, node: &str, fib_time: Duration) {
        self.fib_times.insert(node.to_owned(), fib_time);
    }

    // Installs a RIB policy and rebuilds routes immediately.
    pub fn set_rib_policy(&mut self, policy: RibPolicy) -> Result<(), Error> {
        if !self.config.enable_rib_policy {
            return Err(Error::RibPolicyDisabled);
        }
        let ttl = policy.ttl_remaining();
        if ttl.is_zero() {
            return Err(Error::RibPolicyStale(ttl));
        }

        Debug::RibPolicyInstall(ttl).log();
        self.rib_policy = Some(policy);
        self.rib_policy_timer =
            Some(tasks::rib_policy_timer(ttl, &self.tx.protocol_input));
        self.pending.set_needs_full_rebuild();
        self.rebuild_routes("RIB_POLICY_UPDATE");
        Ok(())
    }

    // Processes a timer expiration.
    pub fn process_protocol_msg(&mut self, msg: ProtocolInputMsg) {
        match msg {
            ProtocolMsg::DebounceTimer => {
                match self.debouncer.process_event(
                    debounce::Event::Expire,
                    &self.tx.protocol_input,
                ) {
                    Ok(true) => self.rebuild_routes("DECISION_DEBOUNCE"),
                    Ok(false) => (),
                    Err(error) => error.log(),
                }
            }
            ProtocolMsg::ColdStartTimer => {
                Debug::ColdStartExpire.log();
                self.cold_start_timer = None;
                self.pending.set_needs_full_rebuild();
                self.rebuild_routes("COLD_START_UPDATE");
            }
            ProtocolMsg::FibHoldTimer => {
                self.fib_hold_timer = None;
                for (node, area, change) in self.holds.decrement() {
                    self.sync_route_topology(&area);
                    self.pending.apply_topology_change(
                        &self.config.node_name,
                        &node,
                        change,
                        None,
                    );
                }
                if !self.holds.is_empty() {
                    let interval = hold_interval(self.fib_times.values());
                    let timer =
                        tasks::fib_hold_timer(interval, &self.tx.protocol_input);
                    self.fib_hold_timer = Some(timer);
                }
                if self.pending.needs_route_update() {
                    self.rebuild_routes("ORDERED_FIB_HOLDS_EXPIRED");
                }
            }
            ProtocolMsg::RibPolicyTimer => {
                Debug::RibPolicyExpire.log();
                self.rib_policy = None;
                self.rib_policy_timer = None;
                self.pending.set_needs_full_rebuild();
                self.rebuild_routes("RIB_POLICY_EXPIRED");
            }
        }
    }

    // Rebuilds routes, sending the resulting changes downstream.
    pub fn rebuild_routes(&mut self, event: &str) {
        if self.cold_start_timer.is_some() {
            debug!(%event, "skipping route rebuild during cold start");
            return;
        }

        let local_node = self.config.node_name.clone();
        self.pending.add_event(&local_node, event);

        // Static routes go first. Dynamic routes may resolve through them, so
        // any change forces a full rebuild.
        if self.solver.static_routes_store_mut().has_pending()
            && let Some(update) =
                self.solver.static_routes_store_mut().process_queue()
        {
            self.pending.set_needs_full_rebuild();
            Debug::RouteUpdateSend(event, &update).log();
            let _ = self
                .tx
                .route_update
                .send(ProtocolOutputMsg::RouteUpdate(update));
        }

        if self.pending.needs_route_update() {
            match self.solver.build_route_db(
                &local_node,
                &self.route_topologies,
                &self.prefix_state,
            ) {
                Some(route_db) => {
                    self.pending.add_event(&local_node, "ROUTE_UPDATE");
                    self.send_route_update(route_db, event);
                }
                None => {
                    warn!(node = %local_node, "local node not part of any area");
                }
            }
        }

        self.pending.reset();
    }

    // ===== read-outs =====

    pub fn config(&self) -> &DecisionCfg {
        &self.config
    }

    pub fn topologies(&self) -> &Topologies<T> {
        &self.topologies
    }

    pub fn prefix_state(&self) -> &PrefixState {
        &self.prefix_state
    }

    pub fn prefix_databases(&self) -> Vec<PrefixDatabase> {
        self.prefix_state.prefix_databases()
    }

    // Returns the last route database sent downstream.
    pub fn route_db(&self) -> &RouteDb {
        &self.route_db
    }

    // Computes the route database of any node, static routes included.
    pub fn decision_route_db(&mut self, node: Option<&str>) -> Option<RouteDb> {
        let node = node.unwrap_or(&self.config.node_name).to_owned();
        let mut route_db = match node == self.config.node_name {
            true => self.route_db.clone(),
            false => self.solver.build_route_db(
                &node,
                &self.route_topologies,
                &self.prefix_state,
            )?,
        };
        for (label, nexthops) in &self.solver.static_routes().mpls {
            let nexthops = nexthops.iter().cloned().collect();
            route_db.mpls.insert(*label, MplsRoute::new(*label, nexthops));
        }
        Some(route_db)
    }

    pub fn static_routes(&self) -> &StaticRoutes {
        self.solver.static_routes()
    }

    pub fn rib_policy(&self) -> Result<Option<RibPolicy>, Error> {
        if !self.config.enable_rib_policy {
            return Err(Error::RibPolicyDisabled);
        }
        Ok(self.rib_policy.clone())
    }

    pub fn stats(&self) -> &Statistics {
        &self.solver.stats
    }

    pub fn pending(&self) -> &PendingUpdates {
        &self.pending
    }

    pub fn holds(&self) -> &FibHolds {
        &self.holds
    }

    pub fn debouncer(&self) -> &Debouncer {
        &self.debouncer
    }

    // Time remaining until the next hold decrement.
    pub fn fib_hold_remaining(&self) -> Option<Duration> {
        self.fib_hold_timer.as_ref().map(|timer| timer.remaining())
    }

    pub fn is_cold_start(&self) -> bool {
        self.cold_start_timer.is_some()
    }

    // ===== helper methods =====

    // Makes the latest state of an area visible to route computation, unless
    // ordered FIB holds are still deferring changes in it.
    fn sync_route_topology(&mut self, area: &str) {
        if self.holds.has_area(area) {
            return;
        }
        if let Some(topology) = self.topologies.get(area) {
            self.route_topologies
                .insert(area.to_owned(), topology.clone());
        }
    }

    fn schedule_rebuild(&mut self) {
        if let Err(error) = self
            .debouncer
            .process_event(debounce::Event::Trigger, &self.tx.protocol_input)
        {
            error.log();
        }
    }

    fn send_route_update(&mut self, mut route_db: RouteDb, event: &str) {
        // Apply the RIB policy. Routes left without next-hops are withdrawn.
        if let Some(policy) = &self.rib_policy
            && policy.is_active()
        {
            route_db.unicast.retain(|_, route| {
                !policy.apply(route) || !route.nexthops.is_empty()
            });
        }

        let mut update = route_db.diff(&self.route_db);
        self.route_db = route_db;
        update.perf_events = self.pending.take_perf_events();
        if update.is_empty() {
            return;
        }

        Debug::RouteUpdateSend(event, &update).log();
        let _ = self
            .tx
            .route_update
            .send(ProtocolOutputMsg::RouteUpdate(update));
    }
}
