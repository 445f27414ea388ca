//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use tracing::{debug, debug_span};

use crate::pending::TopologyChange;
use crate::route::{RouteDb, RouteUpdate};

// Route computation debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Inputs
    TopologyChange(&'a str, &'a str, TopologyChange),
    PrefixDbUpdate(&'a str, &'a str, usize),
    StaticRoutesQueued(usize, usize),
    // Ordered FIB
    FibHoldAdd(&'a str, u64, TopologyChange),
    FibHoldRelease(&'a str, TopologyChange),
    // Scheduling
    DebounceSchedule(Duration),
    ColdStartExpire,
    RibPolicyInstall(Duration),
    RibPolicyExpire,
    // Route computation
    RouteBuildStart(&'a str),
    RouteBuildFinish(&'a RouteDb, Duration),
    RouteUpdateSend(&'a str, &'a RouteUpdate),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::TopologyChange(node, area, change) => {
                debug_span!("topology", %area).in_scope(|| {
                    debug!(%node, ?change, "{}", self);
                })
            }
            Debug::PrefixDbUpdate(node, area, changed) => {
                debug_span!("prefix-db", %area).in_scope(|| {
                    debug!(%node, %changed, "{}", self);
                })
            }
            Debug::StaticRoutesQueued(updated, deleted) => {
                debug!(%updated, %deleted, "{}", self);
            }
            Debug::FibHoldAdd(node, ttl, change) => {
                debug_span!("ordered-fib").in_scope(|| {
                    debug!(%node, %ttl, ?change, "{}", self);
                })
            }
            Debug::FibHoldRelease(node, change) => {
                debug_span!("ordered-fib").in_scope(|| {
                    debug!(%node, ?change, "{}", self);
                })
            }
            Debug::DebounceSchedule(delay) => {
                debug!(?delay, "{}", self);
            }
            Debug::ColdStartExpire | Debug::RibPolicyExpire => {
                debug!("{}", self);
            }
            Debug::RibPolicyInstall(ttl) => {
                debug!(?ttl, "{}", self);
            }
            Debug::RouteBuildStart(node) => {
                debug!(%node, "{}", self);
            }
            Debug::RouteBuildFinish(route_db, elapsed) => {
                debug!(
                    unicast = route_db.unicast.len(),
                    mpls = route_db.mpls.len(),
                    ?elapsed,
                    "{}",
                    self
                );
            }
            Debug::RouteUpdateSend(event, update) => {
                debug!(
                    %event,
                    unicast_update = update.unicast_update.len(),
                    unicast_delete = update.unicast_delete.len(),
                    mpls_update = update.mpls_update.len(),
                    mpls_delete = update.mpls_delete.len(),
                    "{}",
                    self
                );
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::TopologyChange(..) => {
                write!(f, "adjacency database changed")
            }
            Debug::PrefixDbUpdate(..) => {
                write!(f, "prefix database changed")
            }
            Debug::StaticRoutesQueued(..) => {
                write!(f, "static routes queued")
            }
            Debug::FibHoldAdd(..) => {
                write!(f, "holding topology change")
            }
            Debug::FibHoldRelease(..) => {
                write!(f, "releasing topology change")
            }
            Debug::DebounceSchedule(..) => {
                write!(f, "route rebuild scheduled")
            }
            Debug::ColdStartExpire => {
                write!(f, "cold start timer expired")
            }
            Debug::RibPolicyInstall(..) => {
                write!(f, "RIB policy installed")
            }
            Debug::RibPolicyExpire => {
                write!(f, "RIB policy expired")
            }
            Debug::RouteBuildStart(..) => {
                write!(f, "route computation started")
            }
            Debug::RouteBuildFinish(..) => {
                write!(f, "route computation finished")
            }
            Debug::RouteUpdateSend(..) => {
                write!(f, "sending route update")
            }
        }
    }
}
