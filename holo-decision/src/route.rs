//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use derive_new::new;
use enum_as_inner::EnumAsInner;
use holo_utils::ip::{AddressFamily, IpAddrExt};
use holo_utils::mpls::Label;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::pending::PerfEvent;
use crate::prefix::PrefixEntry;
use crate::topology::{Link, Metric};

// MPLS operation applied when forwarding through a next-hop.
#[derive(Clone, Debug, EnumAsInner, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum MplsAction {
    // Labels to push, bottom of the stack first.
    Push(Vec<Label>),
    Swap(Label),
    Php,
    PopAndLookup,
}

// Forwarding next-hop.
//
// Next-hops are kept in ordered sets, so two next-hops are considered
// duplicates only when all of their attributes match.
#[derive(Clone, Debug, Eq, new, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub struct Nexthop {
    pub addr: IpAddr,
    pub ifname: Option<String>,
    pub metric: Metric,
    pub mpls_action: Option<MplsAction>,
    // Set for loop-free alternates and k-shortest paths.
    pub non_shortest: bool,
    pub area: Option<String>,
    #[new(value = "0")]
    pub weight: u32,
}

#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct UnicastRoute {
    pub prefix: IpNetwork,
    pub nexthops: BTreeSet<Nexthop>,
    // Advertisement that won best path selection.
    pub best_prefix_entry: PrefixEntry,
    pub best_area: String,
    // Computed but not to be programmed (BGP dry-run).
    pub do_not_install: bool,
    // Next-hop pointing at the loopback of the best BGP node.
    pub best_nexthop: Option<Nexthop>,
}

#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct MplsRoute {
    pub label: Label,
    pub nexthops: BTreeSet<Nexthop>,
}

// Full set of computed routes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RouteDb {
    pub unicast: BTreeMap<IpNetwork, UnicastRoute>,
    pub mpls: BTreeMap<Label, MplsRoute>,
}

// Incremental update transforming one route database into another.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RouteUpdate {
    pub unicast_update: Vec<UnicastRoute>,
    pub unicast_delete: Vec<IpNetwork>,
    pub mpls_update: Vec<MplsRoute>,
    pub mpls_delete: Vec<Label>,
    pub perf_events: Vec<PerfEvent>,
}

// ===== impl Nexthop =====

impl Nexthop {
    // Builds a next-hop over the given link.
    pub(crate) fn from_link(
        link: &Link,
        af: AddressFamily,
        metric: Metric,
        mpls_action: Option<MplsAction>,
        non_shortest: bool,
    ) -> Option<Nexthop> {
        let addr = link.nexthop(af)?;
        Some(Nexthop::new(
            addr,
            Some(link.ifname.clone()),
            metric,
            mpls_action,
            non_shortest,
            Some(link.area.clone()),
        ))
    }

    // Next-hop for labeled packets terminating on the local node.
    pub(crate) fn pop_and_lookup(area: &str) -> Nexthop {
        Nexthop::new(
            IpAddr::unspecified(AddressFamily::Ipv6),
            None,
            0,
            Some(MplsAction::PopAndLookup),
            false,
            Some(area.to_owned()),
        )
    }
}

// ===== impl UnicastRoute =====

impl UnicastRoute {
    pub(crate) fn new(
        prefix: IpNetwork,
        nexthops: BTreeSet<Nexthop>,
        best_prefix_entry: PrefixEntry,
        best_area: String,
    ) -> UnicastRoute {
        UnicastRoute {
            prefix,
            nexthops,
            best_prefix_entry,
            best_area,
            do_not_install: false,
            best_nexthop: None,
        }
    }
}

// ===== impl RouteDb =====

impl RouteDb {
    pub fn is_empty(&self) -> bool {
        self.unicast.is_empty() && self.mpls.is_empty()
    }

    // Computes the update that transforms `old` into this database.
    pub fn diff(&self, old: &RouteDb) -> RouteUpdate {
        let mut update = RouteUpdate::default();

        for (prefix, route) in &self.unicast {
            if old.unicast.get(prefix) != Some(route) {
                update.unicast_update.push(route.clone());
            }
        }
        update.unicast_delete.extend(
            old.unicast
                .keys()
                .filter(|prefix| !self.unicast.contains_key(prefix)),
        );

        for (label, route) in &self.mpls {
            if old.mpls.get(label) != Some(route) {
                update.mpls_update.push(route.clone());
            }
        }
        update.mpls_delete.extend(
            old.mpls
                .keys()
                .filter(|label| !self.mpls.contains_key(label)),
        );

        update
    }

    // Applies an update in place.
    pub fn apply(&mut self, update: &RouteUpdate) {
        for prefix in &update.unicast_delete {
            self.unicast.remove(prefix);
        }
        for route in &update.unicast_update {
            self.unicast.insert(route.prefix, route.clone());
        }
        for label in &update.mpls_delete {
            self.mpls.remove(label);
        }
        for route in &update.mpls_update {
            self.mpls.insert(route.label, route.clone());
        }
    }
}

// ===== impl RouteUpdate =====

impl RouteUpdate {
    pub fn is_empty(&self) -> bool {
        self.unicast_update.is_empty()
            && self.unicast_delete.is_empty()
            && self.mpls_update.is_empty()
            && self.mpls_delete.is_empty()
    }
}
