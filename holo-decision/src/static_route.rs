//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};

use holo_utils::mpls::Label;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::route::{MplsRoute, Nexthop, RouteUpdate};

// Externally provisioned MPLS routes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct StaticRoutes {
    pub mpls: BTreeMap<Label, Vec<Nexthop>>,
}

// Batch of static route changes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct StaticRoutesDelta {
    pub mpls_update: Vec<MplsRoute>,
    pub mpls_delete: Vec<Label>,
}

// Static route store with queued, not yet processed, changes.
#[derive(Debug, Default)]
pub struct StaticRouteStore {
    routes: StaticRoutes,
    queue: Vec<StaticRoutesDelta>,
}

// ===== impl StaticRouteStore =====

impl StaticRouteStore {
    pub fn routes(&self) -> &StaticRoutes {
        &self.routes
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.is_empty()
    }

    pub(crate) fn push(&mut self, delta: StaticRoutesDelta) {
        self.queue.push(delta);
    }

    // Applies all queued changes to the store.
    //
    // Within a batch, additions are applied before deletions. Later entries
    // override earlier ones for the same label. Returns `None` when the net
    // change is empty.
    pub(crate) fn process_queue(&mut self) -> Option<RouteUpdate> {
        let existing = self.routes.mpls.keys().copied().collect::<BTreeSet<_>>();
        let mut touched = BTreeMap::<Label, Option<BTreeSet<Nexthop>>>::new();

        for delta in std::mem::take(&mut self.queue) {
            for route in delta.mpls_update {
                self.routes.mpls.insert(
                    route.label,
                    route.nexthops.iter().cloned().collect(),
                );
                touched.insert(route.label, Some(route.nexthops));
            }
            for label in delta.mpls_delete {
                self.routes.mpls.remove(&label);
                touched.insert(label, None);
            }
        }

        let mut update = RouteUpdate::default();
        for (label, nexthops) in touched {
            match nexthops {
                Some(nexthops) => {
                    update.mpls_update.push(MplsRoute::new(label, nexthops));
                }
                // Labels that never reached the data plane need no deletion.
                None if existing.contains(&label) => {
                    update.mpls_delete.push(label);
                }
                None => {}
            }
        }
        debug!(
            updated = update.mpls_update.len(),
            deleted = update.mpls_delete.len(),
            "processed static routes"
        );

        (!update.is_empty()).then_some(update)
    }
}
