//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use derive_new::new;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

bitflags! {
    // Kind of change reported for a node's adjacency database.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct TopologyChange: u8 {
        const LINK_UP = 0x01;
        const LINK_DOWN = 0x02;
        const LINK_ATTRIBUTES = 0x04;
        const NODE_LABEL = 0x08;
    }
}

// Timestamped marker used to trace a change through the route computation
// pipeline.
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PerfEvent {
    pub node: String,
    pub event: String,
    #[new(value = "Utc::now()")]
    pub time: DateTime<Utc>,
}

// Changes accumulated since the last route rebuild.
#[derive(Debug, Default)]
pub struct PendingUpdates {
    count: usize,
    needs_full_rebuild: bool,
    updated_prefixes: BTreeSet<IpNetwork>,
    perf_events: Option<Vec<PerfEvent>>,
}

// ===== impl TopologyChange =====

impl TopologyChange {
    pub fn is_topology_change(&self) -> bool {
        self.intersects(TopologyChange::LINK_UP | TopologyChange::LINK_DOWN)
    }
}

// ===== impl PendingUpdates =====

impl PendingUpdates {
    // Records a change to a node's adjacency database.
    pub(crate) fn apply_topology_change(
        &mut self,
        local_node: &str,
        node: &str,
        change: TopologyChange,
        perf_events: Option<Vec<PerfEvent>>,
    ) {
        self.count += 1;
        // Link attribute changes only matter when they affect the local
        // node's next-hops.
        if change.is_topology_change()
            || change.contains(TopologyChange::NODE_LABEL)
            || (change.contains(TopologyChange::LINK_ATTRIBUTES)
                && node == local_node)
        {
            self.needs_full_rebuild = true;
        }
        self.add_perf_events(perf_events);
    }

    // Records a set of prefixes whose advertisements changed.
    pub(crate) fn apply_prefix_change(
        &mut self,
        prefixes: BTreeSet<IpNetwork>,
        perf_events: Option<Vec<PerfEvent>>,
    ) {
        self.count += 1;
        self.updated_prefixes.extend(prefixes);
        self.add_perf_events(perf_events);
    }

    pub(crate) fn set_needs_full_rebuild(&mut self) {
        self.needs_full_rebuild = true;
    }

    pub fn needs_route_update(&self) -> bool {
        self.needs_full_rebuild || !self.updated_prefixes.is_empty()
    }

    pub fn needs_full_rebuild(&self) -> bool {
        self.needs_full_rebuild
    }

    pub fn updated_prefixes(&self) -> &BTreeSet<IpNetwork> {
        &self.updated_prefixes
    }

    pub fn count(&self) -> usize {
        self.count
    }

    // Appends a marker to the tracked perf events, if any are tracked.
    pub(crate) fn add_event(&mut self, node: &str, event: &str) {
        if let Some(perf_events) = &mut self.perf_events {
            perf_events.push(PerfEvent::new(node.to_owned(), event.to_owned()));
        }
    }

    pub(crate) fn take_perf_events(&mut self) -> Vec<PerfEvent> {
        self.perf_events.take().unwrap_or_default()
    }

    pub(crate) fn reset(&mut self) {
        *self = Default::default();
    }

    // Only the oldest set of events is tracked, to measure the worst-case
    // convergence delay.
    fn add_perf_events(&mut self, perf_events: Option<Vec<PerfEvent>>) {
        if self.perf_events.is_none() {
            self.perf_events = perf_events;
        }
    }
}
