//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::time::Duration;

use crate::debug::Debug;
use crate::pending::TopologyChange;
use crate::topology::Topology;

// Ordered FIB programming holds.
//
// Topology changes affecting a node are deferred for a number of hold
// intervals that depends on the node's hop distance. Link-up changes are
// applied nearest-first, and link-down changes farthest-first.
#[derive(Debug, Default)]
pub struct FibHolds {
    holds: BTreeMap<String, FibHold>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FibHold {
    // Remaining number of hold intervals.
    pub ttl: u64,
    // Deferred changes.
    pub change: TopologyChange,
    pub area: String,
}

// ===== impl FibHolds =====

impl FibHolds {
    pub fn is_empty(&self) -> bool {
        self.holds.is_empty()
    }

    pub fn get(&self, node: &str) -> Option<&FibHold> {
        self.holds.get(node)
    }

    // Returns whether changes in the given area are being held.
    pub fn has_area(&self, area: &str) -> bool {
        self.holds.values().any(|hold| hold.area == area)
    }

    // Defers a topology change affecting the given node.
    //
    // Returns false when the change must be applied immediately.
    pub(crate) fn hold<T: Topology>(
        &mut self,
        local_node: &str,
        node: &str,
        change: TopologyChange,
        topology: &T,
    ) -> bool {
        let ttl = hold_ttl(local_node, node, change, topology);

        // Changes to a node already held are merged into the existing hold.
        if let Some(hold) = self.holds.get_mut(node) {
            hold.change |= change;
            hold.ttl = hold.ttl.max(ttl);
            Debug::FibHoldAdd(node, hold.ttl, hold.change).log();
            return true;
        }
        if ttl == 0 {
            return false;
        }

        Debug::FibHoldAdd(node, ttl, change).log();
        self.holds.insert(
            node.to_owned(),
            FibHold {
                ttl,
                change,
                area: topology.area().to_owned(),
            },
        );
        true
    }

    // Decrements all holds by one interval.
    //
    // Returns the (node, area, changes) whose hold expired.
    pub(crate) fn decrement(&mut self) -> Vec<(String, String, TopologyChange)> {
        let mut released = vec![];
        self.holds.retain(|node, hold| {
            hold.ttl = hold.ttl.saturating_sub(1);
            if hold.ttl > 0 {
                return true;
            }
            Debug::FibHoldRelease(node, hold.change).log();
            released.push((node.clone(), hold.area.clone(), hold.change));
            false
        });
        released
    }
}

// ===== global functions =====

// Computes the number of hold intervals for a change affecting the given
// node.
pub(crate) fn hold_ttl<T: Topology>(
    local_node: &str,
    node: &str,
    change: TopologyChange,
    topology: &T,
) -> u64 {
    let Some(hops) = topology.hops_between(local_node, node) else {
        return 0;
    };
    if change.contains(TopologyChange::LINK_DOWN) {
        topology.max_hops_to(node).saturating_sub(hops)
    } else if change.contains(TopologyChange::LINK_UP) {
        hops
    } else {
        0
    }
}

// Interval between hold decrements: the slowest FIB programming time
// reported across the network.
pub(crate) fn hold_interval<'a>(
    fib_times: impl IntoIterator<Item = &'a Duration>,
) -> Duration {
    fib_times
        .into_iter()
        .max()
        .copied()
        .unwrap_or_default()
        .max(Duration::from_millis(1))
}

// ===== unit tests =====
