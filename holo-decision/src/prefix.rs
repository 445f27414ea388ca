//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

use holo_utils::ip::{AddressFamilies, AddressFamily, IpNetworkExt};
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::metric_vector::MetricVector;
use crate::route::Nexthop;
use crate::topology::Metric;

// Origin of a prefix advertisement.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum PrefixType {
    Loopback,
    Default,
    Bgp,
    Rib,
}

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum ForwardingType {
    #[default]
    Ip,
    SrMpls,
}

#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum ForwardingAlgorithm {
    #[default]
    SpEcmp,
    Ksp2EdEcmp,
}

// Single prefix advertisement, as originated by a node in an area.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PrefixEntry {
    pub prefix: IpNetwork,
    pub prefix_type: PrefixType,
    pub forwarding_type: ForwardingType,
    pub forwarding_algorithm: ForwardingAlgorithm,
    // Required for BGP advertisements.
    pub metric_vector: Option<MetricVector>,
    // Label to install at the bottom of the stack on KSP2 paths.
    pub prepend_label: Option<u32>,
    // Minimum number of dynamic next-hops required to program the route.
    pub min_nexthop: Option<u64>,
    // Areas this advertisement was redistributed through, most recent first.
    pub area_stack: Vec<String>,
}

// Advertisements of a single prefix, indexed by node and area.
pub type PrefixEntries = BTreeMap<String, BTreeMap<String, PrefixEntry>>;

// Change to the set of prefixes a node advertises in an area.
#[derive(Clone, Debug)]
pub enum PrefixUpdate {
    // Replaces the node's entire prefix set in the area.
    Full(Vec<PrefixEntry>),
    // Adds (or replaces) and withdraws individual prefixes.
    Incremental {
        add: Vec<PrefixEntry>,
        withdraw: Vec<IpNetwork>,
    },
}

// Prefix advertisements of a node in an area.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PrefixDatabase {
    pub node: String,
    pub area: String,
    pub entries: Vec<PrefixEntry>,
}

// Network-wide table of prefix advertisements.
#[derive(Debug, Default)]
pub struct PrefixState {
    prefixes: BTreeMap<IpNetwork, PrefixEntries>,
    // Reverse index: node -> area -> advertised prefixes.
    node_prefixes: BTreeMap<String, BTreeMap<String, BTreeSet<IpNetwork>>>,
    // Loopback address of each node, derived from LOOPBACK host prefixes.
    loopbacks: AddressFamilies<BTreeMap<String, IpAddr>>,
}

// Advertisement front-end merging full and per-prefix announcements.
//
// Nodes may announce their prefixes either as a single database or as one
// key per prefix. Per-prefix announcements take precedence over the full
// database for the same prefix.
#[derive(Debug, Default)]
pub struct PrefixDbStore {
    full: BTreeMap<(String, String), BTreeMap<IpNetwork, PrefixEntry>>,
    per_prefix: BTreeMap<(String, String), BTreeMap<IpNetwork, PrefixEntry>>,
}

// Advertisement received from the key-value store.
#[derive(Clone, Debug)]
pub enum PrefixDbMsg {
    Full(Vec<PrefixEntry>),
    PerPrefix(PrefixEntry),
    PerPrefixWithdraw(IpNetwork),
    // The node's advertisements expired.
    Expired,
}

// ===== impl PrefixEntry =====

impl PrefixEntry {
    pub fn new(prefix: IpNetwork, prefix_type: PrefixType) -> PrefixEntry {
        PrefixEntry {
            prefix,
            prefix_type,
            forwarding_type: Default::default(),
            forwarding_algorithm: Default::default(),
            metric_vector: None,
            prepend_label: None,
            min_nexthop: None,
            area_stack: Default::default(),
        }
    }

    fn is_loopback(&self) -> bool {
        self.prefix_type == PrefixType::Loopback && self.prefix.is_host_prefix()
    }
}

// ===== impl PrefixState =====

impl PrefixState {
    // Applies a node's advertisement change in an area.
    //
    // Returns the set of prefixes whose advertisements changed.
    pub fn update(
        &mut self,
        node: &str,
        area: &str,
        update: PrefixUpdate,
    ) -> BTreeSet<IpNetwork> {
        let old_prefixes = self
            .node_prefixes
            .get(node)
            .and_then(|areas| areas.get(area))
            .cloned()
            .unwrap_or_default();

        // Compute the new prefix set along with the entries to upsert.
        let (new_prefixes, upserts) = match update {
            PrefixUpdate::Full(entries) => {
                let upserts = entries
                    .into_iter()
                    .map(|entry| (entry.prefix, entry))
                    .collect::<BTreeMap<_, _>>();
                let new_prefixes =
                    upserts.keys().copied().collect::<BTreeSet<_>>();
                (new_prefixes, upserts)
            }
            PrefixUpdate::Incremental { add, withdraw } => {
                let upserts = add
                    .into_iter()
                    .map(|entry| (entry.prefix, entry))
                    .collect::<BTreeMap<_, _>>();
                let mut new_prefixes = old_prefixes.clone();
                for prefix in &withdraw {
                    if !upserts.contains_key(prefix) {
                        new_prefixes.remove(prefix);
                    }
                }
                new_prefixes.extend(upserts.keys().copied());
                (new_prefixes, upserts)
            }
        };

        let mut changed = BTreeSet::new();

        // Withdraw prefixes no longer advertised.
        for prefix in old_prefixes.difference(&new_prefixes) {
            if let Some(entries) = self.prefixes.get_mut(prefix) {
                let removed = entries
                    .get_mut(node)
                    .and_then(|areas| areas.remove(area));
                if let Some(removed) = removed {
                    // Other areas may still advertise the same loopback.
                    if removed.is_loopback()
                        && !entries.get(node).is_some_and(|areas| {
                            areas.values().any(PrefixEntry::is_loopback)
                        })
                    {
                        loopback_remove(&mut self.loopbacks, node, prefix);
                    }
                    debug!(%node, %area, %prefix, "prefix withdrawn");
                    changed.insert(*prefix);
                }
                if entries.get(node).is_some_and(|areas| areas.is_empty()) {
                    entries.remove(node);
                }
                if entries.is_empty() {
                    self.prefixes.remove(prefix);
                }
            }
        }

        // Add or replace advertised prefixes.
        for (prefix, entry) in upserts {
            let areas = self
                .prefixes
                .entry(prefix)
                .or_default()
                .entry(node.to_owned())
                .or_default();
            let old_entry = areas.get(area);
            if old_entry == Some(&entry) {
                continue;
            }
            if old_entry.is_some_and(|old_entry| old_entry.is_loopback())
                && !entry.is_loopback()
                && !areas.iter().any(|(other_area, other_entry)| {
                    other_area != area && other_entry.is_loopback()
                })
            {
                loopback_remove(&mut self.loopbacks, node, &prefix);
            }
            if entry.is_loopback() {
                self.loopbacks
                    .get_mut(prefix.address_family())
                    .insert(node.to_owned(), prefix.ip());
            }
            debug!(%node, %area, %prefix, "prefix advertised");
            areas.insert(area.to_owned(), entry);
            changed.insert(prefix);
        }

        // Update the reverse index.
        if new_prefixes.is_empty() {
            if let Some(areas) = self.node_prefixes.get_mut(node) {
                areas.remove(area);
                if areas.is_empty() {
                    self.node_prefixes.remove(node);
                }
            }
        } else {
            self.node_prefixes
                .entry(node.to_owned())
                .or_default()
                .insert(area.to_owned(), new_prefixes);
        }

        changed
    }

    // Returns all prefix advertisements.
    pub fn prefixes(&self) -> &BTreeMap<IpNetwork, PrefixEntries> {
        &self.prefixes
    }

    // Returns the loopback address of each node for the given address
    // family.
    pub fn loopbacks(&self, af: AddressFamily) -> &BTreeMap<String, IpAddr> {
        self.loopbacks.get(af)
    }

    // Returns a copy of all advertisements, grouped per node and area.
    pub fn prefix_databases(&self) -> Vec<PrefixDatabase> {
        let mut dbs = BTreeMap::<(&str, &str), Vec<PrefixEntry>>::new();
        for entries in self.prefixes.values() {
            for (node, areas) in entries {
                for (area, entry) in areas {
                    dbs.entry((node, area)).or_default().push(entry.clone());
                }
            }
        }
        dbs.into_iter()
            .map(|((node, area), entries)| PrefixDatabase {
                node: node.to_owned(),
                area: area.to_owned(),
                entries,
            })
            .collect()
    }

    // Returns the loopback addresses of the given nodes.
    //
    // Nodes without a known loopback are logged and skipped.
    pub fn loopback_addresses<'a>(
        &self,
        nodes: impl IntoIterator<Item = &'a String>,
        af: AddressFamily,
    ) -> Vec<IpAddr> {
        let loopbacks = self.loopbacks.get(af);
        nodes
            .into_iter()
            .filter_map(|node| {
                let addr = loopbacks.get(node).copied();
                if addr.is_none() {
                    error!(%node, %af, "missing loopback address");
                }
                addr
            })
            .collect()
    }

    // Builds next-hops pointing at the loopbacks of the given nodes.
    pub fn loopback_vias<'a>(
        &self,
        nodes: impl IntoIterator<Item = &'a String>,
        af: AddressFamily,
        igp_metric: Option<i64>,
    ) -> Vec<Nexthop> {
        let metric = igp_metric
            .and_then(|metric| Metric::try_from(metric).ok())
            .unwrap_or(0);
        self.loopback_addresses(nodes, af)
            .into_iter()
            .map(|addr| Nexthop::new(addr, None, metric, None, false, None))
            .collect()
    }
}

// ===== impl PrefixDbStore =====

impl PrefixDbStore {
    // Merges an advertisement into the store.
    //
    // Returns the node's resulting prefix set in the area, or `None` when the
    // advertisement is ignored.
    pub fn update(
        &mut self,
        local_node: &str,
        local_areas: &BTreeSet<String>,
        node: &str,
        area: &str,
        msg: PrefixDbMsg,
    ) -> Option<Vec<PrefixEntry>> {
        let key = (node.to_owned(), area.to_owned());
        match msg {
            PrefixDbMsg::Full(entries) => {
                let entries = entries
                    .into_iter()
                    .filter(|entry| {
                        !is_reflected(local_node, local_areas, node, entry)
                    })
                    .map(|entry| (entry.prefix, entry))
                    .collect::<BTreeMap<_, _>>();
                if entries.is_empty() {
                    self.full.remove(&key);
                } else {
                    self.full.insert(key.clone(), entries);
                }
            }
            PrefixDbMsg::PerPrefix(entry) => {
                if is_reflected(local_node, local_areas, node, &entry) {
                    debug!(%node, %area, prefix = %entry.prefix, "ignoring reflected prefix");
                    return None;
                }
                self.per_prefix
                    .entry(key.clone())
                    .or_default()
                    .insert(entry.prefix, entry);
            }
            PrefixDbMsg::PerPrefixWithdraw(prefix) => {
                let per_prefix = self.per_prefix.get_mut(&key)?;
                per_prefix.remove(&prefix)?;
                if per_prefix.is_empty() {
                    self.per_prefix.remove(&key);
                }
            }
            PrefixDbMsg::Expired => {
                self.full.remove(&key);
                self.per_prefix.remove(&key);
            }
        }

        // Per-prefix announcements override the full database.
        let mut merged = self.full.get(&key).cloned().unwrap_or_default();
        if let Some(per_prefix) = self.per_prefix.get(&key) {
            merged.extend(
                per_prefix
                    .iter()
                    .map(|(prefix, entry)| (*prefix, entry.clone())),
            );
        }
        Some(merged.into_values().collect())
    }
}

// ===== helper functions =====

// Removes a node's loopback address, unless it was already replaced by a
// different one.
fn loopback_remove(
    loopbacks: &mut AddressFamilies<BTreeMap<String, IpAddr>>,
    node: &str,
    prefix: &IpNetwork,
) {
    let loopbacks = loopbacks.get_mut(prefix.address_family());
    if loopbacks.get(node) == Some(&prefix.ip()) {
        loopbacks.remove(node);
    }
}

// Returns true for the local node's own advertisements that were
// redistributed back from one of its areas.
fn is_reflected(
    local_node: &str,
    local_areas: &BTreeSet<String>,
    node: &str,
    entry: &PrefixEntry,
) -> bool {
    node == local_node
        && entry
            .area_stack
            .first()
            .is_some_and(|area| local_areas.contains(area))
}
