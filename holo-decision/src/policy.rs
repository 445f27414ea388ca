//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use derive_new::new;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::route::UnicastRoute;

// Time-limited policy rewriting the next-hop weights of computed routes.
#[derive(Clone, Debug)]
pub struct RibPolicy {
    statements: Vec<RibPolicyStatement>,
    valid_until: Instant,
}

// Statement matching a set of prefixes.
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RibPolicyStatement {
    pub name: String,
    pub prefixes: BTreeSet<IpNetwork>,
    pub action: RibPolicyAction,
}

// Next-hop weight assignment.
//
// Next-hops get the weight of their area, or the default weight for areas
// not listed. Next-hops with a zero weight are removed.
#[derive(Clone, Debug, Eq, new, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct RibPolicyAction {
    pub default_weight: u32,
    pub area_weights: BTreeMap<String, u32>,
}

// ===== impl RibPolicy =====

impl RibPolicy {
    pub fn new(
        statements: Vec<RibPolicyStatement>,
        ttl: Duration,
    ) -> Result<RibPolicy, Error> {
        if statements.is_empty() {
            return Err(Error::RibPolicyInvalid(
                "policy has no statements".to_owned(),
            ));
        }
        if let Some(statement) =
            statements.iter().find(|stmt| stmt.prefixes.is_empty())
        {
            return Err(Error::RibPolicyInvalid(format!(
                "statement {} matches no prefixes",
                statement.name
            )));
        }
        if ttl.is_zero() {
            return Err(Error::RibPolicyStale(ttl));
        }

        Ok(RibPolicy {
            statements,
            valid_until: Instant::now() + ttl,
        })
    }

    pub fn statements(&self) -> &[RibPolicyStatement] {
        &self.statements
    }

    pub fn ttl_remaining(&self) -> Duration {
        self.valid_until.saturating_duration_since(Instant::now())
    }

    pub fn is_active(&self) -> bool {
        !self.ttl_remaining().is_zero()
    }

    // Applies the first matching statement to the route.
    //
    // Returns whether the route was modified. A route may end up without
    // next-hops, in which case it should be withdrawn.
    pub fn apply(&self, route: &mut UnicastRoute) -> bool {
        let Some(statement) = self
            .statements
            .iter()
            .find(|stmt| stmt.prefixes.contains(&route.prefix))
        else {
            return false;
        };

        let action = &statement.action;
        route.nexthops = std::mem::take(&mut route.nexthops)
            .into_iter()
            .filter_map(|mut nexthop| {
                let weight = nexthop
                    .area
                    .as_ref()
                    .and_then(|area| action.area_weights.get(area))
                    .copied()
                    .unwrap_or(action.default_weight);
                nexthop.weight = weight;
                (weight != 0).then_some(nexthop)
            })
            .collect();
        true
    }
}
