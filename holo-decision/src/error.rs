//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use holo_utils::mpls::Label;
use ipnetwork::IpNetwork;
use tracing::{error, warn};

use crate::debounce;

// Route computation errors.
#[derive(Debug)]
pub enum Error {
    // Prefix advertisements
    MixedPrefixTypes(IpNetwork),
    MissingMetricVector(IpNetwork, String, String),
    UnexpectedIgpCostEntity(IpNetwork, String),
    Ipv4Disabled(IpNetwork),
    IncompatibleForwardingType(IpNetwork),
    // Best path selection
    BestPathTie(IpNetwork),
    BestPathError(IpNetwork),
    // Route construction
    NoRouteToPrefix(IpNetwork),
    MissingLoopbackAddr(IpNetwork, String),
    MinNexthopUnmet(IpNetwork, usize, u64),
    MissingStaticNexthops(IpNetwork, Label),
    // MPLS
    InvalidNodeLabel(String, u32),
    InvalidAdjacencyLabel(String, u32),
    DuplicateNodeLabel(Label, String, String),
    NoRouteToLabel(Label, String),
    // RIB policy
    RibPolicyDisabled,
    RibPolicyStale(Duration),
    RibPolicyInvalid(String),
    // Other
    DebounceUnexpectedEvent(debounce::State, debounce::Event),
    ConfigParseError(String, toml::de::Error),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::MixedPrefixTypes(prefix)
            | Error::Ipv4Disabled(prefix)
            | Error::IncompatibleForwardingType(prefix)
            | Error::BestPathTie(prefix)
            | Error::BestPathError(prefix)
            | Error::NoRouteToPrefix(prefix) => {
                warn!(%prefix, "{}", self);
            }
            Error::MissingMetricVector(prefix, node, area) => {
                warn!(%prefix, %node, %area, "{}", self);
            }
            Error::UnexpectedIgpCostEntity(prefix, node)
            | Error::MissingLoopbackAddr(prefix, node) => {
                warn!(%prefix, %node, "{}", self);
            }
            Error::MinNexthopUnmet(prefix, nexthops, min_nexthop) => {
                warn!(%prefix, %nexthops, %min_nexthop, "{}", self);
            }
            Error::MissingStaticNexthops(prefix, label) => {
                warn!(%prefix, %label, "{}", self);
            }
            Error::InvalidNodeLabel(node, label) => {
                warn!(%node, %label, "{}", self);
            }
            Error::InvalidAdjacencyLabel(ifname, label) => {
                warn!(%ifname, %label, "{}", self);
            }
            Error::DuplicateNodeLabel(label, kept, dropped) => {
                error!(%label, %kept, %dropped, "{}", self);
            }
            Error::NoRouteToLabel(label, node) => {
                warn!(%label, %node, "{}", self);
            }
            Error::RibPolicyDisabled => {
                warn!("{}", self);
            }
            Error::RibPolicyStale(ttl) => {
                warn!(?ttl, "{}", self);
            }
            Error::RibPolicyInvalid(reason) => {
                warn!(%reason, "{}", self);
            }
            Error::DebounceUnexpectedEvent(state, event) => {
                warn!(?state, ?event, "{}", self);
            }
            Error::ConfigParseError(path, error) => {
                error!(%path, error = %with_source(error), "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MixedPrefixTypes(..) => {
                write!(f, "prefix advertised with both BGP and non-BGP types")
            }
            Error::MissingMetricVector(..) => {
                write!(f, "BGP prefix advertised without metric vector")
            }
            Error::UnexpectedIgpCostEntity(..) => {
                write!(f, "metric vector carries a reserved IGP cost entity")
            }
            Error::Ipv4Disabled(..) => {
                write!(f, "IPv4 routing is disabled")
            }
            Error::IncompatibleForwardingType(..) => {
                write!(f, "incompatible forwarding type and algorithm")
            }
            Error::BestPathTie(..) => {
                write!(f, "ambiguous best path selection")
            }
            Error::BestPathError(..) => {
                write!(f, "metric vectors can't be compared")
            }
            Error::NoRouteToPrefix(..) => {
                write!(f, "no route to prefix")
            }
            Error::MissingLoopbackAddr(..) => {
                write!(f, "missing loopback address for best node")
            }
            Error::MinNexthopUnmet(..) => {
                write!(f, "minimum nexthop requirement not met")
            }
            Error::MissingStaticNexthops(..) => {
                write!(f, "no static nexthops for prepend label")
            }
            Error::InvalidNodeLabel(..) => {
                write!(f, "ignoring invalid node label")
            }
            Error::InvalidAdjacencyLabel(..) => {
                write!(f, "ignoring invalid adjacency label")
            }
            Error::DuplicateNodeLabel(..) => {
                write!(f, "node label advertised by multiple nodes")
            }
            Error::NoRouteToLabel(..) => {
                write!(f, "no route to node label")
            }
            Error::RibPolicyDisabled => {
                write!(f, "RIB policy feature is not enabled")
            }
            Error::RibPolicyStale(..) => {
                write!(f, "RIB policy has already expired")
            }
            Error::RibPolicyInvalid(..) => {
                write!(f, "invalid RIB policy")
            }
            Error::DebounceUnexpectedEvent(..) => {
                write!(f, "unexpected debounce event")
            }
            Error::ConfigParseError(..) => {
                write!(f, "failed to parse configuration file")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ConfigParseError(_, error) => Some(error),
            _ => None,
        }
    }
}

// ===== global functions =====

fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
