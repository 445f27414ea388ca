//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![cfg_attr(
    feature = "testing",
    allow(dead_code, unused_variables, unused_imports)
)]

pub mod bestpath;
pub mod config;
pub mod debounce;
pub mod debug;
pub mod decision;
pub mod error;
pub mod holds;
pub mod ksp;
pub mod logging;
pub mod metric_vector;
pub mod nexthop;
pub mod pending;
pub mod policy;
pub mod prefix;
pub mod route;
pub mod solver;
pub mod static_route;
pub mod tasks;
pub mod topology;
