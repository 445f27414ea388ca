//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::derivable_impls)]

use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub decision: DecisionCfg,
    pub logging: Logging,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecisionCfg {
    // Name of the local node.
    pub node_name: String,
    pub enable_v4: bool,
    // Compute loop-free alternate next-hops.
    pub compute_lfa_paths: bool,
    // Sequence FIB updates across the network by hop distance.
    pub enable_ordered_fib: bool,
    // Compute BGP routes without programming them.
    pub bgp_dry_run: bool,
    // Break BGP ties using the IGP distance to the advertising node.
    pub bgp_use_igp_metric: bool,
    pub enable_rib_policy: bool,
    // Route rebuild debounce window, in milliseconds.
    pub debounce_min_ms: u64,
    pub debounce_max_ms: u64,
    // Hold route programming after startup until this many seconds elapse.
    pub eor_time_s: Option<u64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub stdout: LoggingStdout,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingStdout {
    pub enabled: bool,
    pub style: LoggingFmtStyle,
    pub colors: bool,
    pub show_thread_id: bool,
    pub show_source: bool,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFmtStyle {
    Compact,
    #[default]
    Full,
    Json,
    Pretty,
}

// ===== impl Config =====

impl Config {
    const DFLT_FILEPATH: &'static str = "/etc/holo-decision.toml";

    // Loads the configuration file, falling back to the default configuration
    // when the file can't be read.
    pub fn load(config_file: Option<&str>) -> Result<Config, Error> {
        let config_file = config_file.unwrap_or(Config::DFLT_FILEPATH);

        match std::fs::read_to_string(config_file) {
            Ok(config_str) => Config::parse(config_file, &config_str),
            Err(error) => {
                tracing::warn!(
                    path = %config_file, %error,
                    "failed to load configuration file, using defaults"
                );
                Ok(Config::default())
            }
        }
    }

    pub fn parse(path: &str, config_str: &str) -> Result<Config, Error> {
        toml::from_str(config_str)
            .map_err(|error| Error::ConfigParseError(path.to_owned(), error))
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            decision: Default::default(),
            logging: Default::default(),
        }
    }
}

// ===== impl DecisionCfg =====

impl DecisionCfg {
    pub fn debounce_min(&self) -> Duration {
        Duration::from_millis(self.debounce_min_ms)
    }

    pub fn debounce_max(&self) -> Duration {
        Duration::from_millis(self.debounce_max_ms.max(self.debounce_min_ms))
    }

    pub fn eor_time(&self) -> Option<Duration> {
        self.eor_time_s.map(Duration::from_secs)
    }
}

impl Default for DecisionCfg {
    fn default() -> DecisionCfg {
        DecisionCfg {
            node_name: "node".to_owned(),
            enable_v4: true,
            compute_lfa_paths: false,
            enable_ordered_fib: false,
            bgp_dry_run: false,
            bgp_use_igp_metric: false,
            enable_rib_policy: false,
            debounce_min_ms: 10,
            debounce_max_ms: 250,
            eor_time_s: None,
        }
    }
}

// ===== impl LoggingStdout =====

impl Default for LoggingStdout {
    fn default() -> LoggingStdout {
        LoggingStdout {
            enabled: true,
            style: LoggingFmtStyle::Full,
            colors: false,
            show_thread_id: false,
            show_source: false,
        }
    }
}

// ===== unit tests =====
