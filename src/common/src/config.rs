// Copyright 2025 RiverCDC Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Per-changefeed replica configuration. Each struct corresponds to a
//! section of the changefeed TOML; unrecognized options are ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::filter::FilterConfig;

/// Root of the per-changefeed configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ReplicaConfig {
    pub scheduler: SchedulerConfig,
    pub filter: FilterConfig,
    pub force_replicate: bool,
}

/// The `[scheduler]` section.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Allow one table's spans to be split across nodes. Off by default;
    /// when off every table is one dispatcher and coverage checks degrade
    /// to counting.
    pub enable_table_across_nodes: bool,
    /// Bound on operators emitted per scheduling tick.
    pub batch_size: usize,
    /// Seconds between balance passes.
    pub balance_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enable_table_across_nodes: false,
            batch_size: default_batch_size(),
            balance_interval_secs: default_balance_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn balance_interval(&self) -> Duration {
        Duration::from_secs(self.balance_interval_secs)
    }
}

fn default_batch_size() -> usize {
    1000
}

fn default_balance_interval_secs() -> u64 {
    60
}

impl ReplicaConfig {
    /// Parses a changefeed TOML document, filling defaults for every
    /// omitted section.
    pub fn from_toml(doc: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(doc)
    }
}
