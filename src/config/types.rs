// Copyright 2025 Lablup Inc. and Jeongkyu Shin
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

//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration structure.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub clusters: HashMap<String, Cluster>,
}

/// Connection settings, used both globally and per cluster.
///
/// Every field is optional; unset fields fall through to the next level.
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Defaults {
    pub user: Option<String>,
    pub port: Option<u16>,
    pub ssh_key: Option<String>,
    pub use_agent: Option<bool>,
    /// Session establishment timeout in seconds.
    pub connect_timeout: Option<u64>,
    /// SSH keepalive interval in seconds. Set to 0 to disable.
    pub keepalive_interval: Option<u64>,
    /// `yes`, `no` or `accept-new`.
    pub strict_host_key_checking: Option<String>,
}

/// A named set of hosts with optional overrides.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Cluster {
    pub nodes: Vec<NodeConfig>,

    #[serde(flatten)]
    pub defaults: Defaults,
}

/// Node entry within a cluster.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum NodeConfig {
    Simple(String),
    Detailed {
        host: String,
        #[serde(default)]
        port: Option<u16>,
    },
}

impl NodeConfig {
    /// The host identity this entry registers under.
    pub fn host_id(&self) -> String {
        match self {
            NodeConfig::Simple(host) => host.clone(),
            NodeConfig::Detailed { host, port: None } => host.clone(),
            NodeConfig::Detailed {
                host,
                port: Some(port),
            } => {
                if host.contains(':') && !host.starts_with('[') {
                    format!("[{host}]:{port}")
                } else {
                    format!("{host}:{port}")
                }
            }
        }
    }
}
