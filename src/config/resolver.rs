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

//! Cluster lookup and settings resolution.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::host::DEFAULT_SSH_PORT;
use crate::ssh::known_hosts::StrictHostKeyChecking;

use super::types::{Cluster, Config};
use super::utils::expand_tilde;

pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_KEEPALIVE_INTERVAL_SECS: u64 = 60;

/// Values given on the command line; they win over every config level.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub user: Option<String>,
    pub ssh_key: Option<PathBuf>,
    pub use_agent: bool,
    pub connect_timeout: Option<u64>,
    pub strict_host_key_checking: Option<StrictHostKeyChecking>,
}

/// Fully resolved connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub user: String,
    pub port: u16,
    pub ssh_key: Option<PathBuf>,
    pub use_agent: bool,
    pub connect_timeout: Duration,
    /// `None` when keepalive is disabled.
    pub keepalive_interval: Option<Duration>,
    pub strict_host_key_checking: StrictHostKeyChecking,
}

impl Config {
    /// Get a cluster by name.
    pub fn get_cluster(&self, name: &str) -> Result<&Cluster> {
        self.clusters.get(name).ok_or_else(|| {
            let mut available: Vec<&str> = self.clusters.keys().map(String::as_str).collect();
            available.sort_unstable();
            anyhow!(
                "Cluster '{}' not found in configuration. Available clusters: {}",
                name,
                if available.is_empty() {
                    "(none)".to_string()
                } else {
                    available.join(", ")
                }
            )
        })
    }

    /// Host identities of a cluster, in file order.
    pub fn cluster_hosts(&self, name: &str) -> Result<Vec<String>> {
        let cluster = self.get_cluster(name)?;
        Ok(cluster.nodes.iter().map(|node| node.host_id()).collect())
    }

    /// Resolve every setting: command line, then cluster, then
    /// `defaults`, then the built-in value.
    pub fn resolve(&self, cluster_name: Option<&str>, overrides: &Overrides) -> Result<Settings> {
        let cluster = match cluster_name {
            Some(name) => Some(&self.get_cluster(name)?.defaults),
            None => None,
        };
        let user = overrides
            .user
            .clone()
            .or_else(|| cluster.and_then(|d| d.user.clone()))
            .or_else(|| self.defaults.user.clone())
            .unwrap_or_else(|| DEFAULT_USER.to_string());

        let port = cluster
            .and_then(|d| d.port)
            .or(self.defaults.port)
            .unwrap_or(DEFAULT_SSH_PORT);

        let ssh_key = overrides.ssh_key.clone().or_else(|| {
            cluster
                .and_then(|d| d.ssh_key.as_deref())
                .or(self.defaults.ssh_key.as_deref())
                .map(|key| expand_tilde(Path::new(key)))
        });

        let use_agent = overrides.use_agent
            || cluster
                .and_then(|d| d.use_agent)
                .or(self.defaults.use_agent)
                .unwrap_or(false);

        let connect_timeout = overrides
            .connect_timeout
            .or_else(|| cluster.and_then(|d| d.connect_timeout))
            .or(self.defaults.connect_timeout)
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS);

        let keepalive = cluster
            .and_then(|d| d.keepalive_interval)
            .or(self.defaults.keepalive_interval)
            .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL_SECS);

        let strict_host_key_checking = match overrides.strict_host_key_checking {
            Some(mode) => mode,
            None => match cluster
                .and_then(|d| d.strict_host_key_checking.as_deref())
                .or(self.defaults.strict_host_key_checking.as_deref())
            {
                Some(mode) => mode
                    .parse::<StrictHostKeyChecking>()
                    .map_err(|e: String| anyhow!(e))?,
                None => StrictHostKeyChecking::default(),
            },
        };

        Ok(Settings {
            user,
            port,
            ssh_key,
            use_agent,
            connect_timeout: Duration::from_secs(connect_timeout),
            keepalive_interval: (keepalive > 0).then(|| Duration::from_secs(keepalive)),
            strict_host_key_checking,
        })
    }
}
