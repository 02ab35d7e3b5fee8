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

//! Concurrent fan-out of one command to many hosts.

use tokio::task::JoinSet;
use tracing::{debug, error};

use super::command::Command;
use super::single::Executor;
use super::outcome::Outcome;
use crate::session::Connector;

impl<C: Connector> Executor<C> {
    /// Run `command` on every host in `hosts`, or on every registered host
    /// when `hosts` is `None`.
    ///
    /// All hosts run at once. Outcomes are returned in completion order, so
    /// match them up by [`Outcome::host`]. A host whose execution fails with
    /// an error (as opposed to a non-zero exit) is logged and left out of
    /// the result.
    pub async fn broadcast(&self, command: &str, hosts: Option<&[String]>) -> Vec<Outcome> {
        self.broadcast_command(&Command::new(command), hosts).await
    }

    /// [`broadcast`](Self::broadcast) for a prepared [`Command`]. Its own
    /// target host, if any, is ignored.
    pub async fn broadcast_command(&self, command: &Command, hosts: Option<&[String]>) -> Vec<Outcome> {
        let targets = match hosts {
            Some(hosts) => {
                let mut unique: Vec<String> = Vec::with_capacity(hosts.len());
                for host in hosts {
                    if !unique.contains(host) {
                        unique.push(host.clone());
                    }
                }
                unique
            }
            None => self.registry.hosts().await,
        };

        debug!(
            "Broadcasting `{}` to {} host(s)",
            command.text(),
            targets.len()
        );

        let mut tasks = JoinSet::new();
        for host in targets {
            let executor = self.clone();
            let command = command.clone().on(host.clone());
            tasks.spawn(async move {
                let result = executor.execute(&command).await;
                (host, result)
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => outcomes.push(outcome),
                Ok((host, Err(e))) => {
                    error!("Broadcast to {} failed, dropping it from the results: {}", host, e);
                }
                Err(e) => {
                    error!("Broadcast task failed: {}", e);
                }
            }
        }
        outcomes
    }
}

/// Hosts from `requested` that have no outcome in `outcomes`.
pub fn missing_hosts<'a>(requested: &'a [String], outcomes: &[Outcome]) -> Vec<&'a str> {
    requested
        .iter()
        .filter(|host| !outcomes.iter().any(|o| o.host() == host.as_str()))
        .map(String::as_str)
        .collect()
}
