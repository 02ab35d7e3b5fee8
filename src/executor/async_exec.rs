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

//! Non-blocking command launch and the handle used to observe it.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::command::Command;
use super::single::Executor;
use super::normalize::normalize;
use super::outcome::Outcome;
use crate::error::ExecError;
use crate::session::{Connector, ProcessStdin, RemoteProcess, Session};

/// Interval between completion checks in [`AsyncHandle::wait`].
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_secs(1);

impl<C: Connector> Executor<C> {
    /// Launch `command` and return without waiting for it to exit.
    ///
    /// Host and session are resolved as in [`execute`](Self::execute),
    /// including the single reconnect if the launch itself fails at the
    /// connection level. The session lease is released once the process is
    /// running, so later commands on the same host are not blocked by it.
    pub async fn start(&self, command: &Command) -> Result<AsyncHandle, ExecError> {
        let host = self.resolve_host(command).await?;
        let process = self
            .with_reconnect(&host, || self.spawn_once(&host, command.text()))
            .await?;

        debug!("[{}] started `{}`", host, command.text());
        Ok(AsyncHandle {
            host,
            command: command.clone(),
            process,
        })
    }

    async fn spawn_once(&self, host: &str, text: &str) -> Result<RemoteProcess, ExecError> {
        let session = self.registry.session(host).await?;
        session
            .spawn(text)
            .await
            .map_err(|source| ExecError::ConnectionLost {
                host: host.to_string(),
                source,
            })
    }
}

/// A command running on a remote host.
///
/// [`collect`](Self::collect) and [`wait`](Self::wait) consume the handle,
/// so a result can only be taken once. Dropping the handle leaves the remote
/// process running.
#[derive(Debug)]
pub struct AsyncHandle {
    host: String,
    command: Command,
    process: RemoteProcess,
}

impl AsyncHandle {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn command(&self) -> &Command {
        &self.command
    }

    /// True once the remote process has exited. Never blocks.
    pub fn is_finished(&self) -> bool {
        self.process.is_finished()
    }

    /// The live stdin of the remote process.
    pub fn stdin(&mut self) -> Option<&mut ProcessStdin> {
        self.process.stdin()
    }

    /// Block until the process exits and normalize its output.
    pub async fn collect(self) -> Result<Outcome, ExecError> {
        let Self {
            host,
            command,
            process,
        } = self;

        let raw = process
            .finish()
            .await?
            .map_err(|source| ExecError::ConnectionLost {
                host: host.clone(),
                source,
            })?;

        let outcome = normalize(&raw, &command, &host)?;
        outcome.log();
        Ok(outcome)
    }

    /// Like [`collect`](Self::collect), but give up after `timeout`.
    ///
    /// Completion is checked every [`WAIT_POLL_INTERVAL`]. On timeout the
    /// result is an incomplete outcome (exit code `-1`, error
    /// `"execution incomplete"`) and the remote process is left running.
    pub async fn wait(self, timeout: Option<Duration>) -> Result<Outcome, ExecError> {
        let Some(timeout) = timeout else {
            return self.collect().await;
        };

        let deadline = Instant::now() + timeout;
        loop {
            if self.is_finished() {
                return self.collect().await;
            }

            let now = Instant::now();
            if now >= deadline {
                warn!(
                    "[{}] `{}` still running after {:?}, leaving it detached",
                    self.host,
                    self.command.text(),
                    timeout
                );
                let outcome = Outcome::incomplete(self.host, self.command.text());
                outcome.log();
                return Ok(outcome);
            }

            tokio::time::sleep(WAIT_POLL_INTERVAL.min(deadline - now)).await;
        }
    }
}
