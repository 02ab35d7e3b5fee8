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

//! Single-host execution with one transparent reconnect.

use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::command::Command;
use super::normalize::normalize;
use super::outcome::Outcome;
use crate::error::ExecError;
use crate::session::{Connector, RawOutput, Session, SessionRegistry};

/// Runs commands against the sessions of a shared [`SessionRegistry`].
///
/// Cloning is cheap; clones share the registry.
pub struct Executor<C: Connector> {
    pub(super) registry: Arc<SessionRegistry<C>>,
}

impl<C: Connector> Clone for Executor<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<C: Connector> Executor<C> {
    pub fn new(registry: Arc<SessionRegistry<C>>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry<C>> {
        &self.registry
    }

    /// Run `command` and wait for it to exit.
    ///
    /// A non-zero exit code is not an error; it is reported through
    /// [`Outcome::is_success`]. Connection-level failures are retried once
    /// on a fresh session before they are returned.
    pub async fn execute(&self, command: &Command) -> Result<Outcome, ExecError> {
        let host = self.resolve_host(command).await?;
        let raw = self
            .with_reconnect(&host, || self.exec_once(&host, command.text()))
            .await?;

        let outcome = normalize(&raw, command, &host)?;
        outcome.log();
        Ok(outcome)
    }

    /// The command's own host, or a random registered one.
    pub(super) async fn resolve_host(&self, command: &Command) -> Result<String, ExecError> {
        match command.host() {
            Some(host) => Ok(host.to_string()),
            None => {
                let host = self.registry.any_host().await?;
                debug!("No host given for `{}`, picked {}", command.text(), host);
                Ok(host)
            }
        }
    }

    /// Run `op`, and run it once more on a fresh session if it fails at the
    /// connection level.
    pub(super) async fn with_reconnect<T, F, Fut>(&self, host: &str, mut op: F) -> Result<T, ExecError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ExecError>>,
    {
        let mut reconnected = false;
        loop {
            match op().await {
                Err(e) if e.is_connection_level() && !reconnected => {
                    warn!("Session to {} failed ({}), reconnecting once", host, e);
                    self.registry.discard(host).await;
                    reconnected = true;
                }
                result => return result,
            }
        }
    }

    async fn exec_once(&self, host: &str, text: &str) -> Result<RawOutput, ExecError> {
        let session = self.registry.session(host).await?;
        debug!("[{}] executing `{}`", host, text);
        session
            .exec(text)
            .await
            .map_err(|source| ExecError::ConnectionLost {
                host: host.to_string(),
                source,
            })
    }
}
