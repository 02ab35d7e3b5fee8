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

//! File transfer over a host's session.
//!
//! Unlike command execution, transfers are not retried: any failure,
//! including an unusable session, is returned as [`ExecError::Transfer`].

use std::path::Path;
use tracing::{debug, info};

use super::single::Executor;
use crate::error::ExecError;
use crate::session::{Connector, Session, SessionLease};

impl<C: Connector> Executor<C> {
    /// Upload `local` to `remote` on `host`.
    ///
    /// With `overwrite`, any existing file at `remote` is removed first.
    pub async fn push(
        &self,
        local: &Path,
        remote: &str,
        host: &str,
        overwrite: bool,
    ) -> Result<(), ExecError> {
        let session = self.transfer_session(host, remote).await?;
        debug!("[{}] uploading {} to {}", host, local.display(), remote);
        session
            .upload(local, remote, overwrite)
            .await
            .map_err(|source| transfer_error(host, remote, source))?;
        info!("[{}] uploaded {} to {}", host, local.display(), remote);
        Ok(())
    }

    /// Download `remote` on `host` to `local`.
    pub async fn fetch(&self, remote: &str, local: &Path, host: &str) -> Result<(), ExecError> {
        let session = self.transfer_session(host, remote).await?;
        debug!("[{}] downloading {} to {}", host, remote, local.display());
        session
            .download(remote, local)
            .await
            .map_err(|source| transfer_error(host, remote, source))?;
        info!("[{}] downloaded {} to {}", host, remote, local.display());
        Ok(())
    }

    async fn transfer_session(
        &self,
        host: &str,
        path: &str,
    ) -> Result<SessionLease<C::Session>, ExecError> {
        self.registry.session(host).await.map_err(|err| match err {
            ExecError::Connect { mut failures } if failures.len() == 1 => {
                let (_, source) = failures.remove(0);
                transfer_error(host, path, source)
            }
            other => other,
        })
    }
}

fn transfer_error(host: &str, path: &str, source: crate::error::SessionError) -> ExecError {
    ExecError::Transfer {
        host: host.to_string(),
        path: path.to_string(),
        source,
    }
}
