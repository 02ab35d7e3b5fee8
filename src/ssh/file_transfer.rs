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

//! SFTP file transfer.
//!
//! The remote sshd must have the sftp subsystem enabled, e.g.
//! `Subsystem sftp internal-sftp` in sshd_config.

use russh_sftp::{client::SftpSession, protocol::OpenFlags};
use std::future::Future;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::client::SshSession;
use crate::error::SessionError;

impl SshSession {
    async fn open_sftp(&self) -> Result<SftpSession, SessionError> {
        let channel = self.handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        Ok(SftpSession::new(channel.into_stream()).await?)
    }

    /// Upload `local_path` to `remote_path`.
    ///
    /// With `overwrite`, an existing remote file is removed before writing
    /// instead of being truncated in place.
    pub(super) async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<(), SessionError> {
        let contents = tokio::fs::read(local_path).await?;
        let sftp = self.open_sftp().await?;

        let written = async {
            if overwrite && sftp.try_exists(remote_path).await? {
                tracing::debug!("Removing existing {} on {}", remote_path, self.addr);
                sftp.remove_file(remote_path).await?;
            }

            let mut file = sftp
                .open_with_flags(
                    remote_path,
                    OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
                )
                .await?;
            file.write_all(&contents).await?;
            file.flush().await?;
            file.shutdown().await?;
            Ok::<_, SessionError>(())
        }
        .await;

        close_after(sftp.close(), written).await?;
        tracing::debug!(
            "Uploaded {} to {}:{} ({} bytes)",
            local_path.display(),
            self.addr,
            remote_path,
            contents.len()
        );
        Ok(())
    }

    /// Download `remote_path` into `local_path`.
    pub(super) async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
    ) -> Result<(), SessionError> {
        let sftp = self.open_sftp().await?;

        let read = async {
            let mut remote_file = sftp.open_with_flags(remote_path, OpenFlags::READ).await?;
            let mut contents = Vec::new();
            remote_file.read_to_end(&mut contents).await?;
            Ok::<_, SessionError>(contents)
        }
        .await;
        let contents = close_after(sftp.close(), read).await?;

        let mut local_file = tokio::fs::File::create(local_path).await?;
        local_file.write_all(&contents).await?;
        local_file.flush().await?;
        Ok(())
    }
}

/// Await `close` whatever `result` is. A transfer error wins over a close
/// error.
async fn close_after<T, C, E>(close: C, result: Result<T, SessionError>) -> Result<T, SessionError>
where
    C: Future<Output = Result<(), E>>,
    E: Into<SessionError>,
{
    match (result, close.await) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e.into()),
        (Err(e), closed) => {
            if let Err(close_err) = closed {
                let close_err: SessionError = close_err.into();
                tracing::debug!("Closing SFTP session after failed transfer: {}", close_err);
            }
            Err(e)
        }
    }
}
