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

//! SSH connector and session.

use async_trait::async_trait;
use russh::client::{Config, Handle, Handler};
use std::fmt::Debug;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::auth::authenticate;
use super::known_hosts::{get_default_known_hosts_path, ServerCheckMethod};
use crate::error::SessionError;
use crate::host::{HostAddr, DEFAULT_SSH_PORT};
use crate::session::{Connector, LoginIdentity, RawOutput, RemoteProcess, Session};

/// Maximum keepalive messages without response before disconnect.
const KEEPALIVE_MAX: usize = 3;

/// Opens [`SshSession`]s.
///
/// # Examples
///
/// ```no_run
/// use cluster_exec::ssh::{AuthMethod, ServerCheckMethod, SshConnector};
/// use cluster_exec::{Executor, LoginIdentity, SessionRegistry};
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), cluster_exec::ExecError> {
/// let connector = SshConnector::new(ServerCheckMethod::NoCheck);
/// let identity = LoginIdentity::new("root", AuthMethod::with_agent());
/// let registry = Arc::new(SessionRegistry::new(connector, identity));
/// registry.open(&["server1".to_string(), "server2".to_string()]).await?;
///
/// let executor = Executor::new(Arc::clone(&registry));
/// let outcomes = executor.broadcast("hostname", None).await;
/// assert_eq!(outcomes.len(), 2);
///
/// registry.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SshConnector {
    server_check: ServerCheckMethod,
    keepalive_interval: Option<Duration>,
    default_port: u16,
}

impl SshConnector {
    pub fn new(server_check: ServerCheckMethod) -> Self {
        Self {
            server_check,
            keepalive_interval: None,
            default_port: DEFAULT_SSH_PORT,
        }
    }

    /// Send keepalives at `interval`; `None` disables them.
    pub fn with_keepalive(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Port used for host identities without an explicit one.
    pub fn with_default_port(mut self, port: u16) -> Self {
        self.default_port = port;
        self
    }

    fn russh_config(&self) -> Config {
        Config {
            keepalive_interval: self.keepalive_interval,
            keepalive_max: KEEPALIVE_MAX,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(
        &self,
        host: &str,
        identity: &LoginIdentity,
        timeout: Option<Duration>,
    ) -> Result<SshSession, SessionError> {
        let addr = HostAddr::parse(host, self.default_port).map_err(|e| {
            SessionError::AddressInvalid(host.to_string(), io::Error::new(io::ErrorKind::InvalidInput, e))
        })?;

        let connecting = SshSession::connect(
            addr,
            identity,
            self.server_check.clone(),
            self.russh_config(),
        );

        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, connecting)
                .await
                .map_err(|_| SessionError::ConnectTimeout {
                    host: host.to_string(),
                    timeout,
                })?,
            None => connecting.await,
        }
    }
}

/// An authenticated SSH connection to one host.
pub struct SshSession {
    pub(super) addr: HostAddr,
    pub(super) handle: Handle<ClientHandler>,
}

impl SshSession {
    async fn connect(
        addr: HostAddr,
        identity: &LoginIdentity,
        server_check: ServerCheckMethod,
        config: Config,
    ) -> Result<Self, SessionError> {
        let handler = ClientHandler {
            hostname: addr.host.clone(),
            port: addr.port,
            server_check,
        };

        tracing::debug!("Connecting to {}", addr);
        let mut handle =
            russh::client::connect(Arc::new(config), (addr.host.as_str(), addr.port), handler)
                .await?;

        authenticate(&mut handle, &identity.user, &identity.auth).await?;
        tracing::debug!("Connected and authenticated to {} as {}", addr, identity.user);

        Ok(Self { addr, handle })
    }

    pub fn address(&self) -> &HostAddr {
        &self.addr
    }
}

impl Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("addr", &self.addr)
            .field("handle", &"Handle<ClientHandler>")
            .finish()
    }
}

#[async_trait]
impl Session for SshSession {
    async fn exec(&self, command: &str) -> Result<RawOutput, SessionError> {
        self.run(command).await
    }

    async fn spawn(&self, command: &str) -> Result<RemoteProcess, SessionError> {
        self.launch(command).await
    }

    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<(), SessionError> {
        self.upload_file(local_path, remote_path, overwrite).await
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), SessionError> {
        self.download_file(remote_path, local_path).await
    }

    fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    async fn close(&self) -> Result<(), SessionError> {
        if self.handle.is_closed() {
            return Ok(());
        }
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await
            .map_err(SessionError::Ssh)
    }
}

/// SSH client handler for managing server key verification.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    hostname: String,
    port: u16,
    server_check: ServerCheckMethod,
}

impl Handler for ClientHandler {
    type Error = SessionError;

    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        match &self.server_check {
            ServerCheckMethod::NoCheck => Ok(true),
            ServerCheckMethod::KnownHostsFile(known_hosts_path) => {
                russh::keys::check_known_hosts_path(
                    &self.hostname,
                    self.port,
                    server_public_key,
                    known_hosts_path,
                )
                .map_err(|_| SessionError::ServerCheckFailed)
            }
            ServerCheckMethod::DefaultKnownHostsFile => {
                russh::keys::check_known_hosts(&self.hostname, self.port, server_public_key)
                    .map_err(|_| SessionError::ServerCheckFailed)
            }
            ServerCheckMethod::AcceptNew => {
                let known_hosts_path =
                    get_default_known_hosts_path().ok_or(SessionError::ServerCheckFailed)?;
                accept_new_host_key(&self.hostname, self.port, server_public_key, &known_hosts_path)
            }
        }
    }
}

/// Trust-on-first-use check against `known_hosts_path`: a known key must
/// match, an unknown host is learned and accepted.
fn accept_new_host_key(
    hostname: &str,
    port: u16,
    server_public_key: &russh::keys::PublicKey,
    known_hosts_path: &Path,
) -> Result<bool, SessionError> {
    match russh::keys::check_known_hosts_path(hostname, port, server_public_key, known_hosts_path)
    {
        Ok(true) => Ok(true),
        Ok(false) => {
            tracing::info!("Adding host key for {}:{} to known_hosts", hostname, port);
            russh::keys::known_hosts::learn_known_hosts_path(
                hostname,
                port,
                server_public_key,
                known_hosts_path,
            )
            .map_err(|_| SessionError::ServerCheckFailed)?;
            Ok(true)
        }
        Err(e) => {
            tracing::warn!(
                "Host key for {}:{} does not match known_hosts: {}",
                hostname,
                port,
                e
            );
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SERVER_KEY: &str = "AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";

    #[test]
    fn test_accept_new_learns_unknown_host() {
        let temp_dir = TempDir::new().unwrap();
        let known_hosts = temp_dir.path().join("known_hosts");
        let key = russh::keys::parse_public_key_base64(SERVER_KEY).unwrap();

        assert!(accept_new_host_key("server1", 22, &key, &known_hosts).unwrap());

        let recorded = std::fs::read_to_string(&known_hosts).unwrap();
        assert!(recorded.contains("server1"));
        assert!(russh::keys::check_known_hosts_path("server1", 22, &key, &known_hosts).unwrap());
    }

    #[test]
    fn test_accept_new_keeps_known_host() {
        let temp_dir = TempDir::new().unwrap();
        let known_hosts = temp_dir.path().join("known_hosts");
        let key = russh::keys::parse_public_key_base64(SERVER_KEY).unwrap();

        assert!(accept_new_host_key("server1", 2222, &key, &known_hosts).unwrap());
        let first = std::fs::read_to_string(&known_hosts).unwrap();
        assert!(accept_new_host_key("server1", 2222, &key, &known_hosts).unwrap());
        assert_eq!(std::fs::read_to_string(&known_hosts).unwrap(), first);
    }
}
