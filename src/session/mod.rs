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

//! Session abstraction and the per-host session registry.
//!
//! A [`Session`] is one live, authenticated connection to exactly one host.
//! Sessions are produced by a [`Connector`] and owned by the
//! [`SessionRegistry`]; executors only ever borrow them through a
//! [`SessionLease`], which serializes access per host.

mod process;
mod registry;

pub use process::{OutputSink, ProcessStdin, RemoteProcess};
pub use registry::{SessionLease, SessionRegistry};

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::error::SessionError;
use crate::ssh::AuthMethod;

/// Login identity used for every host in a registry.
#[derive(Debug, Clone)]
pub struct LoginIdentity {
    pub user: String,
    pub auth: AuthMethod,
}

impl LoginIdentity {
    pub fn new(user: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            user: user.into(),
            auth,
        }
    }
}

/// Raw result of a finished remote command, before normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RawOutput {
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// A live connection to one host.
///
/// Implementations are not required to support concurrent commands; the
/// registry guarantees at most one borrower at a time.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Run `command` and block until it exits.
    async fn exec(&self, command: &str) -> Result<RawOutput, SessionError>;

    /// Launch `command` without waiting for it to exit.
    async fn spawn(&self, command: &str) -> Result<RemoteProcess, SessionError>;

    /// Copy a local file to `remote_path`, removing any existing file first
    /// when `overwrite` is set.
    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<(), SessionError>;

    /// Copy `remote_path` to a local file.
    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), SessionError>;

    /// Whether the session is known to be dead.
    fn is_closed(&self) -> bool;

    async fn close(&self) -> Result<(), SessionError>;
}

/// Factory for sessions.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: Session;

    async fn connect(
        &self,
        host: &str,
        identity: &LoginIdentity,
        timeout: Option<Duration>,
    ) -> Result<Self::Session, SessionError>;
}
