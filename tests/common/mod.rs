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

//! In-process stand-in for an SSH cluster.
//!
//! Each "host" runs commands with the local `sh`. A shell function named
//! `hostname` prints the host identity, so outcomes can be told apart.
//! Remote files of a host live under its own directory in a temp dir.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::process::Command as ProcessCommand;

use cluster_exec::session::{ProcessStdin, RemoteProcess};
use cluster_exec::ssh::AuthMethod;
use cluster_exec::{
    Connector, Executor, LoginIdentity, RawOutput, Session, SessionError, SessionRegistry,
};

#[derive(Default)]
struct ClusterState {
    unreachable: Mutex<HashSet<String>>,
    attempts: Mutex<HashMap<String, usize>>,
    kill_switches: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

/// Shared view of the fake cluster, used by tests to inject failures.
#[derive(Clone)]
pub struct LocalCluster {
    state: Arc<ClusterState>,
    root: Arc<TempDir>,
}

impl LocalCluster {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ClusterState::default()),
            root: Arc::new(tempfile::tempdir().expect("temp dir")),
        }
    }

    pub fn connector(&self) -> LocalConnector {
        LocalConnector {
            cluster: self.clone(),
        }
    }

    /// Registry with a dummy identity and a short connect timeout.
    pub fn registry(&self) -> Arc<SessionRegistry<LocalConnector>> {
        Arc::new(
            SessionRegistry::new(
                self.connector(),
                LoginIdentity::new("root", AuthMethod::with_password("unused")),
            )
            .with_connect_timeout(Some(Duration::from_secs(5))),
        )
    }

    /// Registry opened on `hosts`, plus an executor over it.
    pub async fn executor(
        &self,
        hosts: &[&str],
    ) -> (Arc<SessionRegistry<LocalConnector>>, Executor<LocalConnector>) {
        let registry = self.registry();
        let hosts = hosts_vec(hosts);
        let _ = registry.open(&hosts).await;
        let executor = Executor::new(Arc::clone(&registry));
        (registry, executor)
    }

    pub fn set_unreachable(&self, host: &str, unreachable: bool) {
        let mut set = self.state.unreachable.lock().unwrap();
        if unreachable {
            set.insert(host.to_string());
        } else {
            set.remove(host);
        }
    }

    /// Break the current session of `host` without telling the registry.
    pub fn kill(&self, host: &str) {
        if let Some(switch) = self.state.kill_switches.lock().unwrap().get(host) {
            switch.store(true, Ordering::SeqCst);
        }
    }

    /// Connection attempts made for `host`, failed ones included.
    pub fn attempts(&self, host: &str) -> usize {
        self.state
            .attempts
            .lock()
            .unwrap()
            .get(host)
            .copied()
            .unwrap_or(0)
    }

    /// Where `remote` on `host` is stored locally.
    pub fn remote_path(&self, host: &str, remote: &str) -> PathBuf {
        self.root
            .path()
            .join(host.replace([':', '/', '[', ']'], "_"))
            .join(remote.trim_start_matches('/'))
    }

    /// A scratch directory outside every host's files.
    pub fn scratch(&self) -> PathBuf {
        let dir = self.root.path().join("scratch");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

pub fn hosts_vec(hosts: &[&str]) -> Vec<String> {
    hosts.iter().map(|h| h.to_string()).collect()
}

pub struct LocalConnector {
    cluster: LocalCluster,
}

#[async_trait]
impl Connector for LocalConnector {
    type Session = LocalSession;

    async fn connect(
        &self,
        host: &str,
        _identity: &LoginIdentity,
        _timeout: Option<Duration>,
    ) -> Result<LocalSession, SessionError> {
        let state = &self.cluster.state;
        *state
            .attempts
            .lock()
            .unwrap()
            .entry(host.to_string())
            .or_default() += 1;

        if state.unreachable.lock().unwrap().contains(host) {
            return Err(SessionError::Refused(host.to_string()));
        }

        let killed = Arc::new(AtomicBool::new(false));
        state
            .kill_switches
            .lock()
            .unwrap()
            .insert(host.to_string(), Arc::clone(&killed));

        let files = self.cluster.remote_path(host, "");
        tokio::fs::create_dir_all(&files).await?;

        Ok(LocalSession {
            host: host.to_string(),
            files,
            cluster: self.cluster.clone(),
            killed,
            closed: AtomicBool::new(false),
        })
    }
}

pub struct LocalSession {
    host: String,
    files: PathBuf,
    cluster: LocalCluster,
    killed: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl LocalSession {
    fn check_alive(&self) -> Result<(), SessionError> {
        if self.killed.load(Ordering::SeqCst) {
            return Err(SessionError::Io(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("connection to {} reset", self.host),
            )));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn shell(&self, command: &str) -> ProcessCommand {
        let script = format!("hostname() {{ echo \"$FAKE_HOST\"; }}\n{command}");
        let mut process = ProcessCommand::new("sh");
        process
            .arg("-c")
            .arg(script)
            .env("FAKE_HOST", &self.host)
            .current_dir(&self.files);
        process
    }
}

fn raw_output(output: std::process::Output) -> RawOutput {
    RawOutput {
        exit_code: output.status.code().unwrap_or(255),
        stdout: output.stdout,
        stderr: output.stderr,
    }
}

#[async_trait]
impl Session for LocalSession {
    async fn exec(&self, command: &str) -> Result<RawOutput, SessionError> {
        self.check_alive()?;
        let output = self.shell(command).stdin(Stdio::null()).output().await?;
        Ok(raw_output(output))
    }

    async fn spawn(&self, command: &str) -> Result<RemoteProcess, SessionError> {
        self.check_alive()?;
        let mut child = self
            .shell(command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .map(|stdin| -> ProcessStdin { Box::pin(stdin) });
        Ok(RemoteProcess::spawn(stdin, async move {
            let output = child.wait_with_output().await.map_err(SessionError::Io)?;
            Ok::<_, SessionError>(raw_output(output))
        }))
    }

    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        overwrite: bool,
    ) -> Result<(), SessionError> {
        self.check_alive()?;
        let target = self.cluster.remote_path(&self.host, remote_path);
        if overwrite && tokio::fs::try_exists(&target).await? {
            tokio::fs::remove_file(&target).await?;
        }
        tokio::fs::copy(local_path, &target).await?;
        Ok(())
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), SessionError> {
        self.check_alive()?;
        let source = self.cluster.remote_path(&self.host, remote_path);
        tokio::fs::copy(&source, local_path).await?;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), SessionError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
