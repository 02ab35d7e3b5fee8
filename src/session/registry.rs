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

//! Per-host session ownership with on-demand (re)connection.

use futures::future::join_all;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use super::{Connector, LoginIdentity, Session};
use crate::error::{ExecError, SessionError};

type Slot<S> = Arc<Mutex<Option<S>>>;

/// Owns at most one session per host.
///
/// Each host has its own slot guarded by an async mutex; holding a
/// [`SessionLease`] is the only way to touch a session, so two commands can
/// never interleave on the same host. Hosts are registered by [`open`] or on
/// first use by [`session`], and stay registered (even when their connection
/// failed) until [`close`].
///
/// [`open`]: SessionRegistry::open
/// [`session`]: SessionRegistry::session
/// [`close`]: SessionRegistry::close
pub struct SessionRegistry<C: Connector> {
    connector: C,
    identity: LoginIdentity,
    connect_timeout: Option<Duration>,
    slots: RwLock<HashMap<String, Slot<C::Session>>>,
    usable: AtomicBool,
}

impl<C: Connector> SessionRegistry<C> {
    pub fn new(connector: C, identity: LoginIdentity) -> Self {
        Self {
            connector,
            identity,
            connect_timeout: None,
            slots: RwLock::new(HashMap::new()),
            usable: AtomicBool::new(false),
        }
    }

    /// Set the timeout applied to every session establishment.
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn identity(&self) -> &LoginIdentity {
        &self.identity
    }

    /// Establish one session per host, best effort.
    ///
    /// Every host is attempted even after a failure, and every host stays
    /// registered, so the ones that connected can be used right away and the
    /// failed ones are retried on demand. The error lists each failed host.
    pub async fn open(&self, hosts: &[String]) -> Result<(), ExecError> {
        let mut unique: Vec<&String> = Vec::with_capacity(hosts.len());
        for host in hosts {
            if !unique.contains(&host) {
                unique.push(host);
            }
        }

        self.usable.store(true, Ordering::SeqCst);

        let count = unique.len();
        let attempts = unique.into_iter().map(|host| async move {
            let slot = self.slot(host).await;
            let mut guard = slot.lock().await;
            if guard.as_ref().is_some_and(|s| !s.is_closed()) {
                return Ok(());
            }
            match self.establish(host).await {
                Ok(session) => {
                    *guard = Some(session);
                    Ok(())
                }
                Err(e) => Err((host.clone(), e)),
            }
        });

        let failures: Vec<(String, SessionError)> = join_all(attempts)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();

        if failures.is_empty() {
            info!("Opened sessions to {} host(s)", count);
            return Ok(());
        }

        self.usable.store(false, Ordering::SeqCst);
        for (host, err) in &failures {
            warn!("Could not connect to {}: {}", host, err);
        }
        Err(ExecError::Connect { failures })
    }

    /// Borrow the session for `host`, establishing it first when it is
    /// missing or known to be closed.
    ///
    /// The lease blocks other borrowers of the same host until dropped.
    pub async fn session(&self, host: &str) -> Result<SessionLease<C::Session>, ExecError> {
        let slot = self.slot(host).await;
        let mut guard = slot.lock_owned().await;

        if guard.as_ref().is_some_and(|s| s.is_closed()) {
            debug!("Session to {} is closed, re-establishing", host);
            guard.take();
        }

        if guard.is_none() {
            let session = self
                .establish(host)
                .await
                .map_err(|e| ExecError::connect(host, e))?;
            *guard = Some(session);
        }

        Ok(SessionLease {
            host: host.to_string(),
            guard,
        })
    }

    /// Drop the session for `host` so the next borrower reconnects.
    pub async fn discard(&self, host: &str) {
        let slot = match self.slots.read().await.get(host) {
            Some(slot) => Arc::clone(slot),
            None => return,
        };
        let stale = slot.lock().await.take();
        if let Some(session) = stale {
            debug!("Discarding session to {}", host);
            if let Err(e) = session.close().await {
                debug!("Closing stale session to {} failed: {}", host, e);
            }
        }
    }

    /// Close every session and forget every host. Safe to call repeatedly.
    pub async fn close(&self) {
        let slots: Vec<(String, Slot<C::Session>)> =
            self.slots.write().await.drain().collect();
        self.usable.store(false, Ordering::SeqCst);
        if slots.is_empty() {
            return;
        }

        let closes = slots.into_iter().map(|(host, slot)| async move {
            if let Some(session) = slot.lock().await.take() {
                if let Err(e) = session.close().await {
                    debug!("Closing session to {} failed: {}", host, e);
                }
            }
        });
        join_all(closes).await;
        info!("Closed all sessions");
    }

    /// Pick a registered host uniformly at random.
    pub async fn any_host(&self) -> Result<String, ExecError> {
        let slots = self.slots.read().await;
        let hosts: Vec<&String> = slots.keys().collect();
        hosts
            .choose(&mut rand::thread_rng())
            .map(|host| (*host).clone())
            .ok_or(ExecError::NoHostsAvailable)
    }

    /// Registered hosts, sorted.
    pub async fn hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = self.slots.read().await.keys().cloned().collect();
        hosts.sort();
        hosts
    }

    /// False once any host failed during the last [`open`](Self::open), or
    /// before `open` was ever called.
    pub fn is_usable(&self) -> bool {
        self.usable.load(Ordering::SeqCst)
    }

    async fn slot(&self, host: &str) -> Slot<C::Session> {
        if let Some(slot) = self.slots.read().await.get(host) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(host.to_string()).or_default())
    }

    async fn establish(&self, host: &str) -> Result<C::Session, SessionError> {
        debug!("Connecting to {} as {}", host, self.identity.user);
        self.connector
            .connect(host, &self.identity, self.connect_timeout)
            .await
    }
}

/// Exclusive borrow of one host's session.
pub struct SessionLease<S> {
    host: String,
    guard: OwnedMutexGuard<Option<S>>,
}

impl<S> SessionLease<S> {
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl<S> Deref for SessionLease<S> {
    type Target = S;

    fn deref(&self) -> &S {
        match self.guard.as_ref() {
            Some(session) => session,
            None => unreachable!("a lease is only created for an established session"),
        }
    }
}
