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

//! SSH authentication methods.
//!
//! [`AuthMethod`] is the credential half of a login identity; [`AuthContext`]
//! picks one from configuration, and [`authenticate`] runs it against a fresh
//! russh handle.

use anyhow::{Context, Result};
use russh::client::{Handle, Handler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zeroize::Zeroizing;

use crate::error::SessionError;

/// An authentication token.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AuthMethod {
    Password(Zeroizing<String>),
    PrivateKeyFile {
        key_file_path: PathBuf,
        key_pass: Option<Zeroizing<String>>,
    },
    #[cfg(not(target_os = "windows"))]
    Agent,
}

impl AuthMethod {
    pub fn with_password(password: &str) -> Self {
        Self::Password(Zeroizing::new(password.to_string()))
    }

    pub fn with_key_file<T: AsRef<Path>>(key_file_path: T, passphrase: Option<&str>) -> Self {
        Self::PrivateKeyFile {
            key_file_path: key_file_path.as_ref().to_path_buf(),
            key_pass: passphrase.map(|p| Zeroizing::new(p.to_string())),
        }
    }

    /// Authenticate with every identity offered by the running SSH agent.
    ///
    /// Requires `SSH_AUTH_SOCK`.
    #[cfg(not(target_os = "windows"))]
    pub fn with_agent() -> Self {
        Self::Agent
    }
}

/// Inputs for choosing an [`AuthMethod`].
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub key_path: Option<PathBuf>,
    pub key_passphrase: Option<Zeroizing<String>>,
    pub use_agent: bool,
    pub password: Option<Zeroizing<String>>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key_path(mut self, key_path: Option<PathBuf>) -> Self {
        self.key_path = key_path;
        self
    }

    pub fn with_key_passphrase(mut self, passphrase: Option<String>) -> Self {
        self.key_passphrase = passphrase.map(Zeroizing::new);
        self
    }

    pub fn with_agent(mut self, use_agent: bool) -> Self {
        self.use_agent = use_agent;
        self
    }

    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.map(Zeroizing::new);
        self
    }

    /// Pick the authentication method.
    ///
    /// Priority:
    /// 1. Password (if supplied)
    /// 2. SSH agent (if requested and `SSH_AUTH_SOCK` is set)
    /// 3. Explicit key file
    /// 4. Default key locations (~/.ssh/id_ed25519, ~/.ssh/id_rsa, ~/.ssh/id_ecdsa)
    pub fn determine_method(&self) -> Result<AuthMethod> {
        if let Some(password) = &self.password {
            tracing::debug!("Using password authentication");
            return Ok(AuthMethod::with_password(password));
        }

        #[cfg(not(target_os = "windows"))]
        if self.use_agent {
            if std::env::var("SSH_AUTH_SOCK").is_ok() {
                tracing::debug!("Using SSH agent for authentication");
                return Ok(AuthMethod::Agent);
            }
            tracing::warn!("SSH agent requested but SSH_AUTH_SOCK is not set");
        }

        if let Some(key_path) = &self.key_path {
            if !key_path.exists() {
                anyhow::bail!("SSH key file not found: {}", key_path.display());
            }
            tracing::debug!("Authenticating with key: {:?}", key_path);
            return Ok(self.key_file_method(key_path));
        }

        let ssh_dir = directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".ssh"))
            .context("Could not determine home directory for default SSH keys")?;
        let default_keys = ["id_ed25519", "id_rsa", "id_ecdsa"];
        for name in default_keys {
            let candidate = ssh_dir.join(name);
            if candidate.exists() {
                tracing::debug!("Using default key: {:?}", candidate);
                return Ok(self.key_file_method(&candidate));
            }
        }

        anyhow::bail!(
            "No SSH authentication method available: no password, no usable agent, \
             and no key in {} (tried {})",
            ssh_dir.display(),
            default_keys.join(", ")
        )
    }

    fn key_file_method(&self, key_path: &Path) -> AuthMethod {
        AuthMethod::with_key_file(key_path, self.key_passphrase.as_ref().map(|p| p.as_str()))
    }
}

/// Run `auth` for `username` on a freshly connected handle.
pub(super) async fn authenticate<H>(
    handle: &mut Handle<H>,
    username: &str,
    auth: &AuthMethod,
) -> Result<(), SessionError>
where
    H: Handler,
{
    match auth {
        AuthMethod::Password(password) => {
            let result = handle
                .authenticate_password(username, password.as_str())
                .await?;
            if !result.success() {
                return Err(SessionError::AuthFailed(username.to_string()));
            }
        }
        AuthMethod::PrivateKeyFile {
            key_file_path,
            key_pass,
        } => {
            let key = russh::keys::load_secret_key(key_file_path, key_pass.as_ref().map(|p| p.as_str()))
                .map_err(SessionError::KeyInvalid)?;
            let result = handle
                .authenticate_publickey(
                    username,
                    russh::keys::PrivateKeyWithHashAlg::new(
                        Arc::new(key),
                        handle.best_supported_rsa_hash().await?.flatten(),
                    ),
                )
                .await?;
            if !result.success() {
                return Err(SessionError::AuthFailed(username.to_string()));
            }
        }
        #[cfg(not(target_os = "windows"))]
        AuthMethod::Agent => {
            let mut agent = russh::keys::agent::client::AgentClient::connect_env()
                .await
                .map_err(|e| SessionError::Agent(e.to_string()))?;
            let identities = agent
                .request_identities()
                .await
                .map_err(|e| SessionError::Agent(e.to_string()))?;
            if identities.is_empty() {
                return Err(SessionError::Agent("agent has no identities".to_string()));
            }

            let mut authenticated = false;
            for identity in identities {
                let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
                match handle
                    .authenticate_publickey_with(username, identity, hash_alg, &mut agent)
                    .await
                {
                    Ok(result) if result.success() => {
                        authenticated = true;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!("Agent identity rejected: {}", e),
                }
            }
            if !authenticated {
                return Err(SessionError::AuthFailed(username.to_string()));
            }
        }
    }
    Ok(())
}
