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

//! Error types for sessions and command execution.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failure on a single session.
///
/// Every variant describes a problem with the connection itself, never with
/// the remote command: a non-zero exit code is reported through
/// [`Outcome`](crate::Outcome), not through this type.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("could not resolve address {0}")]
    AddressInvalid(String, #[source] io::Error),

    #[error("connection to {host} timed out after {timeout:?}")]
    ConnectTimeout { host: String, timeout: Duration },

    #[error("host key verification failed")]
    ServerCheckFailed,

    #[error("authentication failed for user {0}")]
    AuthFailed(String),

    #[error("could not use private key: {0}")]
    KeyInvalid(#[source] russh::keys::Error),

    #[error("ssh agent unavailable: {0}")]
    Agent(String),

    #[error("ssh protocol error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("sftp error: {0}")]
    Sftp(#[from] russh_sftp::client::error::Error),

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The channel closed before an exit status arrived. Executors treat this
    /// as connection-level, so the command is re-run once on a fresh session.
    #[error("remote command ended without reporting an exit status")]
    NoExitStatus,

    #[error("session is closed")]
    Closed,

    #[error("connection refused: {0}")]
    Refused(String),
}

/// Failure of a registry or executor operation.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Session establishment failed for one or more hosts.
    #[error("failed to connect to {}", describe_failures(.failures))]
    Connect { failures: Vec<(String, SessionError)> },

    /// A session failed mid-use and the single reconnect did not help.
    #[error("connection to {host} lost: {source}")]
    ConnectionLost {
        host: String,
        #[source]
        source: SessionError,
    },

    /// Structured decoding was requested but stdout is not well-formed markup.
    #[error("malformed structured output from {host} for `{command}`: {reason}")]
    MalformedStructuredOutput {
        host: String,
        command: String,
        reason: String,
    },

    #[error("transfer of {path} on {host} failed: {source}")]
    Transfer {
        host: String,
        path: String,
        #[source]
        source: SessionError,
    },

    #[error("no hosts available in the session registry")]
    NoHostsAvailable,

    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ExecError {
    /// Build a single-host connect failure.
    pub fn connect(host: impl Into<String>, source: SessionError) -> Self {
        Self::Connect {
            failures: vec![(host.into(), source)],
        }
    }

    /// Whether this error came from the connection rather than the command.
    ///
    /// Only these errors are eligible for the one transparent reconnect.
    pub fn is_connection_level(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::ConnectionLost { .. })
    }

    /// Hosts that failed to connect, if this is a connect error.
    pub fn failed_hosts(&self) -> Vec<&str> {
        match self {
            Self::Connect { failures } => failures.iter().map(|(h, _)| h.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}

fn describe_failures(failures: &[(String, SessionError)]) -> String {
    failures
        .iter()
        .map(|(host, err)| format!("{host} ({err})"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_level_classification() {
        assert!(ExecError::connect("a", SessionError::Closed).is_connection_level());
        assert!(ExecError::ConnectionLost {
            host: "a".to_string(),
            source: SessionError::NoExitStatus,
        }
        .is_connection_level());
        assert!(!ExecError::NoHostsAvailable.is_connection_level());
        assert!(!ExecError::MalformedStructuredOutput {
            host: "a".to_string(),
            command: "x".to_string(),
            reason: "bad".to_string(),
        }
        .is_connection_level());
    }

    #[test]
    fn test_connect_error_lists_every_host() {
        let err = ExecError::Connect {
            failures: vec![
                ("node1".to_string(), SessionError::Closed),
                ("node2".to_string(), SessionError::AuthFailed("root".to_string())),
            ],
        };
        let message = err.to_string();
        assert!(message.contains("node1 (session is closed)"));
        assert!(message.contains("node2 (authentication failed for user root)"));
        assert_eq!(err.failed_hosts(), vec!["node1", "node2"]);
    }
}
