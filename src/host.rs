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

use std::fmt;

/// Default SSH port used when a host identity carries no explicit port.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Network address of a host identity.
///
/// Host identities are plain strings used as registry keys; this type is only
/// the connect-time view of such a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAddr {
    pub host: String,
    pub port: u16,
}

impl HostAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a host identity with `default_port` as fallback.
    ///
    /// Accepted forms:
    /// - host
    /// - host:port
    /// - [ipv6]
    /// - [ipv6]:port
    /// - bare ipv6 (more than one colon, no port)
    pub fn parse(identity: &str, default_port: u16) -> Result<Self, String> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err("empty host".to_string());
        }

        if let Some(rest) = identity.strip_prefix('[') {
            let Some(close) = rest.find(']') else {
                return Err(format!("unterminated '[' in host {identity}"));
            };
            let host = &rest[..close];
            let tail = &rest[close + 1..];
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(port, identity)?,
                None if tail.is_empty() => default_port,
                None => return Err(format!("unexpected text after ']' in host {identity}")),
            };
            return Ok(Self::new(host, port));
        }

        match identity.matches(':').count() {
            0 => Ok(Self::new(identity, default_port)),
            1 => {
                // count() == 1 guarantees the split succeeds
                let (host, port) = identity.split_once(':').unwrap_or((identity, ""));
                if host.is_empty() {
                    return Err(format!("missing hostname in {identity}"));
                }
                Ok(Self::new(host, parse_port(port, identity)?))
            }
            _ => Ok(Self::new(identity, default_port)),
        }
    }
}

fn parse_port(port: &str, identity: &str) -> Result<u16, String> {
    port.parse::<u16>()
        .map_err(|_| format!("invalid port number in host {identity}"))
}

impl fmt::Display for HostAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}
