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

//! Host key verification policy.

use std::path::PathBuf;
use std::str::FromStr;

/// How the client verifies a server's host key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ServerCheckMethod {
    /// Accept any host key (lab clusters only)
    NoCheck,
    /// Verify against ~/.ssh/known_hosts, rejecting unknown hosts
    DefaultKnownHostsFile,
    /// Verify against a specific known_hosts file
    KnownHostsFile(String),
    /// Verify against ~/.ssh/known_hosts, learning unknown hosts on first contact
    AcceptNew,
}

/// Mode for host key checking, as written in config files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrictHostKeyChecking {
    /// Always verify host keys (fail on unknown/changed)
    Yes,
    /// Never verify host keys (accept all)
    No,
    /// Verify known hosts, add new ones automatically (TOFU)
    #[default]
    AcceptNew,
}

impl FromStr for StrictHostKeyChecking {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yes" | "true" => Ok(Self::Yes),
            "no" | "false" => Ok(Self::No),
            "accept-new" | "tofu" => Ok(Self::AcceptNew),
            other => Err(format!(
                "invalid host key checking mode '{other}' (expected yes, no or accept-new)"
            )),
        }
    }
}

/// Get the default known_hosts file path
pub fn get_default_known_hosts_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(".ssh").join("known_hosts"))
}

/// Create a ServerCheckMethod based on strict host key checking mode
pub fn get_check_method(strict_mode: StrictHostKeyChecking) -> ServerCheckMethod {
    match strict_mode {
        StrictHostKeyChecking::Yes => ServerCheckMethod::DefaultKnownHostsFile,
        StrictHostKeyChecking::No => {
            tracing::debug!("Host key checking disabled (strict mode = no)");
            ServerCheckMethod::NoCheck
        }
        StrictHostKeyChecking::AcceptNew => ServerCheckMethod::AcceptNew,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_host_key_checking_from_str() {
        assert_eq!("yes".parse(), Ok(StrictHostKeyChecking::Yes));
        assert_eq!("TRUE".parse(), Ok(StrictHostKeyChecking::Yes));
        assert_eq!("no".parse(), Ok(StrictHostKeyChecking::No));
        assert_eq!("accept-new".parse(), Ok(StrictHostKeyChecking::AcceptNew));
        assert_eq!("tofu".parse(), Ok(StrictHostKeyChecking::AcceptNew));
        assert!("maybe".parse::<StrictHostKeyChecking>().is_err());
    }

    #[test]
    fn test_get_check_method() {
        assert_eq!(
            get_check_method(StrictHostKeyChecking::No),
            ServerCheckMethod::NoCheck
        );
        assert_eq!(
            get_check_method(StrictHostKeyChecking::Yes),
            ServerCheckMethod::DefaultKnownHostsFile
        );
        assert_eq!(
            get_check_method(StrictHostKeyChecking::AcceptNew),
            ServerCheckMethod::AcceptNew
        );
    }
}
