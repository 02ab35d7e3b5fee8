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

//! Remote command execution across a cluster of hosts.
//!
//! A [`SessionRegistry`] owns one SSH session per host and re-establishes
//! broken sessions on demand. An [`Executor`] runs [`Command`]s on those
//! sessions (one host, a random host, or every host at once) and turns each
//! result into an [`Outcome`], decoding XML output into a JSON tree when the
//! command asks for it.
//!
//! ```no_run
//! use std::sync::Arc;
//! use cluster_exec::ssh::{get_check_method, AuthMethod, SshConnector, StrictHostKeyChecking};
//! use cluster_exec::{Command, Executor, LoginIdentity, SessionRegistry};
//!
//! # async fn demo() -> Result<(), cluster_exec::ExecError> {
//! let connector = SshConnector::new(get_check_method(StrictHostKeyChecking::AcceptNew));
//! let identity = LoginIdentity::new("root", AuthMethod::with_agent());
//! let registry = Arc::new(SessionRegistry::new(connector, identity));
//! registry
//!     .open(&["server1".to_string(), "server2".to_string()])
//!     .await?;
//!
//! let executor = Executor::new(Arc::clone(&registry));
//! let outcome = executor
//!     .execute(&Command::new("gluster volume info --xml").on("server1").structured())
//!     .await?;
//! assert!(outcome.structured().is_some() || !outcome.is_success());
//!
//! registry.close().await;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod host;
pub mod session;
pub mod ssh;
pub mod utils;

pub use cli::Cli;
pub use config::Config;
pub use error::{ExecError, SessionError};
pub use executor::{AsyncHandle, Command, Executor, Outcome, Payload};
pub use host::HostAddr;
pub use session::{Connector, LoginIdentity, RawOutput, Session, SessionRegistry};
