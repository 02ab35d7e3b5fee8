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

//! Command execution on top of a [`SessionRegistry`](crate::session::SessionRegistry).
//!
//! - [`Executor::execute`] runs one command on one host and waits for it.
//! - [`Executor::start`] launches a command and returns an [`AsyncHandle`].
//! - [`Executor::broadcast`] runs one command on many hosts at once.
//! - [`Executor::push`] and [`Executor::fetch`] move files over SFTP.
//!
//! Every finished command is turned into an [`Outcome`] by [`normalize`].

mod async_exec;
mod command;
mod markup;
mod normalize;
mod outcome;
mod parallel;
mod single;
mod transfer;

pub use async_exec::{AsyncHandle, WAIT_POLL_INTERVAL};
pub use command::Command;
pub use normalize::{normalize, split_lines};
pub use outcome::{Outcome, Payload, INCOMPLETE_EXIT_CODE, INCOMPLETE_MESSAGE};
pub use parallel::missing_hosts;
pub use single::Executor;
