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

//! Command execution over SSH channels.

use russh::client::Msg;
use russh::{Channel, ChannelMsg, Sig};

use super::client::SshSession;
use crate::error::SessionError;
use crate::session::{OutputSink, ProcessStdin, RawOutput, RemoteProcess};

/// Initial stdout capacity; matches typical SSH channel window chunks.
const SSH_CMD_BUFFER_SIZE: usize = 8192;

/// Initial stderr capacity; stderr is usually a few short lines.
const SSH_RESPONSE_BUFFER_SIZE: usize = 1024;

/// Exit code reported for a signal without a conventional number.
const UNKNOWN_SIGNAL_EXIT_CODE: i32 = 255;

impl SshSession {
    /// Run `command` in a new channel and wait for it to exit.
    ///
    /// Every invocation is a new shell context, so `cd` and variables do not
    /// carry over between calls.
    pub(super) async fn run(&self, command: &str) -> Result<RawOutput, SessionError> {
        let channel = self.open_exec(command).await?;
        drain(channel, OutputSink::attached()).await
    }

    /// Launch `command` and return as soon as the remote side accepted it.
    pub(super) async fn launch(&self, command: &str) -> Result<RemoteProcess, SessionError> {
        let channel = self.open_exec(command).await?;
        let stdin: ProcessStdin = Box::pin(channel.make_writer());
        Ok(RemoteProcess::spawn_draining(Some(stdin), |sink| {
            drain(channel, sink)
        }))
    }

    async fn open_exec(&self, command: &str) -> Result<Channel<Msg>, SessionError> {
        let channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;
        Ok(channel)
    }
}

/// Collect stdout, stderr and the exit status until the channel closes.
async fn drain(mut channel: Channel<Msg>, mut sink: OutputSink) -> Result<RawOutput, SessionError> {
    sink.reserve(SSH_CMD_BUFFER_SIZE, SSH_RESPONSE_BUFFER_SIZE);
    let mut exit_code: Option<i32> = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => sink.stdout(data),
            ChannelMsg::ExtendedData { ref data, ext } if ext == 1 => sink.stderr(data),
            // The exit status may arrive before the last data, so keep reading
            // until the channel closes.
            ChannelMsg::ExitStatus { exit_status } => {
                exit_code = Some(i32::try_from(exit_status).unwrap_or(UNKNOWN_SIGNAL_EXIT_CODE))
            }
            ChannelMsg::ExitSignal { signal_name, .. } => {
                sink.stderr(format!("terminated by signal {signal_name:?}\n").as_bytes());
                exit_code = Some(signal_exit_code(&signal_name));
            }
            _ => {}
        }
    }

    exit_code
        .map(|exit_code| sink.into_raw(exit_code))
        .ok_or(SessionError::NoExitStatus)
}

/// Shell convention: 128 + signal number.
fn signal_exit_code(signal: &Sig) -> i32 {
    let number = match signal {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::USR1 => 10,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        _ => return UNKNOWN_SIGNAL_EXIT_CODE,
    };
    128 + number
}
