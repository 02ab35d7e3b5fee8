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

//! Conversion of raw exit code and output streams into an [`Outcome`].

use super::command::Command;
use super::markup;
use super::outcome::{Outcome, Payload};
use crate::error::ExecError;
use crate::session::RawOutput;

/// Split process output into lines.
///
/// Lines end at `\n` with an optional preceding `\r`; trailing empty lines
/// are dropped, so `"ok"`, `"ok\n"` and `"ok\r\n\n"` all give `["ok"]`.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
        .collect();
    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

/// Build the outcome of `command` on `host` from its raw output.
///
/// Structured decoding is only attempted for successful commands; a failed
/// command always carries its stdout as lines and its stderr as the error.
pub fn normalize(raw: &RawOutput, command: &Command, host: &str) -> Result<Outcome, ExecError> {
    let stdout = raw.stdout_string();

    if raw.exit_code != 0 {
        let error = split_lines(&raw.stderr_string()).join("\n");
        return Ok(Outcome::finished(
            host,
            command.text(),
            raw.exit_code,
            Payload::Lines(split_lines(&stdout)),
            error,
        ));
    }

    let payload = if command.is_structured() {
        let value = markup::parse(&stdout).map_err(|reason| ExecError::MalformedStructuredOutput {
            host: host.to_string(),
            command: command.text().to_string(),
            reason,
        })?;
        Payload::Structured(value)
    } else {
        Payload::Lines(split_lines(&stdout))
    };

    Ok(Outcome::finished(host, command.text(), 0, payload, String::new()))
}
