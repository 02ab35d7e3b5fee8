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

//! Normalized result of one executed command.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Exit code of the synthetic outcome produced when a wait times out.
pub const INCOMPLETE_EXIT_CODE: i32 = -1;

/// Error message of the synthetic outcome produced when a wait times out.
pub const INCOMPLETE_MESSAGE: &str = "execution incomplete";

const LOG_PAYLOAD_CHARS: usize = 512;

/// Decoded stdout of a finished command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// stdout split into lines, trailing empty lines removed.
    Lines(Vec<String>),
    /// stdout decoded from structured markup.
    Structured(Value),
}

impl Payload {
    /// Short single-line rendering for logs.
    pub fn summary(&self, max_chars: usize) -> String {
        let full = match self {
            Self::Lines(lines) => lines.join("\\n"),
            Self::Structured(value) => value.to_string(),
        };
        if full.chars().count() <= max_chars {
            return full;
        }
        let mut truncated: String = full.chars().take(max_chars).collect();
        truncated.push_str("...");
        truncated
    }
}

/// Result of one command on one host.
///
/// Immutable once built; `is_success()` is exactly `exit_code() == 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    host: String,
    command: String,
    exit_code: i32,
    success: bool,
    payload: Payload,
    error: String,
}

impl Outcome {
    pub(crate) fn finished(
        host: impl Into<String>,
        command: impl Into<String>,
        exit_code: i32,
        payload: Payload,
        error: String,
    ) -> Self {
        Self {
            host: host.into(),
            command: command.into(),
            exit_code,
            success: exit_code == 0,
            payload,
            error,
        }
    }

    /// The outcome of a command still running when its wait timed out.
    pub(crate) fn incomplete(host: impl Into<String>, command: impl Into<String>) -> Self {
        Self::finished(
            host,
            command,
            INCOMPLETE_EXIT_CODE,
            Payload::Lines(Vec::new()),
            INCOMPLETE_MESSAGE.to_string(),
        )
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// stderr text of a failed command; empty on success.
    pub fn error(&self) -> &str {
        &self.error
    }

    /// Line payload, if the command was not structured or failed.
    pub fn lines(&self) -> Option<&[String]> {
        match &self.payload {
            Payload::Lines(lines) => Some(lines),
            Payload::Structured(_) => None,
        }
    }

    pub fn structured(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Structured(value) => Some(value),
            Payload::Lines(_) => None,
        }
    }

    /// True only for the synthetic timeout outcome, never for a real exit.
    pub fn is_incomplete(&self) -> bool {
        self.exit_code == INCOMPLETE_EXIT_CODE && self.error == INCOMPLETE_MESSAGE
    }

    /// Audit record of this outcome.
    pub(crate) fn log(&self) {
        debug!(
            "[{}] `{}` exited with {} (success: {}): payload={} error={:?}",
            self.host,
            self.command,
            self.exit_code,
            self.success,
            self.payload.summary(LOG_PAYLOAD_CHARS),
            self.error
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_follows_exit_code() {
        let ok = Outcome::finished("h", "true", 0, Payload::Lines(vec![]), String::new());
        assert!(ok.is_success());

        let failed = Outcome::finished("h", "false", 1, Payload::Lines(vec![]), String::new());
        assert!(!failed.is_success());
        assert!(!failed.is_incomplete());
    }

    #[test]
    fn test_incomplete() {
        let outcome = Outcome::incomplete("server1", "sleep 600");
        assert!(!outcome.is_success());
        assert!(outcome.is_incomplete());
        assert_eq!(outcome.exit_code(), -1);
        assert_eq!(outcome.error(), "execution incomplete");
        assert_eq!(outcome.lines(), Some(&[][..]));
    }

    #[test]
    fn test_payload_accessors() {
        let value = json!({"cliOutput": {"opRet": "0"}});
        let outcome = Outcome::finished(
            "h",
            "gluster volume info --xml",
            0,
            Payload::Structured(value.clone()),
            String::new(),
        );
        assert_eq!(outcome.structured(), Some(&value));
        assert_eq!(outcome.lines(), None);
    }

    #[test]
    fn test_summary_truncates() {
        let payload = Payload::Lines(vec!["a".repeat(20), "b".to_string()]);
        assert_eq!(payload.summary(100), format!("{}\\nb", "a".repeat(20)));
        assert_eq!(payload.summary(5), "aaaaa...");
    }

    #[test]
    fn test_serialize_shape() {
        let outcome = Outcome::finished(
            "server1",
            "printf ok",
            0,
            Payload::Lines(vec!["ok".to_string()]),
            String::new(),
        );
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({
                "host": "server1",
                "command": "printf ok",
                "exit_code": 0,
                "success": true,
                "payload": ["ok"],
                "error": ""
            })
        );
    }
}
