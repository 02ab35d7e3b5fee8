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

/// A shell command to run on one host.
///
/// The command text is opaque to the executor. Whether stdout should be
/// decoded as structured markup is declared here by the caller, never guessed
/// from the text or the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    host: Option<String>,
    structured: bool,
}

impl Command {
    /// A plain-output command for any registered host.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            host: None,
            structured: false,
        }
    }

    /// Target a specific host instead of a random one.
    pub fn on(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Request decoding of stdout as structured markup.
    pub fn structured(self) -> Self {
        self.with_structured(true)
    }

    pub fn with_structured(mut self, structured: bool) -> Self {
        self.structured = structured;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn is_structured(&self) -> bool {
        self.structured
    }
}

impl From<&str> for Command {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for Command {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}
