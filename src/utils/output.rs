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

//! Terminal rendering of outcomes for the command-line tool.

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::io::Write;

use crate::executor::{Outcome, Payload};

/// Write `outcomes` to stdout, as JSON when `json` is set.
pub fn print_outcomes(outcomes: &[Outcome], json: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, outcomes).context("Failed to serialize outcomes")?;
        writeln!(out)?;
    } else {
        for outcome in outcomes {
            out.write_all(format_outcome(outcome).as_bytes())?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Human-readable block for one outcome.
pub fn format_outcome(outcome: &Outcome) -> String {
    let mut text = String::new();
    let status = if outcome.is_success() {
        format!("{}", "●".green())
    } else {
        format!("{}", "●".red())
    };

    if outcome.is_incomplete() {
        text.push_str(&format!(
            "{} {} {}\n",
            status,
            outcome.host().bold(),
            "still running (detached)".yellow()
        ));
        return text;
    }

    text.push_str(&format!(
        "{} {} {}\n",
        status,
        outcome.host().bold(),
        format!("exit {}", outcome.exit_code()).dimmed()
    ));

    match outcome.payload() {
        Payload::Lines(lines) => {
            for line in lines {
                text.push_str(&format!("  {line}\n"));
            }
        }
        Payload::Structured(value) => {
            let rendered =
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
            for line in rendered.lines() {
                text.push_str(&format!("  {line}\n"));
            }
        }
    }

    for line in outcome.error().lines() {
        text.push_str(&format!("  {}\n", line.red()));
    }
    text
}

/// Report one file transfer.
pub fn print_transfer(host: &str, description: &str, result: &Result<(), crate::ExecError>) {
    match result {
        Ok(()) => println!("{} {}: {}", "●".green(), host.bold(), description.green()),
        Err(e) => {
            println!("{} {}: {}", "●".red(), host.bold(), "transfer failed".red());
            println!("    {}", e.to_string().dimmed());
        }
    }
}
