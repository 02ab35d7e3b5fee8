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

use anyhow::{bail, Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use cluster_exec::{
    cli::{Cli, Commands},
    config::{expand_tilde, Config, Overrides},
    executor::missing_hosts,
    ssh::{get_check_method, AuthContext, SshConnector},
    utils::{init_logging, print_outcomes, print_transfer},
    Command, Executor, LoginIdentity, Outcome, SessionRegistry,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(1)
        }
    }
}

/// Returns whether everything that ran succeeded.
async fn run(cli: Cli) -> Result<bool> {
    if let Some(path) = &cli.config {
        let expanded = expand_tilde(path);
        if !expanded.exists() {
            bail!("Config file not found: {}", expanded.display());
        }
    }
    let config = Config::load_or_default(cli.config.as_deref()).await?;

    let hosts = target_hosts(&cli, &config)?;
    let overrides = Overrides {
        user: cli.user.clone(),
        ssh_key: cli.identity.clone(),
        use_agent: cli.use_agent,
        connect_timeout: cli.connect_timeout,
        strict_host_key_checking: cli.strict_host_key_checking,
    };
    let settings = config.resolve(cli.cluster.as_deref(), &overrides)?;
    tracing::debug!("Resolved settings: {:?}", settings);

    let auth = AuthContext::new()
        .with_key_path(settings.ssh_key.clone())
        .with_key_passphrase(cli.key_passphrase.clone())
        .with_agent(settings.use_agent)
        .with_password(cli.password.clone())
        .determine_method()
        .context("Failed to choose an authentication method")?;

    let connector = SshConnector::new(get_check_method(settings.strict_host_key_checking))
        .with_keepalive(settings.keepalive_interval)
        .with_default_port(settings.port);
    let registry = Arc::new(
        SessionRegistry::new(connector, LoginIdentity::new(settings.user.clone(), auth))
            .with_connect_timeout(Some(settings.connect_timeout)),
    );

    if let Err(e) = registry.open(&hosts).await {
        // Failed hosts stay registered and are retried on first use.
        eprintln!("{} {}", "Warning:".yellow().bold(), e);
    }

    let executor = Executor::new(Arc::clone(&registry));
    let result = dispatch(&executor, cli, &hosts).await;
    registry.close().await;
    result
}

fn target_hosts(cli: &Cli, config: &Config) -> Result<Vec<String>> {
    let mut hosts = match &cli.cluster {
        Some(name) => config.cluster_hosts(name)?,
        None => Vec::new(),
    };
    for host in cli.explicit_hosts() {
        if !hosts.contains(&host) {
            hosts.push(host);
        }
    }
    if hosts.is_empty() {
        bail!("No hosts specified. Use -H host1,host2 or -c <cluster>.");
    }
    Ok(hosts)
}

async fn dispatch(executor: &Executor<SshConnector>, cli: Cli, hosts: &[String]) -> Result<bool> {
    let json = cli.json;
    match cli.command {
        Commands::Exec {
            host,
            structured,
            command,
        } => {
            let command = build_command(command, host, structured);
            let outcome = executor.execute(&command).await?;
            report(&[outcome], json)
        }
        Commands::Broadcast {
            structured,
            command,
        } => {
            let command = build_command(command, None, structured);
            let outcomes = executor.broadcast_command(&command, Some(hosts)).await;
            let missing = missing_hosts(hosts, &outcomes);
            for host in &missing {
                eprintln!(
                    "{} {}: {}",
                    "●".red(),
                    host.bold(),
                    "no result (see log for details)".red()
                );
            }
            Ok(report(&outcomes, json)? && missing.is_empty())
        }
        Commands::Start {
            host,
            timeout,
            structured,
            command,
        } => {
            let command = build_command(command, host, structured);
            let handle = executor.start(&command).await?;
            tracing::info!("Started `{}` on {}", command.text(), handle.host());
            let outcome = handle.wait(timeout.map(Duration::from_secs)).await?;
            report(&[outcome], json)
        }
        Commands::Push {
            local,
            remote,
            host,
            overwrite,
        } => {
            let result = executor.push(&local, &remote, &host, overwrite).await;
            let ok = result.is_ok();
            print_transfer(&host, &format!("uploaded to {remote}"), &result);
            Ok(ok)
        }
        Commands::Fetch {
            remote,
            local,
            host,
        } => {
            let result = executor.fetch(&remote, &local, &host).await;
            let ok = result.is_ok();
            print_transfer(&host, &format!("downloaded to {}", local.display()), &result);
            Ok(ok)
        }
    }
}

fn build_command(words: Vec<String>, host: Option<String>, structured: bool) -> Command {
    let mut command = Command::new(words.join(" ")).with_structured(structured);
    if let Some(host) = host {
        command = command.on(host);
    }
    command
}

fn report(outcomes: &[Outcome], json: bool) -> Result<bool> {
    print_outcomes(outcomes, json)?;
    Ok(outcomes.iter().all(Outcome::is_success))
}
