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

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::ssh::known_hosts::StrictHostKeyChecking;

#[derive(Parser, Debug)]
#[command(
    name = "cluster-exec",
    version,
    about = "Run commands and move files across the hosts of a cluster over SSH",
    long_about = "cluster-exec keeps one SSH session per host and runs commands on one host, on a\nrandom host, or on every host at once. Results are printed per host, or as JSON with --json.\nA broken session is re-established once, transparently, before a command fails.",
    after_help = "EXAMPLES:\n  Run on one host:             cluster-exec -H server1,server2 exec --host server1 \"printf ok\"\n  Run on a random host:        cluster-exec -c gluster exec \"gluster peer status\"\n  Decode XML output:           cluster-exec -c gluster exec --structured \"gluster volume info --xml\"\n  Run on every host:           cluster-exec -c gluster broadcast \"systemctl restart glusterd\"\n  Wait with a deadline:        cluster-exec -c gluster start --timeout 30 \"gluster volume heal v1\"\n  Upload a file:               cluster-exec -H server1 push ./brick.conf /etc/brick.conf --host server1 --overwrite"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        help = "Configuration file path [default: ~/.config/cluster-exec/config.yaml]"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        short = 'c',
        long,
        global = true,
        help = "Cluster name from configuration file"
    )]
    pub cluster: Option<String>,

    #[arg(
        short = 'H',
        long,
        global = true,
        value_delimiter = ',',
        help = "Comma-separated list of hosts in hostname[:port] format\nAdded to the hosts of --cluster when both are given"
    )]
    pub hosts: Option<Vec<String>>,

    #[arg(short = 'u', long, global = true, help = "Login user [default: root]")]
    pub user: Option<String>,

    #[arg(
        short = 'i',
        long,
        global = true,
        help = "SSH private key file path\nFalls back to ~/.ssh/id_ed25519, ~/.ssh/id_rsa or ~/.ssh/id_ecdsa"
    )]
    pub identity: Option<PathBuf>,

    #[arg(
        short = 'A',
        long,
        global = true,
        help = "Use SSH agent for authentication (requires SSH_AUTH_SOCK)"
    )]
    pub use_agent: bool,

    #[arg(
        long,
        global = true,
        env = "CLUSTER_EXEC_PASSWORD",
        hide_env_values = true,
        help = "Password for password authentication"
    )]
    pub password: Option<String>,

    #[arg(
        long,
        global = true,
        env = "CLUSTER_EXEC_KEY_PASSPHRASE",
        hide_env_values = true,
        help = "Passphrase for an encrypted private key"
    )]
    pub key_passphrase: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Session establishment timeout in seconds [default: 30]"
    )]
    pub connect_timeout: Option<u64>,

    #[arg(
        long,
        global = true,
        value_parser = parse_strict_mode,
        help = "Host key checking mode (yes/no/accept-new) [default: accept-new]\n  yes        - Strict checking against known_hosts\n  no         - Accept all host keys (testing only)\n  accept-new - Accept and remember new hosts, reject changed keys"
    )]
    pub strict_host_key_checking: Option<StrictHostKeyChecking>,

    #[arg(long, global = true, help = "Print outcomes as JSON")]
    pub json: bool,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Execute a command on one host and wait for it",
        long_about = "Runs the command on --host, or on a random registered host when --host is omitted.\n\nExit codes: 0 (command succeeded), 1 (non-zero exit or error)"
    )]
    Exec {
        #[arg(long, help = "Target host [default: random registered host]")]
        host: Option<String>,

        #[arg(long, help = "Decode stdout as XML into a JSON tree")]
        structured: bool,

        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    #[command(
        about = "Execute a command on every host at once",
        long_about = "Runs the command concurrently on every target host. Outcomes are printed in\ncompletion order. Hosts that could not run the command are reported on stderr.\n\nExit codes: 0 (all succeeded), 1 (any failure or missing host)"
    )]
    Broadcast {
        #[arg(long, help = "Decode stdout as XML into a JSON tree")]
        structured: bool,

        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    #[command(
        about = "Launch a command and wait for it with an optional deadline",
        long_about = "Starts the command without blocking, then waits for it. With --timeout, gives up\nafter that many seconds and leaves the remote command running."
    )]
    Start {
        #[arg(long, help = "Target host [default: random registered host]")]
        host: Option<String>,

        #[arg(long, help = "Seconds to wait before giving up")]
        timeout: Option<u64>,

        #[arg(long, help = "Decode stdout as XML into a JSON tree")]
        structured: bool,

        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },

    #[command(about = "Upload a local file to a host over SFTP")]
    Push {
        local: PathBuf,

        remote: String,

        #[arg(long, required = true)]
        host: String,

        #[arg(long, help = "Remove an existing remote file first")]
        overwrite: bool,
    },

    #[command(about = "Download a file from a host over SFTP")]
    Fetch {
        remote: String,

        local: PathBuf,

        #[arg(long, required = true)]
        host: String,
    },
}

fn parse_strict_mode(value: &str) -> Result<StrictHostKeyChecking, String> {
    value.parse()
}

impl Cli {
    /// Hosts named directly on the command line.
    pub fn explicit_hosts(&self) -> Vec<String> {
        self.hosts
            .iter()
            .flatten()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_exec_parsing() {
        let cli = Cli::try_parse_from([
            "cluster-exec",
            "-H",
            "server1, server2:2222",
            "exec",
            "--host",
            "server1",
            "--structured",
            "gluster",
            "volume",
            "info",
            "--xml",
        ])
        .unwrap();

        assert_eq!(cli.explicit_hosts(), vec!["server1", "server2:2222"]);
        match cli.command {
            Commands::Exec {
                host,
                structured,
                command,
            } => {
                assert_eq!(host.as_deref(), Some("server1"));
                assert!(structured);
                assert_eq!(command.join(" "), "gluster volume info --xml");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "cluster-exec",
            "broadcast",
            "-c",
            "gluster",
            "--strict-host-key-checking",
            "no",
            "-vv",
            "hostname",
        ])
        .unwrap();
        assert_eq!(cli.cluster.as_deref(), Some("gluster"));
        assert_eq!(cli.strict_host_key_checking, Some(StrictHostKeyChecking::No));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_invalid_strict_mode() {
        let result = Cli::try_parse_from([
            "cluster-exec",
            "--strict-host-key-checking",
            "maybe",
            "exec",
            "true",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_push_requires_host() {
        assert!(Cli::try_parse_from(["cluster-exec", "push", "a", "/tmp/a"]).is_err());
    }
}
