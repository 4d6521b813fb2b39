// Copyright 2025 JiangLong.
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

// CLI command definitions

use super::exec::ExecCommand;
use super::rollout::RolloutApproveCommand;
use super::set_resources::SetResourcesCommand;
use super::KubeOptions;
use clap::{ArgAction, Parser};

#[derive(Parser, Debug)]
#[command(
    name = "kubectl-kruise",
    bin_name = "kubectl kruise",
    version,
    about = "kubectl plugin for OpenKruise workloads",
    long_about = "Execute commands in containers, update resource requirements and approve \
                  rollouts for OpenKruise CloneSet, Advanced StatefulSet and Rollout objects"
)]
pub struct CliArgs {
    #[command(flatten)]
    pub kube: KubeOptions,

    /// Log verbosity, repeat for more detail (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Execute a command in a container
    Exec(ExecCommand),

    /// Set specific features on objects
    #[command(subcommand)]
    Set(SetCommands),

    /// Manage the rollout of a resource
    #[command(subcommand)]
    Rollout(RolloutCommands),
}

#[derive(clap::Subcommand, Debug)]
pub enum SetCommands {
    /// Update resource requests/limits on objects with pod templates
    Resources(SetResourcesCommand),
}

#[derive(clap::Subcommand, Debug)]
pub enum RolloutCommands {
    /// Approve the paused canary step of a Rollout
    Approve(RolloutApproveCommand),
}

impl CliArgs {
    pub async fn execute(&self) -> anyhow::Result<()> {
        match &self.command {
            Commands::Exec(cmd) => cmd.execute(&self.kube).await,
            Commands::Set(SetCommands::Resources(cmd)) => cmd.execute(&self.kube).await,
            Commands::Rollout(RolloutCommands::Approve(cmd)) => cmd.execute(&self.kube).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_exec() {
        let args = CliArgs::try_parse_from([
            "kubectl-kruise", "-n", "team-a", "exec", "-it", "web-0", "-c", "nginx", "--", "sh",
            "-c", "ls",
        ])
        .unwrap();
        assert_eq!(args.kube.namespace.as_deref(), Some("team-a"));
        let Commands::Exec(exec) = args.command else {
            panic!("expected exec");
        };
        assert_eq!(exec.args, vec!["web-0"]);
        assert_eq!(exec.command, vec!["sh", "-c", "ls"]);
        assert!(exec.stdin && exec.tty);
        assert_eq!(exec.container.as_deref(), Some("nginx"));
    }

    #[test]
    fn test_parse_set_resources() {
        let args = CliArgs::try_parse_from([
            "kubectl-kruise",
            "set",
            "resources",
            "cloneset/sample",
            "--limits=cpu=200m",
            "--dry-run=server",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.verbose, 2);
        let Commands::Set(SetCommands::Resources(cmd)) = args.command else {
            panic!("expected set resources");
        };
        assert_eq!(cmd.resources, vec!["cloneset/sample"]);
        assert_eq!(cmd.containers, "*");
        assert_eq!(cmd.dry_run, crate::cli::printer::DryRunStrategy::Server);
    }

    #[test]
    fn test_parse_rollout_approve() {
        let args =
            CliArgs::try_parse_from(["kubectl-kruise", "rollout", "approve", "rollout/demo"]).unwrap();
        assert!(matches!(
            args.command,
            Commands::Rollout(RolloutCommands::Approve(_))
        ));
    }
}
