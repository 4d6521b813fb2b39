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

pub mod commands;
pub mod exec;
pub mod printer;
pub mod rollout;
pub mod set_resources;

pub use self::commands::{CliArgs, Commands, RolloutCommands, SetCommands};

use crate::domain::config::PluginConfig;
use crate::infrastructure::constants::DEFAULT_NAMESPACE;
use crate::infrastructure::kubernetes::KruiseClient;
use crate::shared::error::{KruiseError, Result};

/// Cluster access options shared by every command.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct KubeOptions {
    /// Path to the kubeconfig file to use
    #[arg(long, global = true)]
    pub kubeconfig: Option<String>,

    /// The name of the kubeconfig context to use
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// If present, the namespace scope for this CLI request
    #[arg(long, short = 'n', global = true)]
    pub namespace: Option<String>,
}

/// What a command needs to talk to the cluster.
pub struct CommandContext<'a> {
    client: Option<&'a dyn KruiseClient>,
    pub namespace: String,
    /// The namespace came from `-n` and file objects must agree with it.
    pub enforce_namespace: bool,
    pub config: PluginConfig,
}

impl<'a> CommandContext<'a> {
    pub fn new(client: &'a dyn KruiseClient, options: &KubeOptions, config: PluginConfig) -> Self {
        let (namespace, enforce_namespace) = match &options.namespace {
            Some(ns) => (ns.clone(), true),
            None => (client.default_namespace().to_string(), false),
        };
        Self {
            client: Some(client),
            namespace,
            enforce_namespace,
            config,
        }
    }

    /// Context for commands that never contact the server.
    pub fn local(options: &KubeOptions, config: PluginConfig) -> Self {
        let (namespace, enforce_namespace) = match &options.namespace {
            Some(ns) => (ns.clone(), true),
            None => (DEFAULT_NAMESPACE.to_string(), false),
        };
        Self {
            client: None,
            namespace,
            enforce_namespace,
            config,
        }
    }

    pub fn client(&self) -> Result<&'a dyn KruiseClient> {
        self.client.ok_or_else(|| {
            KruiseError::config_error("a cluster connection is required for this command")
        })
    }

    pub fn client_opt(&self) -> Option<&'a dyn KruiseClient> {
        self.client
    }
}
