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

use super::printer::{DryRunStrategy, ObjectPrinter};
use super::{CommandContext, KubeOptions};
use crate::domain::config::PluginConfig;
use crate::domain::workload::approve_object;
use crate::infrastructure::kubernetes::builder::{FilenameOptions, ResourceBuilder};
use crate::infrastructure::kubernetes::{KruiseClientImpl, WriteOptions};
use crate::shared::error::{KruiseError, Result};
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug, Clone)]
#[command(
    override_usage = "kubectl kruise rollout approve (TYPE NAME | TYPE/NAME | -f FILENAME)",
    after_help = "Examples:\n  \
        # Approve the paused step of a rollout\n  \
        kubectl kruise rollout approve rollout/demo"
)]
pub struct RolloutApproveCommand {
    /// TYPE NAME... or TYPE/NAME...
    #[arg(value_name = "TYPE NAME")]
    pub resources: Vec<String>,

    /// Filename, directory, or '-' identifying the rollouts to approve
    #[arg(long = "filename", short = 'f')]
    pub filenames: Vec<String>,

    /// Process the directory used in -f recursively
    #[arg(long, short = 'R')]
    pub recursive: bool,

    /// Name of the manager used to track field ownership
    #[arg(long)]
    pub field_manager: Option<String>,

    /// Output format: yaml, json or name
    #[arg(long, short = 'o')]
    pub output: Option<String>,
}

impl RolloutApproveCommand {
    pub async fn execute(&self, kube: &KubeOptions) -> anyhow::Result<()> {
        let config = PluginConfig::load()?;
        let client =
            KruiseClientImpl::connect(kube.kubeconfig.as_deref(), kube.context.as_deref()).await?;
        let ctx = CommandContext::new(&client, kube, config);

        self.run(&ctx, &mut std::io::stdout()).await?;
        Ok(())
    }

    pub async fn run(&self, ctx: &CommandContext<'_>, out: &mut dyn Write) -> Result<()> {
        let printer = ObjectPrinter::new(self.output.as_deref(), "approved", DryRunStrategy::None)?;
        let options = WriteOptions::new(
            ctx.config.resolve_field_manager(self.field_manager.as_deref()),
            false,
        );
        let client = ctx.client()?;

        let infos = ResourceBuilder::new(&ctx.namespace, ctx.enforce_namespace)
            .filenames(FilenameOptions {
                filenames: self.filenames.clone(),
                recursive: self.recursive,
            })
            .resource_args(&self.resources)
            .latest()
            .infos(Some(client))
            .await?;

        let mut errs = Vec::new();
        for mut info in infos {
            let patch = match approve_object(&mut info.object, &info.mapping) {
                Ok(patch) => patch,
                Err(e) => {
                    errs.push(KruiseError::validation(format!(
                        "error: {} \"{}\" {}",
                        info.resource_string(),
                        info.name,
                        e
                    )));
                    continue;
                }
            };

            match client
                .patch_status(
                    &info.mapping,
                    info.namespace.as_deref(),
                    &info.name,
                    &patch,
                    &options,
                )
                .await
            {
                Ok(object) => printer.print(&info.mapping, &object, out)?,
                Err(e) => errs.push(e),
            }
        }

        KruiseError::aggregate(errs)
    }
}
