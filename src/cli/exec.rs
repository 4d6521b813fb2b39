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

//! `exec`: run a command in a container of a pod or of a workload's pod.

use super::{CommandContext, KubeOptions};
use crate::domain::config::PluginConfig;
use crate::domain::workload::kinds::WorkloadKind;
use crate::domain::workload::pods::{
    annotated_default_container, first_pod, hot_upgrade_working_containers, pod_phase,
    workload_selector,
};
use crate::infrastructure::constants::{
    PARENT_COMMAND, POD_PHASE_FAILED, POD_PHASE_SUCCEEDED, POD_POLL_INTERVAL_MS,
};
use crate::infrastructure::kubernetes::builder::{FilenameOptions, Info, ResourceBuilder};
use crate::infrastructure::kubernetes::executor::{
    DefaultRemoteExecutor, ExecRequest, ExecStreams, OutputStream, RemoteExecutor,
};
use crate::infrastructure::kubernetes::terminal::{monitor_size, setup_tty, stdin_stream, RawModeGuard};
use crate::infrastructure::kubernetes::{KruiseClient, KruiseClientImpl};
use crate::shared::error::{KruiseError, Result};
use backon::{ConstantBuilder, Retryable};
use clap::Parser;
use k8s_openapi::api::core::v1::Pod;
use std::io::{IsTerminal, Write};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(
    override_usage = "kubectl kruise exec (POD | TYPE/NAME) [-c CONTAINER] [-S SIDECARSET_CONTAINER] [flags] -- COMMAND [args...]",
    after_help = "Examples:\n  \
        # Get output from running 'date' command from the first pod of cloneset/web\n  \
        kubectl kruise exec cloneset/web -- date\n\n  \
        # Switch to raw terminal mode in the working container of a hot-upgrade sidecar\n  \
        kubectl kruise exec web-0 -S sidecar -it -- bash"
)]
pub struct ExecCommand {
    /// Pod name or TYPE/NAME
    #[arg(value_name = "POD | TYPE/NAME")]
    pub args: Vec<String>,

    /// Command to run, given after `--`
    #[arg(last = true, value_name = "COMMAND")]
    pub command: Vec<String>,

    /// Container name. If omitted, use the default container annotation or the first container
    #[arg(long, short = 'c')]
    pub container: Option<String>,

    /// Sidecar container name of a SidecarSet hot upgrade
    #[arg(long, short = 'S')]
    pub sidecar: Option<String>,

    /// Pass stdin to the container
    #[arg(long, short = 'i')]
    pub stdin: bool,

    /// Stdin is a TTY
    #[arg(long, short = 't')]
    pub tty: bool,

    /// File containing the resource to exec into
    #[arg(long = "filename", short = 'f')]
    pub filenames: Vec<String>,

    /// How long to wait until at least one pod is running (e.g. 5s, 2m, 3h)
    #[arg(long)]
    pub pod_running_timeout: Option<String>,

    /// Only print output from the remote session
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

/// Resource name and command after argument completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecTarget {
    pub resource_name: Option<String>,
    pub command: Vec<String>,
}

impl ExecCommand {
    pub async fn execute(&self, kube: &KubeOptions) -> anyhow::Result<()> {
        let config = PluginConfig::load()?;
        let client =
            KruiseClientImpl::connect(kube.kubeconfig.as_deref(), kube.context.as_deref()).await?;
        let executor = DefaultRemoteExecutor::new(client.get_client());
        let ctx = CommandContext::new(&client, kube, config);

        self.run(&ctx, &executor, &mut std::io::stderr()).await?;
        Ok(())
    }

    /// Splits positionals into the target and the command, warning about the
    /// deprecated `exec POD COMMAND` form.
    pub fn complete(&self, err_out: &mut dyn Write) -> Result<ExecTarget> {
        if !self.command.is_empty() {
            return Ok(ExecTarget {
                resource_name: self.args.first().cloned(),
                command: self.command.clone(),
            });
        }

        let target = match self.args.split_first() {
            Some((name, rest)) if !rest.is_empty() => ExecTarget {
                resource_name: Some(name.clone()),
                command: rest.to_vec(),
            },
            // With -f a lone positional is the command.
            Some(_) if !self.filenames.is_empty() => ExecTarget {
                resource_name: None,
                command: self.args.clone(),
            },
            Some((name, _)) => ExecTarget {
                resource_name: Some(name.clone()),
                command: Vec::new(),
            },
            None => ExecTarget {
                resource_name: None,
                command: Vec::new(),
            },
        };

        if !target.command.is_empty() && !self.quiet {
            writeln!(
                err_out,
                "{} exec [POD] [COMMAND] is DEPRECATED and will be removed in a future version. Use {} exec [POD] -- [COMMAND] instead.",
                PARENT_COMMAND, PARENT_COMMAND
            )?;
        }
        Ok(target)
    }

    pub fn validate(&self, target: &ExecTarget) -> Result<()> {
        if target.resource_name.as_deref().unwrap_or("").is_empty() && self.filenames.is_empty() {
            return Err(KruiseError::usage(
                "pod, type/name or --filename must be specified",
            ));
        }
        if target.command.is_empty() {
            return Err(KruiseError::usage(
                "you must specify at least one command for the container",
            ));
        }
        Ok(())
    }

    pub async fn run(
        &self,
        ctx: &CommandContext<'_>,
        executor: &dyn RemoteExecutor,
        err_out: &mut dyn Write,
    ) -> Result<()> {
        let target = self.complete(err_out)?;
        self.validate(&target)?;
        let timeout = ctx
            .config
            .resolve_pod_running_timeout(self.pod_running_timeout.as_deref())?;

        let client = ctx.client()?;
        let pod = self.resolve_pod(ctx, client, &target, timeout).await?;

        let phase = pod_phase(&pod);
        if phase == POD_PHASE_SUCCEEDED || phase == POD_PHASE_FAILED {
            return Err(KruiseError::validation(format!(
                "cannot exec into a container in a completed pod; current phase is {}",
                phase
            )));
        }

        let pod_name = pod.metadata.name.clone().unwrap_or_default();
        let namespace = pod
            .metadata
            .namespace
            .clone()
            .unwrap_or_else(|| ctx.namespace.clone());

        let choice = choose_container(&pod, self.container.as_deref(), self.sidecar.as_deref())?;
        if !self.quiet {
            for notice in choice.notices(&pod_name, &namespace) {
                writeln!(err_out, "{}", notice)?;
            }
        }

        let tty = setup_tty(self.stdin, self.tty, std::io::stdin().is_terminal());
        if let Some(warning) = tty.warning {
            if !self.quiet {
                writeln!(err_out, "{}", warning)?;
            }
        }

        let request = ExecRequest {
            namespace,
            pod: pod_name,
            container: choice.name,
            command: target.command,
            stdin: tty.stdin,
            stdout: true,
            stderr: !tty.raw,
            tty: tty.raw,
        };

        let stdin = if tty.stdin {
            Some(stdin_stream()?)
        } else {
            None
        };
        let streams = ExecStreams {
            stdin,
            stdout: Box::new(tokio::io::stdout()),
            stderr: (!tty.raw).then(|| Box::new(tokio::io::stderr()) as OutputStream),
            resize: tty.raw.then(monitor_size),
        };

        let guard = if tty.raw {
            Some(RawModeGuard::enable()?)
        } else {
            None
        };
        let result = executor.execute(&request, streams).await;
        drop(guard);
        result
    }

    async fn resolve_pod(
        &self,
        ctx: &CommandContext<'_>,
        client: &dyn KruiseClient,
        target: &ExecTarget,
        timeout: Duration,
    ) -> Result<Pod> {
        let args: Vec<String> = target.resource_name.iter().cloned().collect();
        let infos = ResourceBuilder::new(&ctx.namespace, ctx.enforce_namespace)
            .filenames(FilenameOptions {
                filenames: self.filenames.clone(),
                recursive: false,
            })
            .resource_args(&args)
            .default_type("pods")
            .latest()
            .infos(Some(client))
            .await?;

        let info = match <[Info; 1]>::try_from(infos) {
            Ok([info]) => info,
            Err(infos) if infos.is_empty() => {
                return Err(KruiseError::validation("no resources found to exec into"))
            }
            Err(_) => {
                return Err(KruiseError::validation(
                    "exec requires exactly one resource, but several were given",
                ))
            }
        };

        if info.mapping.workload == WorkloadKind::Pod {
            return Ok(serde_json::from_value(serde_json::to_value(&info.object)?)?);
        }

        let selector = workload_selector(&info.object.data, &info.mapping)?;
        let namespace = info.namespace.clone().unwrap_or_else(|| ctx.namespace.clone());
        tracing::debug!(
            "Waiting up to {:?} for a pod of {} matching {}",
            timeout,
            info.object_name(),
            selector
        );
        wait_for_first_pod(client, &namespace, &selector, timeout).await
    }
}

/// Polls for the pod an exec session should attach to until `timeout`.
pub async fn wait_for_first_pod(
    client: &dyn KruiseClient,
    namespace: &str,
    selector: &str,
    timeout: Duration,
) -> Result<Pod> {
    let interval = Duration::from_millis(POD_POLL_INTERVAL_MS);
    let attempts = (timeout.as_millis() / interval.as_millis()).max(1) as usize;

    let lookup = move || {
        let selector = selector.to_string();
        async move {
            let pods = client.list_pods(namespace, &selector).await?;
            first_pod(pods).ok_or_else(|| {
                KruiseError::Timeout(format!(
                    "no pod matching {} found in namespace {}",
                    selector, namespace
                ))
            })
        }
    };

    lookup
        .retry(
            ConstantBuilder::default()
                .with_delay(interval)
                .with_max_times(attempts),
        )
        .sleep(tokio::time::sleep)
        .when(|e: &KruiseError| matches!(e, KruiseError::Timeout(_)))
        .await
}

/// Container picked for a session and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerChoice {
    pub name: String,
    pub reason: ChoiceReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceReason {
    HotUpgradeSidecar,
    Explicit,
    Annotated,
    /// First container of a pod with several containers.
    Defaulted,
    Only,
}

impl ContainerChoice {
    pub fn notices(&self, pod_name: &str, namespace: &str) -> Vec<String> {
        match self.reason {
            ChoiceReason::HotUpgradeSidecar => {
                vec![format!("Enter working container {} of SidecarSet.", self.name)]
            }
            ChoiceReason::Defaulted => vec![
                format!("Defaulting container name to {}.", self.name),
                format!(
                    "Use '{} describe pod/{} -n {}' to see all of the containers in this pod.",
                    PARENT_COMMAND, pod_name, namespace
                ),
            ],
            _ => Vec::new(),
        }
    }
}

pub fn choose_container(
    pod: &Pod,
    container: Option<&str>,
    sidecar: Option<&str>,
) -> Result<ContainerChoice> {
    if let Some(sidecar) = sidecar.filter(|s| !s.is_empty()) {
        if let Some(working) = hot_upgrade_working_containers(pod).remove(sidecar) {
            return Ok(ContainerChoice {
                name: working,
                reason: ChoiceReason::HotUpgradeSidecar,
            });
        }
    }

    if let Some(name) = container.filter(|c| !c.is_empty()) {
        return Ok(ContainerChoice {
            name: name.to_string(),
            reason: ChoiceReason::Explicit,
        });
    }

    if let Some(name) = annotated_default_container(pod) {
        return Ok(ContainerChoice {
            name: name.to_string(),
            reason: ChoiceReason::Annotated,
        });
    }

    let containers = pod
        .spec
        .as_ref()
        .map(|s| s.containers.as_slice())
        .unwrap_or_default();
    match containers {
        [] => Err(KruiseError::validation(format!(
            "pod {} does not have any containers",
            pod.metadata.name.as_deref().unwrap_or_default()
        ))),
        [only] => Ok(ContainerChoice {
            name: only.name.clone(),
            reason: ChoiceReason::Only,
        }),
        [first, ..] => Ok(ContainerChoice {
            name: first.name.clone(),
            reason: ChoiceReason::Defaulted,
        }),
    }
}
