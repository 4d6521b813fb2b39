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

//! `set resources`: update resource requests/limits of pod templates.

use super::printer::{DryRunStrategy, ObjectPrinter};
use super::{CommandContext, KubeOptions};
use crate::domain::config::PluginConfig;
use crate::domain::workload::kinds::ResourceMapping;
use crate::domain::workload::{
    pod_spec, update_container_resources, update_pod_spec, ContainerPattern,
    ResourceRequirementsUpdate,
};
use crate::infrastructure::constants::{
    ALL_CONTAINERS, ANNOTATION_CHANGE_CAUSE, PARENT_COMMAND, REPLACE_CONFLICT_RETRIES,
};
use crate::infrastructure::kubernetes::builder::{FilenameOptions, Info, ResourceBuilder};
use crate::infrastructure::kubernetes::{
    KruiseClient, KruiseClientImpl, PatchType, WriteOptions,
};
use crate::shared::error::{KruiseError, Result};
use backon::{ConstantBuilder, Retryable};
use clap::Parser;
use kube::api::DynamicObject;
use serde_json::{Map, Value};
use std::io::Write;
use std::time::Duration;

const OPERATION: &str = "resource requirements updated";

#[derive(Parser, Debug, Clone)]
#[command(
    override_usage = "kubectl kruise set resources (-f FILENAME | TYPE NAME) ([--limits=LIMITS & --requests=REQUESTS]",
    after_help = "Examples:\n  \
        # Set the nginx container cpu limit of a CloneSet\n  \
        kubectl kruise set resources cloneset sample -c=nginx --limits=cpu=200m,memory=512Mi\n\n  \
        # Print the result in yaml without touching the server\n  \
        kubectl kruise set resources -f cloneset.yaml --limits=cpu=200m --local -o yaml"
)]
pub struct SetResourcesCommand {
    /// TYPE NAME... or TYPE/NAME...
    #[arg(value_name = "TYPE NAME")]
    pub resources: Vec<String>,

    /// Filename, directory, or '-' identifying the resources to update
    #[arg(long = "filename", short = 'f')]
    pub filenames: Vec<String>,

    /// Process the directory used in -f recursively
    #[arg(long, short = 'R')]
    pub recursive: bool,

    /// Select all resources of the given types in the namespace
    #[arg(long)]
    pub all: bool,

    /// Label selector to filter on
    #[arg(long, short = 'l')]
    pub selector: Option<String>,

    /// The names of containers in the selected pod templates to change, wildcards are allowed
    #[arg(long, short = 'c', default_value = ALL_CONTAINERS)]
    pub containers: String,

    /// Set resources locally without contacting the server
    #[arg(long)]
    pub local: bool,

    /// Only print or submit with dryRun=All instead of persisting
    #[arg(
        long,
        value_enum,
        default_value_t = DryRunStrategy::None,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "client"
    )]
    pub dry_run: DryRunStrategy,

    /// Resource limits for the containers, e.g. cpu=200m,memory=512Mi
    #[arg(long, default_value = "")]
    pub limits: String,

    /// Resource requests for the containers, e.g. cpu=100m,memory=256Mi
    #[arg(long, default_value = "")]
    pub requests: String,

    /// Output format: yaml, json or name
    #[arg(long, short = 'o')]
    pub output: Option<String>,

    /// Record the command in the kubernetes.io/change-cause annotation
    #[arg(long)]
    pub record: bool,

    /// Name of the manager used to track field ownership
    #[arg(long)]
    pub field_manager: Option<String>,
}

impl SetResourcesCommand {
    pub async fn execute(&self, kube: &KubeOptions) -> anyhow::Result<()> {
        let config = PluginConfig::load()?;
        let mut out = std::io::stdout();

        if self.local {
            let ctx = CommandContext::local(kube, config);
            self.run(&ctx, &mut out).await?;
        } else {
            let client =
                KruiseClientImpl::connect(kube.kubeconfig.as_deref(), kube.context.as_deref())
                    .await?;
            let ctx = CommandContext::new(&client, kube, config);
            self.run(&ctx, &mut out).await?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<ResourceRequirementsUpdate> {
        if self.local && self.dry_run == DryRunStrategy::Server {
            return Err(KruiseError::usage(
                "cannot specify --local and --dry-run=server - did you mean --dry-run=client?",
            ));
        }
        if self.all && self.selector.as_deref().is_some_and(|s| !s.is_empty()) {
            return Err(KruiseError::usage(
                "cannot set --all and --selector at the same time",
            ));
        }
        if self.limits.is_empty() && self.requests.is_empty() {
            return Err(KruiseError::usage(
                "you must specify an update to requests or limits (in the form of --requests/--limits)",
            ));
        }
        ResourceRequirementsUpdate::parse(&self.limits, &self.requests)
    }

    pub async fn run(&self, ctx: &CommandContext<'_>, out: &mut dyn Write) -> Result<()> {
        let update = self.validate()?;
        let printer = ObjectPrinter::new(self.output.as_deref(), OPERATION, self.dry_run)?;
        let pattern = ContainerPattern::new(&self.containers);
        let change_cause = self.record.then(change_cause_from_args);
        let options = WriteOptions::new(
            ctx.config.resolve_field_manager(self.field_manager.as_deref()),
            self.dry_run == DryRunStrategy::Server,
        );

        let infos = ResourceBuilder::new(&ctx.namespace, ctx.enforce_namespace)
            .filenames(FilenameOptions {
                filenames: self.filenames.clone(),
                recursive: self.recursive,
            })
            .resource_args(&self.resources)
            .selector(self.selector.clone())
            .select_all(self.all)
            .local(self.local)
            .latest()
            .infos(ctx.client_opt())
            .await?;

        let mut errs = Vec::new();
        for mut info in infos {
            let name = info.object_name();
            let changes = match transform(
                &mut info.object,
                &info.mapping,
                &name,
                &pattern,
                &update,
                change_cause.as_deref(),
            ) {
                Ok(changes) => changes,
                Err(e) => {
                    errs.push(e);
                    continue;
                }
            };
            if !changes.changed {
                tracing::info!("{} unchanged", name);
                continue;
            }

            if self.local || self.dry_run == DryRunStrategy::Client {
                printer.print(&info.mapping, &info.object, out)?;
                continue;
            }

            let client = ctx.client()?;
            let written = if info.mapping.workload.is_kruise() {
                replace_with_retry(client, &info, &pattern, &update, change_cause.as_deref(), &options)
                    .await
            } else {
                patch_builtin(client, &info, &changes.containers, change_cause.as_deref(), &options)
                    .await
            };

            match written {
                Ok(object) => printer.print(&info.mapping, &object, out)?,
                Err(e) => errs.push(KruiseError::KubeError(format!(
                    "failed to patch resources update to pod template {}",
                    e
                ))),
            }
        }

        KruiseError::aggregate(errs)
    }
}

/// What a transform changed on one object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changes {
    pub changed: bool,
    /// Containers whose requirements changed.
    pub containers: Vec<String>,
}

/// Applies the requirements to the matching containers of `object`.
pub fn transform(
    object: &mut DynamicObject,
    mapping: &ResourceMapping,
    name: &str,
    pattern: &ContainerPattern,
    update: &ResourceRequirementsUpdate,
    change_cause: Option<&str>,
) -> Result<Changes> {
    let outcome = update_pod_spec(&mut object.data, mapping, |spec| {
        update_container_resources(spec, pattern, update)
    })
    .map_err(|e| KruiseError::InvalidResource(format!("error: {} {}", name, e)))?;

    if outcome.matched.is_empty() {
        return Err(KruiseError::validation(format!(
            "error: unable to find container named {}",
            pattern.as_str()
        )));
    }

    let mut changed = !outcome.changed.is_empty();
    if let Some(cause) = change_cause {
        changed |= set_change_cause(object, cause);
    }

    Ok(Changes {
        changed,
        containers: outcome.changed,
    })
}

/// Sets the change-cause annotation, returning whether it changed.
fn set_change_cause(object: &mut DynamicObject, cause: &str) -> bool {
    let annotations = object.metadata.annotations.get_or_insert_with(Default::default);
    let previous = annotations.insert(ANNOTATION_CHANGE_CAUSE.to_string(), cause.to_string());
    previous.as_deref() != Some(cause)
}

fn change_cause_from_args() -> String {
    let args: Vec<String> = std::env::args().skip(1).collect();
    format!("{} kruise {}", PARENT_COMMAND, args.join(" "))
}

/// Writes an OpenKruise object back in full. Custom resources do not take
/// strategic merge patches, so a conflict re-reads the object and repeats
/// the update.
async fn replace_with_retry(
    client: &dyn KruiseClient,
    info: &Info,
    pattern: &ContainerPattern,
    update: &ResourceRequirementsUpdate,
    change_cause: Option<&str>,
    options: &WriteOptions,
) -> Result<DynamicObject> {
    let name = info.object_name();
    let name = name.as_str();

    let attempt = move || async move {
        let mut latest = client
            .get_object(&info.mapping, info.namespace.as_deref(), &info.name)
            .await?;
        transform(&mut latest, &info.mapping, name, pattern, update, change_cause)?;
        client
            .replace_object(&info.mapping, info.namespace.as_deref(), &latest, options)
            .await
    };

    attempt
        .retry(
            ConstantBuilder::default()
                .with_delay(Duration::from_millis(100))
                .with_max_times(REPLACE_CONFLICT_RETRIES),
        )
        .sleep(tokio::time::sleep)
        .when(KruiseError::is_conflict)
        .notify(|e: &KruiseError, after: Duration| {
            tracing::debug!("Conflict updating {}, retrying after {:?}: {}", name, after, e);
        })
        .await
}

async fn patch_builtin(
    client: &dyn KruiseClient,
    info: &Info,
    containers: &[String],
    change_cause: Option<&str>,
    options: &WriteOptions,
) -> Result<DynamicObject> {
    let patch = strategic_patch(&info.object, &info.mapping, containers, change_cause)?;
    tracing::debug!("Patching {} with {}", info.object_name(), patch);
    client
        .patch_object(
            &info.mapping,
            info.namespace.as_deref(),
            &info.name,
            PatchType::Strategic,
            &patch,
            options,
        )
        .await
}

/// Builds a strategic merge patch carrying the new resources of `containers`,
/// keyed by container name.
pub fn strategic_patch(
    object: &DynamicObject,
    mapping: &ResourceMapping,
    containers: &[String],
    change_cause: Option<&str>,
) -> Result<Value> {
    let mut patch = Map::new();

    if !containers.is_empty() {
        let spec = pod_spec(&object.data, mapping)?;
        let entries: Vec<Value> = spec
            .get("containers")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter(|c| {
                c.get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|n| containers.iter().any(|wanted| wanted == n))
            })
            .map(|c| {
                let mut entry = Map::new();
                entry.insert("name".to_string(), c["name"].clone());
                entry.insert("resources".to_string(), c["resources"].clone());
                Value::Object(entry)
            })
            .collect();

        let mut nested = Map::new();
        nested.insert("containers".to_string(), Value::Array(entries));
        let mut nested = Value::Object(nested);
        for key in mapping.workload.pod_spec_path().unwrap_or_default().iter().rev() {
            let mut wrapper = Map::new();
            wrapper.insert(key.to_string(), nested);
            nested = Value::Object(wrapper);
        }
        if let Value::Object(body) = nested {
            patch.extend(body);
        }
    }

    if let Some(cause) = change_cause {
        let mut annotations = Map::new();
        annotations.insert(ANNOTATION_CHANGE_CAUSE.to_string(), Value::String(cause.to_string()));
        let mut metadata = Map::new();
        metadata.insert("annotations".to_string(), Value::Object(annotations));
        patch.insert("metadata".to_string(), Value::Object(metadata));
    }

    Ok(Value::Object(patch))
}
