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

use crate::domain::workload::kinds::{split_api_version, ResourceMapping};
use crate::shared::error::KruiseError;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::discovery::{Discovery, Scope};
use kube::{Api, Client};
use serde_json::Value;

/// Patch flavours the commands send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchType {
    Strategic,
    Merge,
}

/// Options shared by every write request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    pub dry_run: bool,
    pub field_manager: String,
}

impl WriteOptions {
    pub fn new(field_manager: impl Into<String>, dry_run: bool) -> Self {
        Self {
            dry_run,
            field_manager: field_manager.into(),
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            dry_run: self.dry_run,
            field_manager: Some(self.field_manager.clone()),
        }
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams {
            dry_run: self.dry_run,
            field_manager: Some(self.field_manager.clone()),
            ..Default::default()
        }
    }
}

#[async_trait::async_trait]
pub trait KruiseClient: Send + Sync {
    /// Namespace of the current kubeconfig context.
    fn default_namespace(&self) -> &str;

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, KruiseError>;

    async fn list_pods(&self, namespace: &str, label_selector: &str)
        -> Result<Vec<Pod>, KruiseError>;

    async fn get_object(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, KruiseError>;

    async fn list_objects(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, KruiseError>;

    async fn replace_object(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        object: &DynamicObject,
        options: &WriteOptions,
    ) -> Result<DynamicObject, KruiseError>;

    async fn patch_object(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        name: &str,
        patch_type: PatchType,
        patch: &Value,
        options: &WriteOptions,
    ) -> Result<DynamicObject, KruiseError>;

    /// Merge-patches the `status` subresource.
    async fn patch_status(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
        options: &WriteOptions,
    ) -> Result<DynamicObject, KruiseError>;

    /// Resolves a resource type argument the built-in registry does not know.
    async fn discover(&self, type_name: &str) -> Result<ResourceMapping, KruiseError>;

    /// Resolves the mapping for a manifest's `apiVersion` and `kind`.
    async fn discover_gvk(
        &self,
        api_version: &str,
        kind: &str,
    ) -> Result<ResourceMapping, KruiseError>;
}

pub struct KruiseClientImpl {
    client: Client,
    default_namespace: String,
}

impl KruiseClientImpl {
    pub fn new(client: Client, default_namespace: impl Into<String>) -> Self {
        Self {
            client,
            default_namespace: default_namespace.into(),
        }
    }

    /// Builds a client from kubeconfig options. Without any option the
    /// standard inference (`KUBECONFIG`, `~/.kube/config`, in-cluster) applies.
    pub async fn connect(
        kubeconfig_path: Option<&str>,
        context: Option<&str>,
    ) -> Result<Self, KruiseError> {
        use kube::config::{KubeConfigOptions, Kubeconfig};

        let config = if kubeconfig_path.is_none() && context.is_none() {
            kube::Config::infer().await.map_err(|e| {
                KruiseError::config_error(format!("Failed to load kubeconfig: {}", e))
            })?
        } else {
            let kubeconfig = match kubeconfig_path {
                Some(path) => Kubeconfig::read_from(path),
                None => Kubeconfig::read(),
            }
            .map_err(|e| KruiseError::config_error(format!("Failed to load kubeconfig: {}", e)))?;

            let config_options = KubeConfigOptions {
                context: context.map(str::to_string),
                cluster: None,
                user: None,
            };

            kube::Config::from_custom_kubeconfig(kubeconfig, &config_options)
                .await
                .map_err(|e| {
                    KruiseError::config_error(format!(
                        "Failed to create Kubernetes config: {}",
                        e
                    ))
                })?
        };

        let default_namespace = config.default_namespace.clone();
        let client = Client::try_from(config).map_err(|e| {
            KruiseError::KubeError(format!("Failed to create Kubernetes client: {}", e))
        })?;
        tracing::debug!("Connected, default namespace {}", default_namespace);

        Ok(Self::new(client, default_namespace))
    }

    pub fn get_client(&self) -> Client {
        self.client.clone()
    }

    fn dynamic_api(&self, mapping: &ResourceMapping, namespace: Option<&str>) -> Api<DynamicObject> {
        match (mapping.namespaced, namespace) {
            (true, Some(ns)) => Api::namespaced_with(self.client.clone(), ns, &mapping.resource),
            (true, None) => Api::namespaced_with(
                self.client.clone(),
                &self.default_namespace,
                &mapping.resource,
            ),
            (false, _) => Api::all_with(self.client.clone(), &mapping.resource),
        }
    }
}

fn map_get_error(
    err: kube::Error,
    resource_type: &str,
    name: &str,
    namespace: Option<&str>,
) -> KruiseError {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => {
            KruiseError::not_found(resource_type, name, namespace.unwrap_or_default())
        }
        other => other.into(),
    }
}

#[async_trait::async_trait]
impl KruiseClient for KruiseClientImpl {
    fn default_namespace(&self) -> &str {
        &self.default_namespace
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod, KruiseError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| map_get_error(e, "pods", name, Some(namespace)))
    }

    async fn list_pods(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<Pod>, KruiseError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = ListParams::default().labels(label_selector);

        let pods = api.list(&lp).await?;
        Ok(pods.items)
    }

    async fn get_object(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, KruiseError> {
        let resource_type = mapping.resource.plural.clone();
        self.dynamic_api(mapping, namespace)
            .get(name)
            .await
            .map_err(|e| map_get_error(e, &resource_type, name, namespace))
    }

    async fn list_objects(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, KruiseError> {
        let mut lp = ListParams::default();
        if let Some(selector) = label_selector {
            lp = lp.labels(selector);
        }

        let list = self.dynamic_api(mapping, namespace).list(&lp).await?;
        Ok(list.items)
    }

    async fn replace_object(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        object: &DynamicObject,
        options: &WriteOptions,
    ) -> Result<DynamicObject, KruiseError> {
        let name = object.metadata.name.as_deref().ok_or_else(|| {
            KruiseError::InvalidResource("object name is required".to_string())
        })?;

        let replaced = self
            .dynamic_api(mapping, namespace)
            .replace(name, &options.post_params(), object)
            .await?;
        Ok(replaced)
    }

    async fn patch_object(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        name: &str,
        patch_type: PatchType,
        patch: &Value,
        options: &WriteOptions,
    ) -> Result<DynamicObject, KruiseError> {
        let api = self.dynamic_api(mapping, namespace);
        let patched = match patch_type {
            PatchType::Strategic => {
                api.patch(name, &options.patch_params(), &Patch::Strategic(patch))
                    .await?
            }
            PatchType::Merge => {
                api.patch(name, &options.patch_params(), &Patch::Merge(patch))
                    .await?
            }
        };
        Ok(patched)
    }

    async fn patch_status(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
        options: &WriteOptions,
    ) -> Result<DynamicObject, KruiseError> {
        let patched = self
            .dynamic_api(mapping, namespace)
            .patch_status(name, &options.patch_params(), &Patch::Merge(patch))
            .await?;
        Ok(patched)
    }

    async fn discover(&self, type_name: &str) -> Result<ResourceMapping, KruiseError> {
        let wanted = type_name.to_lowercase();
        let (resource, group) = match wanted.split_once('.') {
            Some((resource, group)) => (resource.to_string(), Some(group.to_string())),
            None => (wanted.clone(), None),
        };

        let discovery = Discovery::new(self.client.clone()).run().await?;
        for api_group in discovery.groups() {
            if group.as_deref().is_some_and(|g| g != api_group.name()) {
                continue;
            }
            for (ar, caps) in api_group.recommended_resources() {
                if ar.plural == resource || ar.kind.to_lowercase() == resource {
                    tracing::debug!("Discovered {} as {}", type_name, ar.api_version);
                    return Ok(ResourceMapping::new(ar, caps.scope == Scope::Namespaced));
                }
            }
        }

        Err(KruiseError::InvalidResource(format!(
            "the server doesn't have a resource type \"{}\"",
            type_name
        )))
    }

    async fn discover_gvk(
        &self,
        api_version: &str,
        kind: &str,
    ) -> Result<ResourceMapping, KruiseError> {
        let (group, version) = split_api_version(api_version);
        let gvk = kube::api::GroupVersionKind::gvk(group, version, kind);
        let (ar, caps) = kube::discovery::pinned_kind(&self.client, &gvk)
            .await
            .map_err(|e| {
                KruiseError::InvalidResource(format!(
                    "no matches for kind \"{}\" in version \"{}\": {}",
                    kind, api_version, e
                ))
            })?;
        Ok(ResourceMapping::new(ar, caps.scope == Scope::Namespaced))
    }
}
