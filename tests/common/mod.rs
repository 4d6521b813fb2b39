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

//! In-memory cluster used by the command tests.

#![allow(dead_code)]

use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;
use kubectl_kruise::domain::workload::ResourceMapping;
use kubectl_kruise::infrastructure::kubernetes::executor::{
    ExecRequest, ExecStreams, RemoteExecutor,
};
use kubectl_kruise::infrastructure::kubernetes::{KruiseClient, PatchType, WriteOptions};
use kubectl_kruise::shared::error::{KruiseError, Result};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;

type Key = (String, String, String);

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Replace {
        name: String,
        dry_run: bool,
        field_manager: String,
    },
    Patch {
        name: String,
        patch_type: PatchType,
        patch: Value,
        dry_run: bool,
    },
    PatchStatus {
        name: String,
        patch: Value,
    },
}

#[derive(Default)]
pub struct FakeClient {
    objects: Mutex<BTreeMap<Key, DynamicObject>>,
    calls: Mutex<Vec<Call>>,
    conflicts: Mutex<usize>,
}

fn key(mapping: &ResourceMapping, namespace: Option<&str>, name: &str) -> Key {
    (
        mapping.resource.plural.clone(),
        namespace.unwrap_or_default().to_string(),
        name.to_string(),
    )
}

fn labels_match(object: &DynamicObject, selector: Option<&str>) -> bool {
    let Some(selector) = selector.filter(|s| !s.is_empty()) else {
        return true;
    };
    let labels = object.metadata.labels.clone().unwrap_or_default();
    selector.split(',').all(|term| match term.split_once('=') {
        Some((k, v)) => labels.get(k).map(String::as_str) == Some(v),
        None => labels.contains_key(term),
    })
}

/// RFC 7386 merge of `patch` into `target`.
fn merge(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (k, v) in patch {
                if v.is_null() {
                    target.remove(k);
                } else {
                    merge(target.entry(k.clone()).or_insert(Value::Null), v);
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object under the mapping resolved from its type.
    pub fn add(&self, object: DynamicObject) {
        let types = object.types.clone().expect("object type");
        let mapping = ResourceMapping::lookup_gvk(&types.api_version, &types.kind).expect("known kind");
        let k = key(
            &mapping,
            object.metadata.namespace.as_deref(),
            object.metadata.name.as_deref().unwrap_or_default(),
        );
        self.objects.lock().unwrap().insert(k, object);
    }

    pub fn add_pod(&self, pod: Pod) {
        let object: DynamicObject = serde_json::from_value(serde_json::to_value(&pod).unwrap()).unwrap();
        self.add(object);
    }

    pub fn get(&self, type_name: &str, namespace: &str, name: &str) -> DynamicObject {
        let mapping = ResourceMapping::lookup(type_name).unwrap();
        self.objects
            .lock()
            .unwrap()
            .get(&key(&mapping, Some(namespace), name))
            .cloned()
            .expect("stored object")
    }

    pub fn inject_conflicts(&self, count: usize) {
        *self.conflicts.lock().unwrap() = count;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn lookup(&self, mapping: &ResourceMapping, namespace: Option<&str>, name: &str) -> Result<DynamicObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&key(mapping, namespace, name))
            .cloned()
            .ok_or_else(|| {
                KruiseError::not_found(&mapping.resource.plural, name, namespace.unwrap_or_default())
            })
    }
}

#[async_trait::async_trait]
impl KruiseClient for FakeClient {
    fn default_namespace(&self) -> &str {
        "default"
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Pod> {
        let mapping = ResourceMapping::lookup("pods").unwrap();
        let object = self.lookup(&mapping, Some(namespace), name)?;
        Ok(serde_json::from_value(serde_json::to_value(&object)?)?)
    }

    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>> {
        let mapping = ResourceMapping::lookup("pods").unwrap();
        let objects = self
            .list_objects(&mapping, Some(namespace), Some(label_selector))
            .await?;
        objects
            .into_iter()
            .map(|o| Ok(serde_json::from_value(serde_json::to_value(&o)?)?))
            .collect()
    }

    async fn get_object(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        self.lookup(mapping, namespace, name)
    }

    async fn list_objects(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        label_selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>> {
        let ns = namespace.unwrap_or_default();
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|((plural, object_ns, _), object)| {
                plural == &mapping.resource.plural
                    && object_ns == ns
                    && labels_match(object, label_selector)
            })
            .map(|(_, object)| object.clone())
            .collect())
    }

    async fn replace_object(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        object: &DynamicObject,
        options: &WriteOptions,
    ) -> Result<DynamicObject> {
        let name = object.metadata.name.clone().unwrap_or_default();
        self.calls.lock().unwrap().push(Call::Replace {
            name: name.clone(),
            dry_run: options.dry_run,
            field_manager: options.field_manager.clone(),
        });

        {
            let mut conflicts = self.conflicts.lock().unwrap();
            if *conflicts > 0 {
                *conflicts -= 1;
                return Err(KruiseError::Conflict {
                    message: format!("the object has been modified; {}", name),
                });
            }
        }

        if !options.dry_run {
            self.objects
                .lock()
                .unwrap()
                .insert(key(mapping, namespace, &name), object.clone());
        }
        Ok(object.clone())
    }

    async fn patch_object(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        name: &str,
        patch_type: PatchType,
        patch: &Value,
        options: &WriteOptions,
    ) -> Result<DynamicObject> {
        self.calls.lock().unwrap().push(Call::Patch {
            name: name.to_string(),
            patch_type,
            patch: patch.clone(),
            dry_run: options.dry_run,
        });
        self.lookup(mapping, namespace, name)
    }

    async fn patch_status(
        &self,
        mapping: &ResourceMapping,
        namespace: Option<&str>,
        name: &str,
        patch: &Value,
        _options: &WriteOptions,
    ) -> Result<DynamicObject> {
        self.calls.lock().unwrap().push(Call::PatchStatus {
            name: name.to_string(),
            patch: patch.clone(),
        });

        let mut object = self.lookup(mapping, namespace, name)?;
        merge(&mut object.data, patch);
        self.objects
            .lock()
            .unwrap()
            .insert(key(mapping, namespace, name), object.clone());
        Ok(object)
    }

    async fn discover(&self, type_name: &str) -> Result<ResourceMapping> {
        Err(KruiseError::InvalidResource(format!(
            "the server doesn't have a resource type \"{}\"",
            type_name
        )))
    }

    async fn discover_gvk(&self, api_version: &str, kind: &str) -> Result<ResourceMapping> {
        Err(KruiseError::InvalidResource(format!(
            "no matches for kind \"{}\" in version \"{}\"",
            kind, api_version
        )))
    }
}

/// Records exec requests instead of opening a session.
#[derive(Default)]
pub struct FakeExecutor {
    requests: Mutex<Vec<ExecRequest>>,
    exit_code: Option<i32>,
}

impl FakeExecutor {
    pub fn exiting_with(code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<ExecRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn execute(&self, request: &ExecRequest, _streams: ExecStreams) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        match self.exit_code {
            Some(code) => Err(KruiseError::CommandExit { code }),
            None => Ok(()),
        }
    }
}

pub fn cloneset(name: &str, labels: &[(&str, &str)], containers: &[&str]) -> DynamicObject {
    let mapping = ResourceMapping::lookup("cloneset").unwrap();
    let match_labels: BTreeMap<String, String> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let mut object = DynamicObject::new(name, &mapping.resource)
        .within("default")
        .data(json!({
            "spec": {
                "replicas": 2,
                "selector": {"matchLabels": match_labels},
                "template": {
                    "metadata": {"labels": match_labels},
                    "spec": {
                        "containers": containers
                            .iter()
                            .map(|c| json!({"name": c, "image": format!("{}:latest", c)}))
                            .collect::<Vec<_>>()
                    }
                },
                "updateStrategy": {"type": "InPlaceIfPossible"}
            }
        }));
    object.metadata.labels = Some(match_labels);
    object
}

pub fn deployment(name: &str, containers: &[&str]) -> DynamicObject {
    let mapping = ResourceMapping::lookup("deployment").unwrap();
    DynamicObject::new(name, &mapping.resource)
        .within("default")
        .data(json!({
            "spec": {
                "selector": {"matchLabels": {"app": name}},
                "template": {"spec": {"containers": containers
                    .iter()
                    .map(|c| json!({"name": c, "image": c}))
                    .collect::<Vec<_>>()}}
            }
        }))
}

pub fn rollout(name: &str, state: &str) -> DynamicObject {
    let mapping = ResourceMapping::lookup("rollout").unwrap();
    DynamicObject::new(name, &mapping.resource)
        .within("default")
        .data(json!({
            "spec": {"objectRef": {"workloadRef": {"apiVersion": "apps.kruise.io/v1alpha1", "kind": "CloneSet", "name": "web"}}},
            "status": {"canaryStatus": {"currentStepIndex": 1, "currentStepState": state}}
        }))
}

/// A scheduled pod; `ready` adds a Ready condition.
pub fn pod(name: &str, labels: &[(&str, &str)], phase: &str, ready: bool, containers: &[&str]) -> Pod {
    let labels: BTreeMap<String, String> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let conditions = if ready {
        json!([{"type": "Ready", "status": "True", "lastTransitionTime": "2024-01-01T00:00:00Z"}])
    } else {
        json!([])
    };
    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": name, "namespace": "default", "labels": labels},
        "spec": {
            "nodeName": "node-1",
            "containers": containers.iter().map(|c| json!({"name": c})).collect::<Vec<_>>()
        },
        "status": {"phase": phase, "conditions": conditions}
    }))
    .unwrap()
}

pub fn output(buf: Vec<u8>) -> String {
    String::from_utf8(buf).unwrap()
}
