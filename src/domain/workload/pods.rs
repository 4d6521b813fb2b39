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

//! Pod helpers used to pick an exec target.

use crate::domain::workload::kinds::{ResourceMapping, WorkloadKind};
use crate::infrastructure::constants::{
    ANNOTATION_DEFAULT_CONTAINER, ANNOTATION_SIDECARSET_WORKING_HOTUPGRADE_CONTAINER,
};
use crate::shared::error::{KruiseError, Result};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// SidecarSet hot-upgrade bookkeeping: sidecar name → working container.
pub fn hot_upgrade_working_containers(pod: &Pod) -> BTreeMap<String, String> {
    let Some(raw) = pod
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_SIDECARSET_WORKING_HOTUPGRADE_CONTAINER))
    else {
        return BTreeMap::new();
    };

    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::debug!(
            "ignoring malformed {} annotation: {}",
            ANNOTATION_SIDECARSET_WORKING_HOTUPGRADE_CONTAINER,
            e
        );
        BTreeMap::new()
    })
}

/// Container named by the `kubectl.kubernetes.io/default-container`
/// annotation, if it exists in the pod.
pub fn annotated_default_container(pod: &Pod) -> Option<&str> {
    let name = pod
        .metadata
        .annotations
        .as_ref()?
        .get(ANNOTATION_DEFAULT_CONTAINER)?;
    pod.spec
        .as_ref()?
        .containers
        .iter()
        .any(|c| &c.name == name)
        .then_some(name.as_str())
}

pub fn pod_phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or("")
}

/// Renders a label selector in the `a=b,c in (d,e),!f` form.
pub fn label_selector_string(selector: &LabelSelector) -> Result<String> {
    let mut parts = Vec::new();

    if let Some(labels) = &selector.match_labels {
        for (k, v) in labels {
            parts.push(format!("{}={}", k, v));
        }
    }

    for expr in selector.match_expressions.iter().flatten() {
        let values = expr.values.clone().unwrap_or_default();
        let part = match expr.operator.as_str() {
            "In" => format!("{} in ({})", expr.key, values.join(",")),
            "NotIn" => format!("{} notin ({})", expr.key, values.join(",")),
            "Exists" => expr.key.clone(),
            "DoesNotExist" => format!("!{}", expr.key),
            other => {
                return Err(KruiseError::InvalidResource(format!(
                    "{} is not a valid label selector operator",
                    other
                )))
            }
        };
        parts.push(part);
    }

    Ok(parts.join(","))
}

/// Label selector that picks the pods managed by a workload.
pub fn workload_selector(data: &Value, mapping: &ResourceMapping) -> Result<String> {
    let selector = match mapping.workload {
        WorkloadKind::ReplicationController => {
            let labels: BTreeMap<String, String> = data
                .pointer("/spec/selector")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            labels
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(",")
        }
        WorkloadKind::CloneSet
        | WorkloadKind::AdvancedStatefulSet
        | WorkloadKind::AdvancedDaemonSet
        | WorkloadKind::Deployment
        | WorkloadKind::StatefulSet
        | WorkloadKind::DaemonSet
        | WorkloadKind::ReplicaSet
        | WorkloadKind::Job => {
            let selector: LabelSelector = data
                .pointer("/spec/selector")
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .unwrap_or_default();
            label_selector_string(&selector)?
        }
        _ => {
            return Err(KruiseError::InvalidResource(format!(
                "cannot attach to {}: not implemented",
                mapping.qualified_kind()
            )))
        }
    };

    if selector.is_empty() {
        return Err(KruiseError::InvalidResource(format!(
            "{} has an empty selector",
            mapping.qualified_kind()
        )));
    }
    Ok(selector)
}

fn is_ready(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .is_some_and(|conds| conds.iter().any(|c| c.type_ == "Ready" && c.status == "True"))
}

/// Time the pod last became ready.
pub fn ready_since(pod: &Pod) -> Option<DateTime<Utc>> {
    pod.status
        .as_ref()?
        .conditions
        .as_ref()?
        .iter()
        .find(|c| c.type_ == "Ready" && c.status == "True")?
        .last_transition_time
        .as_ref()
        .map(|t| t.0)
}

fn max_restarts(pod: &Pod) -> i32 {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_ref())
        .map(|statuses| statuses.iter().map(|s| s.restart_count).max().unwrap_or(0))
        .unwrap_or(0)
}

fn phase_rank(pod: &Pod) -> u8 {
    match pod_phase(pod) {
        "Running" => 0,
        "Unknown" => 1,
        "Pending" => 2,
        _ => 3,
    }
}

/// Earlier timestamps first, missing timestamps last.
fn compare_times(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ordering that puts the pod most worth attaching to first: scheduled,
/// running, ready for longest, most restarted, oldest.
pub fn compare_for_attach(a: &Pod, b: &Pod) -> Ordering {
    let assigned = |p: &Pod| {
        p.spec
            .as_ref()
            .and_then(|s| s.node_name.as_deref())
            .is_some_and(|n| !n.is_empty())
    };

    assigned(b)
        .cmp(&assigned(a))
        .then_with(|| phase_rank(a).cmp(&phase_rank(b)))
        .then_with(|| is_ready(b).cmp(&is_ready(a)))
        .then_with(|| {
            if is_ready(a) && is_ready(b) {
                compare_times(ready_since(a), ready_since(b))
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| max_restarts(b).cmp(&max_restarts(a)))
        .then_with(|| {
            compare_times(
                a.metadata.creation_timestamp.as_ref().map(|t| t.0),
                b.metadata.creation_timestamp.as_ref().map(|t| t.0),
            )
        })
}

/// Picks the pod to attach to out of a workload's pods.
pub fn first_pod(mut pods: Vec<Pod>) -> Option<Pod> {
    pods.sort_by(compare_for_attach);
    pods.into_iter().next()
}
