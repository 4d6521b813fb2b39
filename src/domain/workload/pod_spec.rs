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

//! Pod spec access on untyped objects.
//!
//! Objects are kept as JSON so that fields unknown to `k8s-openapi` (and
//! every field of OpenKruise kinds) survive a read-modify-write cycle.

use crate::domain::workload::kinds::ResourceMapping;
use crate::shared::error::{KruiseError, Result};
use serde_json::Value;

fn unsupported(mapping: &ResourceMapping) -> KruiseError {
    KruiseError::InvalidResource(format!(
        "the object is not a pod or does not have a pod template: {}",
        mapping.qualified_kind()
    ))
}

/// Returns the pod spec of `data` (the object body without metadata).
pub fn pod_spec<'a>(data: &'a Value, mapping: &ResourceMapping) -> Result<&'a Value> {
    let path = mapping
        .workload
        .pod_spec_path()
        .ok_or_else(|| unsupported(mapping))?;

    path.iter()
        .try_fold(data, |node, key| node.get(key))
        .filter(|spec| spec.is_object())
        .ok_or_else(|| unsupported(mapping))
}

/// Mutable variant of [`pod_spec`].
pub fn pod_spec_mut<'a>(data: &'a mut Value, mapping: &ResourceMapping) -> Result<&'a mut Value> {
    let path = mapping
        .workload
        .pod_spec_path()
        .ok_or_else(|| unsupported(mapping))?;

    path.iter()
        .try_fold(data, |node, key| node.get_mut(key))
        .filter(|spec| spec.is_object())
        .ok_or_else(|| unsupported(mapping))
}

/// Runs `update` against the pod spec of `data`, mirroring kubectl's
/// `UpdatePodSpecForObject`.
pub fn update_pod_spec<F, T>(data: &mut Value, mapping: &ResourceMapping, update: F) -> Result<T>
where
    F: FnOnce(&mut Value) -> Result<T>,
{
    let spec = pod_spec_mut(data, mapping)?;
    update(spec)
}
