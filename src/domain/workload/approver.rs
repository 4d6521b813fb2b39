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

use crate::domain::workload::kinds::{ResourceMapping, WorkloadKind};
use crate::infrastructure::constants::{CANARY_STEP_STATE_COMPLETED, CANARY_STEP_STATE_PAUSED};
use crate::shared::error::{KruiseError, Result};
use kube::api::DynamicObject;
use serde_json::{json, Value};

/// Approves the paused canary step of a Rollout.
///
/// The object is updated in place and the returned value is the JSON merge
/// patch to send to the `status` subresource.
pub fn approve_object(object: &mut DynamicObject, mapping: &ResourceMapping) -> Result<Value> {
    if mapping.workload != WorkloadKind::Rollout {
        return Err(KruiseError::InvalidResource(
            "approving is not supported".to_string(),
        ));
    }

    let state = object
        .data
        .pointer_mut("/status/canaryStatus/currentStepState")
        .filter(|state| state.as_str() == Some(CANARY_STEP_STATE_PAUSED))
        .ok_or_else(|| {
            KruiseError::validation(
                "does not allow to approve, because current canary state is not 'StepInPaused'",
            )
        })?;
    *state = Value::String(CANARY_STEP_STATE_COMPLETED.to_string());

    Ok(json!({
        "status": {
            "canaryStatus": {
                "currentStepState": CANARY_STEP_STATE_COMPLETED
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rollout(state: Option<&str>) -> (DynamicObject, ResourceMapping) {
        let mapping = ResourceMapping::lookup("rollout").unwrap();
        let status = match state {
            Some(s) => json!({"canaryStatus": {"currentStepState": s, "currentStepIndex": 1}}),
            None => json!({}),
        };
        let obj = DynamicObject::new("demo", &mapping.resource)
            .within("default")
            .data(json!({"spec": {}, "status": status}));
        (obj, mapping)
    }

    #[test]
    fn test_approve_paused_rollout() {
        let (mut obj, mapping) = rollout(Some("StepPaused"));
        let patch = approve_object(&mut obj, &mapping).unwrap();
        assert_eq!(
            patch,
            json!({"status": {"canaryStatus": {"currentStepState": "Completed"}}})
        );
        assert_eq!(
            obj.data["status"]["canaryStatus"]["currentStepState"],
            json!("Completed")
        );
        assert_eq!(obj.data["status"]["canaryStatus"]["currentStepIndex"], json!(1));
    }

    #[test]
    fn test_refuse_unpaused_rollout() {
        for state in [Some("StepUpgrade"), None] {
            let (mut obj, mapping) = rollout(state);
            let err = approve_object(&mut obj, &mapping).unwrap_err();
            assert!(err.to_string().contains("is not 'StepInPaused'"));
        }
    }

    #[test]
    fn test_refuse_other_kinds() {
        let mapping = ResourceMapping::lookup("clone").unwrap();
        let mut obj = DynamicObject::new("demo", &mapping.resource);
        let err = approve_object(&mut obj, &mapping).unwrap_err();
        assert_eq!(err.to_string(), "approving is not supported");
    }
}
