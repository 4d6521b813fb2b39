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

/// Plugin configuration
pub const CONFIG_ENV_VAR: &str = "KUBECTL_KRUISE_CONFIG";
pub const CONFIG_FILE_NAME: &str = "kruise.toml";
pub const DEFAULT_FIELD_MANAGER: &str = "kubectl-kruise";
pub const DEFAULT_POD_RUNNING_TIMEOUT: &str = "1m";
pub const DEFAULT_NAMESPACE: &str = "default";

/// Command path shown in hints
pub const PARENT_COMMAND: &str = "kubectl";

/// API groups
pub const GROUP_CORE: &str = "";
pub const GROUP_APPS: &str = "apps";
pub const GROUP_BATCH: &str = "batch";
pub const GROUP_KRUISE_APPS: &str = "apps.kruise.io";
pub const GROUP_KRUISE_ROLLOUTS: &str = "rollouts.kruise.io";

/// Annotations
pub const ANNOTATION_CHANGE_CAUSE: &str = "kubernetes.io/change-cause";
pub const ANNOTATION_DEFAULT_CONTAINER: &str = "kubectl.kubernetes.io/default-container";
pub const ANNOTATION_SIDECARSET_WORKING_HOTUPGRADE_CONTAINER: &str =
    "kruise.io/sidecarset-working-hotupgrade-container";

/// Rollout canary step states
pub const CANARY_STEP_STATE_PAUSED: &str = "StepPaused";
pub const CANARY_STEP_STATE_COMPLETED: &str = "Completed";

/// Pod phases that cannot be exec'd into
pub const POD_PHASE_SUCCEEDED: &str = "Succeeded";
pub const POD_PHASE_FAILED: &str = "Failed";

/// Container selector matching every container
pub const ALL_CONTAINERS: &str = "*";

/// Interval between pod lookups while waiting for a workload pod
pub const POD_POLL_INTERVAL_MS: u64 = 500;

/// Replace retries for Kruise workloads on update conflicts
pub const REPLACE_CONFLICT_RETRIES: usize = 5;
