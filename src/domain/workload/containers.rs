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

use crate::domain::workload::requirements::ResourceRequirementsUpdate;
use crate::shared::error::Result;
use glob::{MatchOptions, Pattern};
use serde_json::Value;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Shell-style container name pattern (`*`, `?`, `[a-z]`, `[!x]`).
#[derive(Debug, Clone)]
pub struct ContainerPattern {
    raw: String,
    pattern: Option<Pattern>,
}

impl ContainerPattern {
    /// A malformed pattern is kept but matches nothing.
    pub fn new(raw: &str) -> Self {
        // `[^x]` is accepted as a negated class like `[!x]`.
        let normalized = raw.replace("[^", "[!");
        let pattern = match Pattern::new(&normalized) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::debug!("container pattern {:?} is malformed: {}", raw, e);
                None
            }
        };
        Self {
            raw: raw.to_string(),
            pattern,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|p| p.matches_with(name, MATCH_OPTIONS))
    }
}

/// Names of the containers in `pod_spec` matching `pattern`.
pub fn select_containers(pod_spec: &Value, pattern: &ContainerPattern) -> Vec<String> {
    pod_spec
        .get("containers")
        .and_then(Value::as_array)
        .map(|containers| {
            containers
                .iter()
                .filter_map(|c| c.get("name").and_then(Value::as_str))
                .filter(|name| pattern.matches(name))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Outcome of updating the containers of one pod spec.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerUpdate {
    /// Containers matched by the pattern.
    pub matched: Vec<String>,
    /// Matched containers whose resources actually changed.
    pub changed: Vec<String>,
}

/// Applies `update` to every container of `pod_spec` matching `pattern`.
pub fn update_container_resources(
    pod_spec: &mut Value,
    pattern: &ContainerPattern,
    update: &ResourceRequirementsUpdate,
) -> Result<ContainerUpdate> {
    let mut outcome = ContainerUpdate::default();
    let Some(containers) = pod_spec.get_mut("containers").and_then(Value::as_array_mut) else {
        return Ok(outcome);
    };

    for container in containers.iter_mut() {
        let Some(name) = container.get("name").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        if !pattern.matches(&name) {
            continue;
        }
        if update.apply_to_container(container)? {
            outcome.changed.push(name.clone());
        }
        outcome.matched.push(name);
    }
    Ok(outcome)
}
