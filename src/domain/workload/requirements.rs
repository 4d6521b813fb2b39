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

use crate::shared::error::{KruiseError, Result};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

fn quantity_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[KMGTPE]i|[numkMGTPE]|[eE][+-]?[0-9]+)?$")
            .expect("valid regex")
    })
}

/// Checks a quantity string against the Kubernetes quantity grammar.
pub fn parse_quantity(value: &str) -> Result<Quantity> {
    if quantity_regex().is_match(value) {
        Ok(Quantity(value.to_string()))
    } else {
        Err(KruiseError::validation(format!(
            "{}: quantities must match the regular expression '^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$'",
            value
        )))
    }
}

/// Parses `cpu=200m,memory=512Mi` into a resource list.
pub fn parse_resource_list(spec: &str) -> Result<BTreeMap<String, Quantity>> {
    let mut list = BTreeMap::new();
    if spec.is_empty() {
        return Ok(list);
    }

    for statement in spec.split(',') {
        let parts: Vec<&str> = statement.split('=').collect();
        if parts.len() != 2 || parts[0].is_empty() {
            return Err(KruiseError::validation(format!(
                "invalid argument syntax {}, expected <resource>=<value>",
                statement
            )));
        }
        list.insert(parts[0].to_string(), parse_quantity(parts[1])?);
    }
    Ok(list)
}

/// Limits and requests to write into selected containers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceRequirementsUpdate {
    pub limits: BTreeMap<String, Quantity>,
    pub requests: BTreeMap<String, Quantity>,
}

impl ResourceRequirementsUpdate {
    pub fn parse(limits: &str, requests: &str) -> Result<Self> {
        Ok(Self {
            limits: parse_resource_list(limits)?,
            requests: parse_resource_list(requests)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty() && self.requests.is_empty()
    }

    /// Writes the requirements into a container object, returning whether
    /// anything changed. Entries not mentioned are left as they are.
    pub fn apply_to_container(&self, container: &mut Value) -> Result<bool> {
        let obj = container.as_object_mut().ok_or_else(|| {
            KruiseError::InvalidResource("container is not an object".to_string())
        })?;

        let resources = obj
            .entry("resources")
            .or_insert_with(|| Value::Object(Map::new()));
        if !resources.is_object() {
            *resources = Value::Object(Map::new());
        }

        let mut changed = false;
        for (field, list) in [("limits", &self.limits), ("requests", &self.requests)] {
            if list.is_empty() {
                continue;
            }
            let Some(resources) = resources.as_object_mut() else {
                continue;
            };
            let target = resources
                .entry(field)
                .or_insert_with(|| Value::Object(Map::new()));
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            let Some(target) = target.as_object_mut() else {
                continue;
            };

            for (name, quantity) in list {
                let value = Value::String(quantity.0.clone());
                if target.get(name) != Some(&value) {
                    target.insert(name.clone(), value);
                    changed = true;
                }
            }
        }
        Ok(changed)
    }
}
