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

//! Resource types the plugin knows without asking the API server.

use crate::infrastructure::constants::{
    GROUP_APPS, GROUP_BATCH, GROUP_CORE, GROUP_KRUISE_APPS, GROUP_KRUISE_ROLLOUTS,
};
use kube::api::ApiResource;

/// Workload flavours the commands treat differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Pod,
    CloneSet,
    AdvancedStatefulSet,
    AdvancedDaemonSet,
    Rollout,
    Deployment,
    StatefulSet,
    DaemonSet,
    ReplicaSet,
    ReplicationController,
    Job,
    CronJob,
    Other,
}

impl WorkloadKind {
    pub fn from_group_kind(group: &str, kind: &str) -> Self {
        match (group, kind) {
            (GROUP_CORE, "Pod") => Self::Pod,
            (GROUP_CORE, "ReplicationController") => Self::ReplicationController,
            (GROUP_KRUISE_APPS, "CloneSet") => Self::CloneSet,
            (GROUP_KRUISE_APPS, "StatefulSet") => Self::AdvancedStatefulSet,
            (GROUP_KRUISE_APPS, "DaemonSet") => Self::AdvancedDaemonSet,
            (GROUP_KRUISE_ROLLOUTS, "Rollout") => Self::Rollout,
            (GROUP_APPS, "Deployment") | ("extensions", "Deployment") => Self::Deployment,
            (GROUP_APPS, "StatefulSet") => Self::StatefulSet,
            (GROUP_APPS, "DaemonSet") | ("extensions", "DaemonSet") => Self::DaemonSet,
            (GROUP_APPS, "ReplicaSet") | ("extensions", "ReplicaSet") => Self::ReplicaSet,
            (GROUP_BATCH, "Job") => Self::Job,
            (GROUP_BATCH, "CronJob") => Self::CronJob,
            _ => Self::Other,
        }
    }

    /// OpenKruise custom resources do not accept strategic merge patches.
    pub fn is_kruise(&self) -> bool {
        matches!(
            self,
            Self::CloneSet | Self::AdvancedStatefulSet | Self::AdvancedDaemonSet | Self::Rollout
        )
    }

    /// JSON path from the object root to its pod spec.
    pub fn pod_spec_path(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::Pod => Some(&["spec"]),
            Self::CronJob => Some(&["spec", "jobTemplate", "spec", "template", "spec"]),
            Self::CloneSet
            | Self::AdvancedStatefulSet
            | Self::AdvancedDaemonSet
            | Self::Deployment
            | Self::StatefulSet
            | Self::DaemonSet
            | Self::ReplicaSet
            | Self::ReplicationController
            | Self::Job => Some(&["spec", "template", "spec"]),
            Self::Rollout | Self::Other => None,
        }
    }
}

struct KnownResource {
    group: &'static str,
    version: &'static str,
    kind: &'static str,
    plural: &'static str,
    namespaced: bool,
    aliases: &'static [&'static str],
}

const KNOWN_RESOURCES: &[KnownResource] = &[
    KnownResource {
        group: GROUP_CORE,
        version: "v1",
        kind: "Pod",
        plural: "pods",
        namespaced: true,
        aliases: &["pod", "po"],
    },
    KnownResource {
        group: GROUP_CORE,
        version: "v1",
        kind: "ReplicationController",
        plural: "replicationcontrollers",
        namespaced: true,
        aliases: &["replicationcontroller", "rc"],
    },
    KnownResource {
        group: GROUP_KRUISE_APPS,
        version: "v1alpha1",
        kind: "CloneSet",
        plural: "clonesets",
        namespaced: true,
        aliases: &["cloneset", "clone"],
    },
    KnownResource {
        group: GROUP_KRUISE_APPS,
        version: "v1beta1",
        kind: "StatefulSet",
        plural: "statefulsets",
        namespaced: true,
        aliases: &["asts", "advancedstatefulset"],
    },
    KnownResource {
        group: GROUP_KRUISE_APPS,
        version: "v1alpha1",
        kind: "DaemonSet",
        plural: "daemonsets",
        namespaced: true,
        aliases: &["ads", "advanceddaemonset"],
    },
    KnownResource {
        group: GROUP_KRUISE_ROLLOUTS,
        version: "v1alpha1",
        kind: "Rollout",
        plural: "rollouts",
        namespaced: true,
        aliases: &["rollout", "ro"],
    },
    KnownResource {
        group: GROUP_APPS,
        version: "v1",
        kind: "Deployment",
        plural: "deployments",
        namespaced: true,
        aliases: &["deployment", "deploy"],
    },
    KnownResource {
        group: GROUP_APPS,
        version: "v1",
        kind: "StatefulSet",
        plural: "statefulsets",
        namespaced: true,
        aliases: &["statefulset", "sts"],
    },
    KnownResource {
        group: GROUP_APPS,
        version: "v1",
        kind: "DaemonSet",
        plural: "daemonsets",
        namespaced: true,
        aliases: &["daemonset", "ds"],
    },
    KnownResource {
        group: GROUP_APPS,
        version: "v1",
        kind: "ReplicaSet",
        plural: "replicasets",
        namespaced: true,
        aliases: &["replicaset", "rs"],
    },
    KnownResource {
        group: GROUP_BATCH,
        version: "v1",
        kind: "Job",
        plural: "jobs",
        namespaced: true,
        aliases: &["job"],
    },
    KnownResource {
        group: GROUP_BATCH,
        version: "v1",
        kind: "CronJob",
        plural: "cronjobs",
        namespaced: true,
        aliases: &["cronjob", "cj"],
    },
];

/// Everything needed to talk to the API for one resource type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceMapping {
    pub resource: ApiResource,
    pub namespaced: bool,
    pub workload: WorkloadKind,
}

impl ResourceMapping {
    pub fn new(resource: ApiResource, namespaced: bool) -> Self {
        let workload = WorkloadKind::from_group_kind(&resource.group, &resource.kind);
        Self {
            resource,
            namespaced,
            workload,
        }
    }

    fn from_known(known: &KnownResource) -> Self {
        let api_version = if known.group.is_empty() {
            known.version.to_string()
        } else {
            format!("{}/{}", known.group, known.version)
        };
        Self::new(
            ApiResource {
                group: known.group.to_string(),
                version: known.version.to_string(),
                api_version,
                kind: known.kind.to_string(),
                plural: known.plural.to_string(),
            },
            known.namespaced,
        )
    }

    /// Resolves a type argument such as `clone`, `deployments` or
    /// `statefulsets.apps.kruise.io`.
    pub fn lookup(type_name: &str) -> Option<Self> {
        let name = type_name.to_lowercase();
        let (resource, group) = match name.split_once('.') {
            Some((resource, group)) => (resource.to_string(), Some(group.to_string())),
            None => (name, None),
        };

        let matches = |k: &&KnownResource| {
            k.plural == resource
                || k.kind.to_lowercase() == resource
                || k.aliases.contains(&resource.as_str())
        };

        let found = match &group {
            Some(g) => KNOWN_RESOURCES
                .iter()
                .filter(|k| k.group == g.as_str())
                .find(matches),
            // Bare names only reach OpenKruise look-alikes of built-in kinds
            // through their own aliases.
            None => KNOWN_RESOURCES
                .iter()
                .filter(|k| !shadows_builtin(k) || k.aliases.contains(&resource.as_str()))
                .find(matches),
        };
        found.map(Self::from_known)
    }

    /// Resolves the mapping for a manifest's `apiVersion` and `kind`.
    pub fn lookup_gvk(api_version: &str, kind: &str) -> Option<Self> {
        let (group, version) = split_api_version(api_version);
        KNOWN_RESOURCES
            .iter()
            .find(|k| k.group == group && k.kind == kind)
            .map(|k| {
                let mut mapping = Self::from_known(k);
                mapping.resource.version = version.to_string();
                mapping.resource.api_version = api_version.to_string();
                mapping
            })
    }

    /// `cloneset.apps.kruise.io` style name used when printing objects.
    pub fn qualified_kind(&self) -> String {
        let kind = self.resource.kind.to_lowercase();
        if self.resource.group.is_empty() {
            kind
        } else {
            format!("{}.{}", kind, self.resource.group)
        }
    }
}

/// An OpenKruise kind that shares its plural with a built-in kind.
fn shadows_builtin(known: &KnownResource) -> bool {
    known.group == GROUP_KRUISE_APPS && matches!(known.kind, "StatefulSet" | "DaemonSet")
}

pub fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => (GROUP_CORE, api_version),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_aliases() {
        let clone = ResourceMapping::lookup("clone").unwrap();
        assert_eq!(clone.workload, WorkloadKind::CloneSet);
        assert_eq!(clone.resource.api_version, "apps.kruise.io/v1alpha1");

        let pods = ResourceMapping::lookup("pods").unwrap();
        assert_eq!(pods.workload, WorkloadKind::Pod);
        assert_eq!(pods.resource.api_version, "v1");

        let rollout = ResourceMapping::lookup("Rollout").unwrap();
        assert_eq!(rollout.workload, WorkloadKind::Rollout);
    }

    #[test]
    fn test_lookup_statefulset_flavours() {
        let sts = ResourceMapping::lookup("statefulset").unwrap();
        assert_eq!(sts.workload, WorkloadKind::StatefulSet);

        let asts = ResourceMapping::lookup("asts").unwrap();
        assert_eq!(asts.workload, WorkloadKind::AdvancedStatefulSet);

        let qualified = ResourceMapping::lookup("statefulsets.apps.kruise.io").unwrap();
        assert_eq!(qualified.workload, WorkloadKind::AdvancedStatefulSet);
        assert_eq!(qualified.resource.version, "v1beta1");

        let ads = ResourceMapping::lookup("daemonset.apps.kruise.io").unwrap();
        assert_eq!(ads.workload, WorkloadKind::AdvancedDaemonSet);
    }

    #[test]
    fn test_lookup_unknown() {
        assert!(ResourceMapping::lookup("widgets").is_none());
        assert!(ResourceMapping::lookup("clonesets.example.com").is_none());
    }

    #[test]
    fn test_lookup_gvk_keeps_version() {
        let rollout = ResourceMapping::lookup_gvk("rollouts.kruise.io/v1beta1", "Rollout").unwrap();
        assert_eq!(rollout.resource.version, "v1beta1");
        assert_eq!(rollout.resource.plural, "rollouts");
        assert!(ResourceMapping::lookup_gvk("v1", "ConfigMap").is_none());
    }

    #[test]
    fn test_qualified_kind() {
        assert_eq!(
            ResourceMapping::lookup("clone").unwrap().qualified_kind(),
            "cloneset.apps.kruise.io"
        );
        assert_eq!(ResourceMapping::lookup("po").unwrap().qualified_kind(), "pod");
    }

    #[test]
    fn test_pod_spec_paths() {
        assert_eq!(WorkloadKind::Pod.pod_spec_path(), Some(&["spec"][..]));
        assert_eq!(WorkloadKind::CronJob.pod_spec_path().unwrap().len(), 5);
        assert!(WorkloadKind::Rollout.pod_spec_path().is_none());
        assert!(WorkloadKind::CloneSet.is_kruise());
        assert!(!WorkloadKind::Deployment.is_kruise());
    }
}
