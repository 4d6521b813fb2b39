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

//! Workload domain: resource kinds and the object mutations the commands perform

pub mod approver;
pub mod containers;
pub mod kinds;
pub mod pod_spec;
pub mod pods;
pub mod requirements;

pub use self::approver::approve_object;
pub use self::containers::{
    select_containers, update_container_resources, ContainerPattern, ContainerUpdate,
};
pub use self::kinds::{ResourceMapping, WorkloadKind};
pub use self::pod_spec::{pod_spec, pod_spec_mut, update_pod_spec};
pub use self::requirements::{parse_resource_list, ResourceRequirementsUpdate};
